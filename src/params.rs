//! # Acquisition parameters
//!
//! This module defines [`GalaxyParams`] and its builder, which control how targets are
//! resolved against the catalog and how images are acquired.
//!
//! ## Purpose
//!
//! A single [`GalaxyParams`] value is shared by the resolver, the multi-band fetcher and the
//! batch orchestrator. It allows you to:
//!
//! - Bound the **expanding-radius search** (`max_search_radius`, arcminutes),
//! - Size the **worker pools** (`worker_count` for batch rows, `band_workers` per target),
//! - Harden network access with **per-call timeouts** and **bounded retries**,
//! - Select the **bands** acquired in the batch fetch phase,
//! - Toggle the **progress display** (requires the `progress` feature to render a bar).
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use gmag::params::GalaxyParams;
//!
//! let params = GalaxyParams::builder()
//!     .max_search_radius(4.0)
//!     .worker_count(16)
//!     .request_timeout(Duration::from_secs(20))
//!     .bands("gri")
//!     .build()
//!     .unwrap();
//! ```
use std::{fmt, time::Duration};

use crate::{band::BandSelection, constants::ArcMin, constants::BAND_WORKERS, GalaxyError};

/// Configuration for catalog resolution and image acquisition.
///
/// Defaults
/// -----------------
/// * `max_search_radius`: 8.0 arcmin
/// * `worker_count`: 16
/// * `band_workers`: 5
/// * `request_timeout`: 30 s
/// * `row_timeout`: 120 s
/// * `max_retries`: 2
/// * `retry_backoff`: 500 ms (doubled after each failed attempt)
/// * `bands`: `ugriz`
/// * `show_progress`: false
///
/// Validation
/// -----------------
/// * `max_search_radius > 0` and finite.
/// * `worker_count ≥ 1`, `band_workers ≥ 1`.
/// * `request_timeout > 0`, `row_timeout > 0`.
#[derive(Debug, Clone)]
pub struct GalaxyParams {
    /// Largest radius (arcmin) probed by the nearest-object search.
    pub max_search_radius: ArcMin,
    /// Number of batch rows processed concurrently.
    pub worker_count: usize,
    /// Number of bands downloaded concurrently for one target.
    pub band_workers: usize,
    /// Timeout applied to every single HTTP call.
    pub request_timeout: Duration,
    /// Timeout applied to one batch row as a whole (resolution or acquisition).
    pub row_timeout: Duration,
    /// Additional attempts after a transport failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub retry_backoff: Duration,
    pub bands: BandSelection,
    pub show_progress: bool,
}

impl GalaxyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`GalaxyParamsBuilder`] initialized with default values.
    pub fn builder() -> GalaxyParamsBuilder {
        GalaxyParamsBuilder::new()
    }
}

impl Default for GalaxyParams {
    fn default() -> Self {
        GalaxyParams {
            max_search_radius: 8.0,
            worker_count: 16,
            band_workers: BAND_WORKERS,
            request_timeout: Duration::from_secs(30),
            row_timeout: Duration::from_secs(120),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            bands: BandSelection::all(),
            show_progress: false,
        }
    }
}

/// Builder for [`GalaxyParams`], with validation.
///
/// A band string that fails to parse is remembered and reported by [`build`](GalaxyParamsBuilder::build).
#[derive(Debug, Clone)]
pub struct GalaxyParamsBuilder {
    params: GalaxyParams,
    bands_error: Option<String>,
}

impl Default for GalaxyParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GalaxyParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: GalaxyParams::default(),
            bands_error: None,
        }
    }

    pub fn max_search_radius(mut self, v: ArcMin) -> Self {
        self.params.max_search_radius = v;
        self
    }
    pub fn worker_count(mut self, v: usize) -> Self {
        self.params.worker_count = v;
        self
    }
    pub fn band_workers(mut self, v: usize) -> Self {
        self.params.band_workers = v;
        self
    }
    pub fn request_timeout(mut self, v: Duration) -> Self {
        self.params.request_timeout = v;
        self
    }
    pub fn row_timeout(mut self, v: Duration) -> Self {
        self.params.row_timeout = v;
        self
    }
    pub fn max_retries(mut self, v: u32) -> Self {
        self.params.max_retries = v;
        self
    }
    pub fn retry_backoff(mut self, v: Duration) -> Self {
        self.params.retry_backoff = v;
        self
    }
    pub fn show_progress(mut self, v: bool) -> Self {
        self.params.show_progress = v;
        self
    }

    /// Parse a band string such as `"gri"`.
    pub fn bands(mut self, v: &str) -> Self {
        match v.parse::<BandSelection>() {
            Ok(sel) => {
                self.params.bands = sel;
                self.bands_error = None;
            }
            Err(e) => self.bands_error = Some(e.to_string()),
        }
        self
    }

    pub fn band_selection(mut self, v: BandSelection) -> Self {
        self.params.bands = v;
        self.bands_error = None;
        self
    }

    /// Validate and return the parameters.
    ///
    /// Return
    /// ----------
    /// * The validated [`GalaxyParams`], [`GalaxyError::InvalidInput`] for a bad band string,
    ///   or [`GalaxyError::InvalidParameter`] naming the first offending field.
    pub fn build(self) -> Result<GalaxyParams, GalaxyError> {
        if let Some(msg) = self.bands_error {
            return Err(GalaxyError::InvalidInput(msg));
        }

        let p = &self.params;

        if !(p.max_search_radius.is_finite() && p.max_search_radius > 0.0) {
            return Err(GalaxyError::InvalidParameter(
                "max_search_radius must be > 0".into(),
            ));
        }
        if p.worker_count == 0 {
            return Err(GalaxyError::InvalidParameter(
                "worker_count must be >= 1".into(),
            ));
        }
        if p.band_workers == 0 {
            return Err(GalaxyError::InvalidParameter(
                "band_workers must be >= 1".into(),
            ));
        }
        if p.request_timeout.is_zero() {
            return Err(GalaxyError::InvalidParameter(
                "request_timeout must be > 0".into(),
            ));
        }
        if p.row_timeout.is_zero() {
            return Err(GalaxyError::InvalidParameter(
                "row_timeout must be > 0".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for GalaxyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Galaxy acquisition parameters")?;
            writeln!(f, "-----------------------------")?;
            writeln!(f, "  max_search_radius = {} arcmin", self.max_search_radius)?;
            writeln!(f, "  worker_count      = {}", self.worker_count)?;
            writeln!(f, "  band_workers      = {}", self.band_workers)?;
            writeln!(f, "  request_timeout   = {:?}", self.request_timeout)?;
            writeln!(f, "  row_timeout       = {:?}", self.row_timeout)?;
            writeln!(f, "  max_retries       = {}", self.max_retries)?;
            writeln!(f, "  retry_backoff     = {:?}", self.retry_backoff)?;
            writeln!(f, "  bands             = {}", self.bands)?;
            write!(f, "  show_progress     = {}", self.show_progress)
        } else {
            write!(
                f,
                "radius={}', workers={}, band_workers={}, timeout={:?}, retries={}, bands={}",
                self.max_search_radius,
                self.worker_count,
                self.band_workers,
                self.request_timeout,
                self.max_retries,
                self.bands
            )
        }
    }
}
