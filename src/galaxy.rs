//! # Galaxy records and the single-target pipeline
//!
//! [`GalaxyFetcher`] composes the resolver, the multi-band fetcher and the preview fetcher
//! serially for one [`Target`]:
//!
//! ```text
//! Target ──resolve──▶ objID ──describe──▶ ImagingDescriptor ──┬─▶ preview (optional)
//!                                                           └─▶ 5 bands ─▶ GalaxyRecord
//! ```
//!
//! A [`GalaxyRecord`] is only handed out once every band has been acquired. Its fields are
//! read through accessors; nothing mutates it afterwards. The preview never holds the record
//! back: it is dropped if it is still pending at the row deadline.
//!
//! ## Example
//! -----------------
//! ```rust,no_run
//! use gmag::{galaxy::{GalaxyFetcher, Target}, params::GalaxyParams};
//!
//! # async fn run() -> Result<(), gmag::GalaxyError> {
//! let fetcher = GalaxyFetcher::sdss(GalaxyParams::default())?;
//! let record = fetcher
//!     .fetch(&Target::Coordinates { ra: 179.689, dec: -0.454, max_radius: Some(2.0) })
//!     .await?;
//! println!("{record}");
//! # Ok(()) }
//! ```
use std::fmt;

use tokio::time::{error::Elapsed, timeout_at, Instant};
use tracing::{info, warn};

use crate::{
    band::Band,
    bands::{BandImage, MultiBandFetcher},
    catalog::{Catalog, SearchConstraints, SkyServerCatalog},
    constants::{ArcMin, Degree, ObjId},
    frames::{FrameArchive, SdssFrameArchive},
    http::HttpClient,
    params::GalaxyParams,
    preview::{Preview, PreviewFetcher, PreviewService, SkyServerPreview},
    resolver::{ImagingDescriptor, Resolver},
    GalaxyError,
};

/// Longest name rendered in full by the record summary.
const MAX_DISPLAY_NAME: usize = 35;

/// What to fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// A known catalog object.
    ObjectId(ObjId),
    /// The nearest galaxy to a sky position, searched up to `max_radius` (arcmin) or the
    /// configured default.
    Coordinates {
        ra: Degree,
        dec: Degree,
        max_radius: Option<ArcMin>,
    },
    /// A random galaxy meeting quality constraints.
    Random(SearchConstraints),
}

/// A fully acquired galaxy: identifier, position, optional preview and five band cutouts.
#[derive(Debug, Clone, PartialEq)]
pub struct GalaxyRecord {
    id: ObjId,
    name: String,
    descriptor: ImagingDescriptor,
    preview: Option<Preview>,
    bands: [BandImage; 5],
}

impl GalaxyRecord {
    /// Assemble a record; `bands` must be in `u, g, r, i, z` order.
    pub fn new(
        id: ObjId,
        descriptor: ImagingDescriptor,
        preview: Option<Preview>,
        bands: [BandImage; 5],
    ) -> Result<Self, GalaxyError> {
        if bands.iter().map(|b| b.band).ne(Band::ALL) {
            return Err(GalaxyError::InvalidInput(
                "band images must be ordered u, g, r, i, z".to_string(),
            ));
        }
        Ok(GalaxyRecord {
            id,
            name: format!("SDSS {id}"),
            descriptor,
            preview,
            bands,
        })
    }

    /// Replace the display name. Names longer than 35 characters are truncated when displayed.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if name.chars().count() > MAX_DISPLAY_NAME {
            warn!(name = %name, "name is too long, it will be truncated in the summary");
        }
        self.name = name;
        self
    }

    pub fn id(&self) -> ObjId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ra(&self) -> Degree {
        self.descriptor.ra
    }

    pub fn dec(&self) -> Degree {
        self.descriptor.dec
    }

    pub fn descriptor(&self) -> &ImagingDescriptor {
        &self.descriptor
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// The five cutouts, `u, g, r, i, z`.
    pub fn bands(&self) -> &[BandImage; 5] {
        &self.bands
    }

    pub fn band(&self, band: Band) -> &BandImage {
        &self.bands[band.index()]
    }
}

impl fmt::Display for GalaxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {:>40.35}", self.name)?;
        writeln!(f, "ObjID: {:>39}", self.id)?;
        writeln!(f, "RA: {:>42.5}", self.ra())?;
        writeln!(f, "DEC: {:>41.5}", self.dec())?;
        write!(f, "Size (arcsec): {:>31.2}", self.descriptor.angular_size)
    }
}

/// Single-target pipeline.
#[derive(Debug, Clone)]
pub struct GalaxyFetcher<C, A, P> {
    resolver: Resolver<C>,
    bands: MultiBandFetcher<A>,
    previews: PreviewFetcher<P>,
    params: GalaxyParams,
}

impl GalaxyFetcher<SkyServerCatalog, SdssFrameArchive, SkyServerPreview> {
    /// Pipeline over the live SDSS services, sharing one HTTP connection pool.
    pub fn sdss(params: GalaxyParams) -> Result<Self, GalaxyError> {
        let http = HttpClient::new(&params)?;
        Ok(GalaxyFetcher::new(
            SkyServerCatalog::new(http.clone()),
            SdssFrameArchive::new(http.clone()),
            SkyServerPreview::new(http),
            params,
        ))
    }
}

impl<C: Catalog, A: FrameArchive, P: PreviewService> GalaxyFetcher<C, A, P> {
    pub fn new(catalog: C, archive: A, preview: P, params: GalaxyParams) -> Self {
        GalaxyFetcher {
            resolver: Resolver::new(catalog),
            bands: MultiBandFetcher::new(archive, params.band_workers),
            previews: PreviewFetcher::new(preview),
            params,
        }
    }

    pub fn resolver(&self) -> &Resolver<C> {
        &self.resolver
    }

    pub fn bands(&self) -> &MultiBandFetcher<A> {
        &self.bands
    }

    /// Resolve `target` and acquire its record.
    ///
    /// Return
    /// ----------
    /// * The complete [`GalaxyRecord`].
    /// * [`GalaxyError::NotFound`] when a coordinate search finds nothing, or any resolution or
    ///   band acquisition error. A failed preview is logged and leaves the preview empty.
    /// * [`GalaxyError::Timeout`] when resolution and band acquisition exceed `row_timeout`.
    pub async fn fetch(&self, target: &Target) -> Result<GalaxyRecord, GalaxyError> {
        let deadline = Instant::now() + self.params.row_timeout;
        let id = timeout_at(
            deadline,
            self.resolver
                .resolve_target(target, self.params.max_search_radius),
        )
        .await
        .map_err(|_| GalaxyError::Timeout(format!("resolution of {target:?}")))??
        .ok_or_else(|| GalaxyError::NotFound(format!("no galaxy near {target:?}")))?;
        self.acquire_until(id, deadline).await
    }

    /// Acquire a random galaxy meeting `constraints`.
    pub async fn fetch_random(
        &self,
        constraints: SearchConstraints,
    ) -> Result<GalaxyRecord, GalaxyError> {
        self.fetch(&Target::Random(constraints)).await
    }

    /// Acquire the record of a known object within `row_timeout`.
    pub async fn acquire(&self, id: ObjId) -> Result<GalaxyRecord, GalaxyError> {
        self.acquire_until(id, Instant::now() + self.params.row_timeout)
            .await
    }

    /// Describe `id`, then fetch the preview and the bands together.
    ///
    /// Only the description and the bands are bound by `deadline`. A preview still pending
    /// when the bands are in is given until `deadline`, then dropped.
    async fn acquire_until(
        &self,
        id: ObjId,
        deadline: Instant,
    ) -> Result<GalaxyRecord, GalaxyError> {
        let timed_out = |_: Elapsed| GalaxyError::Timeout(format!("acquisition of object {id}"));
        let descriptor = timeout_at(deadline, self.resolver.describe(id))
            .await
            .map_err(timed_out)??;

        let preview = self
            .previews
            .fetch(descriptor.ra, descriptor.dec, descriptor.angular_size);
        let bands = timeout_at(deadline, self.bands.fetch_all(&descriptor));
        tokio::pin!(preview, bands);

        let (bands, preview) = tokio::select! {
            preview = &mut preview => (bands.await, Some(preview)),
            bands = &mut bands => (bands, timeout_at(deadline, preview).await.ok()),
        };
        let bands = bands.map_err(timed_out)??;

        let preview = match preview {
            Some(Ok(preview)) => Some(preview),
            Some(Err(e)) => {
                warn!(objid = id, error = %e, "preview unavailable");
                None
            }
            None => {
                warn!(objid = id, "preview still pending when the bands were in, dropped");
                None
            }
        };
        let record = GalaxyRecord::new(id, descriptor, preview, bands)?;
        info!(objid = id, frame = %descriptor.frame_id(), "galaxy acquired");
        Ok(record)
    }
}
