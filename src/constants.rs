//! # Constants and type definitions for gmag
//!
//! This module centralizes the **survey endpoints**, **cutout sizing constants**, and **common
//! type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Angular unit aliases (degrees, arcminutes, arcseconds) and pixel coordinates
//! - Unit conversions (arcseconds ↔ degrees)
//! - SDSS SkyServer / SAS endpoints for the catalog, frame archive and JPEG cutout service
//! - Cutout sizing constants shared by the geometry engine and the preview fetcher
//!
//! These definitions are used by all main modules, including the resolver, the geometry engine
//! and the batch orchestrator.

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in arcminutes
pub type ArcMin = f64;
/// Angle in arcseconds
pub type ArcSec = f64;
/// Continuous pixel coordinate (0-based)
pub type Pixel = f64;

/// SDSS photometric object identifier (`objID`).
pub type ObjId = i64;

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Arcseconds per degree
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Convert an angle in arcseconds to degrees.
#[inline]
pub fn arcsec_to_deg(angle: ArcSec) -> Degree {
    angle / ARCSEC_PER_DEG
}

// -------------------------------------------------------------------------------------------------
// Cutout sizing
// -------------------------------------------------------------------------------------------------

/// Safety margin applied to the estimated galaxy extent.
pub const CUTOUT_MARGIN: f64 = 1.25;

/// Cutout radii are rounded up to a multiple of this many pixels.
pub const CUTOUT_ROUNDING_PX: f64 = 10.0;

/// Width and height (pixels) of the colour preview raster.
pub const PREVIEW_SIZE: u32 = 256;

/// Number of concurrent per-band downloads for a single target.
pub const BAND_WORKERS: usize = 5;

/// Initial radius (arcminutes) of the expanding nearest-object search.
pub const INITIAL_SEARCH_RADIUS: ArcMin = 1.0;

// -------------------------------------------------------------------------------------------------
// Endpoints
// -------------------------------------------------------------------------------------------------

/// SkyServer SQL search endpoint (data release 17).
pub const SKYSERVER_SQL_URL: &str = "https://skyserver.sdss.org/dr17/SkyServerWS/SearchTools/SqlSearch";

/// SkyServer JPEG cutout endpoint (data release 17).
pub const SKYSERVER_CUTOUT_URL: &str = "https://skyserver.sdss.org/dr17/SkyServerWS/ImgCutout/getjpeg";

/// Science Archive Server root for calibrated frames (rerun 301).
pub const SAS_FRAMES_URL: &str = "https://data.sdss.org/sas/dr17/eboss/photoObj/frames/301";
