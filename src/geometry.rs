//! # Cutout geometry
//!
//! Derives the integer pixel bounding box of a galaxy cutout from its sky position and angular
//! size, through the frame's own [`WorldToPixel`] transform.
//!
//! ## Algorithm
//! -----------------
//! 1. Project the centre `(ra, dec)` → `(x, y)`.
//! 2. Project the edge point `(ra + size/3600, dec + size/3600)` → `(x_e, y_e)`.
//! 3. `radius_px = max(|x − x_e|, |y − y_e|)`.
//! 4. `cutout_radius = ceil(1.25 · radius_px / 10) · 10`, never less than 10 pixels.
//! 5. Box = `[x − r, x + r] × [y − r, y + r]`, each bound truncated toward zero.
//!
//! Each band has its own transform, so the box is derived per band even though the sky
//! position and angular size are shared.
//!
//! The box is **not** clamped to the frame. [`crop`] clips silently when extracting pixels.
use nalgebra::DMatrix;

use crate::{
    constants::{arcsec_to_deg, ArcSec, Degree, Pixel, CUTOUT_MARGIN, CUTOUT_ROUNDING_PX},
    wcs::WorldToPixel,
    GalaxyError,
};

/// Integer pixel bounding box, `max_x > min_x` and `max_y > min_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoutSpec {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl CutoutSpec {
    pub fn width(&self) -> i64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i64 {
        self.max_y - self.min_y
    }
}

/// Cutout half-width for an estimated extent of `radius_px` pixels.
///
/// Applies the 25 % margin and rounds up to the next multiple of 10 pixels, with one
/// rounding step as the minimum so that a box is never empty.
pub fn cutout_radius(radius_px: Pixel) -> Pixel {
    let rounded = (CUTOUT_MARGIN * radius_px / CUTOUT_ROUNDING_PX).ceil() * CUTOUT_ROUNDING_PX;
    rounded.max(CUTOUT_ROUNDING_PX)
}

/// Bounding box of radius `radius` around the pixel `(x, y)`.
pub fn bounding_box(x: Pixel, y: Pixel, radius: Pixel) -> CutoutSpec {
    CutoutSpec {
        min_x: (x - radius).trunc() as i64,
        max_x: (x + radius).trunc() as i64,
        min_y: (y - radius).trunc() as i64,
        max_y: (y + radius).trunc() as i64,
    }
}

/// Compute the cutout box of a target on one frame.
///
/// Arguments
/// -----------------
/// * `ra`, `dec`: target position (degrees).
/// * `angular_size`: estimated angular extent (arcseconds).
/// * `transform`: the frame's world-to-pixel transform.
///
/// Return
/// ----------
/// * The [`CutoutSpec`], or [`GalaxyError::InvalidFrame`] when the transform cannot project the
///   target or the size is not a finite non-negative number.
pub fn compute_cutout(
    ra: Degree,
    dec: Degree,
    angular_size: ArcSec,
    transform: &dyn WorldToPixel,
) -> Result<CutoutSpec, GalaxyError> {
    if !(angular_size.is_finite() && angular_size >= 0.0) {
        return Err(GalaxyError::InvalidFrame(format!(
            "invalid angular size {angular_size}"
        )));
    }

    let project = |ra: Degree, dec: Degree| {
        transform.world_to_pixel(ra, dec).ok_or_else(|| {
            GalaxyError::InvalidFrame(format!("({ra}, {dec}) cannot be projected on this frame"))
        })
    };

    let offset = arcsec_to_deg(angular_size);
    let (x, y) = project(ra, dec)?;
    let (x_edge, y_edge) = project(ra + offset, dec + offset)?;

    let radius_px = (x - x_edge).abs().max((y - y_edge).abs());
    Ok(bounding_box(x, y, cutout_radius(radius_px)))
}

/// Extract the pixels of `spec` from `pixels` (indexed `(y, x)`).
///
/// Bounds are half-open (`min..max`) and clipped to the array; a box entirely outside the
/// frame yields an empty matrix.
pub fn crop(pixels: &DMatrix<f32>, spec: &CutoutSpec) -> DMatrix<f32> {
    let clip = |lo: i64, hi: i64, len: usize| {
        let len = len as i64;
        (lo.clamp(0, len) as usize, hi.clamp(0, len) as usize)
    };
    let (x0, x1) = clip(spec.min_x, spec.max_x, pixels.ncols());
    let (y0, y1) = clip(spec.min_y, spec.max_y, pixels.nrows());

    if x1 <= x0 || y1 <= y0 {
        return DMatrix::zeros(0, 0);
    }
    pixels.view((y0, x0), (y1 - y0, x1 - x0)).into_owned()
}
