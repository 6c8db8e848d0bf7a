//! # Colour preview
//!
//! A single composite-colour raster, centred on the target, for quick visual inspection. The
//! pixel scale is chosen so that the 256×256 raster spans the same margin as the per-band
//! cutouts:
//!
//! ```text
//! scale ("/px) = 2 · 1.25 · angular_size / 256
//! ```
//!
//! The preview is informational only. Callers treat its failure as a missing preview, never
//! as a failure of the band acquisition.
use std::future::Future;

use image::RgbImage;
use tracing::debug;

use crate::{
    constants::{ArcSec, Degree, CUTOUT_MARGIN, PREVIEW_SIZE, SKYSERVER_CUTOUT_URL},
    http::HttpClient,
    GalaxyError,
};

/// Service returning an encoded raster (JPEG, PNG…) for a sky position.
pub trait PreviewService: Send + Sync {
    fn fetch_raster(
        &self,
        ra: Degree,
        dec: Degree,
        scale: ArcSec,
        width: u32,
        height: u32,
    ) -> impl Future<Output = Result<Vec<u8>, GalaxyError>> + Send;
}

/// Decoded preview and the pixel scale it was requested at.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// Arcseconds per pixel.
    pub scale: ArcSec,
    pub image: RgbImage,
}

/// Pixel scale (arcsec/px) giving the standard margin around a galaxy of `angular_size`.
pub fn preview_scale(angular_size: ArcSec) -> ArcSec {
    2.0 * CUTOUT_MARGIN * angular_size / PREVIEW_SIZE as f64
}

/// Preview Fetcher over any [`PreviewService`].
#[derive(Debug, Clone)]
pub struct PreviewFetcher<P> {
    service: P,
}

impl<P: PreviewService> PreviewFetcher<P> {
    pub fn new(service: P) -> Self {
        PreviewFetcher { service }
    }

    /// Request and decode the preview of a galaxy.
    ///
    /// Return
    /// ----------
    /// * The decoded [`Preview`], or an error when the raster cannot be downloaded, decoded, or
    ///   does not have the requested 256×256 size.
    pub async fn fetch(
        &self,
        ra: Degree,
        dec: Degree,
        angular_size: ArcSec,
    ) -> Result<Preview, GalaxyError> {
        let scale = preview_scale(angular_size);
        let bytes = self
            .service
            .fetch_raster(ra, dec, scale, PREVIEW_SIZE, PREVIEW_SIZE)
            .await?;

        let image = image::load_from_memory(&bytes)?.to_rgb8();
        if image.dimensions() != (PREVIEW_SIZE, PREVIEW_SIZE) {
            return Err(GalaxyError::MalformedResponse(format!(
                "preview is {:?}, expected {PREVIEW_SIZE}x{PREVIEW_SIZE}",
                image.dimensions()
            )));
        }
        debug!(ra, dec, scale, "preview decoded");
        Ok(Preview { scale, image })
    }
}

/// [`PreviewService`] backed by the SkyServer JPEG cutout service.
#[derive(Debug, Clone)]
pub struct SkyServerPreview {
    http: HttpClient,
    url: String,
}

impl SkyServerPreview {
    pub fn new(http: HttpClient) -> Self {
        SkyServerPreview {
            http,
            url: SKYSERVER_CUTOUT_URL.to_string(),
        }
    }
}

impl PreviewService for SkyServerPreview {
    async fn fetch_raster(
        &self,
        ra: Degree,
        dec: Degree,
        scale: ArcSec,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, GalaxyError> {
        self.http
            .get_bytes(
                &self.url,
                &[
                    ("ra", ra.to_string()),
                    ("dec", dec.to_string()),
                    ("scale", scale.to_string()),
                    ("width", width.to_string()),
                    ("height", height.to_string()),
                ],
            )
            .await
    }
}
