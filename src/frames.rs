//! # Frame archive
//!
//! A *frame* is one imaging exposure identified by `(run, camcol, field)`, stored once per band.
//! The acquisition pipeline consumes a frame as a pixel array plus its world-to-pixel transform
//! ([`Frame`]), obtained through the [`FrameArchive`] trait.
//!
//! [`SdssFrameArchive`] downloads calibrated frames from the SDSS Science Archive Server. The
//! URL is a pure function of `(run, camcol, field, band)`:
//!
//! ```text
//! {SAS}/frames/301/{run}/{camcol}/frame-{band}-{run:06}-{camcol}-{field:04}.fits.bz2
//! ```
//!
//! Decompression and FITS decoding run on the blocking pool so that concurrent band downloads
//! are not stalled by CPU work.
use std::{fmt, future::Future, io::Read};

use nalgebra::DMatrix;
use tracing::debug;

use crate::{
    band::Band, constants::SAS_FRAMES_URL, fits::read_primary_image, http::HttpClient,
    wcs::TanWcs, wcs::WorldToPixel, GalaxyError,
};

/// Identifier of one imaging exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    pub run: u32,
    pub camcol: u8,
    pub field: u32,
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}-{}-{:04}", self.run, self.camcol, self.field)
    }
}

/// One band of a frame: pixels indexed `(y, x)` and the transform locating them on the sky.
pub struct Frame {
    pub pixels: DMatrix<f32>,
    pub transform: Box<dyn WorldToPixel>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("rows", &self.pixels.nrows())
            .field("cols", &self.pixels.ncols())
            .finish_non_exhaustive()
    }
}

/// Source of per-band frames.
pub trait FrameArchive: Send + Sync {
    fn fetch_frame(
        &self,
        frame: FrameId,
        band: Band,
    ) -> impl Future<Output = Result<Frame, GalaxyError>> + Send;
}

/// Archive URL of one band of one frame.
pub fn frame_url(base: &str, frame: FrameId, band: Band) -> String {
    format!(
        "{base}/{run}/{camcol}/frame-{band}-{run:06}-{camcol}-{field:04}.fits.bz2",
        run = frame.run,
        camcol = frame.camcol,
        field = frame.field,
    )
}

/// Decode a downloaded frame: optional bzip2 layer, FITS primary HDU, TAN WCS.
///
/// WCS fix-up notes are dropped here, inside the single call that builds the transform.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, GalaxyError> {
    let decompressed;
    let fits_bytes = if bytes.starts_with(b"BZh") {
        let mut out = Vec::with_capacity(bytes.len() * 4);
        bzip2::read::BzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|e| GalaxyError::InvalidFrame(format!("bzip2 stream: {e}")))?;
        decompressed = out;
        decompressed.as_slice()
    } else {
        bytes
    };

    let image = read_primary_image(fits_bytes)?;
    let wcs = TanWcs::from_header_quiet(&image.header)?;
    Ok(Frame {
        pixels: image.data,
        transform: Box::new(wcs),
    })
}

/// [`FrameArchive`] over the SDSS Science Archive Server.
#[derive(Debug, Clone)]
pub struct SdssFrameArchive {
    http: HttpClient,
    base_url: String,
}

impl SdssFrameArchive {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, SAS_FRAMES_URL)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        SdssFrameArchive {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl FrameArchive for SdssFrameArchive {
    async fn fetch_frame(&self, frame: FrameId, band: Band) -> Result<Frame, GalaxyError> {
        let url = frame_url(&self.base_url, frame, band);
        let bytes = self.http.get_bytes(&url, &[]).await?;
        debug!(%frame, %band, bytes = bytes.len(), "frame downloaded");

        tokio::task::spawn_blocking(move || decode_frame(&bytes))
            .await
            .map_err(|e| GalaxyError::InvalidFrame(format!("frame decoder task failed: {e}")))?
    }
}
