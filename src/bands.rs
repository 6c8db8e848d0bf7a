//! # Multi-band acquisition
//!
//! For one resolved target, download each selected band's frame, derive the band's own cutout
//! box and crop the frame to it. Bands are fetched concurrently over a bounded pool
//! (`band_workers`, 5 by default) and complete in any order.
//!
//! ## Ordering
//! -----------------
//! Results are stored in a [`BandSet`] **keyed by band**, never appended in arrival order, so
//! iteration is always `u, g, r, i, z` whatever the completion order was.
//!
//! ## Failure model
//! -----------------
//! Every band carries its own outcome (`Ok(BandImage)` or `Err(GalaxyError)`), so callers can
//! inspect partial results. [`BandSet::into_images`] and [`BandSet::into_complete`] turn the set
//! into an all-or-nothing result, surfacing the first failing band (in band order) as the
//! failure of the whole acquisition.
use futures::{stream, StreamExt};
use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::{
    band::{Band, BandSelection},
    frames::FrameArchive,
    geometry::{compute_cutout, crop, CutoutSpec},
    resolver::ImagingDescriptor,
    GalaxyError,
};

/// Cutout of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandImage {
    pub band: Band,
    pub cutout: CutoutSpec,
    /// Cropped samples indexed `(y, x)`.
    pub pixels: DMatrix<f32>,
}

/// Per-band outcomes in canonical band order.
#[derive(Debug, Default)]
pub struct BandSet {
    slots: [Option<Result<BandImage, GalaxyError>>; 5],
}

impl BandSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, band: Band, outcome: Result<BandImage, GalaxyError>) {
        self.slots[band.index()] = Some(outcome);
    }

    /// Outcome of `band`, `None` when the band was not requested.
    pub fn get(&self, band: Band) -> Option<&Result<BandImage, GalaxyError>> {
        self.slots[band.index()].as_ref()
    }

    /// Requested bands and their outcomes, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Band, &Result<BandImage, GalaxyError>)> {
        Band::ALL
            .into_iter()
            .zip(self.slots.iter())
            .filter_map(|(band, slot)| slot.as_ref().map(|o| (band, o)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failed_bands(&self) -> Vec<Band> {
        self.iter()
            .filter(|(_, o)| o.is_err())
            .map(|(b, _)| b)
            .collect()
    }

    /// All requested images in canonical order, or the first failure.
    pub fn into_images(self) -> Result<Vec<BandImage>, GalaxyError> {
        self.slots.into_iter().flatten().collect()
    }

    /// Exactly five images `u, g, r, i, z`, or the first failure.
    ///
    /// A band that was never requested is reported as [`GalaxyError::InvalidInput`].
    pub fn into_complete(self) -> Result<[BandImage; 5], GalaxyError> {
        let [u, g, r, i, z] = self.slots;
        let take = |band: Band, slot: Option<Result<BandImage, GalaxyError>>| {
            slot.unwrap_or_else(|| {
                Err(GalaxyError::InvalidInput(format!(
                    "band {band} was not requested"
                )))
            })
        };
        Ok([
            take(Band::U, u)?,
            take(Band::G, g)?,
            take(Band::R, r)?,
            take(Band::I, i)?,
            take(Band::Z, z)?,
        ])
    }
}

/// Multi-band Image Fetcher over any [`FrameArchive`].
#[derive(Debug, Clone)]
pub struct MultiBandFetcher<A> {
    archive: A,
    workers: usize,
}

impl<A: FrameArchive> MultiBandFetcher<A> {
    /// `workers` is clamped to at least one.
    pub fn new(archive: A, workers: usize) -> Self {
        MultiBandFetcher {
            archive,
            workers: workers.max(1),
        }
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    /// Fetch and crop one band.
    pub async fn fetch_band(
        &self,
        descriptor: &ImagingDescriptor,
        band: Band,
    ) -> Result<BandImage, GalaxyError> {
        let frame = self
            .archive
            .fetch_frame(descriptor.frame_id(), band)
            .await?;
        let cutout = compute_cutout(
            descriptor.ra,
            descriptor.dec,
            descriptor.angular_size,
            frame.transform.as_ref(),
        )?;
        let pixels = crop(&frame.pixels, &cutout);
        debug!(%band, ?cutout, rows = pixels.nrows(), cols = pixels.ncols(), "band cropped");
        Ok(BandImage {
            band,
            cutout,
            pixels,
        })
    }

    /// Fetch every band of `selection` concurrently.
    ///
    /// The pool lives inside this call: all band downloads have finished when it returns.
    pub async fn fetch_bands(
        &self,
        descriptor: &ImagingDescriptor,
        selection: BandSelection,
    ) -> BandSet {
        let outcomes: Vec<(Band, Result<BandImage, GalaxyError>)> = stream::iter(selection.bands())
            .map(|band| async move { (band, self.fetch_band(descriptor, band).await) })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut set = BandSet::new();
        for (band, outcome) in outcomes {
            if let Err(e) = &outcome {
                warn!(frame = %descriptor.frame_id(), %band, error = %e, "band acquisition failed");
            }
            set.insert(band, outcome);
        }
        set
    }

    /// Fetch all five bands; any band failure fails the acquisition.
    pub async fn fetch_all(
        &self,
        descriptor: &ImagingDescriptor,
    ) -> Result<[BandImage; 5], GalaxyError> {
        self.fetch_bands(descriptor, BandSelection::all())
            .await
            .into_complete()
    }
}
