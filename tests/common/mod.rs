#![allow(dead_code)]

use std::{
    io::Cursor,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use gmag::{
    catalog::{Catalog, CatalogQuery, CatalogRow},
    constants::{Degree, ObjId, Pixel},
    frames::{Frame, FrameArchive, FrameId},
    preview::PreviewService,
    wcs::WorldToPixel,
    Band, GalaxyError,
};
use nalgebra::DMatrix;
use serde_json::json;

/// Petrosian radius given to every stub galaxy (arcsec).
pub const STUB_SIZE: f64 = 10.0;

/// Deterministic object id of the galaxy at `(ra, dec)`.
pub fn objid_at(ra: Degree, dec: Degree) -> ObjId {
    ((ra * 1e4).round() as i64) * 10_000_000 + ((dec + 90.0) * 1e4).round() as i64
}

pub fn position_of(id: ObjId) -> (Degree, Degree) {
    (
        (id / 10_000_000) as f64 / 1e4,
        (id % 10_000_000) as f64 / 1e4 - 90.0,
    )
}

/// In-memory catalog with one galaxy at every position except `absent` ones.
///
/// Every query is recorded, and the peak number of concurrent queries is tracked.
#[derive(Default)]
pub struct StubCatalog {
    pub absent: Vec<(Degree, Degree)>,
    pub failing: Vec<(Degree, Degree)>,
    pub stalled: Vec<(Degree, Degree)>,
    pub query_delay: Duration,
    queries: Mutex<Vec<CatalogQuery>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absent(mut self, absent: &[(Degree, Degree)]) -> Self {
        self.absent = absent.to_vec();
        self
    }

    pub fn with_failing(mut self, failing: &[(Degree, Degree)]) -> Self {
        self.failing = failing.to_vec();
        self
    }

    pub fn with_stalled(mut self, stalled: &[(Degree, Degree)]) -> Self {
        self.stalled = stalled.to_vec();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    pub fn queries(&self) -> Vec<CatalogQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn nearby_count(&self) -> usize {
        self.queries()
            .iter()
            .filter(|q| matches!(q, CatalogQuery::Nearby { .. }))
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn answer(&self, query: &CatalogQuery) -> Result<Vec<CatalogRow>, GalaxyError> {
        match *query {
            CatalogQuery::Nearby { ra, dec, .. } => {
                if self.failing.contains(&(ra, dec)) {
                    return Err(GalaxyError::Transport(format!("connection reset ({ra}, {dec})")));
                }
                if self.absent.contains(&(ra, dec)) {
                    return Ok(vec![]);
                }
                Ok(vec![CatalogRow::from_pairs([
                    ("objid", json!(objid_at(ra, dec))),
                    ("distance", json!(0.0)),
                ])])
            }
            CatalogQuery::ObjectById(id) => {
                let (ra, dec) = position_of(id);
                Ok(vec![CatalogRow::from_pairs([
                    ("run", json!(756)),
                    ("camcol", json!(3)),
                    ("field", json!(206)),
                    ("ra", json!(ra)),
                    ("dec", json!(dec)),
                    ("petroRad_r", json!(STUB_SIZE)),
                ])])
            }
            CatalogQuery::Random { .. } => Ok(vec![CatalogRow::from_pairs([(
                "objid",
                json!(objid_at(150.0, 2.0)),
            )])]),
        }
    }
}

impl Catalog for StubCatalog {
    async fn query(&self, query: &CatalogQuery) -> Result<Vec<CatalogRow>, GalaxyError> {
        self.queries.lock().unwrap().push(query.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.query_delay).await;
        if let CatalogQuery::Nearby { ra, dec, .. } = *query {
            if self.stalled.contains(&(ra, dec)) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        let answer = self.answer(query);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        answer
    }
}

/// Whole-sky grid at one pixel per degree: `x = ra`, `y = dec + 90`.
pub struct SkyGrid;

impl WorldToPixel for SkyGrid {
    fn world_to_pixel(&self, ra: Degree, dec: Degree) -> Option<(Pixel, Pixel)> {
        Some((ra, dec + 90.0))
    }
}

/// Frame archive whose bands complete in reverse order (`z` first, `u` last).
///
/// Every pixel of a band's frame holds the band index, so callers can check which band a
/// cutout came from.
pub struct StubArchive {
    pub delays: [Duration; 5],
    pub failing: Option<Band>,
    completed: Mutex<Vec<Band>>,
}

impl StubArchive {
    pub fn new() -> Self {
        StubArchive {
            delays: [40, 30, 20, 10, 0].map(Duration::from_millis),
            failing: None,
            completed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, band: Band) -> Self {
        self.failing = Some(band);
        self
    }

    pub fn with_delays(mut self, delays: [Duration; 5]) -> Self {
        self.delays = delays;
        self
    }

    pub fn completion_order(&self) -> Vec<Band> {
        self.completed.lock().unwrap().clone()
    }
}

impl FrameArchive for StubArchive {
    async fn fetch_frame(&self, frame: FrameId, band: Band) -> Result<Frame, GalaxyError> {
        tokio::time::sleep(self.delays[band.index()]).await;
        self.completed.lock().unwrap().push(band);

        if self.failing == Some(band) {
            return Err(GalaxyError::HttpStatus {
                status: 404,
                url: format!("frame-{band}-{frame}.fits.bz2"),
            });
        }
        Ok(Frame {
            pixels: DMatrix::from_element(200, 400, band.index() as f32),
            transform: Box::new(SkyGrid),
        })
    }
}

/// Preview service answering a uniform grey PNG of the requested size, or failing.
#[derive(Default)]
pub struct StubPreview {
    pub fail: bool,
}

impl PreviewService for StubPreview {
    async fn fetch_raster(
        &self,
        _ra: Degree,
        _dec: Degree,
        _scale: f64,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, GalaxyError> {
        if self.fail {
            return Err(GalaxyError::HttpStatus {
                status: 503,
                url: "ImgCutout/getjpeg".into(),
            });
        }
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([128, 128, 128]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)?;
        Ok(out.into_inner())
    }
}

/// Preview service that never answers within any reasonable deadline.
pub struct StalledPreview;

impl PreviewService for StalledPreview {
    async fn fetch_raster(
        &self,
        _ra: Degree,
        _dec: Degree,
        _scale: f64,
        _width: u32,
        _height: u32,
    ) -> Result<Vec<u8>, GalaxyError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(GalaxyError::Timeout("ImgCutout/getjpeg".into()))
    }
}
