//! # Batch acquisition
//!
//! Processes a list of sky coordinates in two phases:
//!
//! 1. **Resolve** ([`BatchOrchestrator::resolve_all`]): every row runs the expanding-radius
//!    search, `worker_count` rows at a time. Each row yields a [`RowOutcome`] stored **at the
//!    row's input index**, whatever order the workers finished in.
//! 2. **Fetch** ([`BatchOrchestrator::fetch_found`]): for every row that resolved to an object,
//!    the selected bands are acquired. Rows without an object keep an explicit empty slot.
//!
//! A row never fails the batch: catalog errors and per-row timeouts are recorded in that row's
//! slot and the other rows proceed.
//!
//! ## Input
//! -----------------
//! Coordinates are read from CSV with a header row containing `ra` and `dec` columns (any
//! case, any position, other columns ignored). Input problems are reported before any
//! network activity.
//!
//! ## Example
//! -----------------
//! ```rust,no_run
//! use gmag::{batch::{BatchInput, BatchOrchestrator}, params::GalaxyParams};
//!
//! # async fn run() -> Result<(), gmag::GalaxyError> {
//! let params = GalaxyParams::builder().worker_count(8).bands("gri").build()?;
//! let input = BatchInput::from_path("targets.csv")?;
//! let mut batch = BatchOrchestrator::sdss(params)?;
//!
//! let resolved = batch.resolve_all(&input).await;
//! println!("{resolved}");
//! let images = batch.fetch_found(&resolved).await;
//! # Ok(()) }
//! ```
use std::{fmt, fs::File, io::Read, path::Path, time::Duration};

use futures::{stream, Future, StreamExt};
use tracing::{info, warn};

use crate::{
    bands::{BandImage, MultiBandFetcher},
    catalog::{Catalog, SkyServerCatalog},
    constants::{Degree, ObjId},
    frames::{FrameArchive, SdssFrameArchive},
    http::HttpClient,
    params::GalaxyParams,
    progress::{BatchProgress, ProgressDisplay},
    resolver::Resolver,
    GalaxyError,
};

/// Coordinates of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchInput {
    rows: Vec<(Degree, Degree)>,
}

impl BatchInput {
    /// Validate in-memory `(ra, dec)` pairs.
    pub fn from_rows(rows: Vec<(Degree, Degree)>) -> Result<Self, GalaxyError> {
        for (i, &(ra, dec)) in rows.iter().enumerate() {
            check_position(i, ra, dec)?;
        }
        Ok(BatchInput { rows })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GalaxyError> {
        Self::from_csv(File::open(path)?)
    }

    /// Read a CSV table with a header row containing `ra` and `dec`.
    ///
    /// Return
    /// ----------
    /// * The coordinates in file order.
    /// * [`GalaxyError::InvalidInput`] naming the missing column, or the row (1-based, header
    ///   excluded) holding an unparsable or out-of-range value.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, GalaxyError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| GalaxyError::InvalidInput(format!("missing required column '{name}'")))
        };
        let ra_col = column("ra")?;
        let dec_col = column("dec")?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let value = |col: usize, name: &str| {
                let raw = record.get(col).unwrap_or("");
                raw.parse::<f64>().map_err(|_| {
                    GalaxyError::InvalidInput(format!("row {}: invalid {name} value '{raw}'", i + 1))
                })
            };
            let ra = value(ra_col, "ra")?;
            let dec = value(dec_col, "dec")?;
            check_position(i, ra, dec)?;
            rows.push((ra, dec));
        }
        Ok(BatchInput { rows })
    }

    pub fn rows(&self) -> &[(Degree, Degree)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn check_position(i: usize, ra: Degree, dec: Degree) -> Result<(), GalaxyError> {
    if !(ra.is_finite() && (0.0..=360.0).contains(&ra)) {
        return Err(GalaxyError::InvalidInput(format!(
            "row {}: ra {ra} outside [0, 360]",
            i + 1
        )));
    }
    if !(dec.is_finite() && (-90.0..=90.0).contains(&dec)) {
        return Err(GalaxyError::InvalidInput(format!(
            "row {}: dec {dec} outside [-90, 90]",
            i + 1
        )));
    }
    Ok(())
}

/// Resolution outcome of one batch row.
#[derive(Debug, PartialEq)]
pub enum RowOutcome {
    Found(ObjId),
    /// Nothing within the search radius.
    Absent,
    /// The row could not be resolved (transport error, timeout…).
    Failed(GalaxyError),
}

impl RowOutcome {
    pub fn id(&self) -> Option<ObjId> {
        match self {
            RowOutcome::Found(id) => Some(*id),
            _ => None,
        }
    }
}

/// Per-row outcomes of the resolve phase, in input order.
#[derive(Debug, Default, PartialEq)]
pub struct BatchResult {
    rows: Vec<RowOutcome>,
}

impl BatchResult {
    pub fn get(&self, index: usize) -> Option<&RowOutcome> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowOutcome> {
        self.rows.iter()
    }

    pub fn total(&self) -> usize {
        self.rows.len()
    }

    pub fn found_count(&self) -> usize {
        self.rows.iter().filter(|r| r.id().is_some()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, RowOutcome::Failed(_)))
            .count()
    }

    /// One slot per input row, `None` where no object was found.
    pub fn ids(&self) -> Vec<Option<ObjId>> {
        self.rows.iter().map(RowOutcome::id).collect()
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} galaxies found ({} failed)",
            self.found_count(),
            self.total(),
            self.failed_count()
        )
    }
}

/// Band images of one found row, or why they could not be acquired.
pub type RowImages = Result<Vec<BandImage>, GalaxyError>;

/// Batch Orchestrator.
///
/// The orchestrator owns a single [`BatchProgress`], so its phases take `&mut self` and run
/// one at a time.
#[derive(Debug)]
pub struct BatchOrchestrator<C, A> {
    resolver: Resolver<C>,
    bands: MultiBandFetcher<A>,
    params: GalaxyParams,
    progress: BatchProgress,
}

impl BatchOrchestrator<SkyServerCatalog, SdssFrameArchive> {
    /// Orchestrator over the live SDSS services.
    pub fn sdss(params: GalaxyParams) -> Result<Self, GalaxyError> {
        let http = HttpClient::new(&params)?;
        Ok(BatchOrchestrator::new(
            SkyServerCatalog::new(http.clone()),
            SdssFrameArchive::new(http),
            params,
        ))
    }
}

impl<C: Catalog, A: FrameArchive> BatchOrchestrator<C, A> {
    pub fn new(catalog: C, archive: A, params: GalaxyParams) -> Self {
        BatchOrchestrator {
            resolver: Resolver::new(catalog),
            bands: MultiBandFetcher::new(archive, params.band_workers),
            params,
            progress: BatchProgress::new(),
        }
    }

    pub fn resolver(&self) -> &Resolver<C> {
        &self.resolver
    }

    pub fn params(&self) -> &GalaxyParams {
        &self.params
    }

    /// Handle on the completion counter of the running phase; clone it before starting a
    /// phase to poll it from another task.
    pub fn progress(&self) -> &BatchProgress {
        &self.progress
    }

    /// Resolve every row of `input` to its nearest galaxy.
    ///
    /// The worker pool lives inside this call: no row is still in flight when it returns.
    pub async fn resolve_all(&mut self, input: &BatchInput) -> BatchResult {
        let this = &*self;
        let radius = this.params.max_search_radius;
        let rows = this
            .run_rows(
                "resolve",
                input.rows().iter().copied().enumerate(),
                |i, (ra, dec)| async move {
                    let outcome = this.resolver.resolve_nearest(ra, dec, radius).await;
                    match outcome {
                        Ok(Some(id)) => RowOutcome::Found(id),
                        Ok(None) => RowOutcome::Absent,
                        Err(e) => {
                            warn!(row = i, ra, dec, error = %e, "row resolution failed");
                            RowOutcome::Failed(e)
                        }
                    }
                },
                |i| RowOutcome::Failed(GalaxyError::Timeout(format!("resolution of row {i}"))),
            )
            .await;

        let result = BatchResult { rows };
        info!(%result, "batch resolved");
        result
    }

    /// Acquire the selected bands of every found row of `resolved`.
    ///
    /// Return
    /// ----------
    /// * One slot per input row: `None` for rows without an object, otherwise the row's images
    ///   in band order or the error that stopped their acquisition.
    pub async fn fetch_found(&mut self, resolved: &BatchResult) -> Vec<Option<RowImages>> {
        let this = &*self;
        let selection = this.params.bands;
        let found: Vec<(usize, ObjId)> = resolved
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.id().map(|id| (i, id)))
            .collect();

        let fetched = this
            .run_rows(
                "fetch",
                found.into_iter(),
                |i, id| async move {
                    let images = async {
                        let descriptor = this.resolver.describe(id).await?;
                        this.bands
                            .fetch_bands(&descriptor, selection)
                            .await
                            .into_images()
                    }
                    .await;
                    if let Err(e) = &images {
                        warn!(row = i, objid = id, error = %e, "row acquisition failed");
                    }
                    (i, images)
                },
                |i| (i, Err(GalaxyError::Timeout(format!("acquisition of row {i}")))),
            )
            .await;

        let mut slots: Vec<Option<RowImages>> = (0..resolved.total()).map(|_| None).collect();
        for (i, images) in fetched {
            slots[i] = Some(images);
        }
        slots
    }

    /// Run `work` on every `(index, item)` over the bounded pool, each under `row_timeout`,
    /// and return the outputs sorted by index.
    async fn run_rows<I, T, O, W, Fut, E>(
        &self,
        label: &'static str,
        items: I,
        work: W,
        on_timeout: E,
    ) -> Vec<O>
    where
        I: Iterator<Item = (usize, T)>,
        W: Fn(usize, T) -> Fut,
        Fut: Future<Output = O>,
        E: Fn(usize) -> O,
    {
        let items: Vec<(usize, T)> = items.collect();
        self.progress.reset(items.len());
        let display = ProgressDisplay::new(label, items.len(), self.params.show_progress);
        let row_timeout: Duration = self.params.row_timeout;

        let mut outputs: Vec<(usize, O)> = stream::iter(items)
            .map(|(i, item)| {
                let fut = tokio::time::timeout(row_timeout, work(i, item));
                let (display, progress, on_timeout) = (&display, &self.progress, &on_timeout);
                async move {
                    let out = fut.await.unwrap_or_else(|_| {
                        warn!(row = i, phase = label, "row timed out");
                        on_timeout(i)
                    });
                    progress.advance();
                    display.inc();
                    (i, out)
                }
            })
            .buffer_unordered(self.params.worker_count.max(1))
            .collect()
            .await;

        display.finish(outputs.len());
        outputs.sort_by_key(|(i, _)| *i);
        outputs.into_iter().map(|(_, out)| out).collect()
    }
}

#[cfg(test)]
mod batch_test {
    use super::*;

    #[test]
    fn test_csv_any_column_order_and_case() {
        let csv = "name,DEC,Ra\nm1, -1.5 ,180.25\nm2,2.0,10\n";
        let input = BatchInput::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(input.rows(), &[(180.25, -1.5), (10.0, 2.0)]);
    }

    #[test]
    fn test_csv_missing_column() {
        let err = BatchInput::from_csv("ra,declination\n1,2\n".as_bytes()).unwrap_err();
        assert_eq!(
            err,
            GalaxyError::InvalidInput("missing required column 'dec'".into())
        );
    }

    #[test]
    fn test_csv_bad_value_names_row() {
        let err = BatchInput::from_csv("ra,dec\n1,2\n3,abc\n".as_bytes()).unwrap_err();
        assert_eq!(
            err,
            GalaxyError::InvalidInput("row 2: invalid dec value 'abc'".into())
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(BatchInput::from_rows(vec![(10.0, 95.0)]).is_err());
        assert!(BatchInput::from_rows(vec![(-1.0, 0.0)]).is_err());
        assert!(BatchInput::from_rows(vec![(f64::NAN, 0.0)]).is_err());
        assert_eq!(BatchInput::from_rows(vec![]).unwrap().len(), 0);
    }

    #[test]
    fn test_batch_result_counts() {
        let result = BatchResult {
            rows: vec![
                RowOutcome::Found(1),
                RowOutcome::Absent,
                RowOutcome::Failed(GalaxyError::Timeout("row 2".into())),
                RowOutcome::Found(4),
            ],
        };
        assert_eq!(result.found_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.ids(), vec![Some(1), None, None, Some(4)]);
        assert_eq!(result.to_string(), "2 / 4 galaxies found (1 failed)");
    }
}
