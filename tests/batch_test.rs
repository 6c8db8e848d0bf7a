mod common;

use std::time::Duration;

use gmag::{
    batch::RowOutcome, Band, BatchInput, BatchOrchestrator, GalaxyError, GalaxyParams,
};

use crate::common::{objid_at, StubArchive, StubCatalog};

fn ten_rows() -> Vec<(f64, f64)> {
    (0..10).map(|i| (10.0 + i as f64 * 15.0, -5.0 + i as f64)).collect()
}

fn params(workers: usize) -> GalaxyParams {
    GalaxyParams::builder()
        .worker_count(workers)
        .max_search_radius(2.0)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_ten_rows_two_absent() {
    let rows = ten_rows();
    let absent = [rows[3], rows[7]];
    let mut batch = BatchOrchestrator::new(
        StubCatalog::new()
            .with_absent(&absent)
            .with_delay(Duration::from_millis(5)),
        StubArchive::new(),
        params(3),
    );

    let result = batch
        .resolve_all(&BatchInput::from_rows(rows.clone()).unwrap())
        .await;

    assert_eq!(result.total(), 10);
    assert_eq!(result.found_count(), 8);
    for (i, &(ra, dec)) in rows.iter().enumerate() {
        let expected = if i == 3 || i == 7 {
            RowOutcome::Absent
        } else {
            RowOutcome::Found(objid_at(ra, dec))
        };
        assert_eq!(result.get(i), Some(&expected), "row {i}");
    }
    assert!(batch.resolver().catalog().peak_concurrency() <= 3);
    assert_eq!(batch.progress().completed(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_progress_observable_while_running() {
    let rows = ten_rows();
    let mut batch = BatchOrchestrator::new(
        StubCatalog::new()
            .with_absent(&[rows[4]])
            .with_delay(Duration::from_millis(5)),
        StubArchive::new(),
        params(3),
    );
    let progress = batch.progress().clone();
    let input = BatchInput::from_rows(rows).unwrap();

    let watch = async {
        let mut seen = Vec::new();
        loop {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let done = progress.completed();
            seen.push(done);
            if done >= 10 {
                break seen;
            }
        }
    };
    let (result, seen) = tokio::join!(batch.resolve_all(&input), watch);

    assert_eq!(result.found_count(), 9);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert!(seen.iter().any(|&d| d > 0 && d < 10), "{seen:?}");
    assert_eq!(seen.last(), Some(&10));
    assert_eq!(progress.total(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_is_deterministic() {
    let input = BatchInput::from_rows(ten_rows()).unwrap();
    let run = || async {
        let mut batch = BatchOrchestrator::new(
            StubCatalog::new().with_absent(&[ten_rows()[5]]),
            StubArchive::new(),
            params(4),
        );
        batch.resolve_all(&input).await.ids()
    };
    assert_eq!(run().await, run().await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_row_does_not_fail_batch() {
    let rows = ten_rows();
    let mut batch = BatchOrchestrator::new(
        StubCatalog::new().with_failing(&[rows[2]]),
        StubArchive::new(),
        params(3),
    );
    let result = batch
        .resolve_all(&BatchInput::from_rows(rows.clone()).unwrap())
        .await;

    assert_eq!(result.found_count(), 9);
    assert_eq!(result.failed_count(), 1);
    assert!(matches!(
        result.get(2),
        Some(RowOutcome::Failed(GalaxyError::Transport(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_row_times_out_alone() {
    let rows = ten_rows();
    let params = GalaxyParams::builder()
        .worker_count(2)
        .row_timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    let mut batch = BatchOrchestrator::new(
        StubCatalog::new().with_stalled(&[rows[0]]),
        StubArchive::new(),
        params,
    );
    let result = batch
        .resolve_all(&BatchInput::from_rows(rows).unwrap())
        .await;

    assert!(matches!(
        result.get(0),
        Some(RowOutcome::Failed(GalaxyError::Timeout(_)))
    ));
    assert_eq!(result.found_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_found_keeps_row_slots() {
    let rows = ten_rows();
    let params = GalaxyParams::builder()
        .worker_count(3)
        .bands("rg")
        .build()
        .unwrap();
    let mut batch = BatchOrchestrator::new(
        StubCatalog::new().with_absent(&[rows[1]]),
        StubArchive::new(),
        params,
    );
    let resolved = batch
        .resolve_all(&BatchInput::from_rows(rows).unwrap())
        .await;
    let images = batch.fetch_found(&resolved).await;

    assert_eq!(images.len(), 10);
    assert!(images[1].is_none());
    for slot in images.iter().enumerate().filter(|(i, _)| *i != 1) {
        let bands: Vec<Band> = slot
            .1
            .as_ref()
            .unwrap()
            .as_ref()
            .unwrap()
            .iter()
            .map(|b| b.band)
            .collect();
        assert_eq!(bands, vec![Band::G, Band::R], "row {}", slot.0);
    }
    assert_eq!(batch.progress().completed(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_band_failure_recorded_in_row_slot() {
    let rows = vec![(40.0, 1.0), (41.0, 1.0)];
    let mut batch = BatchOrchestrator::new(
        StubCatalog::new(),
        StubArchive::new().failing(Band::Z),
        params(2),
    );
    let resolved = batch
        .resolve_all(&BatchInput::from_rows(rows).unwrap())
        .await;
    let images = batch.fetch_found(&resolved).await;

    for slot in &images {
        assert!(matches!(
            slot,
            Some(Err(GalaxyError::HttpStatus { status: 404, .. }))
        ));
    }
}

#[test]
fn test_bad_input_fails_before_any_query() {
    let err = BatchInput::from_csv("ra,dec\n10,1\n11,north\n".as_bytes()).unwrap_err();
    assert_eq!(
        err,
        GalaxyError::InvalidInput("row 2: invalid dec value 'north'".into())
    );

    let err = GalaxyParams::builder().bands("ugx").build().unwrap_err();
    assert!(matches!(err, GalaxyError::InvalidInput(_)));
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch() {
    let mut batch = BatchOrchestrator::new(StubCatalog::new(), StubArchive::new(), params(3));
    let result = batch.resolve_all(&BatchInput::default()).await;
    assert_eq!(result.total(), 0);
    assert!(batch.fetch_found(&result).await.is_empty());
    assert!(batch.resolver().catalog().queries().is_empty());
}
