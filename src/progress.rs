//! Batch progress reporting.
//!
//! Components
//! -----------------
//! * [`BatchProgress`] – shared, lock-free counter of completed rows. Workers advance it as
//!   they finish; callers may poll it from another task while the batch runs.
//! * [`ProgressDisplay`] – optional live bar (via `indicatif`, `progress` feature) fed by the
//!   same completions. Without the feature, the display only logs a summary when finished.
//! * [`fmt_dur`] – human-readable formatter for [`Duration`] values (`"253µs"`, `"42ms"`,
//!   `"3.14s"`).
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Completed / total rows of the batch phase currently running.
#[derive(Debug, Clone, Default)]
pub struct BatchProgress {
    done: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new phase of `total` rows.
    pub fn reset(&self, total: usize) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    /// Mark one row complete.
    pub fn advance(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.completed() >= self.total()
    }
}

/// Live view of one batch phase.
pub struct ProgressDisplay {
    label: &'static str,
    started: Instant,
    #[cfg(feature = "progress")]
    bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    /// A bar is drawn only when `visible` is set and the `progress` feature is enabled.
    pub fn new(label: &'static str, total: usize, visible: bool) -> Self {
        #[cfg(feature = "progress")]
        let bar = visible.then(|| {
            let pb = ProgressBar::new((total as u64).max(1));
            if let Ok(style) = ProgressStyle::with_template(
                "{prefix} {bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise}",
            ) {
                pb.set_style(style);
            }
            pb.set_prefix(label);
            pb.enable_steady_tick(Duration::from_millis(200));
            pb
        });
        #[cfg(not(feature = "progress"))]
        let _ = (total, visible);

        ProgressDisplay {
            label,
            started: Instant::now(),
            #[cfg(feature = "progress")]
            bar,
        }
    }

    pub fn inc(&self) {
        self.tick_bar();
    }

    pub fn finish(self, completed: usize) {
        self.clear_bar();
        info!(
            phase = self.label,
            rows = completed,
            elapsed = %fmt_dur(self.started.elapsed()),
            "batch phase finished"
        );
    }

    #[cfg(feature = "progress")]
    fn tick_bar(&self) {
        if let Some(pb) = &self.bar {
            pb.inc(1);
        }
    }

    #[cfg(not(feature = "progress"))]
    fn tick_bar(&self) {}

    #[cfg(feature = "progress")]
    fn clear_bar(&self) {
        if let Some(pb) = &self.bar {
            pb.finish_and_clear();
        }
    }

    #[cfg(not(feature = "progress"))]
    fn clear_bar(&self) {}
}

/// Elapsed time of a phase for the summary log: whole µs or ms below one second, seconds with
/// two decimals above.
pub fn fmt_dur(d: Duration) -> String {
    match d.as_micros() {
        us @ 0..1_000 => format!("{us}µs"),
        us @ 1_000..1_000_000 => format!("{}ms", us / 1_000),
        _ => format!("{:.2}s", d.as_secs_f64()),
    }
}

#[cfg(test)]
mod progress_test {
    use super::*;

    #[test]
    fn test_counter_shared_between_clones() {
        let progress = BatchProgress::new();
        progress.reset(3);
        let worker = progress.clone();
        worker.advance();
        worker.advance();
        assert_eq!(progress.completed(), 2);
        assert!(!progress.is_finished());
        worker.advance();
        assert!(progress.is_finished());

        progress.reset(1);
        assert_eq!(worker.completed(), 0);
        assert_eq!(worker.total(), 1);
    }

    #[test]
    fn test_fmt_dur() {
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
    }
}
