//! Parameters of one stress run
//!
//! There is no config file and there are no flags: `HarnessConfig::default()`
//! is the run. Tests build smaller configurations through the `with_*`
//! methods so a full cycle fits in a few seconds.

use notistress_core::limits::{
    BACKGROUND_QUEUE_COUNT, DEFAULT_DATA_DIR, DISPLAY_REFRESH_INTERVAL, LOOP_CHECK_INTERVAL,
    OBJECT_COUNT_TARGET, OBSERVER_RESTART_DELAY_MAX, OBSERVER_RESTART_DELAY_MIN,
    OBSERVER_STOP_DELAY_MAX, OBSERVER_STOP_DELAY_MIN, WRITE_DELAY_MAX, WRITE_DELAY_MIN,
};
use notistress_core::StoreKind;
use rand::Rng;
use std::ops::{Range, RangeInclusive};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything a [`crate::Harness`] needs to know about its run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory holding the five store files. Wiped at startup.
    pub data_dir: PathBuf,
    /// Queue indices run over `0..=queue_count`.
    pub queue_count: usize,
    /// Intended rows per store; informational only.
    pub object_count_target: usize,
    /// Pause before each write on one queue.
    pub write_delay: Range<Duration>,
    /// How long the worker thread runs before it is stopped.
    pub stop_delay: Range<Duration>,
    /// Pause between a stop and the next start.
    pub restart_delay: Range<Duration>,
    /// Longest single wait of the worker's run loop.
    pub loop_check_interval: Duration,
    /// Redraw period of the display.
    pub display_refresh: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            queue_count: BACKGROUND_QUEUE_COUNT,
            object_count_target: OBJECT_COUNT_TARGET,
            write_delay: WRITE_DELAY_MIN..WRITE_DELAY_MAX,
            stop_delay: OBSERVER_STOP_DELAY_MIN..OBSERVER_STOP_DELAY_MAX,
            restart_delay: OBSERVER_RESTART_DELAY_MIN..OBSERVER_RESTART_DELAY_MAX,
            loop_check_interval: LOOP_CHECK_INTERVAL,
            display_refresh: DISPLAY_REFRESH_INTERVAL,
        }
    }
}

impl HarnessConfig {
    /// The fixed run, rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        HarnessConfig {
            data_dir: data_dir.into(),
            ..HarnessConfig::default()
        }
    }

    /// Override the queue count.
    pub fn with_queue_count(mut self, queue_count: usize) -> Self {
        self.queue_count = queue_count;
        self
    }

    /// Override the write delay range.
    pub fn with_write_delay(mut self, delay: Range<Duration>) -> Self {
        self.write_delay = delay;
        self
    }

    /// Override the observer stop and restart delay ranges.
    pub fn with_observer_cycle(mut self, stop: Range<Duration>, restart: Range<Duration>) -> Self {
        self.stop_delay = stop;
        self.restart_delay = restart;
        self
    }

    /// Override the worker's loop-check interval.
    pub fn with_loop_check_interval(mut self, interval: Duration) -> Self {
        self.loop_check_interval = interval;
        self
    }

    /// Every queue index a generator is started for.
    pub fn queue_indices(&self) -> RangeInclusive<usize> {
        0..=self.queue_count
    }

    /// Number of generator tasks: one per queue index and store kind.
    pub fn generator_count(&self) -> usize {
        (self.queue_count + 1) * StoreKind::ALL.len()
    }

    /// File backing `kind`.
    pub fn store_path(&self, kind: StoreKind) -> PathBuf {
        kind.file_path(&self.data_dir)
    }

    /// Working directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Uniform draw from `range`; an empty range yields its start.
pub fn random_delay(range: &Range<Duration>) -> Duration {
    if range.is_empty() {
        return range.start;
    }
    rand::thread_rng().gen_range(range.clone())
}
