//! Fixed parameters of a stress run
//!
//! These are constants of the experiment, not tuning knobs. Tests build
//! smaller `HarnessConfig`s from them instead of changing them.

use std::time::Duration;

/// Number of background write queues. Queue indices run over the inclusive
/// range `0..=BACKGROUND_QUEUE_COUNT`, so 17 generators are started per store.
pub const BACKGROUND_QUEUE_COUNT: usize = 16;

/// Intended scale of a run (rows per store). Not consulted by the mutation logic.
pub const OBJECT_COUNT_TARGET: usize = 10_000;

/// Lower bound (inclusive) of the delay between two writes on one queue.
pub const WRITE_DELAY_MIN: Duration = Duration::from_millis(50);

/// Upper bound (exclusive) of the delay between two writes on one queue.
pub const WRITE_DELAY_MAX: Duration = Duration::from_millis(100);

/// Lower bound (inclusive) of how long the worker thread runs before a stop.
pub const OBSERVER_STOP_DELAY_MIN: Duration = Duration::from_millis(5_000);

/// Upper bound (exclusive) of how long the worker thread runs before a stop.
pub const OBSERVER_STOP_DELAY_MAX: Duration = Duration::from_millis(15_000);

/// Lower bound (inclusive) of the pause between a stop and the next start.
pub const OBSERVER_RESTART_DELAY_MIN: Duration = Duration::from_millis(100);

/// Upper bound (exclusive) of the pause between a stop and the next start.
pub const OBSERVER_RESTART_DELAY_MAX: Duration = Duration::from_millis(1_000);

/// Longest single wait of the worker thread's run loop; the stop flag is
/// checked at least this often.
pub const LOOP_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Mutation roll range: a uniform draw in `0..MUTATION_ROLL_RANGE`.
pub const MUTATION_ROLL_RANGE: u32 = 9;

/// Extension of every store file.
pub const STORE_FILE_EXTENSION: &str = "store";

/// Default working directory, relative to the process working directory.
pub const DEFAULT_DATA_DIR: &str = "notistress-data";

/// How often the console display redraws its five slots.
pub const DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
