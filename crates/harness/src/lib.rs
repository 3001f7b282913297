//! Concurrency stress harness for the notistress store
//!
//! A run keeps five stores under constant write pressure while several
//! observers watch them:
//! - MutationGenerator: one perpetual writer per (queue, store) pair
//! - NotificationRegistry: long-lived control-thread subscriptions
//! - ThreadedObserver / ObserverCycle: a worker thread with its own run loop,
//!   stopped and restarted forever
//! - MetricsSink / MetricsPublisher: per-store size and count, written only on
//!   the control thread
//! - Harness: wires it all onto the control thread's run loop
//!
//! Store failures are never retried. Anything that cannot propagate an error
//! (perpetual tasks, the worker thread, notification callbacks) ends the
//! process through [`fatal`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod display;
pub mod harness;
pub mod metrics;
pub mod mutation;
pub mod observer;
pub mod registry;

pub use config::{random_delay, HarnessConfig};
pub use display::{ConsoleDisplay, MetricsDisplay, RecordingDisplay};
pub use harness::{prepare_directory, Harness};
pub use metrics::{format_megabytes, format_slot, MetricSnapshot, MetricsPublisher, MetricsSink};
pub use mutation::{target_group, Mutation, MutationGenerator, MutationOutcome};
pub use observer::{ObserverCycle, ObserverState, ThreadedObserver};
pub use registry::{NotificationRegistry, Registration, DEFAULT_REGISTRATIONS};

use notistress_core::Error;

/// Log `err` and terminate the process with status 1.
pub fn fatal(context: &str, err: &Error) -> ! {
    tracing::error!(error = %err, "Fatal: {}", context);
    std::process::exit(1)
}
