//! Dedicated observer thread with a stop/start lifecycle
//!
//! ```text
//!            start()                 worker installed
//! Stopped ───────────▶ Starting ─────────────────────▶ Running
//!    ▲                                                    │ stop()
//!    │        worker drained, exit signaled               ▼
//!    └──────────────────────────────────────────────── Stopping
//! ```
//!
//! The worker thread owns a run loop and a thread-local store handle, and
//! installs exactly one subscription on `ThreadListener`. `stop()` only sets
//! a flag; the worker notices it within one loop-check interval, cancels its
//! subscription, clears the published loop handle and signals the exit
//! condvar. `start()` refuses to spawn a new worker while the previous loop
//! handle is still published, and waits on that condvar instead.
//!
//! The lifecycle lock guards the state, the published loop handle and the
//! thread handle. Two condvars are paired with it: `exit_signal` releases
//! the one `start()` waiting for the previous worker, and `state_changed`
//! broadcasts every transition to `Running` or `Stopped` to anyone else.

use crate::config::random_delay;
use crate::fatal;
use crate::metrics::MetricsPublisher;
use notistress_core::{Error, Result, StoreKind};
use notistress_store::{Results, RunLoop, StoreHandle, Subscription, WeakRunLoop};
use parking_lot::{Condvar, Mutex};
use std::ops::Range;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle state of the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    /// No worker thread
    Stopped,
    /// Worker spawned, not yet observing
    Starting,
    /// Worker observing
    Running,
    /// Stop requested, worker draining
    Stopping,
}

struct Lifecycle {
    state: ObserverState,
    loop_handle: Option<RunLoop>,
    thread: Option<JoinHandle<()>>,
    // Bumped each time a worker confirms exit
    exits: u64,
}

struct ObserverShared {
    lifecycle: Mutex<Lifecycle>,
    exit_signal: Condvar,
    state_changed: Condvar,
    stop_requested: AtomicBool,
    notifications_received: AtomicU64,
    total_notifications: AtomicU64,
    cycles: AtomicU64,
    token: Mutex<Option<Subscription>>,
    // Replaced on every start but never cleared: releasing the worker's last
    // results between runs stops deliveries after a few restart cycles.
    retained_results: Mutex<Option<Results>>,
}

/// Owner of the single observer worker thread.
pub struct ThreadedObserver {
    shared: Arc<ObserverShared>,
    store_path: PathBuf,
    publisher: MetricsPublisher,
    loop_check_interval: Duration,
}

impl ThreadedObserver {
    /// Observer of the store at `store_path`, publishing through `publisher`.
    pub fn new(
        store_path: impl Into<PathBuf>,
        publisher: MetricsPublisher,
        loop_check_interval: Duration,
    ) -> Self {
        ThreadedObserver {
            shared: Arc::new(ObserverShared {
                lifecycle: Mutex::new(Lifecycle {
                    state: ObserverState::Stopped,
                    loop_handle: None,
                    exits: 0,
                    thread: None,
                }),
                exit_signal: Condvar::new(),
                state_changed: Condvar::new(),
                stop_requested: AtomicBool::new(false),
                notifications_received: AtomicU64::new(0),
                total_notifications: AtomicU64::new(0),
                cycles: AtomicU64::new(0),
                token: Mutex::new(None),
                retained_results: Mutex::new(None),
            }),
            store_path: store_path.into(),
            publisher,
            loop_check_interval,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ObserverState {
        self.shared.lifecycle.lock().state
    }

    /// Notifications received by the current (or last) worker.
    pub fn notifications_received(&self) -> u64 {
        self.shared.notifications_received.load(Ordering::Acquire)
    }

    /// Notifications received across every worker.
    pub fn total_notifications(&self) -> u64 {
        self.shared.total_notifications.load(Ordering::Acquire)
    }

    /// Number of workers started so far.
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }

    /// Whether the current worker has installed its subscription.
    pub fn is_subscribed(&self) -> bool {
        self.shared.token.lock().is_some()
    }

    /// Whether a worker's loop handle is still published.
    pub fn has_live_loop(&self) -> bool {
        self.shared.lifecycle.lock().loop_handle.is_some()
    }

    /// Spawn a worker and return once it is `Running`.
    ///
    /// Returns `Ok(false)` without doing anything if a worker thread is still
    /// owned. If the previous worker has been released by `stop()` but has
    /// not yet confirmed exit, blocks until it signals.
    pub fn start(&self) -> Result<bool> {
        let shared = &self.shared;
        let mut lifecycle = shared.lifecycle.lock();
        if lifecycle.thread.is_some() {
            return Ok(false);
        }

        if lifecycle.loop_handle.is_some() {
            let waited = Instant::now();
            while lifecycle.loop_handle.is_some() {
                let timeout = shared
                    .exit_signal
                    .wait_for(&mut lifecycle, self.loop_check_interval * 2);
                if lifecycle.thread.is_some() {
                    // Another start() got here first
                    return Ok(false);
                }
                if timeout.timed_out() && lifecycle.loop_handle.is_some() {
                    warn!(
                        waited_ms = waited.elapsed().as_millis() as u64,
                        "Previous observer loop has not confirmed exit"
                    );
                }
            }
            debug!(waited_ms = waited.elapsed().as_millis() as u64, "Previous observer exited");
        }

        lifecycle.state = ObserverState::Starting;
        let worker = Worker {
            shared: Arc::clone(shared),
            store_path: self.store_path.clone(),
            publisher: self.publisher.clone(),
            loop_check_interval: self.loop_check_interval,
        };
        let handle = thread::Builder::new()
            .name("notistress-observer".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                Error::InvalidOperation(format!("failed to spawn observer thread: {}", e))
            });
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                lifecycle.state = ObserverState::Stopped;
                return Err(e);
            }
        };
        lifecycle.thread = Some(handle);
        shared.cycles.fetch_add(1, Ordering::AcqRel);

        while lifecycle.state == ObserverState::Starting {
            shared.state_changed.wait(&mut lifecycle);
        }
        Ok(true)
    }

    /// Ask the worker to stop and release the thread handle.
    ///
    /// Returns `false` if no worker is running. Does not wait for the worker.
    pub fn stop(&self) -> bool {
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != ObserverState::Running || lifecycle.loop_handle.is_none() {
            return false;
        }
        self.shared.stop_requested.store(true, Ordering::Release);
        lifecycle.state = ObserverState::Stopping;
        // Detaches the worker; the next start() waits on the loop handle instead
        lifecycle.thread = None;
        true
    }

    /// Block until the worker published at call time has exited, or
    /// `timeout` passes. Returns whether it exited; `true` if none was live.
    pub fn wait_for_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.loop_handle.is_none() {
            return true;
        }
        let exits = lifecycle.exits;
        while lifecycle.exits == exits {
            if self
                .shared
                .state_changed
                .wait_until(&mut lifecycle, deadline)
                .timed_out()
            {
                return lifecycle.exits != exits;
            }
        }
        true
    }
}

impl Drop for ThreadedObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the worker thread.
struct Worker {
    shared: Arc<ObserverShared>,
    store_path: PathBuf,
    publisher: MetricsPublisher,
    loop_check_interval: Duration,
}

impl Worker {
    fn run(self) {
        let shared = self.shared;
        shared.notifications_received.store(0, Ordering::Release);

        let run_loop = RunLoop::current();
        let handle = match StoreHandle::open(&self.store_path) {
            Ok(handle) => handle,
            Err(e) => fatal("opening observer store", &e.on_store(StoreKind::ThreadListener)),
        };

        {
            let mut lifecycle = shared.lifecycle.lock();
            lifecycle.loop_handle = Some(run_loop.clone());
            lifecycle.state = ObserverState::Running;
            shared.state_changed.notify_all();
        }

        let setup = Arc::clone(&shared);
        let publisher = self.publisher;
        run_loop.perform(move || install_subscription(setup, handle, publisher));

        while !shared.stop_requested.load(Ordering::Acquire) {
            run_loop.run_once(self.loop_check_interval);
        }

        info!(
            received = shared.notifications_received.load(Ordering::Acquire),
            "Observer thread total received"
        );

        shared.stop_requested.store(false, Ordering::Release);
        if let Some(token) = shared.token.lock().take() {
            token.cancel();
        }
        drop(run_loop);
        RunLoop::detach_current();

        let mut lifecycle = shared.lifecycle.lock();
        lifecycle.loop_handle = None;
        lifecycle.exits += 1;
        lifecycle.state = ObserverState::Stopped;
        shared.exit_signal.notify_one();
        shared.state_changed.notify_all();
    }
}

/// First job on a new worker's loop: refresh, take the results, replace any
/// subscription this observer still owns, and subscribe.
fn install_subscription(shared: Arc<ObserverShared>, mut handle: StoreHandle, publisher: MetricsPublisher) {
    handle.refresh();
    let results = handle.objects();
    *shared.retained_results.lock() = Some(results.clone());

    let mut token = shared.token.lock();
    if let Some(previous) = token.take() {
        previous.cancel();
    }

    let counters = Arc::clone(&shared);
    let subscribed = results.subscribe(move |results| {
        let count = results.count();
        counters.notifications_received.fetch_add(1, Ordering::AcqRel);
        counters.total_notifications.fetch_add(1, Ordering::AcqRel);
        publisher.publish_count(StoreKind::ThreadListener, count);
    });
    match subscribed {
        Ok(subscription) => *token = Some(subscription),
        Err(e) => fatal("subscribing on observer thread", &e),
    }
}

/// Timer-driven perpetual stop/start cycle of a [`ThreadedObserver`].
///
/// Both timers run on the control run loop.
pub struct ObserverCycle {
    observer: Arc<ThreadedObserver>,
    control: WeakRunLoop,
    stop_delay: Range<Duration>,
    restart_delay: Range<Duration>,
    halted: AtomicBool,
}

impl ObserverCycle {
    /// Cycle `observer` using timers on `control`.
    pub fn new(
        observer: Arc<ThreadedObserver>,
        control: &RunLoop,
        stop_delay: Range<Duration>,
        restart_delay: Range<Duration>,
    ) -> Arc<Self> {
        Arc::new(ObserverCycle {
            observer,
            control: control.downgrade(),
            stop_delay,
            restart_delay,
            halted: AtomicBool::new(false),
        })
    }

    /// The observer being cycled.
    pub fn observer(&self) -> &Arc<ThreadedObserver> {
        &self.observer
    }

    /// Stop the observer and ignore any timer still pending.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
        self.observer.stop();
    }

    /// Start the observer and schedule its stop.
    pub fn start(self: &Arc<Self>) {
        if self.halted.load(Ordering::Acquire) {
            return;
        }
        match self.observer.start() {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => fatal("starting observer thread", &e),
        }

        let stop_after = random_delay(&self.stop_delay);
        info!(
            stop_after_ms = stop_after.as_millis() as u64,
            "Observer thread is about to start; stop scheduled"
        );
        if let Some(control) = self.control.upgrade() {
            let cycle = Arc::clone(self);
            control.perform_after(stop_after, move || cycle.stop());
        }
    }

    /// Stop the observer and schedule the next start.
    pub fn stop(self: &Arc<Self>) {
        if !self.observer.stop() {
            return;
        }

        let start_after = random_delay(&self.restart_delay);
        info!(
            start_after_ms = start_after.as_millis() as u64,
            "Observer thread is about to stop; start scheduled"
        );
        if let Some(control) = self.control.upgrade() {
            let cycle = Arc::clone(self);
            control.perform_after(start_after, move || cycle.start());
        }
    }
}
