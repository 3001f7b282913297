//! Per-thread cooperative run loop
//!
//! Change notifications are delivered on the run loop of the thread that
//! subscribed, never on the writer's thread. A run loop is a queue of ready
//! jobs plus a min-heap of timed jobs, drained by its owning thread through
//! [`RunLoop::run_once`] or [`RunLoop::run`]. Other threads only enqueue.
//!
//! The thread-local reference created by [`RunLoop::current`] keeps the loop
//! alive until [`RunLoop::detach_current`] or thread exit. Once every strong
//! reference is gone, [`WeakRunLoop::upgrade`] fails and work posted through
//! weak references is silently dropped.

use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    static CURRENT: RefCell<Option<RunLoop>> = RefCell::new(None);
}

/// Why a call to [`RunLoop::run_once`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exactly one job ran
    Handled,
    /// Nothing became ready before the timeout
    TimedOut,
    /// [`RunLoop::stop`] was called
    Stopped,
}

struct TimedJob {
    due: Instant,
    sequence: u64,
    job: Job,
}

impl Eq for TimedJob {}

impl PartialEq for TimedJob {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

// Earliest deadline first, then lower sequence (older) first
impl Ord for TimedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for TimedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct LoopQueue {
    ready: VecDeque<Job>,
    timers: BinaryHeap<TimedJob>,
    sequence: u64,
    stop_requested: bool,
}

impl LoopQueue {
    fn promote_due(&mut self, now: Instant) {
        while self.timers.peek().map_or(false, |t| t.due <= now) {
            if let Some(timed) = self.timers.pop() {
                self.ready.push_back(timed.job);
            }
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.timers.peek().map(|t| t.due)
    }
}

struct LoopInner {
    queue: Mutex<LoopQueue>,
    work_ready: Condvar,
    owner: ThreadId,
}

/// Handle to one thread's run loop. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct RunLoop {
    inner: Arc<LoopInner>,
}

/// Non-owning handle; does not keep the loop alive.
#[derive(Clone)]
pub struct WeakRunLoop {
    inner: Weak<LoopInner>,
}

impl RunLoop {
    fn new_for_current_thread() -> Self {
        RunLoop {
            inner: Arc::new(LoopInner {
                queue: Mutex::new(LoopQueue::default()),
                work_ready: Condvar::new(),
                owner: thread::current().id(),
            }),
        }
    }

    /// The calling thread's run loop, created on first use.
    pub fn current() -> RunLoop {
        CURRENT.with(|slot| {
            slot.borrow_mut()
                .get_or_insert_with(RunLoop::new_for_current_thread)
                .clone()
        })
    }

    /// The calling thread's run loop, if one has been created.
    pub fn current_if_exists() -> Option<RunLoop> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Release the calling thread's reference to its run loop.
    ///
    /// Pending jobs stay queued for as long as another handle keeps the loop
    /// alive; a later [`RunLoop::current`] on this thread creates a new loop.
    pub fn detach_current() -> Option<RunLoop> {
        CURRENT.with(|slot| slot.borrow_mut().take())
    }

    /// Whether this loop belongs to the calling thread.
    pub fn is_current(&self) -> bool {
        self.inner.owner == thread::current().id()
    }

    /// Thread that drains this loop.
    pub fn owner(&self) -> ThreadId {
        self.inner.owner
    }

    /// Non-owning handle to this loop.
    pub fn downgrade(&self) -> WeakRunLoop {
        WeakRunLoop {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Queue `job` to run on the owning thread's next iteration.
    pub fn perform(&self, job: impl FnOnce() + Send + 'static) {
        let mut queue = self.inner.queue.lock();
        queue.ready.push_back(Box::new(job));
        drop(queue);
        self.inner.work_ready.notify_one();
    }

    /// Queue `job` to run on the owning thread once `delay` has elapsed.
    pub fn perform_after(&self, delay: Duration, job: impl FnOnce() + Send + 'static) {
        let mut queue = self.inner.queue.lock();
        queue.sequence += 1;
        let sequence = queue.sequence;
        queue.timers.push(TimedJob {
            due: Instant::now() + delay,
            sequence,
            job: Box::new(job),
        });
        drop(queue);
        // The owner may be sleeping until a later deadline
        self.inner.work_ready.notify_one();
    }

    /// Make the current or next [`RunLoop::run_once`] return `Stopped`.
    pub fn stop(&self) {
        let mut queue = self.inner.queue.lock();
        queue.stop_requested = true;
        drop(queue);
        self.inner.work_ready.notify_one();
    }

    /// Number of jobs queued, ready or timed.
    pub fn pending(&self) -> usize {
        let queue = self.inner.queue.lock();
        queue.ready.len() + queue.timers.len()
    }

    /// Run at most one job, waiting up to `timeout` for one to become ready.
    ///
    /// Must be called from the owning thread.
    pub fn run_once(&self, timeout: Duration) -> RunOutcome {
        debug_assert!(self.is_current(), "run loop driven from a foreign thread");
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.queue.lock();
        loop {
            let now = Instant::now();
            queue.promote_due(now);

            if let Some(job) = queue.ready.pop_front() {
                drop(queue);
                job();
                return RunOutcome::Handled;
            }
            if queue.stop_requested {
                queue.stop_requested = false;
                return RunOutcome::Stopped;
            }
            if now >= deadline {
                return RunOutcome::TimedOut;
            }

            let wake_at = queue.next_due().map_or(deadline, |due| due.min(deadline));
            self.inner.work_ready.wait_until(&mut queue, wake_at);
        }
    }

    /// Run jobs until [`RunLoop::stop`] is called.
    pub fn run(&self) {
        while self.run_once(Duration::from_secs(60)) != RunOutcome::Stopped {}
    }
}

impl WeakRunLoop {
    /// Strong handle, if the loop is still alive.
    pub fn upgrade(&self) -> Option<RunLoop> {
        self.inner.upgrade().map(|inner| RunLoop { inner })
    }
}

impl std::fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLoop")
            .field("owner", &self.inner.owner)
            .finish()
    }
}
