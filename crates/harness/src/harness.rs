//! Control-thread wiring of a stress run
//!
//! The thread that builds a [`Harness`] becomes the control thread: its run
//! loop owns the metrics sink, delivers registry notifications, and drives the
//! observer's stop/start timers and the display refresh. Generators run on a
//! separate multi-threaded tokio runtime.

use crate::config::HarnessConfig;
use crate::display::MetricsDisplay;
use crate::fatal;
use crate::metrics::{MetricsPublisher, MetricsSink};
use crate::mutation::MutationGenerator;
use crate::observer::{ObserverCycle, ThreadedObserver};
use crate::registry::NotificationRegistry;
use notistress_core::{Error, Result, StoreKind};
use notistress_store::{evict, RunLoop, WeakRunLoop};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Wipe `dir` and recreate it empty.
///
/// Open stores under `dir` are evicted from the shared registry first so the
/// next open starts from an empty file.
pub fn prepare_directory(dir: &Path) -> Result<()> {
    for kind in StoreKind::ALL {
        evict(&kind.file_path(dir))?;
    }
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(dir)?;
    debug!(dir = %dir.display(), "Working directory prepared");
    Ok(())
}

/// One stress run.
pub struct Harness {
    config: HarnessConfig,
    control: RunLoop,
    sink: Arc<MetricsSink>,
    publisher: MetricsPublisher,
    registry: NotificationRegistry,
    observer: Arc<ThreadedObserver>,
    cycle: Arc<ObserverCycle>,
    runtime: Option<Runtime>,
    generators: Vec<JoinHandle<()>>,
}

impl Harness {
    /// Build a harness controlled by the calling thread.
    pub fn new(config: HarnessConfig, display: Arc<dyn MetricsDisplay>) -> Self {
        let control = RunLoop::current();
        let sink = MetricsSink::new(config.data_dir.clone(), display);
        let publisher = MetricsPublisher::new(control.clone(), Arc::clone(&sink));
        let registry = NotificationRegistry::new(Arc::clone(&sink));
        let observer = Arc::new(ThreadedObserver::new(
            config.store_path(StoreKind::ThreadListener),
            publisher.clone(),
            config.loop_check_interval,
        ));
        let cycle = ObserverCycle::new(
            Arc::clone(&observer),
            &control,
            config.stop_delay.clone(),
            config.restart_delay.clone(),
        );

        Harness {
            config,
            control,
            sink,
            publisher,
            registry,
            observer,
            cycle,
            runtime: None,
            generators: Vec::new(),
        }
    }

    /// Configuration of this run.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The control thread's run loop.
    pub fn control(&self) -> &RunLoop {
        &self.control
    }

    /// Published metrics.
    pub fn sink(&self) -> &Arc<MetricsSink> {
        &self.sink
    }

    /// Control-thread subscriptions.
    pub fn registry(&self) -> &NotificationRegistry {
        &self.registry
    }

    /// The dedicated-thread observer.
    pub fn observer(&self) -> &Arc<ThreadedObserver> {
        &self.observer
    }

    /// Generator tasks spawned so far.
    pub fn spawned_generators(&self) -> usize {
        self.generators.len()
    }

    /// Generator tasks still running.
    pub fn active_generators(&self) -> usize {
        self.generators.iter().filter(|g| !g.is_finished()).count()
    }

    /// Wipe the working directory, install subscriptions, spawn the
    /// generators and start the observer cycle.
    pub fn start(&mut self) -> Result<()> {
        if self.runtime.is_some() {
            return Err(Error::InvalidOperation("harness already started".to_string()));
        }

        prepare_directory(&self.config.data_dir)?;
        self.registry.install_defaults()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("notistress-writer")
            .build()?;

        for queue_index in self.config.queue_indices() {
            for kind in StoreKind::ALL {
                let generator =
                    MutationGenerator::new(queue_index, kind, &self.config, self.publisher.clone());
                self.generators.push(runtime.spawn(async move {
                    match generator.run().await {
                        Ok(never) => match never {},
                        Err(e) => fatal("running mutation generator", &e),
                    }
                }));
            }
        }
        self.runtime = Some(runtime);

        info!(
            dir = %self.config.data_dir.display(),
            generators = self.generators.len(),
            object_count_target = self.config.object_count_target,
            "Harness started"
        );

        self.cycle.start();
        schedule_present(
            self.control.downgrade(),
            Arc::clone(&self.sink),
            self.config.display_refresh,
        );
        Ok(())
    }

    /// Drive the control loop until [`RunLoop::stop`] is called on it.
    pub fn run(&self) {
        self.control.run();
    }

    /// Drive the control loop for `duration`.
    pub fn run_for(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.control.run_once(deadline - now);
        }
    }

    /// Tear the run down: cancel subscriptions, stop the observer and the
    /// generators.
    pub fn shutdown(&mut self) {
        self.registry.cancel_all();
        self.cycle.halt();
        if !self.observer.wait_for_exit(self.config.loop_check_interval * 4) {
            debug!("Observer thread did not exit before shutdown");
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_secs(1));
        }
        info!(received = self.observer.total_notifications(), "Harness shut down");
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if self.runtime.is_some() {
            self.shutdown();
        }
    }
}

fn schedule_present(control: WeakRunLoop, sink: Arc<MetricsSink>, every: Duration) {
    let Some(run_loop) = control.upgrade() else {
        return;
    };
    run_loop.perform_after(every, move || {
        sink.present();
        schedule_present(control, sink, every);
    });
}
