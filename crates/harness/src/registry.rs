//! Long-lived control-thread subscriptions
//!
//! Each registration watches every root in one store. On a notification the
//! callback, already on the control thread, recounts the results, rereads the
//! file size and publishes both. Registrations live as long as the registry.

use crate::fatal;
use crate::metrics::MetricsSink;
use notistress_core::{Result, StoreKind};
use notistress_store::{StoreHandle, Subscription};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Stores watched at startup. `TwoListeners` appears twice on purpose: both
/// registrations must keep firing independently.
pub const DEFAULT_REGISTRATIONS: [StoreKind; 3] = [
    StoreKind::Listener,
    StoreKind::TwoListeners,
    StoreKind::TwoListeners,
];

/// One live registration.
pub struct Registration {
    kind: StoreKind,
    deliveries: Arc<AtomicU64>,
    token: Subscription,
}

impl Registration {
    /// Store being watched.
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Notifications delivered so far.
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Acquire)
    }

    /// Whether the subscription is still live.
    pub fn is_active(&self) -> bool {
        self.token.is_active()
    }
}

/// Subscriptions owned by the control thread.
pub struct NotificationRegistry {
    data_dir: PathBuf,
    sink: Arc<MetricsSink>,
    registrations: Vec<Registration>,
}

impl NotificationRegistry {
    /// Empty registry publishing into `sink`.
    pub fn new(sink: Arc<MetricsSink>) -> Self {
        NotificationRegistry {
            data_dir: sink.data_dir().to_path_buf(),
            sink,
            registrations: Vec::new(),
        }
    }

    /// Watch every root in `kind`'s store.
    ///
    /// Must be called on the control thread, which must have a run loop.
    pub fn subscribe(&mut self, kind: StoreKind) -> Result<&Registration> {
        let handle = StoreHandle::open(kind.file_path(&self.data_dir))?;
        let results = handle.objects();
        let deliveries = Arc::new(AtomicU64::new(0));

        let sink = Arc::clone(&self.sink);
        let counter = Arc::clone(&deliveries);
        let token = results.subscribe(move |results| {
            counter.fetch_add(1, Ordering::AcqRel);
            if let Err(e) = sink.refresh(kind, Some(results.count())) {
                fatal("refreshing subscribed store", &e.on_store(kind));
            }
        })?;

        info!(store = %kind, index = self.registrations.len(), "Subscription installed");
        self.registrations.push(Registration {
            kind,
            deliveries,
            token,
        });
        Ok(&self.registrations[self.registrations.len() - 1])
    }

    /// Install the startup set: `Listener` once, `TwoListeners` twice.
    pub fn install_defaults(&mut self) -> Result<()> {
        for kind in DEFAULT_REGISTRATIONS {
            self.subscribe(kind)?;
        }
        Ok(())
    }

    /// All registrations, in install order.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Registrations on `kind`.
    pub fn for_kind(&self, kind: StoreKind) -> impl Iterator<Item = &Registration> {
        self.registrations.iter().filter(move |r| r.kind == kind)
    }

    /// Cancel every registration. Only used when a run is torn down.
    pub fn cancel_all(&mut self) {
        for registration in self.registrations.drain(..) {
            registration.token.cancel();
        }
    }
}
