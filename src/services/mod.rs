//! The complaint lifecycle engine. Each submodule adds one component's
//! operations to [`Engine`]; the periodic ones also expose a `spawn` that
//! drives them from a tokio interval.

use std::sync::Arc;

use crate::config::Settings;
use crate::notify::Outbox;
use crate::store::Store;

pub mod allocator;
pub mod credentials;
pub mod desk;
pub mod escalation;
pub mod overdue;
pub mod resolution;
pub mod warnings;

#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) outbox: Outbox,
    pub(crate) settings: Arc<Settings>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, outbox: Outbox, settings: Arc<Settings>) -> Self {
        Self { store, outbox, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Converts a configured `std` duration for wall-clock arithmetic, capped at
/// a century so `now - window` cannot overflow.
pub(crate) fn chrono_duration(d: std::time::Duration) -> chrono::Duration {
    let cap = chrono::Duration::days(36_500);
    chrono::Duration::from_std(d).map_or(cap, |d| d.min(cap))
}

#[cfg(test)]
pub(crate) mod testkit {
    use std::sync::Arc;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::Engine;
    use crate::config::Settings;
    use crate::notify::{Notification, Outbox};
    use crate::store::MemoryStore;

    pub struct Harness {
        pub engine: Engine,
        pub store: Arc<MemoryStore>,
        pub rx: UnboundedReceiver<Notification>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_settings(Settings::for_tests())
        }

        pub fn with_settings(settings: Settings) -> Self {
            let store = Arc::new(MemoryStore::new());
            let (outbox, rx) = Outbox::channel();
            let engine = Engine::new(store.clone(), outbox, Arc::new(settings));
            Self { engine, store, rx }
        }

        pub fn sent(&mut self) -> Vec<Notification> {
            crate::notify::drain(&mut self.rx)
        }
    }
}
