use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use super::orchestrator::{Core, MachineService, spawn_listener};
use crate::config::Config;
use crate::error_log::ErrorLog;
use crate::events::Bus;
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::store::{MachineStore, MemoryStore};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for [`MachineService`].
pub struct MachineServiceBuilder {
    cfg: Config,
    store: Option<Arc<dyn MachineStore>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl MachineServiceBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            store: None,
            subscribers: Vec::new(),
        }
    }

    /// Persists machines and errors in `store` instead of a fresh [`MemoryStore`].
    pub fn with_store(mut self, store: Arc<dyn MachineStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every runtime event through dedicated workers. Status changes
    /// always arrive; rejections and job flow may be dropped when a subscriber lags.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Wires the service and starts the event listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> MachineService {
        let store: Arc<dyn MachineStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        let (dispatcher, feed) = Dispatcher::channel(bus.clone());
        let stop = CancellationToken::new();
        let listener = spawn_listener(feed, bus.subscribe(), subs, stop.clone());

        let core = Core {
            registry: Registry::new(Arc::clone(&store)),
            errors: ErrorLog::new(store),
            scheduler: Scheduler::new(&self.cfg, bus.clone()),
            dispatcher,
            bus,
            listener: tokio::sync::Mutex::new(Some((stop, listener))),
        };
        MachineService::from_core(core)
    }
}
