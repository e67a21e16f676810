use std::sync::Arc;

use crate::error::CoreResult;

use super::delta::NamedWindowDeltaData;
use super::dispatch::{ConsumerRegistration, DispatchEngine, DispatchStats};
use super::index::IndexDescriptor;
use super::lock::{LockTable, StatementLock};
use super::observer::{NamedWindowLifecycleObserver, ObserverFailure};
use super::processor::{NamedWindowProcessor, ProcessorDef};
use super::registry::WindowRegistry;

// ---------------------------------------------------------------------------
// NamedWindowService
// ---------------------------------------------------------------------------

/// Engine-level service for named window processors, their shared locks and
/// the per-cycle delta dispatch.
///
/// One instance is constructed per engine and handed to collaborators by
/// reference (usually `Arc`). Lookups on unknown names return `None` or an
/// empty result; only a duplicate `add_processor` is an error.
#[derive(Debug)]
pub struct NamedWindowService {
    registry: WindowRegistry,
    locks: LockTable,
    dispatcher: DispatchEngine,
}

impl NamedWindowService {
    /// `prioritized` selects priority-ordered delivery in [`dispatch`](Self::dispatch).
    pub fn new(prioritized: bool) -> Self {
        Self {
            registry: WindowRegistry::new(),
            locks: LockTable::new(),
            dispatcher: DispatchEngine::new(prioritized),
        }
    }

    // -- registry ------------------------------------------------------------

    pub fn is_named_window(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn named_windows(&self) -> Vec<String> {
        self.registry.window_names()
    }

    /// Register a new window. Fails with `WindowExists` on a name collision.
    pub fn add_processor(&self, def: ProcessorDef) -> CoreResult<Arc<NamedWindowProcessor>> {
        self.registry.add(def)
    }

    pub fn get_processor(&self, name: &str) -> Option<Arc<NamedWindowProcessor>> {
        self.registry.get(name)
    }

    /// Unregister `name`; unknown names are ignored.
    pub fn remove_processor(&self, name: &str) {
        self.registry.remove(name);
    }

    pub fn get_named_window_indexes(&self, name: &str) -> Vec<IndexDescriptor> {
        self.registry.indexes(name)
    }

    // -- locks ---------------------------------------------------------------

    pub fn get_named_window_lock(&self, window_name: &str) -> Option<StatementLock> {
        self.locks.get_lock(window_name)
    }

    pub fn add_named_window_lock(&self, window_name: &str, lock: StatementLock, statement_name: &str) {
        self.locks.add_lock(window_name, lock, statement_name);
    }

    pub fn remove_named_window_lock(&self, statement_name: &str) {
        self.locks.remove_lock(statement_name);
    }

    pub fn named_window_lock_owner(&self, window_name: &str) -> Option<String> {
        self.locks.lock_owner(window_name)
    }

    // -- dispatch ------------------------------------------------------------

    pub fn add_dispatch(&self, delta: NamedWindowDeltaData, consumers: &[ConsumerRegistration]) {
        self.dispatcher.add_dispatch(delta, consumers);
    }

    /// Deliver the current cycle's deltas; see [`DispatchEngine::dispatch`].
    pub fn dispatch(&self) -> CoreResult<bool> {
        self.dispatcher.dispatch()
    }

    pub fn pending_dispatches(&self) -> usize {
        self.dispatcher.pending()
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    // -- observers -----------------------------------------------------------

    pub fn add_observer(&self, observer: Arc<dyn NamedWindowLifecycleObserver>) {
        self.registry.observers().add(observer);
    }

    pub fn remove_observer(&self, observer: &Arc<dyn NamedWindowLifecycleObserver>) {
        self.registry.observers().remove(observer);
    }

    /// Observer failures collected since the last call.
    ///
    /// Callers owning observers that can fail should drain this after each
    /// `add_processor` / `remove_processor`; undrained failures beyond
    /// [`MAX_RETAINED_FAILURES`](super::observer::MAX_RETAINED_FAILURES)
    /// are dropped oldest first.
    pub fn take_observer_failures(&self) -> Vec<ObserverFailure> {
        self.registry.observers().take_failures()
    }

    // -- shutdown ------------------------------------------------------------

    /// Clear every processor, lock, observer and queued delta.
    ///
    /// Must run under an engine-wide stop barrier: no other call on this
    /// service may be in flight.
    pub fn destroy(&self) {
        let windows = self.registry.len();
        self.registry.clear();
        self.locks.clear();
        self.dispatcher.clear();
        log::debug!("named window service destroyed, windows={windows}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
