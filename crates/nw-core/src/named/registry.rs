use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};

use super::index::IndexDescriptor;
use super::observer::{LifecycleAction, LifecycleEvent, ObserverHub};
use super::processor::{NamedWindowProcessor, ProcessorDef};

// ---------------------------------------------------------------------------
// WindowRegistry
// ---------------------------------------------------------------------------

/// Name → processor mapping for every live named window.
///
/// Mutations are serialized by `mutation` for their whole duration,
/// including observer notification, so observers see lifecycle events in
/// mutation order. The map itself is only write-locked for the insert or
/// remove, which keeps lookups available to observers while they run. An
/// observer that mutates the registry from `observe` would deadlock on
/// `mutation`.
pub struct WindowRegistry {
    processors: RwLock<HashMap<String, Arc<NamedWindowProcessor>>>,
    mutation: Mutex<()>,
    observers: ObserverHub,
}

impl std::fmt::Debug for WindowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowRegistry")
            .field("windows", &self.window_names())
            .field("observers", &self.observers)
            .finish()
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self {
            processors: RwLock::new(HashMap::new()),
            mutation: Mutex::new(()),
            observers: ObserverHub::new(),
        }
    }

    /// Whether a processor is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Snapshot of registered names, sorted.
    pub fn window_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Option<Arc<NamedWindowProcessor>> {
        self.read().get(name).cloned()
    }

    /// Index descriptors of `name`, empty when the window does not exist.
    pub fn indexes(&self, name: &str) -> Vec<IndexDescriptor> {
        self.get(name).map(|p| p.indexes()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn observers(&self) -> &ObserverHub {
        &self.observers
    }

    /// Create and register a processor.
    ///
    /// Returns `Err` with [`CoreReason::WindowExists`] if the name is taken;
    /// the existing processor is left untouched.
    pub fn add(&self, def: ProcessorDef) -> CoreResult<Arc<NamedWindowProcessor>> {
        let _serial = self.mutation.lock().expect("registry mutation lock poisoned");

        if self.contains(&def.name) {
            return StructError::from(CoreReason::WindowExists)
                .with_detail(format!("named window {:?} already exists", def.name))
                .err();
        }
        let processor = Arc::new(NamedWindowProcessor::new(def)?);
        self.write()
            .insert(processor.name().to_string(), Arc::clone(&processor));
        log::debug!(
            "named window {:?} created by statement {:?}",
            processor.name(),
            processor.statement_name()
        );

        self.observers.notify(&LifecycleEvent {
            window: processor.name(),
            action: LifecycleAction::Created,
            processor: &processor,
        });
        Ok(processor)
    }

    /// Unregister and destroy the processor under `name`. Unknown names are a
    /// no-op (returns `None`, observers are not notified).
    pub fn remove(&self, name: &str) -> Option<Arc<NamedWindowProcessor>> {
        let _serial = self.mutation.lock().expect("registry mutation lock poisoned");

        let processor = self.write().remove(name)?;
        log::debug!("named window {name:?} removed");

        self.observers.notify(&LifecycleEvent {
            window: name,
            action: LifecycleAction::Removed,
            processor: &processor,
        });
        processor.destroy();
        Some(processor)
    }

    /// Drop every processor and observer without notification.
    pub(crate) fn clear(&self) {
        let _serial = self.mutation.lock().expect("registry mutation lock poisoned");
        let drained: Vec<_> = self.write().drain().map(|(_, p)| p).collect();
        for processor in drained {
            processor.destroy();
        }
        self.observers.clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<NamedWindowProcessor>>> {
        self.processors.read().expect("registry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<NamedWindowProcessor>>> {
        self.processors.write().expect("registry lock poisoned")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
