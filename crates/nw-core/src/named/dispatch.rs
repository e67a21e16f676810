use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};

use super::delta::NamedWindowDeltaData;
use super::lock::StatementLock;

// ---------------------------------------------------------------------------
// StatementHandle
// ---------------------------------------------------------------------------

struct HandleInner {
    statement_name: String,
    agent_instance_id: u32,
    priority: i32,
    lock: StatementLock,
}

/// Identifies one running instance of a consuming statement.
///
/// Equality and hashing use `(statement_name, agent_instance_id)`; the lock
/// and priority travel with the handle.
#[derive(Clone)]
pub struct StatementHandle {
    inner: Arc<HandleInner>,
}

impl StatementHandle {
    pub fn new(
        statement_name: impl Into<String>,
        agent_instance_id: u32,
        priority: i32,
        lock: StatementLock,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                statement_name: statement_name.into(),
                agent_instance_id,
                priority,
                lock,
            }),
        }
    }

    pub fn statement_name(&self) -> &str {
        &self.inner.statement_name
    }

    pub fn agent_instance_id(&self) -> u32 {
        self.inner.agent_instance_id
    }

    pub fn priority(&self) -> i32 {
        self.inner.priority
    }

    pub fn lock(&self) -> &StatementLock {
        &self.inner.lock
    }
}

impl PartialEq for StatementHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.agent_instance_id == other.inner.agent_instance_id
            && self.inner.statement_name == other.inner.statement_name
    }
}

impl Eq for StatementHandle {}

impl Hash for StatementHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.statement_name.hash(state);
        self.inner.agent_instance_id.hash(state);
    }
}

impl fmt::Debug for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatementHandle({}#{}, prio={})",
            self.inner.statement_name, self.inner.agent_instance_id, self.inner.priority
        )
    }
}

// ---------------------------------------------------------------------------
// Consumers
// ---------------------------------------------------------------------------

/// Downstream sink receiving the deltas of one named window for one
/// consuming statement.
pub trait NamedWindowConsumerView: Send + Sync {
    fn update(&self, delta: &NamedWindowDeltaData) -> anyhow::Result<()>;
}

/// A consuming statement's interest in a window: one handle, one or more views.
#[derive(Clone)]
pub struct ConsumerRegistration {
    pub handle: StatementHandle,
    pub views: Vec<Arc<dyn NamedWindowConsumerView>>,
}

impl ConsumerRegistration {
    pub fn new(handle: StatementHandle, views: Vec<Arc<dyn NamedWindowConsumerView>>) -> Self {
        Self { handle, views }
    }
}

// ---------------------------------------------------------------------------
// DispatchEngine
// ---------------------------------------------------------------------------

struct PendingDispatch {
    delta: Arc<NamedWindowDeltaData>,
    handle: StatementHandle,
    views: Vec<Arc<dyn NamedWindowConsumerView>>,
}

struct DispatchGroup {
    handle: StatementHandle,
    units: Vec<PendingDispatch>,
}

/// Everything one view of a statement receives from one window in a cycle.
struct ViewBatch<'a> {
    view: &'a Arc<dyn NamedWindowConsumerView>,
    view_idx: usize,
    window: &'a str,
    parts: Vec<&'a NamedWindowDeltaData>,
}

fn view_identity(view: &Arc<dyn NamedWindowConsumerView>) -> usize {
    Arc::as_ptr(view) as *const () as usize
}

impl DispatchGroup {
    /// Accumulate the group's deltas per (view, window), in first-appearance
    /// order; each batch keeps its deltas in enqueue order.
    fn accumulate(&self) -> Vec<ViewBatch<'_>> {
        let mut batches: Vec<ViewBatch<'_>> = Vec::new();
        for unit in &self.units {
            let window = unit.delta.window();
            for (view_idx, view) in unit.views.iter().enumerate() {
                let id = view_identity(view);
                match batches
                    .iter_mut()
                    .find(|b| view_identity(b.view) == id && b.window == window)
                {
                    Some(batch) => batch.parts.push(&*unit.delta),
                    None => batches.push(ViewBatch {
                        view,
                        view_idx,
                        window,
                        parts: vec![&*unit.delta],
                    }),
                }
            }
        }
        batches
    }
}

fn describe_failure(
    handle: &StatementHandle,
    window: &str,
    view_idx: usize,
    error: &dyn fmt::Display,
) -> String {
    format!(
        "statement {}#{} window {window:?} view {view_idx}: {error}",
        handle.statement_name(),
        handle.agent_instance_id()
    )
}

/// Cumulative dispatch counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub cycles: u64,
    pub deltas_drained: u64,
    pub deliveries: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    cycles: AtomicU64,
    deltas_drained: AtomicU64,
    deliveries: AtomicU64,
    failures: AtomicU64,
}

/// Per-cycle queue of window deltas and their consumers.
///
/// [`add_dispatch`](Self::add_dispatch) appends under the queue lock;
/// [`dispatch`](Self::dispatch) swaps the whole queue out under the same lock
/// and delivers after releasing it. Anything enqueued after the swap belongs
/// to the next cycle.
pub struct DispatchEngine {
    prioritized: bool,
    queue: Mutex<Vec<PendingDispatch>>,
    /// Serializes concurrent `dispatch` calls so cycles never overlap.
    flushing: Mutex<()>,
    counters: Counters,
}

impl fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("prioritized", &self.prioritized)
            .field("pending", &self.pending())
            .finish()
    }
}

impl DispatchEngine {
    pub fn new(prioritized: bool) -> Self {
        Self {
            prioritized,
            queue: Mutex::new(Vec::new()),
            flushing: Mutex::new(()),
            counters: Counters::default(),
        }
    }

    /// Enqueue `delta` for every registration in `consumers`.
    ///
    /// All entries of one call are appended under a single lock acquisition,
    /// so a delta is never split across two cycles.
    pub fn add_dispatch(&self, delta: NamedWindowDeltaData, consumers: &[ConsumerRegistration]) {
        if consumers.is_empty() {
            return;
        }
        let delta = Arc::new(delta);
        let mut queue = self.queue.lock().expect("dispatch queue poisoned");
        queue.extend(consumers.iter().map(|c| PendingDispatch {
            delta: Arc::clone(&delta),
            handle: c.handle.clone(),
            views: c.views.clone(),
        }));
    }

    /// Number of (statement, delta) entries waiting for the next cycle.
    pub fn pending(&self) -> usize {
        self.queue.lock().expect("dispatch queue poisoned").len()
    }

    /// Deliver everything queued so far, then start an empty queue.
    ///
    /// Deliveries are grouped per statement handle (first-enqueue order, or
    /// descending priority when prioritized); each group runs under the
    /// handle's exclusive lock. Within a group, the deltas a view receives
    /// from one window accumulate into a single update: inserts concatenated
    /// in enqueue order, removes likewise. A failing view does not stop the
    /// others; after the cycle the failures are returned as a single
    /// [`CoreReason::Dispatch`] error.
    ///
    /// Returns `Ok(true)` if at least one view received a delta.
    pub fn dispatch(&self) -> CoreResult<bool> {
        let _cycle = self.flushing.lock().expect("dispatch cycle lock poisoned");
        let drained = std::mem::take(&mut *self.queue.lock().expect("dispatch queue poisoned"));
        if drained.is_empty() {
            return Ok(false);
        }
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        self.counters
            .deltas_drained
            .fetch_add(drained.len() as u64, Ordering::Relaxed);

        let groups = self.group(drained);

        let mut delivered = 0u64;
        let mut failures: Vec<String> = Vec::new();
        for group in &groups {
            let _guard = group.handle.lock().write();
            for batch in group.accumulate() {
                let merged;
                let delta = match batch.parts.as_slice() {
                    [single] => *single,
                    parts => match NamedWindowDeltaData::concat(parts) {
                        Ok(d) => {
                            merged = d;
                            &merged
                        }
                        Err(e) => {
                            failures.push(describe_failure(
                                &group.handle,
                                batch.window,
                                batch.view_idx,
                                &e,
                            ));
                            continue;
                        }
                    },
                };
                match batch.view.update(delta) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        log::warn!(
                            "named window consumer failed: statement={:?} window={:?} view={} error={e:#}",
                            group.handle.statement_name(),
                            batch.window,
                            batch.view_idx
                        );
                        failures.push(describe_failure(
                            &group.handle,
                            batch.window,
                            batch.view_idx,
                            &format!("{e:#}"),
                        ));
                    }
                }
            }
        }

        self.counters.deliveries.fetch_add(delivered, Ordering::Relaxed);
        if !failures.is_empty() {
            self.counters
                .failures
                .fetch_add(failures.len() as u64, Ordering::Relaxed);
            return StructError::from(CoreReason::Dispatch)
                .with_detail(format!(
                    "{} consumer deliveries failed: {}",
                    failures.len(),
                    failures.join("; ")
                ))
                .err();
        }
        Ok(delivered > 0)
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            cycles: self.counters.cycles.load(Ordering::Relaxed),
            deltas_drained: self.counters.deltas_drained.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Drop anything queued without delivering it.
    pub(crate) fn clear(&self) {
        self.queue.lock().expect("dispatch queue poisoned").clear();
    }

    fn group(&self, drained: Vec<PendingDispatch>) -> Vec<DispatchGroup> {
        let mut positions: HashMap<StatementHandle, usize> = HashMap::new();
        let mut groups: Vec<DispatchGroup> = Vec::new();
        for unit in drained {
            let pos = *positions.entry(unit.handle.clone()).or_insert_with(|| {
                groups.push(DispatchGroup {
                    handle: unit.handle.clone(),
                    units: Vec::new(),
                });
                groups.len() - 1
            });
            groups[pos].units.push(unit);
        }
        if self.prioritized {
            // Stable: equal priorities keep first-enqueue order.
            groups.sort_by_key(|g| Reverse(g.handle.priority()));
        }
        groups
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
