use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::CoreResult;

use super::delta::NamedWindowDeltaData;
use super::index::{IndexCatalog, IndexDescriptor};

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Merges partial update events into full before/after values.
pub trait RevisionProcessor: Send + Sync {
    fn merge(&self, prior: &RecordBatch, update: &RecordBatch) -> anyhow::Result<RecordBatch>;
}

/// Decides whether the defining statement posts insert/remove streams to its
/// own listeners.
pub trait ResultCoordinator: Send + Sync {
    fn is_make_natural(&self) -> bool;
    fn is_make_synthetic(&self) -> bool;
}

/// Per-statement resources released when the window goes away.
pub trait StatementResources: Send + Sync {
    fn release(&self);
}

// ---------------------------------------------------------------------------
// WindowMetricHandle
// ---------------------------------------------------------------------------

/// Lock-free counters for one named window.
#[derive(Debug, Default)]
pub struct WindowMetricHandle {
    deltas_total: AtomicU64,
    inserted_rows_total: AtomicU64,
    removed_rows_total: AtomicU64,
}

impl WindowMetricHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn observe_delta(&self, delta: &NamedWindowDeltaData) {
        self.deltas_total.fetch_add(1, Ordering::Relaxed);
        self.inserted_rows_total
            .fetch_add(delta.inserted().num_rows() as u64, Ordering::Relaxed);
        self.removed_rows_total
            .fetch_add(delta.removed().num_rows() as u64, Ordering::Relaxed);
    }

    pub fn deltas_total(&self) -> u64 {
        self.deltas_total.load(Ordering::Relaxed)
    }

    pub fn inserted_rows_total(&self) -> u64 {
        self.inserted_rows_total.load(Ordering::Relaxed)
    }

    pub fn removed_rows_total(&self) -> u64 {
        self.removed_rows_total.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// ProcessorDef
// ---------------------------------------------------------------------------

/// Everything the `create window` statement supplies to register a window.
///
/// The statement must already have passed shape validation (a qualifying
/// data-window child view); the registry never inspects view composition.
pub struct ProcessorDef {
    pub name: String,
    pub context_name: Option<String>,
    pub schema: SchemaRef,
    pub result_coordinator: Arc<dyn ResultCoordinator>,
    pub revision: Option<Arc<dyn RevisionProcessor>>,
    /// Text of the defining expression, kept for diagnostics.
    pub epl_expression: String,
    pub statement_name: String,
    pub prioritized: bool,
    pub subquery_index_share: bool,
    pub batching_data_window: bool,
    pub virtual_data_window: bool,
    pub metrics: Option<Arc<WindowMetricHandle>>,
    /// When present, seeds the catalog with a unique hash index over these.
    pub unique_key_props: Option<Vec<String>>,
    pub event_type_alias: Option<String>,
    pub resources: Option<Arc<dyn StatementResources>>,
}

impl ProcessorDef {
    /// Minimal definition: no revision, no context, all flags off.
    pub fn new(
        name: impl Into<String>,
        schema: SchemaRef,
        statement_name: impl Into<String>,
        result_coordinator: Arc<dyn ResultCoordinator>,
    ) -> Self {
        Self {
            name: name.into(),
            context_name: None,
            schema,
            result_coordinator,
            revision: None,
            epl_expression: String::new(),
            statement_name: statement_name.into(),
            prioritized: false,
            subquery_index_share: false,
            batching_data_window: false,
            virtual_data_window: false,
            metrics: None,
            unique_key_props: None,
            event_type_alias: None,
            resources: None,
        }
    }
}

// ---------------------------------------------------------------------------
// NamedWindowProcessor
// ---------------------------------------------------------------------------

/// Runtime state of one named window, owned by the registry between
/// `add_processor` and `remove_processor`.
pub struct NamedWindowProcessor {
    name: String,
    context_name: Option<String>,
    schema: SchemaRef,
    result_coordinator: Arc<dyn ResultCoordinator>,
    revision: Option<Arc<dyn RevisionProcessor>>,
    epl_expression: String,
    statement_name: String,
    prioritized: bool,
    subquery_index_share: bool,
    batching_data_window: bool,
    virtual_data_window: bool,
    metrics: Arc<WindowMetricHandle>,
    event_type_alias: Option<String>,
    resources: Option<Arc<dyn StatementResources>>,
    indexes: IndexCatalog,
    destroyed: AtomicBool,
}

impl fmt::Debug for NamedWindowProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedWindowProcessor")
            .field("name", &self.name)
            .field("statement_name", &self.statement_name)
            .field("context_name", &self.context_name)
            .field("index_count", &self.indexes.len())
            .field("revision", &self.revision.is_some())
            .finish()
    }
}

impl NamedWindowProcessor {
    pub(crate) fn new(def: ProcessorDef) -> CoreResult<Self> {
        let indexes = IndexCatalog::new(def.schema.clone());
        if let Some(props) = def.unique_key_props.filter(|p| !p.is_empty()) {
            indexes.record(IndexDescriptor::hash(true, props))?;
        }
        Ok(Self {
            name: def.name,
            context_name: def.context_name,
            schema: def.schema,
            result_coordinator: def.result_coordinator,
            revision: def.revision,
            epl_expression: def.epl_expression,
            statement_name: def.statement_name,
            prioritized: def.prioritized,
            subquery_index_share: def.subquery_index_share,
            batching_data_window: def.batching_data_window,
            virtual_data_window: def.virtual_data_window,
            metrics: def.metrics.unwrap_or_default(),
            event_type_alias: def.event_type_alias,
            resources: def.resources,
            indexes,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Add an index over the window contents. Returns `Ok(false)` if an equal
    /// descriptor was already recorded.
    pub fn record_index(&self, descriptor: IndexDescriptor) -> CoreResult<bool> {
        self.indexes.record(descriptor)
    }

    /// Package a raw change set. `None` means nothing changed and nothing
    /// must be enqueued.
    pub fn compute_delta(
        &self,
        inserted: &[RecordBatch],
        removed: &[RecordBatch],
    ) -> CoreResult<Option<NamedWindowDeltaData>> {
        let delta = NamedWindowDeltaData::build(&self.name, &self.schema, inserted, removed)?;
        if let Some(ref d) = delta {
            self.metrics.observe_delta(d);
        }
        Ok(delta)
    }

    pub fn indexes(&self) -> Vec<IndexDescriptor> {
        self.indexes.descriptors()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_name(&self) -> Option<&str> {
        self.context_name.as_deref()
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn revision(&self) -> Option<&Arc<dyn RevisionProcessor>> {
        self.revision.as_ref()
    }

    /// Whether the defining statement posts any result stream.
    pub fn posts_results(&self) -> bool {
        self.result_coordinator.is_make_natural() || self.result_coordinator.is_make_synthetic()
    }

    pub fn epl_expression(&self) -> &str {
        &self.epl_expression
    }

    pub fn statement_name(&self) -> &str {
        &self.statement_name
    }

    pub fn is_prioritized(&self) -> bool {
        self.prioritized
    }

    pub fn is_subquery_index_share(&self) -> bool {
        self.subquery_index_share
    }

    pub fn is_batching_data_window(&self) -> bool {
        self.batching_data_window
    }

    pub fn is_virtual_data_window(&self) -> bool {
        self.virtual_data_window
    }

    pub fn metrics(&self) -> &Arc<WindowMetricHandle> {
        &self.metrics
    }

    /// Alias under which the window's event type is published, defaulting to
    /// the window name.
    pub fn event_type_name(&self) -> &str {
        self.event_type_alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Clear indexes and release statement resources. Runs at most once.
    pub(crate) fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.indexes.clear();
        if let Some(resources) = &self.resources {
            resources.release();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
