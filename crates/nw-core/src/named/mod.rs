mod delta;
mod dispatch;
mod index;
mod lock;
mod observer;
mod processor;
mod registry;
mod service;

pub use delta::NamedWindowDeltaData;
pub use dispatch::{
    ConsumerRegistration, DispatchEngine, DispatchStats, NamedWindowConsumerView, StatementHandle,
};
pub use index::{IndexCatalog, IndexDescriptor};
pub use lock::{LockTable, StatementLock};
pub use observer::{
    LifecycleAction, LifecycleEvent, MAX_RETAINED_FAILURES, NamedWindowLifecycleObserver,
    ObserverFailure, ObserverHub,
};
pub use processor::{
    NamedWindowProcessor, ProcessorDef, ResultCoordinator, RevisionProcessor, StatementResources,
    WindowMetricHandle,
};
pub use registry::WindowRegistry;
pub use service::NamedWindowService;
