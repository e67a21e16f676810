#[macro_use]
mod log_macros;

pub mod engine;
pub mod error;
pub mod metrics;
pub mod shape;
pub mod tracing_init;

pub use engine::Engine;
pub use metrics::LifecycleMetrics;
pub use shape::{ViewKind, ViewSpec, check_consumer_views, check_create_window_views};
