pub mod engine;
pub mod logging;
pub mod validate;

pub use engine::{DispatchConfig, EngineConfig, EngineSection};
pub use logging::{LogFormat, LoggingConfig};
