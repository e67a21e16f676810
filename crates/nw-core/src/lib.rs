pub mod error;
pub mod named;
