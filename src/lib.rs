//! Radiologix: chest X-ray analysis service.
//!
//! Library root; exposes internals for the binary in `src/main.rs` and for
//! integration tests.

pub mod bootstrap;
pub mod core;
pub mod llm;
pub mod subsystems;
pub mod supervisor;

pub use crate::bootstrap::logger;
pub use crate::core::{config, error};
