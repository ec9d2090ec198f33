//! Process-level supervision shared by all subsystems.
//!
//! - **health**: push-based health registry read by `GET /health/`.

pub mod health;
