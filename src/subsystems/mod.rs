//! Subsystem modules for the Radiologix service.

pub mod chatbot;
pub mod classifier;
pub mod comms;
#[cfg(feature = "records")]
pub mod records;
pub mod segmentation;
