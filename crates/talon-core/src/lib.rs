//! Talon CI Core
//!
//! Core domain types, traits, and error handling for Talon CI.
//! This crate has minimal dependencies and defines the shared vocabulary
//! used by the store, the scheduler and the server.

pub mod agent;
pub mod error;
pub mod events;
pub mod ids;
pub mod pipeline;
pub mod ports;

pub use error::{Error, Result};
pub use ids::*;
