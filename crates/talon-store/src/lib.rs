//! In-memory adapters for Talon CI.
//!
//! Implements the repository and event bus ports from `talon-core` on top of
//! process-local maps, standing in for the document store.

pub mod bus;
pub mod memory;

pub use bus::BroadcastEventBus;
pub use memory::{InMemoryAgentRepository, InMemoryDefinitionRepository, InMemoryPipelineRepository};

use std::sync::Arc;

/// A bundle of the three repositories sharing one process.
#[derive(Clone, Default)]
pub struct Store {
    pub pipelines: Arc<InMemoryPipelineRepository>,
    pub agents: Arc<InMemoryAgentRepository>,
    pub definitions: Arc<InMemoryDefinitionRepository>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}
