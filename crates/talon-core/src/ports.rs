//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the scheduling core and the
//! persistence and notification adapters. `Ok` carries a successful lookup or
//! write; `Err` is a reportable failure the caller may retry on the next tick.

use crate::agent::Agent;
use crate::events::Event;
use crate::ids::*;
use crate::pipeline::{Pipeline, PipelineDefinition};
use crate::Result;
use async_trait::async_trait;

/// Event bus for publishing events to UI subscribers.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> Result<()>;
}

/// Repository for runtime pipelines.
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// List all pipelines.
    async fn get_all(&self) -> Result<Vec<Pipeline>>;

    /// Get a pipeline by ID.
    async fn get_by_id(&self, id: PipelineId) -> Result<Option<Pipeline>>;

    /// List pipelines the scheduler still has to drive (see [`Pipeline::is_active`]).
    async fn get_all_in_progress(&self) -> Result<Vec<Pipeline>>;

    /// Next execution number for a definition, starting at 1.
    async fn next_execution_id(&self, definition_id: PipelineDefinitionId) -> Result<u32>;

    /// Store a new pipeline.
    async fn add(&self, pipeline: &Pipeline) -> Result<()>;

    /// Replace a stored pipeline.
    async fn update(&self, pipeline: &Pipeline) -> Result<()>;

    /// Delete a pipeline.
    async fn delete(&self, id: PipelineId) -> Result<()>;
}

/// Repository for agents.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// List all agents.
    async fn get_all(&self) -> Result<Vec<Agent>>;

    /// Get an agent by ID.
    async fn get_by_id(&self, id: AgentId) -> Result<Option<Agent>>;

    /// Store a new agent.
    async fn add(&self, agent: &Agent) -> Result<()>;

    /// Replace a stored agent unconditionally.
    async fn update(&self, agent: &Agent) -> Result<()>;

    /// Replace a stored agent only if its version is still `expected_version`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    async fn update_if_version(&self, agent: &Agent, expected_version: u64) -> Result<bool>;

    /// Delete an agent.
    async fn delete(&self, id: AgentId) -> Result<()>;
}

/// Repository for pipeline definitions.
#[async_trait]
pub trait PipelineDefinitionRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<PipelineDefinition>>;

    async fn get_by_id(&self, id: PipelineDefinitionId) -> Result<Option<PipelineDefinition>>;

    async fn add(&self, definition: &PipelineDefinition) -> Result<()>;

    async fn update(&self, definition: &PipelineDefinition) -> Result<()>;

    async fn delete(&self, id: PipelineDefinitionId) -> Result<()>;
}
