//! In-memory repositories.
//!
//! Entities are kept in insertion order so listings are stable, which the
//! job assigner relies on for tie-breaking.

use async_trait::async_trait;
use std::collections::HashMap;
use talon_core::agent::Agent;
use talon_core::ids::{AgentId, PipelineDefinitionId, PipelineId};
use talon_core::pipeline::{Pipeline, PipelineDefinition};
use talon_core::ports::{AgentRepository, PipelineDefinitionRepository, PipelineRepository};
use talon_core::{Error, Result};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory implementation of [`PipelineRepository`].
#[derive(Default)]
pub struct InMemoryPipelineRepository {
    pipelines: RwLock<Vec<Pipeline>>,
    execution_counters: RwLock<HashMap<PipelineDefinitionId, u32>>,
}

impl InMemoryPipelineRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineRepository for InMemoryPipelineRepository {
    async fn get_all(&self) -> Result<Vec<Pipeline>> {
        Ok(self.pipelines.read().await.clone())
    }

    async fn get_by_id(&self, id: PipelineId) -> Result<Option<Pipeline>> {
        Ok(self
            .pipelines
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn get_all_in_progress(&self) -> Result<Vec<Pipeline>> {
        Ok(self
            .pipelines
            .read()
            .await
            .iter()
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn next_execution_id(&self, definition_id: PipelineDefinitionId) -> Result<u32> {
        let mut counters = self.execution_counters.write().await;
        let counter = counters.entry(definition_id).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn add(&self, pipeline: &Pipeline) -> Result<()> {
        let mut pipelines = self.pipelines.write().await;
        if pipelines.iter().any(|p| p.id == pipeline.id) {
            return Err(Error::Conflict(format!(
                "pipeline {} already exists",
                pipeline.id
            )));
        }
        pipelines.push(pipeline.clone());
        debug!(pipeline_id = %pipeline.id, "Pipeline stored");
        Ok(())
    }

    async fn update(&self, pipeline: &Pipeline) -> Result<()> {
        let mut pipelines = self.pipelines.write().await;
        let slot = pipelines
            .iter_mut()
            .find(|p| p.id == pipeline.id)
            .ok_or_else(|| Error::PipelineNotFound(pipeline.id.to_string()))?;
        *slot = pipeline.clone();
        Ok(())
    }

    async fn delete(&self, id: PipelineId) -> Result<()> {
        let mut pipelines = self.pipelines.write().await;
        let before = pipelines.len();
        pipelines.retain(|p| p.id != id);
        if pipelines.len() == before {
            return Err(Error::PipelineNotFound(id.to_string()));
        }
        Ok(())
    }
}

/// In-memory implementation of [`AgentRepository`].
///
/// Every successful write bumps the stored agent's `version`, which is what
/// [`AgentRepository::update_if_version`] compares against.
#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: RwLock<Vec<Agent>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn get_all(&self) -> Result<Vec<Agent>> {
        Ok(self.agents.read().await.clone())
    }

    async fn get_by_id(&self, id: AgentId) -> Result<Option<Agent>> {
        Ok(self.agents.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn add(&self, agent: &Agent) -> Result<()> {
        let mut agents = self.agents.write().await;
        if agents.iter().any(|a| a.id == agent.id) {
            return Err(Error::Conflict(format!("agent {} already exists", agent.id)));
        }
        agents.push(agent.clone());
        debug!(agent_id = %agent.id, name = %agent.name, "Agent stored");
        Ok(())
    }

    async fn update(&self, agent: &Agent) -> Result<()> {
        let mut agents = self.agents.write().await;
        let slot = agents
            .iter_mut()
            .find(|a| a.id == agent.id)
            .ok_or_else(|| Error::AgentNotFound(agent.id.to_string()))?;
        let version = slot.version + 1;
        *slot = agent.clone();
        slot.version = version;
        Ok(())
    }

    async fn update_if_version(&self, agent: &Agent, expected_version: u64) -> Result<bool> {
        let mut agents = self.agents.write().await;
        let slot = agents
            .iter_mut()
            .find(|a| a.id == agent.id)
            .ok_or_else(|| Error::AgentNotFound(agent.id.to_string()))?;
        if slot.version != expected_version {
            debug!(
                agent_id = %agent.id,
                expected = expected_version,
                actual = slot.version,
                "Stale agent write rejected"
            );
            return Ok(false);
        }
        *slot = agent.clone();
        slot.version = expected_version + 1;
        Ok(true)
    }

    async fn delete(&self, id: AgentId) -> Result<()> {
        let mut agents = self.agents.write().await;
        let before = agents.len();
        agents.retain(|a| a.id != id);
        if agents.len() == before {
            return Err(Error::AgentNotFound(id.to_string()));
        }
        Ok(())
    }
}

/// In-memory implementation of [`PipelineDefinitionRepository`].
#[derive(Default)]
pub struct InMemoryDefinitionRepository {
    definitions: RwLock<Vec<PipelineDefinition>>,
}

impl InMemoryDefinitionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineDefinitionRepository for InMemoryDefinitionRepository {
    async fn get_all(&self) -> Result<Vec<PipelineDefinition>> {
        Ok(self.definitions.read().await.clone())
    }

    async fn get_by_id(&self, id: PipelineDefinitionId) -> Result<Option<PipelineDefinition>> {
        Ok(self
            .definitions
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn add(&self, definition: &PipelineDefinition) -> Result<()> {
        let mut definitions = self.definitions.write().await;
        if definitions.iter().any(|d| d.id == definition.id) {
            return Err(Error::Conflict(format!(
                "pipeline definition {} already exists",
                definition.id
            )));
        }
        definitions.push(definition.clone());
        Ok(())
    }

    async fn update(&self, definition: &PipelineDefinition) -> Result<()> {
        let mut definitions = self.definitions.write().await;
        let slot = definitions
            .iter_mut()
            .find(|d| d.id == definition.id)
            .ok_or_else(|| Error::PipelineDefinitionNotFound(definition.id.to_string()))?;
        *slot = definition.clone();
        Ok(())
    }

    async fn delete(&self, id: PipelineDefinitionId) -> Result<()> {
        let mut definitions = self.definitions.write().await;
        let before = definitions.len();
        definitions.retain(|d| d.id != id);
        if definitions.len() == before {
            return Err(Error::PipelineDefinitionNotFound(id.to_string()));
        }
        Ok(())
    }
}
