//! Test context wiring the store and scheduler together.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use talon_core::agent::{Agent, AgentRegistration};
use talon_core::ids::{AgentId, PipelineDefinitionId, PipelineId};
use talon_core::pipeline::{Pipeline, PipelineDefinition};
use talon_core::ports::{AgentRepository, PipelineDefinitionRepository, PipelineRepository};
use talon_scheduler::{AgentReports, ManualClock, Scheduler, SchedulerConfig};
use talon_store::{BroadcastEventBus, Store};

/// Poll interval used by [`TestContext::new`].
pub const TEST_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Disconnect timeout used by [`TestContext::new`].
pub const TEST_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An in-memory deployment of the scheduler with a manual clock.
pub struct TestContext {
    pub store: Store,
    pub event_bus: Arc<BroadcastEventBus>,
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<Scheduler>,
    pub reports: AgentReports,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(
            SchedulerConfig::new(TEST_POLL_INTERVAL, TEST_DISCONNECT_TIMEOUT)
                .expect("test scheduler config is valid"),
        )
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        crate::init_test_logging();

        let store = Store::new();
        let event_bus = Arc::new(BroadcastEventBus::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let scheduler = Arc::new(Scheduler::new(
            config,
            store.pipelines.clone(),
            store.agents.clone(),
            store.definitions.clone(),
            event_bus.clone(),
            clock.clone(),
        ));
        let reports = scheduler.reports();

        Self {
            store,
            event_bus,
            clock,
            scheduler,
            reports,
        }
    }

    pub async fn add_definition(&self, definition: PipelineDefinition) -> anyhow::Result<PipelineDefinitionId> {
        self.store.definitions.add(&definition).await?;
        Ok(definition.id)
    }

    /// Store `definition` and trigger one execution of it.
    pub async fn start(&self, definition: PipelineDefinition) -> anyhow::Result<PipelineId> {
        let id = self.add_definition(definition).await?;
        Ok(self.scheduler.trigger(id).await?)
    }

    pub async fn register(&self, registration: AgentRegistration) -> anyhow::Result<AgentId> {
        Ok(self.reports.register(registration).await?.id)
    }

    pub async fn pipeline(&self, id: PipelineId) -> anyhow::Result<Pipeline> {
        self.store
            .pipelines
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("pipeline {id} not found"))
    }

    pub async fn agent(&self, id: AgentId) -> anyhow::Result<Agent> {
        self.store
            .agents
            .get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("agent {id} not found"))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
