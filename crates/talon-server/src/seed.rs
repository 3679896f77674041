//! Startup data for the in-memory store.

use anyhow::{Context, bail};
use serde::Deserialize;
use std::path::Path;
use talon_core::agent::AgentRegistration;
use talon_core::pipeline::PipelineDefinition;
use talon_core::ports::PipelineDefinitionRepository;
use talon_scheduler::Scheduler;
use talon_store::Store;
use tracing::info;

/// A YAML file of pipeline definitions and agents to preload.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub definitions: Vec<PipelineDefinition>,
    #[serde(default)]
    pub agents: Vec<AgentRegistration>,
    /// Definition names to trigger once loaded.
    #[serde(default)]
    pub trigger: Vec<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub definitions: usize,
    pub agents: usize,
    pub triggered: usize,
}

impl SeedFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid seed file {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Store the definitions, register the agents and fire the triggers.
    pub async fn apply(self, store: &Store, scheduler: &Scheduler) -> anyhow::Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for definition in &self.definitions {
            store.definitions.add(definition).await?;
            summary.definitions += 1;
        }

        let reports = scheduler.reports();
        for registration in self.agents {
            reports.register(registration).await?;
            summary.agents += 1;
        }

        for name in &self.trigger {
            let Some(definition) = self.definitions.iter().find(|d| &d.name == name) else {
                bail!("cannot trigger unknown pipeline definition '{name}'");
            };
            scheduler.trigger(definition.id).await?;
            summary.triggered += 1;
        }

        info!(
            definitions = summary.definitions,
            agents = summary.agents,
            triggered = summary.triggered,
            "Seed data loaded"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use talon_core::ports::{AgentRepository, PipelineRepository};
    use talon_scheduler::{SchedulerConfig, SystemClock};
    use talon_store::BroadcastEventBus;

    const SEED: &str = r#"
definitions:
  - name: service
    stages:
      - name: build
        jobs:
          - name: compile
            resources: [linux]
            tasks:
              - name: cargo
                command: cargo
                arguments: [build, --release]
agents:
  - name: builder-1
    resources: [linux, docker]
  - name: builder-2
    enabled: false
trigger: [service]
"#;

    fn scheduler(store: &Store) -> Scheduler {
        Scheduler::new(
            SchedulerConfig::new(Duration::from_secs(4), Duration::from_secs(30)).unwrap(),
            store.pipelines.clone(),
            store.agents.clone(),
            store.definitions.clone(),
            Arc::new(BroadcastEventBus::new()),
            Arc::new(SystemClock),
        )
    }

    #[tokio::test]
    async fn test_apply_seed() {
        let store = Store::new();
        let scheduler = scheduler(&store);

        let summary = SeedFile::parse(SEED)
            .unwrap()
            .apply(&store, &scheduler)
            .await
            .unwrap();

        assert_eq!(
            summary,
            SeedSummary {
                definitions: 1,
                agents: 2,
                triggered: 1
            }
        );
        let agents = store.agents.get_all().await.unwrap();
        assert!(agents.iter().any(|a| a.name == "builder-2" && !a.enabled));
        let pipelines = store.pipelines.get_all().await.unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].stages[0].jobs[0].tasks[0].arguments, vec!["build", "--release"]);
    }

    #[tokio::test]
    async fn test_unknown_trigger_fails() {
        let store = Store::new();
        let scheduler = scheduler(&store);

        let err = SeedFile::parse("trigger: [missing]\n")
            .unwrap()
            .apply(&store, &scheduler)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
