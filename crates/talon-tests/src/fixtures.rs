//! Test fixtures for creating sample data.

use talon_core::agent::AgentRegistration;
use talon_core::ids::PipelineDefinitionId;
use talon_core::pipeline::{JobDefinition, PipelineDefinition, StageDefinition, TaskDefinition};

/// Factory for pipeline definitions.
pub struct PipelineFixture;

impl PipelineFixture {
    /// One stage with one `linux` job.
    pub fn single_job() -> PipelineDefinition {
        Self::definition("single-job", vec![Self::stage("build", vec![Self::job("compile", &["linux"])])])
    }

    /// `count` stages named `stage-0..`, one `linux` job each.
    pub fn sequential(count: usize) -> PipelineDefinition {
        let stages = (0..count)
            .map(|i| Self::stage(&format!("stage-{i}"), vec![Self::job(&format!("job-{i}"), &["linux"])]))
            .collect();
        Self::definition("sequential", stages)
    }

    /// A single stage fanning out into `count` parallel `linux` jobs.
    pub fn fan_out(count: usize) -> PipelineDefinition {
        let jobs = (0..count)
            .map(|i| Self::job(&format!("shard-{i}"), &["linux"]))
            .collect();
        Self::definition("fan-out", vec![Self::stage("test", jobs)])
    }

    pub fn definition(name: &str, stages: Vec<StageDefinition>) -> PipelineDefinition {
        PipelineDefinition {
            id: PipelineDefinitionId::new(),
            name: name.to_string(),
            stages,
        }
    }

    pub fn stage(name: &str, jobs: Vec<JobDefinition>) -> StageDefinition {
        StageDefinition {
            name: name.to_string(),
            jobs,
        }
    }

    pub fn job(name: &str, resources: &[&str]) -> JobDefinition {
        JobDefinition {
            name: name.to_string(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
            tasks: vec![Self::shell_task(&format!("echo {name}"))],
        }
    }

    pub fn shell_task(command: &str) -> TaskDefinition {
        TaskDefinition {
            name: "run".to_string(),
            command: "sh".to_string(),
            arguments: vec!["-c".to_string(), command.to_string()],
        }
    }
}

/// Factory for agent registrations.
pub struct AgentFixture;

impl AgentFixture {
    /// An enabled agent advertising `linux` only.
    pub fn linux(name: &str) -> AgentRegistration {
        Self::with_resources(name, &["linux"])
    }

    pub fn with_resources(name: &str, resources: &[&str]) -> AgentRegistration {
        AgentRegistration {
            name: name.to_string(),
            resources: resources.iter().map(|r| r.to_string()).collect(),
            enabled: true,
        }
    }

    pub fn disabled(name: &str) -> AgentRegistration {
        AgentRegistration {
            enabled: false,
            ..Self::linux(name)
        }
    }
}
