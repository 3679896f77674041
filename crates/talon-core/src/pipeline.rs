//! Pipeline definitions and their runtime instances.
//!
//! A [`PipelineDefinition`] is the authored template. Each trigger produces a
//! [`Pipeline`], which exclusively owns its ordered [`Stage`]s, which in turn
//! own their [`Job`]s. Stage order is execution order.

use crate::ids::{AgentId, JobId, PipelineDefinitionId, PipelineId, StageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default)]
    pub id: PipelineDefinitionId,
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    /// Tags an agent must advertise to run this job.
    #[serde(default)]
    pub resources: BTreeSet<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

/// A shell task executed agent-side. Opaque to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// Aggregate status shared by pipelines and stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    NotRun,
    InProgress,
    Passed,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Passed | Status::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotRun => "NOT_RUN",
            Status::InProgress => "IN_PROGRESS",
            Status::Passed => "PASSED",
            Status::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Awaiting,
    Assigned,
    InProgress,
    Passed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Passed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Awaiting => "AWAITING",
            JobStatus::Assigned => "ASSIGNED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Passed => "PASSED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Coarse projection onto the aggregate status domain.
    pub fn as_status(&self) -> Status {
        match self {
            JobStatus::Awaiting => Status::NotRun,
            JobStatus::Assigned | JobStatus::InProgress => Status::InProgress,
            JobStatus::Passed => Status::Passed,
            JobStatus::Failed => Status::Failed,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A running or completed instance of a pipeline definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub definition_id: PipelineDefinitionId,
    pub definition_name: String,
    pub execution_id: u32,
    pub status: Status,
    pub stages: Vec<Stage>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub status: Status,
    pub jobs: Vec<Job>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    /// Lookup-only reference to the agent holding this job.
    pub assigned_agent_id: Option<AgentId>,
    #[serde(default)]
    pub required_resources: BTreeSet<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Pipeline {
    /// Instantiate a runtime pipeline from its definition.
    ///
    /// Every stage starts `NOT_RUN` and every job `AWAITING`; the pipeline
    /// itself is `IN_PROGRESS` so the next scheduler tick picks it up.
    pub fn from_definition(definition: &PipelineDefinition, execution_id: u32) -> Self {
        Self {
            id: PipelineId::new(),
            definition_id: definition.id,
            definition_name: definition.name.clone(),
            execution_id,
            status: Status::InProgress,
            stages: definition.stages.iter().map(Stage::from_definition).collect(),
            start_time: Some(Utc::now()),
            end_time: None,
        }
    }

    /// Whether the scheduler still has work to do on this pipeline.
    pub fn is_active(&self) -> bool {
        match self.status {
            Status::InProgress => true,
            Status::NotRun => self.stages.iter().any(|s| s.status != Status::NotRun),
            Status::Passed | Status::Failed => false,
        }
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.stages.iter().flat_map(|s| s.jobs.iter())
    }

    pub fn find_job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs().find(|j| j.id == job_id)
    }

    pub fn find_job_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.stages
            .iter_mut()
            .flat_map(|s| s.jobs.iter_mut())
            .find(|j| j.id == job_id)
    }
}

impl Stage {
    pub fn from_definition(definition: &StageDefinition) -> Self {
        Self {
            id: StageId::new(),
            name: definition.name.clone(),
            status: Status::NotRun,
            jobs: definition.jobs.iter().map(Job::from_definition).collect(),
            start_time: None,
            end_time: None,
        }
    }

    /// An empty `NOT_RUN` stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: StageId::new(),
            name: name.into(),
            status: Status::NotRun,
            jobs: Vec::new(),
            start_time: None,
            end_time: None,
        }
    }
}

impl Job {
    pub fn from_definition(definition: &JobDefinition) -> Self {
        Self {
            id: JobId::new(),
            name: definition.name.clone(),
            status: JobStatus::Awaiting,
            assigned_agent_id: None,
            required_resources: definition.resources.clone(),
            tasks: definition.tasks.clone(),
            start_time: None,
            end_time: None,
        }
    }

    /// An `AWAITING` job with no tasks.
    pub fn new(name: impl Into<String>, resources: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            status: JobStatus::Awaiting,
            assigned_agent_id: None,
            required_resources: resources.into_iter().collect(),
            tasks: Vec::new(),
            start_time: None,
            end_time: None,
        }
    }
}

/// A mutable handle on any level of the pipeline tree.
#[derive(Debug)]
pub enum SchedulableNode<'a> {
    Pipeline(&'a mut Pipeline),
    Stage(&'a mut Stage),
    Job(&'a mut Job),
}

/// A read-only view of one level of the pipeline tree.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Pipeline(&'a Pipeline),
    Stage(&'a Stage),
    Job(&'a Job),
}

impl<'a> NodeRef<'a> {
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        match *self {
            NodeRef::Pipeline(p) => p.stages.iter().map(NodeRef::Stage).collect(),
            NodeRef::Stage(s) => s.jobs.iter().map(NodeRef::Job).collect(),
            NodeRef::Job(_) => Vec::new(),
        }
    }

    pub fn is_job(&self) -> bool {
        matches!(self, NodeRef::Job(_))
    }
}

impl SchedulableNode<'_> {
    pub fn view(&self) -> NodeRef<'_> {
        match self {
            SchedulableNode::Pipeline(p) => NodeRef::Pipeline(p),
            SchedulableNode::Stage(s) => NodeRef::Stage(s),
            SchedulableNode::Job(j) => NodeRef::Job(j),
        }
    }
}

impl<'a> From<&'a mut Pipeline> for SchedulableNode<'a> {
    fn from(pipeline: &'a mut Pipeline) -> Self {
        SchedulableNode::Pipeline(pipeline)
    }
}

impl<'a> From<&'a mut Stage> for SchedulableNode<'a> {
    fn from(stage: &'a mut Stage) -> Self {
        SchedulableNode::Stage(stage)
    }
}

impl<'a> From<&'a mut Job> for SchedulableNode<'a> {
    fn from(job: &'a mut Job) -> Self {
        SchedulableNode::Job(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> PipelineDefinition {
        PipelineDefinition {
            id: PipelineDefinitionId::new(),
            name: "app".to_string(),
            stages: vec![
                StageDefinition {
                    name: "build".to_string(),
                    jobs: vec![JobDefinition {
                        name: "compile".to_string(),
                        resources: ["linux".to_string()].into(),
                        tasks: vec![TaskDefinition {
                            name: "make".to_string(),
                            command: "make".to_string(),
                            arguments: vec!["all".to_string()],
                        }],
                    }],
                },
                StageDefinition {
                    name: "deploy".to_string(),
                    jobs: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_from_definition_initial_state() {
        let def = definition();
        let pipeline = Pipeline::from_definition(&def, 3);

        assert_eq!(pipeline.definition_id, def.id);
        assert_eq!(pipeline.execution_id, 3);
        assert_eq!(pipeline.status, Status::InProgress);
        assert!(pipeline.end_time.is_none());
        assert_eq!(pipeline.stages.len(), 2);
        assert!(pipeline.stages.iter().all(|s| s.status == Status::NotRun));

        let job = &pipeline.stages[0].jobs[0];
        assert_eq!(job.status, JobStatus::Awaiting);
        assert!(job.required_resources.contains("linux"));
        assert_eq!(job.tasks.len(), 1);
    }

    #[test]
    fn test_is_active() {
        let mut pipeline = Pipeline::from_definition(&definition(), 1);
        assert!(pipeline.is_active());

        pipeline.status = Status::NotRun;
        assert!(!pipeline.is_active());

        pipeline.stages[0].status = Status::InProgress;
        assert!(pipeline.is_active());

        pipeline.status = Status::Passed;
        assert!(!pipeline.is_active());
    }

    #[test]
    fn test_status_text() {
        assert_eq!(Status::NotRun.to_string(), "NOT_RUN");
        assert_eq!(JobStatus::Passed.to_string(), "PASSED");
        assert_eq!(JobStatus::Assigned.as_status(), Status::InProgress);
        assert_eq!(JobStatus::Awaiting.as_status(), Status::NotRun);
    }

    #[test]
    fn test_node_children() {
        let pipeline = Pipeline::from_definition(&definition(), 1);
        let root = NodeRef::Pipeline(&pipeline);
        let stages = root.children();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].children().len(), 1);
        assert!(stages[0].children()[0].is_job());
        assert!(stages[1].children().is_empty());
    }
}
