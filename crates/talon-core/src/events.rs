//! Domain events published to the UI fan-out.

use crate::agent::DisconnectReason;
use crate::ids::*;
use crate::pipeline::{JobStatus, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All events emitted by the scheduling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PipelineStatusChanged(PipelineStatusChangedPayload),
    StageStatusChanged(StageStatusChangedPayload),
    JobAssigned(JobAssignedPayload),
    JobCompleted(JobCompletedPayload),
    AgentConnected(AgentConnectedPayload),
    AgentDisconnected(AgentDisconnectedPayload),
}

impl Event {
    /// Returns the topic for this event.
    pub fn subject(&self) -> String {
        match self {
            Event::PipelineStatusChanged(p) => format!("pipeline.status.{}", p.pipeline_id),
            Event::StageStatusChanged(p) => {
                format!("pipeline.stage.{}.{}", p.pipeline_id, p.stage_id)
            }
            Event::JobAssigned(p) => format!("job.assigned.{}", p.agent_id),
            Event::JobCompleted(p) => format!("job.completed.{}", p.pipeline_id),
            Event::AgentConnected(p) => format!("agent.connected.{}", p.agent_id),
            Event::AgentDisconnected(p) => format!("agent.disconnected.{}", p.agent_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatusChangedPayload {
    pub pipeline_id: PipelineId,
    pub definition_name: String,
    pub status: Status,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageStatusChangedPayload {
    pub pipeline_id: PipelineId,
    pub stage_id: StageId,
    pub stage_name: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAssignedPayload {
    pub pipeline_id: PipelineId,
    pub job_id: JobId,
    pub agent_id: AgentId,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCompletedPayload {
    pub pipeline_id: PipelineId,
    pub job_id: JobId,
    pub agent_id: AgentId,
    pub status: JobStatus,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConnectedPayload {
    pub agent_id: AgentId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDisconnectedPayload {
    pub agent_id: AgentId,
    pub reason: DisconnectReason,
    pub last_reported_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}
