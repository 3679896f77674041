//! Agent types.

use crate::ids::{AgentId, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A remote execution agent as seen by the server.
///
/// `connected` and `last_reported_time` are driven by heartbeats,
/// `assigned` and `running` by the scheduler and the agent's own job reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub connected: bool,
    pub enabled: bool,
    pub running: bool,
    pub assigned: bool,
    /// The job behind `assigned`/`running`, if any.
    #[serde(default)]
    pub current_job_id: Option<JobId>,
    /// Capability tags advertised by the agent.
    #[serde(default)]
    pub resources: BTreeSet<String>,
    pub last_reported_time: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by the store on every write.
    #[serde(default)]
    pub version: u64,
}

impl Agent {
    /// A freshly registered agent: connected, enabled and idle.
    pub fn new(name: impl Into<String>, resources: impl IntoIterator<Item = String>) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            name: name.into(),
            connected: true,
            enabled: true,
            running: false,
            assigned: false,
            current_job_id: None,
            resources: resources.into_iter().collect(),
            last_reported_time: Some(now),
            registered_at: now,
            version: 0,
        }
    }

    /// Whether the agent holds a job (assigned or executing).
    pub fn is_busy(&self) -> bool {
        self.assigned || self.running
    }

    /// Whether every tag in `required` is advertised by this agent.
    pub fn has_resources(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.resources)
    }
}

/// Registration payload delivered by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    Timeout,
    Deregistered,
}
