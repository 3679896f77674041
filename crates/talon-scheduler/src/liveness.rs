//! Agent liveness tracking.

use crate::clock::Clock;
use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use talon_core::Result;
use talon_core::agent::{Agent, DisconnectReason};
use talon_core::events::{AgentDisconnectedPayload, Event};
use talon_core::ids::AgentId;
use talon_core::ports::{AgentRepository, EventBus};
use tracing::{debug, warn};

/// Flags agents whose last report is older than the disconnect timeout.
pub struct LivenessMonitor {
    timeout: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl LivenessMonitor {
    pub fn new(disconnect_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            timeout: TimeDelta::from_std(disconnect_timeout).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    /// Mark `agent` disconnected if it has been silent for too long.
    ///
    /// Never reconnects an agent; only a heartbeat does that. An agent that
    /// has never reported is left alone. Returns `true` if `connected` flipped.
    pub fn update_agent_status(&self, agent: &mut Agent) -> bool {
        let Some(last) = agent.last_reported_time else {
            return false;
        };

        if agent.connected && self.clock.now() - last > self.timeout {
            agent.connected = false;
            return true;
        }
        false
    }

    /// Apply [`Self::update_agent_status`] to every stored agent.
    ///
    /// Writes are conditional on the version read, so a heartbeat landing
    /// mid-pass wins and the agent stays connected. Returns the agents that
    /// were disconnected.
    pub async fn check_agents(
        &self,
        agents: &dyn AgentRepository,
        event_bus: &dyn EventBus,
    ) -> Result<Vec<AgentId>> {
        let mut disconnected = Vec::new();

        for mut agent in agents.get_all().await? {
            let version = agent.version;
            if !self.update_agent_status(&mut agent) {
                continue;
            }

            if !agents.update_if_version(&agent, version).await? {
                debug!(agent_id = %agent.id, "Agent changed during liveness check, skipping");
                continue;
            }

            warn!(
                agent_id = %agent.id,
                name = %agent.name,
                last_reported_time = ?agent.last_reported_time,
                "Agent disconnected after missing heartbeats"
            );
            disconnected.push(agent.id);

            let event = Event::AgentDisconnected(AgentDisconnectedPayload {
                agent_id: agent.id,
                reason: DisconnectReason::Timeout,
                last_reported_time: agent.last_reported_time,
                timestamp: self.clock.now(),
            });
            if let Err(e) = event_bus.publish(event).await {
                warn!(agent_id = %agent.id, error = %e, "Failed to publish disconnect event");
            }
        }

        Ok(disconnected)
    }
}
