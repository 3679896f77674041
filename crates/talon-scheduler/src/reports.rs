//! Handling of agent self-reports.
//!
//! The transport layer (HTTP/WebSocket) decodes agent requests and calls into
//! [`AgentReports`]. These calls race with the scheduler tick, so pipeline
//! writes happen under the pipeline lock and agent writes are conditional on
//! the version read.

use crate::clock::Clock;
use crate::locks::PipelineLocks;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use talon_core::agent::{Agent, AgentRegistration, DisconnectReason};
use talon_core::events::{
    AgentConnectedPayload, AgentDisconnectedPayload, Event, JobCompletedPayload,
};
use talon_core::ids::{AgentId, JobId, PipelineId, StageId};
use talon_core::pipeline::{JobStatus, TaskDefinition};
use talon_core::ports::{AgentRepository, EventBus, PipelineRepository};
use talon_core::{Error, Result};
use tracing::{debug, info, warn};

const MAX_AGENT_WRITE_ATTEMPTS: usize = 3;

/// Work handed to an agent that polled for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkAssignment {
    pub pipeline_id: PipelineId,
    pub stage_id: StageId,
    pub job_id: JobId,
    pub job_name: String,
    pub tasks: Vec<TaskDefinition>,
}

pub struct AgentReports {
    pipelines: Arc<dyn PipelineRepository>,
    agents: Arc<dyn AgentRepository>,
    event_bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    locks: Arc<PipelineLocks>,
}

impl AgentReports {
    pub fn new(
        pipelines: Arc<dyn PipelineRepository>,
        agents: Arc<dyn AgentRepository>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        locks: Arc<PipelineLocks>,
    ) -> Self {
        Self {
            pipelines,
            agents,
            event_bus,
            clock,
            locks,
        }
    }

    /// Register a new agent. It starts connected and idle.
    pub async fn register(&self, registration: AgentRegistration) -> Result<Agent> {
        let mut agent = Agent::new(registration.name, registration.resources);
        agent.enabled = registration.enabled;
        agent.last_reported_time = Some(self.clock.now());
        agent.registered_at = self.clock.now();

        self.agents.add(&agent).await?;
        info!(agent_id = %agent.id, name = %agent.name, resources = ?agent.resources, "Agent registered");
        Ok(agent)
    }

    /// Remove an agent from the pool.
    pub async fn deregister(&self, agent_id: AgentId) -> Result<()> {
        let agent = self.get_agent(agent_id).await?;
        self.agents.delete(agent_id).await?;
        info!(agent_id = %agent_id, name = %agent.name, "Agent deregistered");

        self.publish(Event::AgentDisconnected(AgentDisconnectedPayload {
            agent_id,
            reason: DisconnectReason::Deregistered,
            last_reported_time: agent.last_reported_time,
            timestamp: self.clock.now(),
        }))
        .await;
        Ok(())
    }

    /// Record a heartbeat. This is the only way a disconnected agent comes back.
    pub async fn heartbeat(&self, agent_id: AgentId) -> Result<Agent> {
        let now = self.clock.now();
        let (previous, agent) = self
            .modify_agent(agent_id, |a| {
                a.connected = true;
                a.last_reported_time = Some(now);
            })
            .await?;

        if !previous.connected {
            info!(agent_id = %agent_id, name = %agent.name, "Agent reconnected");
            self.publish(Event::AgentConnected(AgentConnectedPayload {
                agent_id,
                timestamp: now,
            }))
            .await;
        } else {
            debug!(agent_id = %agent_id, "Heartbeat received");
        }
        Ok(agent)
    }

    /// Enable or disable an agent for new work.
    pub async fn set_enabled(&self, agent_id: AgentId, enabled: bool) -> Result<Agent> {
        let (_, agent) = self.modify_agent(agent_id, |a| a.enabled = enabled).await?;
        info!(agent_id = %agent_id, enabled, "Agent availability changed");
        Ok(agent)
    }

    /// Hand the agent the job assigned to it, if any, and mark it running.
    ///
    /// The agent is marked before the job is started. A failed pipeline write
    /// clears the mark again and leaves the job `ASSIGNED` for the next poll.
    pub async fn check_for_work(&self, agent_id: AgentId) -> Result<Option<WorkAssignment>> {
        self.get_agent(agent_id).await?;

        let candidate = self.pipelines.get_all().await?.into_iter().find_map(|p| {
            p.jobs()
                .find(|j| j.status == JobStatus::Assigned && j.assigned_agent_id == Some(agent_id))
                .map(|j| (p.id, j.id))
        });
        let Some((pipeline_id, job_id)) = candidate else {
            return Ok(None);
        };

        let (work, finished) = {
            let _guard = self.locks.lock(pipeline_id).await;
            let Some(mut pipeline) = self.pipelines.get_by_id(pipeline_id).await? else {
                return Ok(None);
            };

            let now = self.clock.now();
            let mut work = None;
            for stage in pipeline.stages.iter_mut() {
                let Some(job) = stage.jobs.iter_mut().find(|j| {
                    j.id == job_id
                        && j.status == JobStatus::Assigned
                        && j.assigned_agent_id == Some(agent_id)
                }) else {
                    continue;
                };

                job.status = JobStatus::InProgress;
                job.start_time = Some(now);
                work = Some(WorkAssignment {
                    pipeline_id,
                    stage_id: stage.id,
                    job_id,
                    job_name: job.name.clone(),
                    tasks: job.tasks.clone(),
                });
                break;
            }

            // Picked up by a concurrent poll between the scan and the lock.
            let Some(work) = work else {
                return Ok(None);
            };

            self.modify_agent(agent_id, |a| {
                a.running = true;
                a.current_job_id = Some(job_id);
            })
            .await?;
            if let Err(e) = self.pipelines.update(&pipeline).await {
                let reset = write_agent_with_retry(self.agents.as_ref(), agent_id, |a| {
                    if a.current_job_id != Some(job_id) {
                        return false;
                    }
                    a.running = false;
                    true
                })
                .await;
                if let Err(reset) = reset {
                    warn!(agent_id = %agent_id, error = %reset, "Failed to clear running flag");
                }
                return Err(e);
            }
            (work, pipeline.status.is_terminal())
        };

        if finished {
            self.locks.forget(pipeline_id).await;
        }
        info!(
            agent_id = %agent_id,
            pipeline_id = %work.pipeline_id,
            job_id = %work.job_id,
            job = %work.job_name,
            "Job handed to agent"
        );
        Ok(Some(work))
    }

    /// Record the outcome of a job and free the agent.
    ///
    /// A repeated report for a finished job does not change the job. It frees
    /// the agent only if the agent still holds that job, which happens when an
    /// earlier report stored the outcome but failed to write the agent.
    pub async fn report_job_result(
        &self,
        agent_id: AgentId,
        job_id: JobId,
        status: JobStatus,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(Error::InvalidReport(format!(
                "job status {status} is not a final outcome"
            )));
        }

        let pipeline_id = self
            .pipelines
            .get_all()
            .await?
            .into_iter()
            .find(|p| p.find_job(job_id).is_some())
            .map(|p| p.id)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

        let now = self.clock.now();
        let (first_report, outcome, finished) = {
            let _guard = self.locks.lock(pipeline_id).await;
            let mut pipeline = self
                .pipelines
                .get_by_id(pipeline_id)
                .await?
                .ok_or_else(|| Error::PipelineNotFound(pipeline_id.to_string()))?;
            let job = pipeline
                .find_job_mut(job_id)
                .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

            if job.assigned_agent_id != Some(agent_id) {
                return Err(Error::InvalidReport(format!(
                    "job {job_id} is not held by agent {agent_id}"
                )));
            }

            let first_report = !job.status.is_terminal();
            if first_report {
                job.status = status;
                job.end_time = Some(now);
            }
            let outcome = (job.status, job.end_time.unwrap_or(now));
            if first_report {
                self.pipelines.update(&pipeline).await?;
            }
            (first_report, outcome, pipeline.status.is_terminal())
        };

        if finished {
            self.locks.forget(pipeline_id).await;
        }

        let (previous, _) = write_agent_with_retry(self.agents.as_ref(), agent_id, |a| {
            // Older records carry no job id; the stored job names this agent.
            let holds_job = match a.current_job_id {
                Some(held) => held == job_id,
                None => first_report,
            };
            if !holds_job || !a.is_busy() {
                return false;
            }
            a.assigned = false;
            a.running = false;
            a.current_job_id = None;
            true
        })
        .await?;

        // A repeated report publishes only if it is the one that freed the agent.
        let released = previous.current_job_id == Some(job_id) && previous.is_busy();
        if !first_report && !released {
            debug!(job_id = %job_id, "Duplicate job report ignored");
            return Ok(());
        }

        let (status, completed_at) = outcome;
        info!(agent_id = %agent_id, job_id = %job_id, status = %status, "Job finished");
        self.publish(Event::JobCompleted(JobCompletedPayload {
            pipeline_id,
            job_id,
            agent_id,
            status,
            completed_at,
        }))
        .await;
        Ok(())
    }

    async fn get_agent(&self, agent_id: AgentId) -> Result<Agent> {
        self.agents
            .get_by_id(agent_id)
            .await?
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))
    }

    async fn modify_agent<F>(&self, agent_id: AgentId, mut apply: F) -> Result<(Agent, Agent)>
    where
        F: FnMut(&mut Agent),
    {
        write_agent_with_retry(self.agents.as_ref(), agent_id, |a| {
            apply(a);
            true
        })
        .await
    }

    async fn publish(&self, event: Event) {
        if let Err(e) = self.event_bus.publish(event).await {
            warn!(error = %e, "Failed to publish agent event");
        }
    }
}

/// Read-modify-write an agent, retrying when another writer interleaves.
///
/// `apply` returns `false` to leave the stored agent untouched. Returns the
/// agent as read and as it now stands.
pub(crate) async fn write_agent_with_retry<F>(
    agents: &dyn AgentRepository,
    agent_id: AgentId,
    mut apply: F,
) -> Result<(Agent, Agent)>
where
    F: FnMut(&mut Agent) -> bool,
{
    for _ in 0..MAX_AGENT_WRITE_ATTEMPTS {
        let current = agents
            .get_by_id(agent_id)
            .await?
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;
        let mut updated = current.clone();
        if !apply(&mut updated) {
            return Ok((current.clone(), current));
        }

        if agents.update_if_version(&updated, current.version).await? {
            updated.version = current.version + 1;
            return Ok((current, updated));
        }
    }

    Err(Error::Conflict(format!(
        "agent {agent_id} kept changing during update"
    )))
}
