//! Stage and pipeline status propagation.
//!
//! Job outcomes are rolled up into stage statuses, stage statuses into the
//! pipeline status. Stages run strictly in order: a later stage only leaves
//! `NOT_RUN` once every earlier stage has `PASSED`.

use crate::clock::Clock;
use crate::locks::PipelineLocks;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use talon_core::events::{Event, PipelineStatusChangedPayload, StageStatusChangedPayload};
use talon_core::ids::PipelineId;
use talon_core::pipeline::{JobStatus, Pipeline, SchedulableNode, Stage, Status};
use talon_core::ports::{EventBus, PipelineRepository};
use talon_core::{Error, Result};
use tracing::{debug, error, info, warn};

/// Advance the first stage that is not yet `PASSED`.
///
/// A `NOT_RUN` stage is started; an `IN_PROGRESS` stage is re-evaluated from
/// its jobs. Any other status halts the scan, so nothing after a failed stage
/// ever starts. At most one stage changes per call.
pub fn update_stage_statuses_in_sequence(stages: &mut [Stage], now: DateTime<Utc>) {
    for stage in stages.iter_mut() {
        match stage.status {
            Status::NotRun => {
                stage.status = Status::InProgress;
                stage.start_time = Some(now);
                info!(stage = %stage.name, status = %stage.status, "Stage status updated");
                break;
            }
            Status::InProgress => {
                update_stage_status(stage, now);
                break;
            }
            Status::Passed => continue,
            Status::Failed => break,
        }
    }
}

/// Recompute a stage's status from its jobs.
///
/// Any failed job fails the stage, all passed jobs pass it; anything else
/// leaves the status as it was. A stage with no jobs is never resolved.
pub fn update_stage_status(stage: &mut Stage, now: DateTime<Utc>) {
    let job_statuses: Vec<JobStatus> = stage.jobs.iter().map(|j| j.status).collect();

    let resolved = if job_statuses.contains(&JobStatus::Failed) {
        Status::Failed
    } else if are_all_passed(&job_statuses) {
        Status::Passed
    } else {
        return;
    };

    stage.status = resolved;
    stage.end_time = Some(now);
    info!(stage = %stage.name, status = %resolved, "Stage status updated");
}

/// Recompute a pipeline's status from its stages, stamping `end_time` on a
/// terminal outcome.
pub fn update_pipeline_status(pipeline: &mut Pipeline, now: DateTime<Utc>) {
    let stage_statuses: Vec<Status> = pipeline.stages.iter().map(|s| s.status).collect();

    let resolved = if stage_statuses.contains(&Status::Failed) {
        Status::Failed
    } else if are_all_passed(&stage_statuses) {
        Status::Passed
    } else {
        return;
    };

    pipeline.status = resolved;
    pipeline.end_time = Some(now);
    info!(
        pipeline_id = %pipeline.id,
        pipeline = %pipeline.definition_name,
        status = %resolved,
        "Pipeline status updated"
    );
}

/// Whether every status reads `PASSED`. An empty list is not "all passed".
pub fn are_all_passed<S: Display>(statuses: &[S]) -> bool {
    !statuses.is_empty() && statuses.iter().all(|s| s.to_string() == "PASSED")
}

/// Walk the tree under `node` breadth-first and apply the updates that fit.
///
/// For a pipeline this advances the stage sequence and, once the walk reaches
/// a job, re-aggregates the pipeline. For a stage only its own status is
/// recomputed. Returns `true` when the walk reached a job.
pub fn update_all_statuses(node: SchedulableNode<'_>, now: DateTime<Utc>) -> bool {
    let reaches_job = {
        let mut queue = VecDeque::from([node.view()]);
        let mut found = false;
        while let Some(current) = queue.pop_front() {
            if current.is_job() {
                found = true;
                break;
            }
            queue.extend(current.children());
        }
        found
    };

    match node {
        SchedulableNode::Pipeline(pipeline) => {
            update_stage_statuses_in_sequence(&mut pipeline.stages, now);
            if reaches_job {
                update_pipeline_status(pipeline, now);
            }
        }
        SchedulableNode::Stage(stage) => {
            if stage.status == Status::InProgress {
                update_stage_status(stage, now);
            }
        }
        SchedulableNode::Job(_) => {}
    }

    reaches_job
}

/// Outcome of one propagation pass.
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// Pipelines walked and written back.
    pub updated: Vec<PipelineId>,
    /// Pipelines that reached `PASSED` or `FAILED` in this pass.
    pub finished: Vec<PipelineId>,
    /// Pipelines whose write-back failed; retried next tick.
    pub failures: Vec<(PipelineId, Error)>,
}

/// Runs status propagation over every active pipeline in the store.
pub struct StatusPropagator {
    pipelines: Arc<dyn PipelineRepository>,
    event_bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    locks: Arc<PipelineLocks>,
}

impl StatusPropagator {
    pub fn new(
        pipelines: Arc<dyn PipelineRepository>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        locks: Arc<PipelineLocks>,
    ) -> Self {
        Self {
            pipelines,
            event_bus,
            clock,
            locks,
        }
    }

    /// Recompute and persist statuses of all active pipelines.
    ///
    /// Failing to list pipelines aborts the pass; a failure on one pipeline
    /// is recorded and the pass moves on.
    pub async fn update_statuses(&self) -> Result<PropagationReport> {
        let active = self.pipelines.get_all_in_progress().await?;
        let mut report = PropagationReport::default();

        for candidate in active {
            match self.update_one(candidate.id).await {
                Ok(Some(status)) => {
                    report.updated.push(candidate.id);
                    if status.is_terminal() {
                        report.finished.push(candidate.id);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(pipeline_id = %candidate.id, error = %e, "Failed to update pipeline statuses");
                    report.failures.push((candidate.id, e));
                }
            }
        }

        debug!(
            updated = report.updated.len(),
            finished = report.finished.len(),
            failed = report.failures.len(),
            "Status propagation pass complete"
        );
        Ok(report)
    }

    /// Reload, update and write back a single pipeline under its lock.
    ///
    /// Returns the resulting pipeline status, or `None` if the pipeline is
    /// gone or no longer active.
    async fn update_one(&self, id: PipelineId) -> Result<Option<Status>> {
        let _guard = self.locks.lock(id).await;

        let Some(mut pipeline) = self.pipelines.get_by_id(id).await? else {
            warn!(pipeline_id = %id, "Pipeline vanished before status update");
            return Ok(None);
        };
        if !pipeline.is_active() {
            return Ok(None);
        }

        let before = pipeline.clone();
        update_all_statuses(SchedulableNode::Pipeline(&mut pipeline), self.clock.now());
        self.pipelines.update(&pipeline).await?;

        self.publish_changes(&before, &pipeline).await;
        Ok(Some(pipeline.status))
    }

    async fn publish_changes(&self, before: &Pipeline, after: &Pipeline) {
        let mut events = Vec::new();

        for (old, new) in before.stages.iter().zip(after.stages.iter()) {
            if old.status != new.status {
                events.push(Event::StageStatusChanged(StageStatusChangedPayload {
                    pipeline_id: after.id,
                    stage_id: new.id,
                    stage_name: new.name.clone(),
                    status: new.status,
                }));
            }
        }

        if before.status != after.status {
            events.push(Event::PipelineStatusChanged(PipelineStatusChangedPayload {
                pipeline_id: after.id,
                definition_name: after.definition_name.clone(),
                status: after.status,
                end_time: after.end_time,
            }));
        }

        for event in events {
            if let Err(e) = self.event_bus.publish(event).await {
                warn!(pipeline_id = %after.id, error = %e, "Failed to publish status event");
            }
        }
    }
}
