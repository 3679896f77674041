//! Test helper functions and utilities.

use crate::context::TestContext;
use futures::future::join_all;
use talon_core::ids::AgentId;
use talon_core::pipeline::JobStatus;
use talon_scheduler::{TickReport, WorkAssignment};

/// Play one round of the agent protocol: poll for work and, if some was
/// handed out, report `outcome` for it.
pub async fn run_assigned_job(
    ctx: &TestContext,
    agent_id: AgentId,
    outcome: JobStatus,
) -> anyhow::Result<Option<WorkAssignment>> {
    let Some(work) = ctx.reports.check_for_work(agent_id).await? else {
        return Ok(None);
    };
    ctx.reports.report_job_result(agent_id, work.job_id, outcome).await?;
    Ok(Some(work))
}

/// Run `count` scheduler ticks at once and collect their reports.
pub async fn concurrent_ticks(ctx: &TestContext, count: usize) -> Vec<TickReport> {
    let ticks = (0..count).map(|_| {
        let scheduler = ctx.scheduler.clone();
        tokio::spawn(async move { scheduler.tick().await })
    });

    join_all(ticks)
        .await
        .into_iter()
        .filter_map(|r| r.ok())
        .collect()
}
