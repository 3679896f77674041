//! Agent matching for job assignment.
//!
//! Pure functions over in-memory records. Persisting the claimed agent and
//! the assigned job is the caller's job (see [`crate::Scheduler`]).

use talon_core::agent::Agent;
use talon_core::pipeline::{Job, JobStatus};

/// Whether `agent` could run `job` right now.
///
/// Does not look at `agent.assigned`; [`eligible_agents_for_job`] filters
/// that separately.
pub fn is_agent_eligible_for_job(job: &Job, agent: Option<&Agent>) -> bool {
    let Some(agent) = agent else {
        return false;
    };

    agent.connected
        && agent.enabled
        && !agent.running
        && agent.has_resources(&job.required_resources)
}

/// Agents from `agents` that are eligible for `job` and not already claimed,
/// in input order.
pub fn eligible_agents_for_job<'a>(job: &Job, agents: &'a [Agent]) -> Vec<&'a Agent> {
    agents
        .iter()
        .filter(|a| is_agent_eligible_for_job(job, Some(*a)) && !a.assigned)
        .collect()
}

/// The candidate advertising the fewest resources. First one wins on ties.
pub fn pick_most_suitable_agent<'a>(agents: &[&'a Agent]) -> Option<&'a Agent> {
    agents.iter().copied().min_by_key(|a| a.resources.len())
}

/// Pick an agent for `job` and mark both sides of the assignment.
///
/// On success the job becomes `ASSIGNED` to the returned agent and the agent
/// is flagged `assigned` for that job. Returns `None`, leaving everything untouched, when
/// no agent qualifies.
pub fn assign_agent_to_job<'a>(job: &mut Job, agents: &'a mut [Agent]) -> Option<&'a mut Agent> {
    let chosen = {
        let eligible = eligible_agents_for_job(job, agents);
        pick_most_suitable_agent(&eligible)?.id
    };

    let agent = agents.iter_mut().find(|a| a.id == chosen)?;
    job.status = JobStatus::Assigned;
    job.assigned_agent_id = Some(agent.id);
    agent.assigned = true;
    agent.current_job_id = Some(job.id);
    Some(agent)
}
