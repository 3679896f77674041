//! The scheduler loop.

use crate::assigner::assign_agent_to_job;
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::liveness::LivenessMonitor;
use crate::locks::PipelineLocks;
use crate::reports::{AgentReports, write_agent_with_retry};
use crate::status::StatusPropagator;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use talon_core::events::{Event, JobAssignedPayload};
use talon_core::ids::{AgentId, JobId, PipelineDefinitionId, PipelineId};
use talon_core::pipeline::{JobStatus, Pipeline, Status};
use talon_core::ports::{AgentRepository, EventBus, PipelineDefinitionRepository, PipelineRepository};
use talon_core::{Error, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// A job handed to an agent during an assignment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub pipeline_id: PipelineId,
    pub job_id: JobId,
    pub agent_id: AgentId,
}

/// What a single tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub disconnected: Vec<AgentId>,
    pub pipelines_updated: Vec<PipelineId>,
    pub finished: Vec<PipelineId>,
    pub assignments: Vec<Assignment>,
    /// Failures logged during the tick. They are retried on the next one.
    pub errors: usize,
}

#[derive(Default)]
struct AssignmentPass {
    assignments: Vec<Assignment>,
    failures: usize,
}

/// The main scheduler service.
pub struct Scheduler {
    config: SchedulerConfig,
    pipelines: Arc<dyn PipelineRepository>,
    agents: Arc<dyn AgentRepository>,
    definitions: Arc<dyn PipelineDefinitionRepository>,
    event_bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    liveness: LivenessMonitor,
    propagator: StatusPropagator,
    locks: Arc<PipelineLocks>,
    ticks: AtomicU64,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        pipelines: Arc<dyn PipelineRepository>,
        agents: Arc<dyn AgentRepository>,
        definitions: Arc<dyn PipelineDefinitionRepository>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = Arc::new(PipelineLocks::new());
        Self {
            config,
            liveness: LivenessMonitor::new(config.disconnect_timeout(), clock.clone()),
            propagator: StatusPropagator::new(
                pipelines.clone(),
                event_bus.clone(),
                clock.clone(),
                locks.clone(),
            ),
            pipelines,
            agents,
            definitions,
            event_bus,
            clock,
            locks,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Agent report handling sharing this scheduler's store and locks.
    pub fn reports(&self) -> AgentReports {
        AgentReports::new(
            self.pipelines.clone(),
            self.agents.clone(),
            self.event_bus.clone(),
            self.clock.clone(),
            self.locks.clone(),
        )
    }

    /// Start a new execution of a pipeline definition.
    ///
    /// The pipeline is stored `IN_PROGRESS` and picked up by the next tick.
    pub async fn trigger(&self, definition_id: PipelineDefinitionId) -> Result<PipelineId> {
        let definition = self
            .definitions
            .get_by_id(definition_id)
            .await?
            .ok_or_else(|| Error::PipelineDefinitionNotFound(definition_id.to_string()))?;

        let execution_id = self.pipelines.next_execution_id(definition_id).await?;
        let mut pipeline = Pipeline::from_definition(&definition, execution_id);
        pipeline.start_time = Some(self.clock.now());
        self.pipelines.add(&pipeline).await?;

        info!(
            pipeline_id = %pipeline.id,
            definition = %definition.name,
            execution_id,
            stages = pipeline.stages.len(),
            "Pipeline triggered"
        );
        Ok(pipeline.id)
    }

    /// Run one scheduling pass: liveness, then status propagation, then
    /// assignment.
    ///
    /// Never fails; errors are logged, counted, and left for the next tick.
    pub async fn tick(&self) -> TickReport {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = TickReport {
            tick,
            ..Default::default()
        };

        match self
            .liveness
            .check_agents(self.agents.as_ref(), self.event_bus.as_ref())
            .await
        {
            Ok(disconnected) => report.disconnected = disconnected,
            Err(e) => {
                error!(tick, error = %e, "Agent liveness check failed");
                report.errors += 1;
            }
        }

        match self.propagator.update_statuses().await {
            Ok(propagation) => {
                report.errors += propagation.failures.len();
                report.pipelines_updated = propagation.updated;
                report.finished = propagation.finished;
            }
            Err(e) => {
                error!(tick, error = %e, "Status propagation failed");
                report.errors += 1;
            }
        }
        for id in &report.finished {
            self.locks.forget(*id).await;
        }

        match self.assignment_pass().await {
            Ok(pass) => {
                report.errors += pass.failures;
                report.assignments = pass.assignments;
            }
            Err(e) => {
                error!(tick, error = %e, "Job assignment failed");
                report.errors += 1;
            }
        }

        debug!(
            tick,
            disconnected = report.disconnected.len(),
            updated = report.pipelines_updated.len(),
            finished = report.finished.len(),
            assigned = report.assignments.len(),
            errors = report.errors,
            "Scheduler tick complete"
        );
        report
    }

    /// Hand `AWAITING` jobs of started stages to eligible agents.
    pub async fn assign_jobs(&self) -> Result<Vec<Assignment>> {
        Ok(self.assignment_pass().await?.assignments)
    }

    async fn assignment_pass(&self) -> Result<AssignmentPass> {
        let mut pass = AssignmentPass::default();

        for candidate in self.pipelines.get_all_in_progress().await? {
            if !has_awaiting_jobs(&candidate) {
                continue;
            }
            match self.assign_in_pipeline(candidate.id).await {
                Ok(mut made) => pass.assignments.append(&mut made),
                Err(e) => {
                    error!(pipeline_id = %candidate.id, error = %e, "Failed to assign jobs");
                    pass.failures += 1;
                }
            }
        }

        Ok(pass)
    }

    /// Assign jobs of one pipeline under its lock.
    ///
    /// Each agent is claimed with a conditional write before the job is
    /// marked; if the pipeline write fails the claims are released again.
    async fn assign_in_pipeline(&self, id: PipelineId) -> Result<Vec<Assignment>> {
        let _guard = self.locks.lock(id).await;

        let Some(mut pipeline) = self.pipelines.get_by_id(id).await? else {
            return Ok(Vec::new());
        };
        if !pipeline.is_active() {
            return Ok(Vec::new());
        }

        let mut agents = self.agents.get_all().await?;
        let mut made = Vec::new();

        let runnable = pipeline
            .stages
            .iter_mut()
            .filter(|s| s.status == Status::InProgress)
            .flat_map(|s| s.jobs.iter_mut())
            .filter(|j| j.status == JobStatus::Awaiting);

        for job in runnable {
            let Some(agent) = assign_agent_to_job(job, &mut agents) else {
                debug!(pipeline_id = %id, job = %job.name, "No eligible agent for job");
                continue;
            };

            let expected = agent.version;
            match self.agents.update_if_version(agent, expected).await {
                Ok(true) => {
                    agent.version = expected + 1;
                    made.push(Assignment {
                        pipeline_id: id,
                        job_id: job.id,
                        agent_id: agent.id,
                    });
                }
                Ok(false) => {
                    // Someone else wrote the agent first. Leave it flagged
                    // locally so this pass does not pick it again.
                    debug!(pipeline_id = %id, agent_id = %agent.id, "Lost agent claim, job stays awaiting");
                    job.status = JobStatus::Awaiting;
                    job.assigned_agent_id = None;
                }
                Err(e) => {
                    self.release_claims(id, &made).await;
                    return Err(e);
                }
            }
        }

        if made.is_empty() {
            return Ok(made);
        }

        if let Err(e) = self.pipelines.update(&pipeline).await {
            self.release_claims(id, &made).await;
            return Err(e);
        }

        let now = self.clock.now();
        for assignment in &made {
            info!(
                pipeline_id = %assignment.pipeline_id,
                job_id = %assignment.job_id,
                agent_id = %assignment.agent_id,
                "Job assigned"
            );
            let event = Event::JobAssigned(JobAssignedPayload {
                pipeline_id: assignment.pipeline_id,
                job_id: assignment.job_id,
                agent_id: assignment.agent_id,
                assigned_at: now,
            });
            if let Err(e) = self.event_bus.publish(event).await {
                warn!(job_id = %assignment.job_id, error = %e, "Failed to publish assignment event");
            }
        }

        Ok(made)
    }

    /// Undo agent claims whose jobs were never persisted.
    ///
    /// Runs under the pipeline lock. An agent is freed only while it still
    /// holds the claimed job and the stored pipeline does not name it, so
    /// heartbeats landing in between do not keep it claimed.
    async fn release_claims(&self, pipeline_id: PipelineId, claims: &[Assignment]) {
        let stored = match self.pipelines.get_by_id(pipeline_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(pipeline_id = %pipeline_id, error = %e, "Could not reload pipeline before releasing claims");
                None
            }
        };

        for claim in claims {
            let persisted = stored
                .as_ref()
                .and_then(|p| p.find_job(claim.job_id))
                .is_some_and(|j| j.assigned_agent_id == Some(claim.agent_id));
            if persisted {
                continue;
            }

            let result = write_agent_with_retry(self.agents.as_ref(), claim.agent_id, |a| {
                if a.current_job_id != Some(claim.job_id) || a.running {
                    return false;
                }
                a.assigned = false;
                a.current_job_id = None;
                true
            })
            .await;

            match result {
                Ok((before, after)) if before.assigned && !after.assigned => {
                    debug!(agent_id = %claim.agent_id, job_id = %claim.job_id, "Agent claim released")
                }
                Ok(_) => debug!(agent_id = %claim.agent_id, "Agent no longer holds the claim"),
                Err(e) => error!(agent_id = %claim.agent_id, error = %e, "Failed to release agent claim"),
            }
        }
    }

    /// Tick at the configured poll interval until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            poll_interval_ms = self.config.poll_interval().as_millis() as u64,
            disconnect_timeout_ms = self.config.disconnect_timeout().as_millis() as u64,
            "Starting scheduler loop"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(ticks = self.tick_count(), "Scheduler loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run the loop on a background task.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        SchedulerHandle { shutdown, task }
    }
}

fn has_awaiting_jobs(pipeline: &Pipeline) -> bool {
    pipeline
        .stages
        .iter()
        .filter(|s| s.status == Status::InProgress)
        .flat_map(|s| s.jobs.iter())
        .any(|j| j.status == JobStatus::Awaiting)
}

/// Handle to a scheduler loop started with [`Scheduler::spawn`].
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use chrono::{TimeDelta, Utc};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use talon_core::agent::Agent;
    use talon_core::pipeline::{JobDefinition, PipelineDefinition, StageDefinition};
    use talon_store::{BroadcastEventBus, InMemoryPipelineRepository, Store};

    fn definition(stages: Vec<(&str, Vec<&str>)>) -> PipelineDefinition {
        PipelineDefinition {
            id: PipelineDefinitionId::new(),
            name: "service".to_string(),
            stages: stages
                .into_iter()
                .map(|(name, jobs)| StageDefinition {
                    name: name.to_string(),
                    jobs: jobs
                        .into_iter()
                        .map(|job| JobDefinition {
                            name: job.to_string(),
                            resources: ["linux".to_string()].into(),
                            tasks: vec![],
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig::new(Duration::from_secs(4), Duration::from_secs(10)).unwrap()
    }

    fn scheduler_over(store: &Store, pipelines: Arc<dyn PipelineRepository>) -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let scheduler = Scheduler::new(
            config(),
            pipelines,
            store.agents.clone(),
            store.definitions.clone(),
            Arc::new(BroadcastEventBus::new()),
            clock.clone(),
        );
        (scheduler, clock)
    }

    fn scheduler(store: &Store) -> (Scheduler, Arc<ManualClock>) {
        scheduler_over(store, store.pipelines.clone())
    }

    async fn add_agent(store: &Store, name: &str) -> Agent {
        let agent = Agent::new(name, vec!["linux".to_string()]);
        store.agents.add(&agent).await.unwrap();
        agent
    }

    #[tokio::test]
    async fn test_trigger_unknown_definition() {
        let store = Store::new();
        let (scheduler, _) = scheduler(&store);

        let err = scheduler.trigger(PipelineDefinitionId::new()).await.unwrap_err();
        assert!(matches!(err, Error::PipelineDefinitionNotFound(_)));
    }

    #[tokio::test]
    async fn test_trigger_numbers_executions() {
        let store = Store::new();
        let def = definition(vec![("build", vec!["compile"])]);
        store.definitions.add(&def).await.unwrap();
        let (scheduler, _) = scheduler(&store);

        let first = scheduler.trigger(def.id).await.unwrap();
        let second = scheduler.trigger(def.id).await.unwrap();

        let first = store.pipelines.get_by_id(first).await.unwrap().unwrap();
        let second = store.pipelines.get_by_id(second).await.unwrap().unwrap();
        assert_eq!(first.execution_id + 1, second.execution_id);
        assert_eq!(first.status, Status::InProgress);
    }

    #[tokio::test]
    async fn test_tick_starts_first_stage_and_assigns() {
        let store = Store::new();
        let def = definition(vec![("build", vec!["compile"]), ("test", vec!["unit"])]);
        store.definitions.add(&def).await.unwrap();
        let agent = add_agent(&store, "builder").await;
        let (scheduler, _) = scheduler(&store);
        let id = scheduler.trigger(def.id).await.unwrap();

        let report = scheduler.tick().await;

        assert_eq!(report.tick, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].agent_id, agent.id);

        let pipeline = store.pipelines.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(pipeline.stages[0].status, Status::InProgress);
        assert_eq!(pipeline.stages[0].jobs[0].status, JobStatus::Assigned);
        assert_eq!(pipeline.stages[1].status, Status::NotRun);
        assert_eq!(pipeline.stages[1].jobs[0].status, JobStatus::Awaiting);
        assert!(store.agents.get_by_id(agent.id).await.unwrap().unwrap().assigned);
    }

    #[tokio::test]
    async fn test_single_agent_gets_one_job() {
        let store = Store::new();
        let def = definition(vec![("build", vec!["compile", "lint"])]);
        store.definitions.add(&def).await.unwrap();
        add_agent(&store, "builder").await;
        let (scheduler, _) = scheduler(&store);
        let id = scheduler.trigger(def.id).await.unwrap();

        let first = scheduler.tick().await;
        let second = scheduler.tick().await;

        assert_eq!(first.assignments.len(), 1);
        assert!(second.assignments.is_empty());
        let pipeline = store.pipelines.get_by_id(id).await.unwrap().unwrap();
        let assigned = pipeline
            .jobs()
            .filter(|j| j.status == JobStatus::Assigned)
            .count();
        assert_eq!(assigned, 1);
    }

    #[tokio::test]
    async fn test_tick_disconnects_silent_agent() {
        let store = Store::new();
        let agent = add_agent(&store, "quiet").await;
        let (scheduler, clock) = scheduler(&store);

        clock.advance(TimeDelta::seconds(30));
        let report = scheduler.tick().await;

        assert_eq!(report.disconnected, vec![agent.id]);
        assert!(!store.agents.get_by_id(agent.id).await.unwrap().unwrap().connected);
    }

    #[tokio::test]
    async fn test_disconnected_agent_not_assigned() {
        let store = Store::new();
        let def = definition(vec![("build", vec!["compile"])]);
        store.definitions.add(&def).await.unwrap();
        add_agent(&store, "quiet").await;
        let (scheduler, clock) = scheduler(&store);
        scheduler.trigger(def.id).await.unwrap();

        clock.advance(TimeDelta::seconds(30));
        let report = scheduler.tick().await;

        assert!(report.assignments.is_empty());
    }

    /// Pipeline store whose writes can be switched off.
    struct FlakyPipelines {
        inner: InMemoryPipelineRepository,
        fail_updates: AtomicBool,
        /// Agents rewritten while a rejected write is in flight, like a heartbeat would.
        touch_agents: Option<Arc<dyn AgentRepository>>,
    }

    impl FlakyPipelines {
        fn new(touch_agents: Option<Arc<dyn AgentRepository>>) -> Self {
            Self {
                inner: InMemoryPipelineRepository::new(),
                fail_updates: AtomicBool::new(false),
                touch_agents,
            }
        }
    }

    #[async_trait]
    impl PipelineRepository for FlakyPipelines {
        async fn get_all(&self) -> Result<Vec<Pipeline>> {
            self.inner.get_all().await
        }
        async fn get_by_id(&self, id: PipelineId) -> Result<Option<Pipeline>> {
            self.inner.get_by_id(id).await
        }
        async fn get_all_in_progress(&self) -> Result<Vec<Pipeline>> {
            self.inner.get_all_in_progress().await
        }
        async fn next_execution_id(&self, definition_id: PipelineDefinitionId) -> Result<u32> {
            self.inner.next_execution_id(definition_id).await
        }
        async fn add(&self, pipeline: &Pipeline) -> Result<()> {
            self.inner.add(pipeline).await
        }
        async fn update(&self, pipeline: &Pipeline) -> Result<()> {
            if self.fail_updates.load(Ordering::SeqCst) {
                if let Some(agents) = &self.touch_agents {
                    for agent in agents.get_all().await? {
                        agents.update(&agent).await?;
                    }
                }
                return Err(Error::Database("write rejected".to_string()));
            }
            self.inner.update(pipeline).await
        }
        async fn delete(&self, id: PipelineId) -> Result<()> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_failed_pipeline_write_releases_claim() {
        let store = Store::new();
        let pipelines = Arc::new(FlakyPipelines::new(None));
        let def = definition(vec![("build", vec!["compile"])]);
        store.definitions.add(&def).await.unwrap();
        let agent = add_agent(&store, "builder").await;
        let (scheduler, _) = scheduler_over(&store, pipelines.clone());
        let id = scheduler.trigger(def.id).await.unwrap();

        // Let propagation start the stage without dispatching anything.
        store.agents.update(&Agent { enabled: false, ..agent.clone() }).await.unwrap();
        scheduler.tick().await;
        let mut stored = store.agents.get_by_id(agent.id).await.unwrap().unwrap();
        stored.enabled = true;
        store.agents.update(&stored).await.unwrap();

        pipelines.fail_updates.store(true, Ordering::SeqCst);
        let report = scheduler.tick().await;

        assert!(report.assignments.is_empty());
        assert!(report.errors > 0);
        assert!(!store.agents.get_by_id(agent.id).await.unwrap().unwrap().assigned);
        let pipeline = pipelines.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(pipeline.stages[0].jobs[0].status, JobStatus::Awaiting);
    }

    #[tokio::test]
    async fn test_claim_released_after_agent_changed_mid_write() {
        let store = Store::new();
        let heartbeats: Arc<dyn AgentRepository> = store.agents.clone();
        let pipelines = Arc::new(FlakyPipelines::new(Some(heartbeats)));
        let def = definition(vec![("build", vec!["compile"])]);
        store.definitions.add(&def).await.unwrap();
        let agent = add_agent(&store, "builder").await;
        let (scheduler, _) = scheduler_over(&store, pipelines.clone());
        let id = scheduler.trigger(def.id).await.unwrap();

        store.agents.update(&Agent { enabled: false, ..agent.clone() }).await.unwrap();
        scheduler.tick().await;
        let mut stored = store.agents.get_by_id(agent.id).await.unwrap().unwrap();
        stored.enabled = true;
        store.agents.update(&stored).await.unwrap();

        pipelines.fail_updates.store(true, Ordering::SeqCst);
        let report = scheduler.tick().await;
        assert!(report.assignments.is_empty());

        let stored = store.agents.get_by_id(agent.id).await.unwrap().unwrap();
        assert!(!stored.assigned);
        assert_eq!(stored.current_job_id, None);
        let pipeline = pipelines.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(pipeline.stages[0].jobs[0].status, JobStatus::Awaiting);
        assert_eq!(pipeline.stages[0].jobs[0].assigned_agent_id, None);

        // Once writes go through again the agent is usable.
        pipelines.fail_updates.store(false, Ordering::SeqCst);
        let report = scheduler.tick().await;
        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].agent_id, agent.id);
    }

    #[tokio::test]
    async fn test_concurrent_ticks_never_double_assign() {
        let store = Store::new();
        let def = definition(vec![("build", vec!["a", "b", "c", "d"])]);
        store.definitions.add(&def).await.unwrap();
        add_agent(&store, "one").await;
        add_agent(&store, "two").await;
        let (scheduler, _) = scheduler(&store);
        let scheduler = Arc::new(scheduler);
        for _ in 0..3 {
            scheduler.trigger(def.id).await.unwrap();
        }

        let ticks: Vec<_> = (0..4)
            .map(|_| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.tick().await })
            })
            .collect();
        let mut total = 0;
        for t in ticks {
            total += t.await.unwrap().assignments.len();
        }

        assert_eq!(total, 2);
        let mut holders: Vec<_> = store
            .pipelines
            .get_all()
            .await
            .unwrap()
            .iter()
            .flat_map(|p| p.jobs().filter_map(|j| j.assigned_agent_id).collect::<Vec<_>>())
            .collect();
        holders.sort();
        holders.dedup();
        assert_eq!(holders.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_at_poll_interval() {
        let store = Store::new();
        let (scheduler, _) = scheduler(&store);
        let scheduler = Arc::new(scheduler);

        let handle = scheduler.clone().spawn();
        tokio::time::sleep(Duration::from_secs(9)).await;
        handle.shutdown().await;

        // Ticks at 0s, 4s and 8s.
        assert_eq!(scheduler.tick_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_when_sender_dropped() {
        let store = Store::new();
        let (scheduler, _) = scheduler(&store);
        let (tx, rx) = watch::channel(false);

        drop(tx);
        scheduler.run(rx).await;
        assert!(scheduler.tick_count() <= 1);
    }
}
