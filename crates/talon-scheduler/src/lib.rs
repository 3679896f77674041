//! Scheduling and status-propagation engine for Talon CI.
//!
//! The [`Scheduler`] drives a periodic tick: agent liveness first, then
//! stage/pipeline status propagation, then dispatch of newly runnable jobs.
//! [`AgentReports`] is the core side of the agent transport.

pub mod assigner;
pub mod clock;
pub mod config;
pub mod liveness;
pub mod locks;
pub mod reports;
pub mod scheduler;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, SchedulerConfig};
pub use liveness::LivenessMonitor;
pub use reports::{AgentReports, WorkAssignment};
pub use scheduler::{Assignment, Scheduler, SchedulerHandle, TickReport};
pub use status::StatusPropagator;
