//! Integration test infrastructure for Talon CI.
//!
//! Wires the in-memory store, event bus and scheduler together behind a
//! [`TestContext`] with a manually driven clock, so tests can run ticks one
//! at a time and play the agent side through [`talon_scheduler::AgentReports`].
//!
//! ```ignore
//! use talon_tests::{PipelineFixture, TestContext};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new();
//!     let definition = ctx.add_definition(PipelineFixture::single_job()).await?;
//!     ctx.scheduler.trigger(definition).await?;
//!     ctx.scheduler.tick().await;
//! }
//! ```

pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,talon_scheduler=debug")),
        )
        .with_test_writer()
        .try_init();
}
