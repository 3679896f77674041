//! Error types for Talon CI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Lookup errors
    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Pipeline definition not found: {0}")]
    PipelineDefinitionNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    // Domain errors
    #[error("Invalid job report: {0}")]
    InvalidReport(String),

    #[error("Conflicting update: {0}")]
    Conflict(String),

    /// A repository backend failed to read or write.
    #[error("Database error: {0}")]
    Database(String),
}

impl Error {
    /// Whether this error reports a missing entity rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::PipelineNotFound(_)
                | Error::PipelineDefinitionNotFound(_)
                | Error::AgentNotFound(_)
                | Error::JobNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
