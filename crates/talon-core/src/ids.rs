//! Strongly-typed identifiers for domain entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let uuid_str = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(uuid_str)?))
            }
        }
    };
}

define_id!(PipelineId, "pip");
define_id!(PipelineDefinitionId, "pdf");
define_id!(StageId, "stg");
define_id!(JobId, "job");
define_id!(AgentId, "agt");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_display() {
        let id = AgentId::new();
        assert!(id.to_string().starts_with("agt_"));
    }

    #[test]
    fn test_job_id_parse_with_and_without_prefix() {
        let id = JobId::new();
        let prefixed: JobId = id.to_string().parse().unwrap();
        let bare: JobId = id.as_uuid().to_string().parse().unwrap();
        assert_eq!(id, prefixed);
        assert_eq!(id, bare);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!("pip_not-a-uuid".parse::<PipelineId>().is_err());
    }
}
