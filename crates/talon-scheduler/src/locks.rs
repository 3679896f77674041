//! Per-pipeline write locks.
//!
//! The scheduler tick and agent report handlers both read-modify-write whole
//! pipeline records. Holding the pipeline's lock across that sequence keeps
//! one writer from silently overwriting another's job updates.

use std::collections::HashMap;
use std::sync::Arc;
use talon_core::ids::PipelineId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct PipelineLocks {
    locks: Mutex<HashMap<PipelineId, Arc<Mutex<()>>>>,
}

impl PipelineLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: PipelineId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a pipeline that no longer needs scheduling.
    pub async fn forget(&self, id: PipelineId) {
        self.locks.lock().await.remove(&id);
    }

    #[cfg(test)]
    pub(crate) async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_pipeline_is_exclusive() {
        let locks = Arc::new(PipelineLocks::new());
        let id = PipelineId::new();

        let guard = locks.lock(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_pipelines_do_not_block() {
        let locks = PipelineLocks::new();
        let _a = locks.lock(PipelineId::new()).await;
        let _b = locks.lock(PipelineId::new()).await;
    }

    #[tokio::test]
    async fn test_forget_drops_entry() {
        let locks = PipelineLocks::new();
        let id = PipelineId::new();
        drop(locks.lock(id).await);
        assert_eq!(locks.tracked().await, 1);

        locks.forget(id).await;
        assert_eq!(locks.tracked().await, 0);
    }
}
