//! Single-flight bookkeeping for tasks
//!
//! A task that is still running when it is triggered again is refused instead of being run
//! twice. Scheduled ticks and manual `run` invocations share the same tracker.
//!
//! ```ignore
//! tracker.try_start("logs-archive", "cron").await?;
//! // ... run the task ...
//! tracker.finish("logs-archive").await;
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ActiveTask {
    pub task: String,
    pub trigger: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub running: HashMap<String, ActiveTask>,
    pub total_active: usize,
}

#[derive(Clone, Default)]
pub struct OperationTracker {
    active: Arc<RwLock<HashMap<String, ActiveTask>>>, // task name -> run
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `task`, failing if a previous run has not finished
    #[instrument(skip(self))]
    pub async fn try_start(&self, task: &str, trigger: &str) -> Result<()> {
        let mut active = self.active.write().await;

        if let Some(current) = active.get(task) {
            let running_for = Utc::now().signed_duration_since(current.started_at);
            return Err(anyhow::anyhow!(
                "Task {} is still running (started by {} {}m ago)",
                task,
                current.trigger,
                running_for.num_minutes()
            ));
        }

        active.insert(
            task.to_string(),
            ActiveTask {
                task: task.to_string(),
                trigger: trigger.to_string(),
                started_at: Utc::now(),
            },
        );
        info!("Started task {} ({})", task, trigger);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn finish(&self, task: &str) {
        let mut active = self.active.write().await;
        if let Some(run) = active.remove(task) {
            let took = Utc::now().signed_duration_since(run.started_at);
            info!("Finished task {} (took {}s)", task, took.num_seconds());
        }
    }

    pub async fn is_busy(&self, task: &str) -> bool {
        self.active.read().await.contains_key(task)
    }

    pub async fn status(&self) -> TrackerStatus {
        let active = self.active.read().await;
        TrackerStatus {
            running: active.clone(),
            total_active: active.len(),
        }
    }

    /// Run `work` under the claim for `task`; a busy task is skipped with `Ok(None)`
    pub async fn run_exclusive<F, T>(&self, task: &str, trigger: &str, work: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        if let Err(e) = self.try_start(task, trigger).await {
            warn!("Skipping {}: {}", task, e);
            return Ok(None);
        }

        let mut claim = ClaimGuard {
            active: self.active.clone(),
            task: task.to_string(),
            armed: true,
        };
        let result = work.await;
        claim.armed = false;
        self.finish(task).await;
        result.map(Some)
    }
}

/// Releases a claim whose work never returned (panic or cancellation)
struct ClaimGuard {
    active: Arc<RwLock<HashMap<String, ActiveTask>>>,
    task: String,
    armed: bool,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Task {} did not finish, releasing its claim", self.task);
        if let Ok(mut active) = self.active.try_write() {
            active.remove(&self.task);
            return;
        }
        // Lock is held elsewhere; release once it is free
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let active = self.active.clone();
            let task = std::mem::take(&mut self.task);
            handle.spawn(async move {
                active.write().await.remove(&task);
            });
        }
    }
}
