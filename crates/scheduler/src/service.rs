use async_trait::async_trait;
use aide_core::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::store::TaskStore;
use crate::task::{next_task_id, ScheduledTask, TaskId};

/// Callback the sweep hands each due task description to.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, description: &str) -> Result<String>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

pub struct TaskScheduler {
    store: TaskStore,
    executor: Arc<dyn TaskExecutor>,
    sweep_interval: Duration,
    /// Load-modify-save on the task file.
    write_lock: Mutex<()>,
    /// One sweep at a time. Never held together with a callback's own writes.
    sweep_lock: Mutex<()>,
}

impl TaskScheduler {
    pub fn new(store: TaskStore, executor: Arc<dyn TaskExecutor>, sweep_interval: Duration) -> Self {
        Self {
            store,
            executor,
            sweep_interval,
            write_lock: Mutex::new(()),
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Append a pending task and rewrite the store.
    pub async fn schedule(&self, description: &str, fire_at: DateTime<Utc>) -> Result<TaskId> {
        if description.trim().is_empty() {
            return Err(Error::Validation("task description is empty".to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let mut tasks = self.store.load().await?;
        let now = Utc::now();
        let id = next_task_id(&tasks, now);
        let task = ScheduledTask::new(id, description, fire_at, now);
        info!(task_id = id, fire_at = %task.fire_at, "⏰ Task scheduled");
        tasks.push(task);
        self.store.save(&tasks).await?;
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<ScheduledTask>> {
        self.store.load().await
    }

    pub async fn get(&self, id: TaskId) -> Result<Option<ScheduledTask>> {
        Ok(self.store.load().await?.into_iter().find(|t| t.id == id))
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// One sweep at `now`: run every due pending task in stored order, then
    /// record the outcomes. The file lock is released while callbacks run, so
    /// a callback may schedule further tasks.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let _sweep = self.sweep_lock.lock().await;

        let due: Vec<(TaskId, String)> = {
            let _guard = self.write_lock.lock().await;
            self.store
                .load()
                .await?
                .iter()
                .filter(|t| t.is_due(now))
                .map(|t| (t.id, t.description.clone()))
                .collect()
        };

        if due.is_empty() {
            debug!("No due tasks");
            return Ok(SweepReport::default());
        }

        let mut outcomes = Vec::with_capacity(due.len());
        for (id, description) in due {
            info!(task_id = id, "▶️ Running task");
            let outcome = match self.executor.execute(&description).await {
                Ok(output) => {
                    debug!(task_id = id, output_len = output.len(), "Task callback succeeded");
                    Ok(())
                }
                Err(e) => {
                    warn!(task_id = id, error = %e, "Task callback failed");
                    Err(e.to_string())
                }
            };
            outcomes.push((id, outcome));
        }

        let _guard = self.write_lock.lock().await;
        let mut tasks = self.store.load().await?;
        let finished_at = Utc::now().max(now);
        let mut report = SweepReport::default();
        for (id, outcome) in outcomes {
            let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
                warn!(task_id = id, "Task disappeared from the store during sweep");
                continue;
            };
            let ok = outcome.is_ok();
            if task.finish(outcome, finished_at) {
                if ok {
                    report.completed.push(id);
                } else {
                    report.failed.push(id);
                }
            }
        }

        if !report.is_empty() {
            self.store.save(&tasks).await?;
            info!(
                completed = report.completed.len(),
                failed = report.failed.len(),
                "✅ Sweep finished"
            );
        }
        Ok(report)
    }

    pub async fn run_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_secs = self.sweep_interval.as_secs(), "TaskScheduler started");

        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Task sweep failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("TaskScheduler shutting down");
                    break;
                }
            }
        }
    }
}
