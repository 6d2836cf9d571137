use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, instrument, warn};

use super::validate_6_field_cron;
use crate::tasks::{Task, TaskRunner};

pub struct TaskScheduler {
    runner: Arc<TaskRunner>,
    scheduler: JobScheduler,
}

impl TaskScheduler {
    pub async fn new(runner: Arc<TaskRunner>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| anyhow!("Failed to create JobScheduler: {}", e))?;
        Ok(Self { runner, scheduler })
    }

    /// Enabled tasks paired with their schedules
    pub fn planned_jobs(&self) -> Vec<(Task, String)> {
        let config = self.runner.config();
        let mut planned = Vec::new();

        match &config.logs {
            Some(logs) if logs.enabled => planned.push((Task::LogsArchive, logs.schedule.clone())),
            Some(_) => info!("logs-archive disabled, skipping schedule"),
            None => info!("No [logs] section, logs-archive not scheduled"),
        }
        match &config.search_index {
            Some(index) if index.enabled => {
                planned.push((Task::IndexOptimize, index.optimize_schedule.clone()));
                planned.push((Task::IndexPurge, index.purge_schedule.clone()));
            }
            Some(_) => info!("search index tasks disabled, skipping schedule"),
            None => info!("No [search_index] section, index tasks not scheduled"),
        }
        match &config.geoip {
            Some(geoip) if geoip.enabled => planned.push((Task::GeoipUpdate, geoip.schedule.clone())),
            Some(_) => info!("geoip-update disabled, skipping schedule"),
            None => info!("No [geoip] section, geoip-update not scheduled"),
        }
        planned
    }

    /// Register every enabled task and start ticking; returns the number of jobs
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<usize> {
        info!("Starting task scheduler with 6-field cron format (sec min hour day month dow)");
        let mut scheduled_count = 0;

        for (task, schedule) in self.planned_jobs() {
            match self.schedule_task(task, &schedule).await {
                Ok(()) => {
                    scheduled_count += 1;
                    info!("✓ Scheduled {}: {}", task, schedule);
                }
                Err(e) => {
                    error!("✗ Failed to schedule {}: {} (schedule: {})", task, e, schedule);
                }
            }
        }

        if scheduled_count > 0 {
            self.scheduler
                .start()
                .await
                .map_err(|e| anyhow!("Failed to start scheduler: {}", e))?;
            info!("✓ Task scheduler started with {} jobs", scheduled_count);
        } else {
            warn!("No scheduled jobs configured - scheduler not started");
        }
        Ok(scheduled_count)
    }

    async fn schedule_task(&self, task: Task, schedule: &str) -> Result<()> {
        validate_6_field_cron(schedule)
            .map_err(|e| anyhow!("Invalid 6-field cron schedule '{}': {}", schedule, e))?;

        let runner = self.runner.clone();
        let job = Job::new_async(schedule, move |_uuid, _scheduler| {
            let runner = runner.clone();
            Box::pin(async move {
                info!("Executing scheduled {}", task);
                match runner.run(task, "cron", None).await {
                    Ok(true) => info!("✓ Scheduled {} completed", task),
                    Ok(false) => warn!("Scheduled {} skipped, previous run still active", task),
                    Err(e) => error!("✗ Scheduled {} failed: {}", task, e),
                }
            })
        })
        .map_err(|e| anyhow!("Failed to create {} job for '{}': {}", task, schedule, e))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| anyhow!("Failed to add {} job to scheduler: {}", task, e))?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| anyhow!("Failed to stop scheduler: {}", e))
    }
}
