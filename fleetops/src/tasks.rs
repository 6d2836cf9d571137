//! Config-driven tasks run by `fleetops run` and by the scheduler

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::config::{AwsCredentials, Config};
use crate::constants;
use crate::exec::{AgentExecutor, CommandExecutor, LocalExecutor};
use crate::geoip;
use crate::index::{OptimizeTarget, SearchIndexClient};
use crate::lifecycle::{ArchiveStore, BucketedScanner, LifecycleDriver, LifecycleReport, RetentionPolicy};
use crate::operation_tracker::OperationTracker;
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Task {
    LogsArchive,
    IndexOptimize,
    IndexPurge,
    GeoipUpdate,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::LogsArchive => "logs-archive",
            Task::IndexOptimize => "index-optimize",
            Task::IndexPurge => "index-purge",
            Task::GeoipUpdate => "geoip-update",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct TaskRunner {
    config: Arc<Config>,
    tracker: OperationTracker,
}

impl TaskRunner {
    pub fn new(config: Arc<Config>, tracker: OperationTracker) -> Self {
        Self { config, tracker }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn tracker(&self) -> &OperationTracker {
        &self.tracker
    }

    /// Run `task` unless a previous run is still going; returns whether it ran
    pub async fn run(&self, task: Task, trigger: &str, target: Option<OptimizeTarget>) -> Result<bool> {
        let ran = self
            .tracker
            .run_exclusive(task.name(), trigger, async {
                let now = Utc::now();
                match task {
                    Task::LogsArchive => self.logs_archive(now).await.map(|report| {
                        info!("logs-archive: {}", report);
                    }),
                    Task::IndexOptimize => {
                        let target = target.clone().unwrap_or(OptimizeTarget::Yesterday);
                        self.index_optimize(&target, now).await.map(|merged| {
                            info!("index-optimize merged {} indexes", merged.len());
                        })
                    }
                    Task::IndexPurge => self.index_purge(now).await.map(|deleted| {
                        info!("index-purge deleted {} indexes", deleted.len());
                    }),
                    Task::GeoipUpdate => self.geoip_update().await.map(|outcome| {
                        info!("geoip-update published {} ({})", outcome.archive_key, outcome.md5);
                    }),
                }
            })
            .await?;
        Ok(ran.is_some())
    }

    fn credentials(&self) -> Result<AwsCredentials, crate::errors::ConfigError> {
        Ok(AwsCredentials::resolve(self.config.aws_credentials_file.as_deref())?
            .with_region(&self.config.aws_region))
    }

    /// Lifecycle pass on every host carrying the log role, through its command agent
    ///
    /// A host whose pass aborts does not stop the others; the task fails at the end.
    #[instrument(skip(self, now))]
    pub async fn logs_archive(&self, now: DateTime<Utc>) -> Result<LifecycleReport> {
        let logs = self
            .config
            .logs
            .as_ref()
            .ok_or_else(|| anyhow!("No [logs] section configured"))?;
        let policy = RetentionPolicy::from_days(
            logs.ripe_days,
            logs.reap_days,
            constants::retention::BUCKETED_REAP_FLOOR_DAYS,
        )?;

        let hosts = self.config.hosts_with_role(&logs.host_role);
        if hosts.is_empty() {
            warn!("No hosts carry role {}", logs.host_role);
        }

        let mut total = LifecycleReport::default();
        let mut failed_hosts = Vec::new();

        for (name, host) in hosts {
            let executor: Arc<dyn CommandExecutor> = Arc::new(AgentExecutor::new(name, host)?);
            let blobs = storage::open_store(&logs.bucket, executor.clone(), || self.credentials())?;
            let driver = LifecycleDriver::new(
                Arc::new(BucketedScanner::new(executor.clone(), &logs.timestamp_format)),
                ArchiveStore::new(executor, blobs, &self.config.staging_dir),
                policy,
            );

            let paths = host.log_paths.as_ref().unwrap_or(&logs.paths);
            for path in paths {
                match driver.run(path, now).await {
                    Ok(report) => {
                        info!("{}:{} {}", name, path, report);
                        total += report;
                    }
                    Err(e) => {
                        error!("logs-archive on {}:{} failed: {}", name, path, e);
                        failed_hosts.push(format!("{}:{}", name, path));
                    }
                }
            }
        }

        if !failed_hosts.is_empty() {
            return Err(anyhow!(
                "logs-archive failed on {} ({})",
                failed_hosts.join(", "),
                total
            ));
        }
        Ok(total)
    }

    fn index_client(&self) -> Result<SearchIndexClient> {
        let index = self
            .config
            .search_index
            .as_ref()
            .ok_or_else(|| anyhow!("No [search_index] section configured"))?;
        SearchIndexClient::new(&index.base_url)
    }

    pub async fn index_optimize(&self, target: &OptimizeTarget, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.index_client()?.optimize(target, now.date_naive()).await
    }

    pub async fn index_purge(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let max_age = self
            .config
            .search_index
            .as_ref()
            .map(|i| i.purge_max_age_days)
            .unwrap_or(constants::retention::INDEX_PURGE_MAX_AGE_DAYS);
        self.index_client()?.purge(max_age, now.date_naive()).await
    }

    pub async fn geoip_update(&self) -> Result<geoip::GeoIpOutcome> {
        let geoip_config = self
            .config
            .geoip
            .as_ref()
            .ok_or_else(|| anyhow!("No [geoip] section configured"))?;

        let executor: Arc<dyn CommandExecutor> = Arc::new(LocalExecutor::new());
        let store = storage::open_store(&geoip_config.bucket, executor.clone(), || self.credentials())?;
        geoip::update(
            executor.as_ref(),
            store.as_ref(),
            &geoip_config.url,
            &self.config.staging_dir,
        )
        .await
    }
}
