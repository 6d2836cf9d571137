//! Archives `{host}/{date}` bucketed logs to a bucket and reaps archived partitions.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tracing::error;

use fleetops::constants::retention;
use fleetops::exec::{CommandExecutor, LocalExecutor};
use fleetops::lifecycle::{ArchiveStore, BucketedScanner, LifecycleDriver, LifecycleReport, RetentionPolicy};
use fleetops::{logging, storage, AwsCredentials};

#[derive(Parser)]
#[command(name = "archive-bucketed-logs", version)]
struct Args {
    /// Bucket name, or file:///dir for a local directory
    bucket: String,

    /// Base directories holding {host}/{date} partitions
    paths: Vec<String>,

    #[arg(short, long)]
    verbose: bool,

    /// File with AWSAccessKeyId= and AWSSecretKey= lines (default: environment)
    #[arg(short, long, value_name = "FILE")]
    aws_creds: Option<String>,

    /// Age in days after which an archived partition is removed
    #[arg(long, default_value_t = retention::BUCKETED_REAP_DAYS)]
    reap_threshold: i64,

    /// Age in days after which a partition is archived
    #[arg(long, default_value_t = retention::BUCKETED_RIPE_DAYS)]
    ripe_threshold: i64,

    /// Directory name format of date partitions
    #[arg(long, default_value = retention::PARTITION_DATE_FORMAT)]
    timestamp_format: String,

    /// Where archives are built before upload
    #[arg(long)]
    staging_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_cli(args.verbose)?;

    let policy = RetentionPolicy::from_days(
        args.ripe_threshold,
        args.reap_threshold,
        retention::BUCKETED_REAP_FLOOR_DAYS,
    )?;

    let executor: Arc<dyn CommandExecutor> = Arc::new(LocalExecutor::new());
    let blobs = storage::open_store(&args.bucket, executor.clone(), || {
        AwsCredentials::resolve(args.aws_creds.as_deref())
    })?;
    let staging_dir = args
        .staging_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().to_string_lossy().to_string());

    let driver = LifecycleDriver::new(
        Arc::new(BucketedScanner::new(executor.clone(), &args.timestamp_format)),
        ArchiveStore::new(executor, blobs, &staging_dir),
        policy,
    );

    let paths = if args.paths.is_empty() {
        vec![retention::DEFAULT_LOG_PATH.to_string()]
    } else {
        args.paths.clone()
    };

    let mut total = LifecycleReport::default();
    for path in &paths {
        match driver.run(path, Utc::now()).await {
            Ok(report) => total += report,
            Err(e) => {
                error!("{}", e);
                return Err(e.into());
            }
        }
    }

    eprintln!("{}", total);
    Ok(())
}
