//! Archives rotated OSSEC logs to a bucket, removing local copies once they are 30 days old.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;

use fleetops::constants::retention;
use fleetops::exec::{CommandExecutor, LocalExecutor};
use fleetops::lifecycle::{ArchiveStore, LifecycleDriver, LifecycleReport, RetentionPolicy, RotatedLogScanner};
use fleetops::{logging, storage, AwsCredentials};

#[derive(Parser)]
#[command(name = "archive-ossec-logs", version)]
struct Args {
    /// Bucket name, or file:///dir for a local directory
    bucket: String,

    /// OSSEC log directories, searched recursively
    #[arg(required = true)]
    paths: Vec<String>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, value_name = "FILE")]
    aws_creds: Option<String>,

    /// Age in days after which an archived log is removed (at least 30)
    #[arg(long, default_value_t = retention::OSSEC_REAP_DAYS)]
    reap_threshold: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_cli(args.verbose)?;

    let policy = RetentionPolicy::from_days(
        retention::OSSEC_RIPE_DAYS,
        args.reap_threshold,
        retention::OSSEC_REAP_FLOOR_DAYS,
    )?;

    let executor: Arc<dyn CommandExecutor> = Arc::new(LocalExecutor::new());
    let blobs = storage::open_store(&args.bucket, executor.clone(), || {
        AwsCredentials::resolve(args.aws_creds.as_deref())
    })?;

    let staging_dir = std::env::temp_dir().to_string_lossy().to_string();
    let driver = LifecycleDriver::new(
        Arc::new(RotatedLogScanner::new(executor.clone())?),
        ArchiveStore::new(executor, blobs, &staging_dir),
        policy,
    );

    let mut total = LifecycleReport::default();
    for path in &args.paths {
        total += driver.run(path, Utc::now()).await?;
    }

    eprintln!("{}", total);
    Ok(())
}
