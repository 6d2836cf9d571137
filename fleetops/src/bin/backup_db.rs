//! Backs up PostgreSQL databases to a bucket.
//!
//! `backup-db {bucket} {database} {user}`, or one such line per stdin line.

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use std::io;
use std::sync::Arc;
use tracing::info;

use fleetops::backup::{self, BackupJob, BackupOptions};
use fleetops::constants;
use fleetops::exec::{CommandExecutor, LocalExecutor};
use fleetops::s3util::read_lines;
use fleetops::{logging, storage, AwsCredentials};

#[derive(Parser)]
#[command(name = "backup-db", version)]
struct Args {
    /// {bucket} {database} {user}; read from stdin when omitted
    job: Vec<String>,

    #[arg(short, long)]
    verbose: bool,

    /// Log the keys that would be reaped without deleting them
    #[arg(short, long)]
    dry: bool,

    /// Number of backups to keep in the bucket
    #[arg(short, long, default_value_t = constants::backup::DEFAULT_CAPACITY_COUNT)]
    capacity_count: usize,

    /// Database server
    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(short, long, value_name = "FILE")]
    aws_creds: Option<String>,

    /// Concurrent part uploads for dumps above the single-request ceiling
    #[arg(short, long)]
    workers: Option<usize>,

    /// Where dumps are written before upload
    #[arg(long)]
    staging_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_cli(args.verbose)?;

    let lines = if args.job.is_empty() {
        read_lines(io::stdin().lock())?
    } else {
        vec![args.job.join(" ")]
    };
    if lines.is_empty() {
        return Err(anyhow!("Usage: backup-db {{bucket}} {{database}} {{user}}"));
    }
    let jobs = lines
        .iter()
        .map(|line| line.parse::<BackupJob>())
        .collect::<Result<Vec<_>>>()?;

    let options = BackupOptions {
        host: args.host.clone(),
        staging_dir: args
            .staging_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().to_string_lossy().to_string()),
        workers: args.workers,
        capacity: args.capacity_count,
        dry: args.dry,
        ..Default::default()
    };

    let executor: Arc<dyn CommandExecutor> = Arc::new(LocalExecutor::new());
    for job in &jobs {
        let store = storage::open_store(&job.bucket, executor.clone(), || {
            AwsCredentials::resolve(args.aws_creds.as_deref())
        })?;

        let outcome =
            backup::backup_database(executor.as_ref(), store.as_ref(), job, &options, Utc::now()).await?;
        info!(
            "backed up {} as {} in {} part(s), reaped {} key(s)",
            job.database,
            outcome.key,
            outcome.parts,
            outcome.reaped.len()
        );
    }

    Ok(())
}
