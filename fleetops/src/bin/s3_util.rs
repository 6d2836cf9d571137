//! Simple operations on a bucket, for use from a shell.
//!
//! ```text
//! s3-util list my.bucket --format '{n} {m}' | sort -k 2 | tail -n1 | cut -f1 -d' ' | s3-util download my.bucket > latest
//! s3-util list some.bucket --before 30d | s3-util delete some.bucket --verbose
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;

use fleetops::exec::{CommandExecutor, LocalExecutor};
use fleetops::s3util::{self, ListFilter};
use fleetops::{logging, storage, timespec, AwsCredentials};

#[derive(Parser)]
#[command(name = "s3-util", version)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    aws_creds: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Target {
    /// Bucket name, or file:///dir for a local directory
    bucket: String,

    #[arg(short, long)]
    dry: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List keys, one per line
    List {
        bucket: String,

        #[arg(short = 'o', long, default_value = s3util::DEFAULT_LIST_FORMAT)]
        format: String,

        #[arg(short, long)]
        prefix: Option<String>,

        /// Only keys modified before T ([+|-]N(d|h|m|s) or RFC 3339)
        #[arg(short, long, value_parser = parse_time)]
        before: Option<DateTime<Utc>>,

        /// Only keys modified after T
        #[arg(short, long, value_parser = parse_time)]
        after: Option<DateTime<Utc>>,
    },
    /// Download keys named on stdin into DIR, or to stdout
    Download {
        #[command(flatten)]
        target: Target,

        dir: Option<String>,
    },
    /// Delete keys named on stdin
    Delete {
        #[command(flatten)]
        target: Target,
    },
    /// Rename keys given as `src dst` pairs on stdin
    Rename {
        #[command(flatten)]
        target: Target,
    },
    /// Upload files given as `src [dst]` lines on stdin
    Upload {
        #[command(flatten)]
        target: Target,

        #[arg(short, long)]
        public: bool,

        /// Create the bucket if necessary
        #[arg(long)]
        create_bucket: bool,
    },
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    timespec::parse_timestamp(raw, Utc::now()).map_err(|e| e.to_string())
}

fn stdin_lines() -> Result<Vec<String>> {
    s3util::read_lines(io::stdin().lock())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose)?;

    let executor: Arc<dyn CommandExecutor> = Arc::new(LocalExecutor::new());
    let open = |bucket: &str| {
        storage::open_store(bucket, executor.clone(), || {
            AwsCredentials::resolve(cli.aws_creds.as_deref())
        })
    };

    match &cli.command {
        Command::List {
            bucket,
            format,
            prefix,
            before,
            after,
        } => {
            let store = open(bucket)?;
            let filter = ListFilter {
                prefix: prefix.clone(),
                before: *before,
                after: *after,
            };
            let mut out = io::stdout().lock();
            for line in s3util::list(store.as_ref(), &filter, format).await? {
                writeln!(out, "{}", line)?;
            }
        }
        Command::Download { target, dir } => {
            let store = open(&target.bucket)?;
            let keys = stdin_lines()?;
            let mut out = io::stdout();
            s3util::download(store.as_ref(), &keys, dir.as_deref(), target.dry, &mut out).await?;
        }
        Command::Delete { target } => {
            let store = open(&target.bucket)?;
            s3util::delete(store.as_ref(), &stdin_lines()?, target.dry).await?;
        }
        Command::Rename { target } => {
            let store = open(&target.bucket)?;
            s3util::rename(store.as_ref(), &stdin_lines()?, target.dry).await?;
        }
        Command::Upload {
            target,
            public,
            create_bucket,
        } => {
            let store = open(&target.bucket)?;
            s3util::upload(
                store.as_ref(),
                &stdin_lines()?,
                target.dry,
                *public,
                *create_bucket,
            )
            .await?;
        }
    }

    Ok(())
}
