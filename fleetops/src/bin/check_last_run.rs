//! Checks that a job's last-run marker is not older than a threshold.
//!
//! `check-last-run {file} {threshold}`, or one such pair per stdin line. Stale markers are
//! reported on stderr and make the exit status 1.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::io;
use std::process::ExitCode;
use tracing::debug;

use fleetops::{last_run, logging, s3util};

#[derive(Parser)]
#[command(name = "check-last-run", version)]
struct Args {
    /// {last-run-file} {threshold}; read from stdin when omitted
    check: Vec<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init_cli(args.verbose)?;

    let lines = if args.check.is_empty() {
        s3util::read_lines(io::stdin().lock())?
    } else {
        vec![args.check.join(" ")]
    };

    let now = Utc::now();
    let mut stale = 0;
    for line in &lines {
        let (path, threshold) = last_run::parse_line(line)?;
        let check = last_run::check(&path, &threshold, now).await?;
        if check.is_stale() {
            eprintln!("{}", check);
            stale += 1;
        } else {
            debug!("{} is fresh ({}s old)", path, check.age.num_seconds());
        }
    }

    Ok(if stale > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
