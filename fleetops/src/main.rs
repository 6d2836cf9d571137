use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use fleetops::index::OptimizeTarget;
use fleetops::scheduler::TaskScheduler;
use fleetops::{logging, ConfigManager, OperationTracker, Task, TaskRunner};

#[derive(Parser)]
#[command(name = "fleetops", version, about = "Scheduled fleet maintenance tasks")]
struct Cli {
    /// Directory holding main.toml and one TOML file per host
    #[arg(short, long, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one task now
    Run {
        #[arg(value_enum)]
        task: Task,

        /// index-optimize only: `yesterday`, `all` or an index name
        #[arg(long)]
        target: Option<OptimizeTarget>,
    },
    /// Run every enabled task on its schedule until interrupted
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_daemon()?;
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config).await?;
    let config = config_manager.get_current_config();
    info!("Configuration loaded: {} hosts", config.hosts.len());

    let runner = Arc::new(TaskRunner::new(config, OperationTracker::new()));

    match cli.command {
        Command::Run { task, target } => {
            info!("Running {}", task);
            if let Err(e) = runner.run(task, "manual", target).await {
                error!("{} failed: {}", task, e);
                return Err(e);
            }
        }
        Command::Serve => {
            let mut scheduler = TaskScheduler::new(runner.clone()).await?;
            scheduler.start().await?;

            info!("fleetops scheduler running, press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
            info!("Shutting down");
            scheduler.shutdown().await?;
        }
    }

    Ok(())
}
