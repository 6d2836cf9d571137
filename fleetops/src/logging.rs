//! tracing-subscriber setup shared by the daemon and the standalone tools

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

const QUIET_DEPENDENCIES: [&str; 3] = ["reqwest=warn", "hyper=warn", "tokio_cron_scheduler=warn"];

fn filter(crate_level: &str) -> Result<EnvFilter> {
    let mut env_filter =
        EnvFilter::from_default_env().add_directive(format!("fleetops={}", crate_level).parse()?);
    for directive in QUIET_DEPENDENCIES {
        env_filter = env_filter.add_directive(directive.parse()?);
    }
    Ok(env_filter)
}

/// Standalone tools log to stderr, `warn` unless `--verbose`
pub fn init_cli(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    fmt()
        .with_env_filter(filter(level)?)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

pub fn init_daemon() -> Result<()> {
    fmt().with_env_filter(filter("info")?).init();
    Ok(())
}
