//! Central repository for defaults, ceilings and schedules
//!
//! Organized by concern so every tool and task reads the same values.

use std::time::Duration;

/// Retention defaults, in days
pub mod retention {
    /// Bucketed logs become archivable after one day
    pub const BUCKETED_RIPE_DAYS: i64 = 1;

    /// Bucketed logs are removed locally after fifteen days (once archived)
    pub const BUCKETED_REAP_DAYS: i64 = 15;

    /// Bucketed logs carry no floor beyond `reap >= ripe`
    pub const BUCKETED_REAP_FLOOR_DAYS: i64 = 0;

    /// Rotated OSSEC logs are archivable as soon as they are rotated
    pub const OSSEC_RIPE_DAYS: i64 = 0;

    /// Rotated OSSEC logs are removed locally after thirty days
    pub const OSSEC_REAP_DAYS: i64 = 30;

    /// Guard against accidental mass deletion
    pub const OSSEC_REAP_FLOOR_DAYS: i64 = 30;

    /// Search indexes younger than this are never purged
    pub const INDEX_PURGE_FLOOR_DAYS: i64 = 30;

    /// Default search index purge age
    pub const INDEX_PURGE_MAX_AGE_DAYS: i64 = 45;

    /// Directory name format of date partitions
    pub const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";

    /// Base path of bucketed logs when none is given
    pub const DEFAULT_LOG_PATH: &str = "/mnt/log/";
}

/// Blob storage constants
pub mod storage {
    /// Single-request upload ceiling (~5GB)
    pub const MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1_000_000;

    /// Upper bound of concurrent part uploads
    pub const MAX_UPLOAD_WORKERS: usize = 16;

    /// Prefix under which uploads are staged before promotion
    pub const STAGING_PREFIX: &str = ".staging/";

    /// Default AWS region for the CLI
    pub const DEFAULT_REGION: &str = "us-east-1";
}

/// Database backup constants
pub mod backup {
    /// Timestamp of dump files and backup keys
    pub const DUMP_DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// Hourly backups for one year
    pub const DEFAULT_CAPACITY_COUNT: usize = 24 * 365;

    pub const COMPRESSION_LEVEL: u32 = 9;

    /// Table excluded from every dump
    pub const EXCLUDED_TABLE: &str = "repl_test";
}

/// HTTP client constants
pub mod http {
    use super::Duration;

    /// Default timeout for requests to command agents
    pub const AGENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

    /// Timeout for establishing HTTP connections
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Timeout for search index requests
    pub const INDEX_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
}

/// Default cron schedules (6-field: sec min hour day month dow)
pub mod schedules {
    pub const LOGS_ARCHIVE: &str = "0 30 * * * *";
    pub const INDEX_OPTIMIZE: &str = "0 0 11 * * *";
    pub const INDEX_PURGE: &str = "0 0 11 * * *";
    pub const GEOIP_UPDATE: &str = "0 0 4 7 * *";
}

/// Command agent constants
pub mod agent {
    /// Default port of the command agent
    pub const DEFAULT_PORT: u16 = 8745;

    /// Host role whose members carry bucketed logs
    pub const DEFAULT_LOG_ROLE: &str = "log-prod";
}

/// GeoIP refresh constants
pub mod geoip {
    pub const DATABASE_URL: &str =
        "http://geolite.maxmind.com/download/geoip/database/GeoLiteCity.dat.gz";
    pub const BUCKET: &str = "balanced.geoip";
    pub const MD5SUMS_NAME: &str = "md5sums";
}
