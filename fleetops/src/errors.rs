//! Error types for fleet operations
//!
//! Configuration and blob-store connectivity failures abort a run. Packaging and parse
//! failures are scoped to a single partition and are recovered by the lifecycle driver.

use std::fmt;

/// Configuration error variants
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to load configuration file
    LoadFailed { path: String, reason: String },

    /// Invalid configuration value
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    MissingRequired { field: String },

    /// Configuration parsing error
    ParseError { reason: String },

    /// Retention age below the safety floor of the variant
    BelowSafetyFloor {
        field: String,
        days: i64,
        floor_days: i64,
    },
}

/// Failures of the command execution capability itself (not non-zero exits)
#[derive(Debug)]
pub enum ExecError {
    /// Local process could not be spawned
    SpawnFailed { command: String, reason: String },

    /// Remote agent unreachable or returned a transport-level error
    AgentUnavailable { host: String, reason: String },

    /// Remote agent answered with something we could not read
    InvalidResponse { host: String, reason: String },

    /// Command ran but exited non-zero where success was required
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Filesystem listing failed
    ListFailed { path: String, reason: String },
}

/// Blob store error variants
#[derive(Debug)]
pub enum StoreError {
    /// Backend unreachable or credentials rejected
    Unavailable { bucket: String, reason: String },

    /// A single object operation failed
    OperationFailed {
        bucket: String,
        key: String,
        operation: String,
        reason: String,
    },

    /// Key does not exist
    NotFound { bucket: String, key: String },
}

/// Lifecycle error taxonomy
#[derive(Debug)]
pub enum LifecycleError {
    /// Invalid retention parameters (fatal, pre-flight)
    Configuration(ConfigError),

    /// Blob backend unreachable (fatal)
    StoreUnavailable(StoreError),

    /// Archive creation or upload failed for one partition (recovered)
    Packaging { partition: String, reason: String },

    /// Unrecognized partition directory name (skipped)
    Parse { path: String, reason: String },

    /// Base path could not be enumerated (fatal for that base path)
    Scan { path: String, reason: String },

    /// Local removal of an archived partition failed (recovered)
    Removal { path: String, reason: String },

    /// Another partition in the same pass maps to this archive name (left untouched)
    AmbiguousArchive { path: String, archive_name: String },
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl LifecycleError {
    /// Whether the driver must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LifecycleError::Configuration(_)
                | LifecycleError::StoreUnavailable(_)
                | LifecycleError::Scan { .. }
        )
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path, reason)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingRequired { field } => {
                write!(f, "Missing required field: {}", field)
            }
            ConfigError::ParseError { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }
            ConfigError::BelowSafetyFloor {
                field,
                days,
                floor_days,
            } => {
                write!(
                    f,
                    "Refusing to run with '{}' of {} days, below the {} day safety floor",
                    field, days, floor_days
                )
            }
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::SpawnFailed { command, reason } => {
                write!(f, "Failed to spawn '{}': {}", command, reason)
            }
            ExecError::AgentUnavailable { host, reason } => {
                write!(f, "Agent on {} unavailable: {}", host, reason)
            }
            ExecError::InvalidResponse { host, reason } => {
                write!(f, "Invalid response from agent on {}: {}", host, reason)
            }
            ExecError::CommandFailed {
                command,
                status,
                stderr,
            } => {
                write!(
                    f,
                    "Command '{}' exited with {}: {}",
                    command,
                    status,
                    stderr.trim()
                )
            }
            ExecError::ListFailed { path, reason } => {
                write!(f, "Failed to list {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable { bucket, reason } => {
                write!(f, "Blob store bucket '{}' unavailable: {}", bucket, reason)
            }
            StoreError::OperationFailed {
                bucket,
                key,
                operation,
                reason,
            } => {
                write!(
                    f,
                    "{} of '{}' in bucket '{}' failed: {}",
                    operation, key, bucket, reason
                )
            }
            StoreError::NotFound { bucket, key } => {
                write!(f, "{} has no key {}", bucket, key)
            }
        }
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Configuration(e) => write!(f, "Configuration error: {}", e),
            LifecycleError::StoreUnavailable(e) => write!(f, "Store unavailable: {}", e),
            LifecycleError::Packaging { partition, reason } => {
                write!(f, "Packaging of {} failed: {}", partition, reason)
            }
            LifecycleError::Parse { path, reason } => {
                write!(f, "{} is not a log partition: {}", path, reason)
            }
            LifecycleError::Scan { path, reason } => {
                write!(f, "Failed to scan {}: {}", path, reason)
            }
            LifecycleError::Removal { path, reason } => {
                write!(f, "Failed to remove {}: {}", path, reason)
            }
            LifecycleError::AmbiguousArchive { path, archive_name } => write!(
                f,
                "{} shares archive name {} with another partition, leaving it alone",
                path, archive_name
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for ExecError {}
impl std::error::Error for StoreError {}
impl std::error::Error for LifecycleError {}

impl From<ConfigError> for LifecycleError {
    fn from(err: ConfigError) -> Self {
        LifecycleError::Configuration(err)
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        LifecycleError::StoreUnavailable(err)
    }
}
