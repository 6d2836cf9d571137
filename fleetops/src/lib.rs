pub mod backup;
pub mod config;
pub mod constants;
pub mod errors;
pub mod exec;
pub mod geoip;
pub mod index;
pub mod last_run;
pub mod lifecycle;
pub mod logging;
pub mod operation_tracker;
pub mod s3util;
pub mod scheduler;
pub mod storage;
pub mod tasks;
pub mod timespec;

// Re-export commonly used types
pub use config::{AwsCredentials, Config, ConfigManager};
pub use errors::{ConfigError, ExecError, LifecycleError, StoreError};
pub use exec::{AgentExecutor, CommandExecutor, LocalExecutor};
pub use lifecycle::{ArchiveStore, LifecycleDriver, LifecycleReport, LogPartition, RetentionPolicy};
pub use operation_tracker::OperationTracker;
pub use storage::{AwsCliStore, BlobStore, LocalDirStore};
pub use tasks::{Task, TaskRunner};
