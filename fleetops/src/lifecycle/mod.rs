//! Log partition lifecycle
//!
//! ```text
//! PartitionScanner → [LogPartition] (oldest first)
//!                          │
//!                  RetentionPolicy::classify
//!                          │
//!   NotRipe ──────────────────────────────────────────→ skip
//!   Archivable      + archived / not archived ───────→ skip / archive
//!   ArchivedExpired + archived / not archived ───────→ remove / archive
//! ```
//!
//! An expired partition that is not yet archived is only archived; the next pass removes it.

pub mod archive;
pub mod driver;
pub mod ossec;
pub mod partition;
pub mod retention;
pub mod scanner;

pub use archive::ArchiveStore;
pub use driver::{LifecycleDriver, LifecycleReport};
pub use ossec::RotatedLogScanner;
pub use partition::{archive_name, LogPartition, Packaging};
pub use retention::{RetentionPolicy, RetentionState};
pub use scanner::{BucketedScanner, PartitionScanner};
