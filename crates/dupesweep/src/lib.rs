pub mod config;
pub mod db;
pub mod dedupe;
pub mod error;
pub mod job;
pub mod logging;
pub mod source;
pub mod store;
pub mod sweep;

pub use config::SweepConfig;
pub use db::{default_database_path, Database, DatabaseError};
pub use dedupe::{find_duplicates, normalize_title};
pub use error::{ConfigError, Result, SweepError};
pub use job::{
    DuplicateGroup, Job, JobProgress, JobResults, JobSnapshot, JobStatus, KeepPolicy,
    ScannedRecord, CANCELLED_BY_USER,
};
pub use source::{
    HttpSource, MemorySource, PropertyValue, RecordPage, RecordSource, SourceError, SourceRecord,
};
pub use store::SweepStore;
pub use sweep::{SweepActor, SweepHandle};
