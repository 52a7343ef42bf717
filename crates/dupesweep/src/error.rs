use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No sweep job has been started on this instance")]
    NotFound,

    #[error("Sweep actor is not running")]
    ActorGone,

    #[error("Source error: {0}")]
    Source(#[from] crate::source::SourceError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

pub type Result<T> = std::result::Result<T, SweepError>;
