// Allow uppercase acronyms for industry-standard terms like SSD, NVMe, LBA
#![allow(clippy::upper_case_acronyms)]

pub mod config;
pub mod drives;
pub mod trim_job;
pub mod ui;

// Re-export the main entry points for convenience
pub use config::{PrimitiveKind, TrimConfig};
pub use drives::{DeviceDescriptor, DriveClassifier, MediaClass};
pub use trim_job::{
    ChunkPlan, JobControl, JobOptions, JobOutcome, JobState, ProgressReport, TrimEvent, TrimJob,
    UnitState,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Enumeration source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Source query failed: {0}")]
    SourceQueryFailed(String),

    #[error("Malformed source response: {0}")]
    MalformedResponse(String),

    #[error("Invalid chunk plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid job state: cannot {action} while {state}")]
    InvalidState { action: &'static str, state: JobState },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient permissions: {0}")]
    PermissionDenied(String),

    #[error("Drive not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for DriveError {
    fn from(err: serde_json::Error) -> Self {
        DriveError::MalformedResponse(err.to_string())
    }
}

impl From<::config::ConfigError> for DriveError {
    fn from(err: ::config::ConfigError) -> Self {
        DriveError::InvalidConfig(err.to_string())
    }
}

pub type DriveResult<T> = Result<T, DriveError>;
