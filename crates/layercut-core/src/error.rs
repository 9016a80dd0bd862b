use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid clip interval: start {start} must be before end {end}")]
    InvalidClipInterval { start: f64, end: f64 },

    #[error("invalid source interval: start {start} is after end {end}")]
    InvalidSourceInterval { start: f64, end: f64 },

    #[error("clip not found: {0}")]
    ClipNotFound(Uuid),

    #[error("audio clip not found: {0}")]
    AudioClipNotFound(Uuid),

    #[error("clip {0} is on a locked track")]
    ClipLocked(Uuid),

    #[error("split point {time}s is outside clip {clip_id}")]
    SplitOutsideClip { clip_id: Uuid, time: f64 },

    #[error("snapshot version {got} is newer than supported version {max}")]
    IncompatibleSnapshotVersion { got: String, max: String },

    #[error("invalid snapshot version: {0}")]
    InvalidSnapshotVersion(#[from] semver::Error),

    #[error("asset resolution failed: {0}")]
    AssetResolution(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
