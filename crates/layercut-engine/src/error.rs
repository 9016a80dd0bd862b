use layercut_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load media {url}: {reason}")]
    MediaLoad { url: String, reason: String },

    #[error("surface error: {0}")]
    Surface(String),

    #[error("export rejected: {0}")]
    Export(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
