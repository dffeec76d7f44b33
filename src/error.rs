use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiStreamError {
    #[error("request to {url} failed after {attempts} attempts: {reason}")]
    Transport {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crawl was interrupted")]
    Interrupted,

    #[error("crawl task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, CiStreamError>;
