use thiserror::Error;

/// Infrastructure failures. Any of these ends the current run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("display unavailable: {0}")]
    Display(String),

    #[error("input simulation failed: {0}")]
    Input(String),

    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
