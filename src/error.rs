use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid local resource {0:?}, expected `name.ext`")]
    Resource(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("failed to spawn playback thread: {0}")]
    Spawn(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error: {0}")]
    Status(u16),
    #[error("unsupported media format: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
