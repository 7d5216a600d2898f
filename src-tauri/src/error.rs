use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("preference store error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to encode stored state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("data directory unavailable: {0}")]
    DataDir(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
