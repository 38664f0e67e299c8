use buildlens_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("No available port in range {start}-{end}")]
    PortRangeExhausted { start: u16, end: u16 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("Server task failed: {0}")]
    Task(String),
}
