use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(&'static str),

    /// Another process holds the rotation lock for the target file.
    #[error("rotation already in progress")]
    RotationInProgress,

    #[error("no active file")]
    NoActiveFile,

    #[error("sink is closed")]
    Closed,

    #[error("sink state lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
