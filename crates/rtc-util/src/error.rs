use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: full")]
    ErrBufferFull,
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("buffer is closed")]
    ErrBufferClosed,
    #[error("a conn bridge already has a conn attached")]
    ErrAlreadyClosed,
    #[error("use of closed network connection")]
    ErrClosed,
    #[error("try-lock is already locked")]
    ErrDoubleLock,
    #[error("no such handle in loop")]
    ErrHandleNotFound,
    #[error("handle invoked from a thread other than its owner")]
    ErrWrongThread,
    #[error("handle already closed")]
    ErrHandleClosed,
    #[error("context has been deleted")]
    ErrContextDeleted,
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("{0}")]
    Other(String),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        format!("{self}") == format!("{other}")
    }
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::Other(e.to_string())
    }
}
