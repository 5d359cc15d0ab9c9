use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Transport error kinds surfaced to the application, per the error
/// handling design's "Transport" category.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("connection refused")]
    ErrConnectRefused,
    #[error("connect timed out")]
    ErrConnectTimeout,
    #[error("read error: {0}")]
    ErrReadError(String),
    #[error("write error: {0}")]
    ErrWriteError(String),
    #[error("address already in use")]
    ErrAddressInUse,
    #[error("could not resolve host: {0}")]
    ErrUnresolvedHost(String),
    #[error("socket is closed")]
    ErrClosed,
    #[error("operation not valid for this transport")]
    ErrNotApplicable,
    #[error("no adapter named {0} in the chain")]
    ErrAdapterNotFound(String),
    #[error("{0}")]
    Util(#[from] util::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
