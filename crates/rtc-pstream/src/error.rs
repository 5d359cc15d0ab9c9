use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the packet stream pipeline, per the packet-stream
/// error kinds enumerated in the error handling design: `AdapterRejected`,
/// `SourceStopped`, `PipelineError`.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("adapter rejected packet: no processor or sink accepts this packet kind")]
    ErrAdapterRejected,
    #[error("packet stream is not active")]
    ErrSourceStopped,
    #[error("packet stream pipeline error: {0}")]
    ErrPipelineError(String),
    #[error("packet stream is already closed")]
    ErrAlreadyClosed,
    #[error("packet stream is in the error state")]
    ErrStreamInError,
    #[error("adapter {0} is not attached to this stream")]
    ErrAdapterNotFound(String),
}
