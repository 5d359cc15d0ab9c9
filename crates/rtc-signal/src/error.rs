use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Protocol and transaction error kinds this crate surfaces, per the error
/// handling design's "Protocol" and "Transaction" categories plus the
/// HTTP/WebSocket/Socket.IO specifics of sections 4.8/4.9.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("malformed HTTP message: {0}")]
    ErrHttpParse(String),
    #[error("malformed WebSocket frame: {0}")]
    ErrWsParse(String),
    #[error("malformed Socket.IO packet: {0}")]
    ErrSockIoParse(String),
    #[error("malformed Symple message: {0}")]
    ErrSympleParse(String),
    #[error("WebSocket handshake failed: {0}")]
    ErrWsHandshake(String),
    #[error("transaction timed out")]
    ErrTimeout,
    #[error("transaction was cancelled")]
    ErrCancelled,
    #[error("peer error {code}: {reason}")]
    ErrPeer { code: u32, reason: String },
    #[error("unexpected response")]
    ErrUnexpectedResponse,
    #[error("connection closed")]
    ErrClosed,
    #[error("{0}")]
    Net(#[from] rtc_net::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
