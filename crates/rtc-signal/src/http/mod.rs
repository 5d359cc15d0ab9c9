pub mod connection;
pub mod message;
pub mod parser;

pub use connection::{ClientConnection, ProgressObserver, ServerConnection};
pub use message::{Headers, RequestHead, ResponseHead};
pub use parser::{Parser, ParserEvent};
