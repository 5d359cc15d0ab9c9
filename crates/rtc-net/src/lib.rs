#![warn(rust_2018_idioms)]

pub mod adapter;
pub mod error;
pub mod secure;
pub mod socket;

pub use adapter::{AdapterChain, SocketAdapter};
pub use error::Error;
pub use secure::SecureSocket;
pub use socket::{Listener, Socket, Transport};
