#![warn(rust_2018_idioms)]

pub mod adapter;
pub mod error;
pub mod packet;
pub mod stream;

pub use adapter::{AdapterRole, StreamAdapter};
pub use error::Error;
pub use packet::{Packet, PacketKind};
pub use stream::{PacketStream, State};
