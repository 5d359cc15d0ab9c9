#![warn(rust_2018_idioms)]

#[cfg(feature = "conn")]
pub mod conn;
pub mod error;
pub mod handle;
pub mod idler;
#[cfg(feature = "sync")]
pub mod sync;
pub mod timer;
#[cfg(feature = "vnet")]
pub mod vnet;

#[cfg(feature = "conn")]
pub use conn::Conn;
pub use error::Error;
pub use handle::{AsyncWake, Context, Handle};
