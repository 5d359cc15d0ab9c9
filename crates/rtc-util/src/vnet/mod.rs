//! Minimal network-access indirection used by relay address generators and
//! other callers that need to create sockets without depending on
//! `tokio::net` directly.
//!
//! The upstream `webrtc-rs` `vnet` crate additionally provides a simulated
//! router/NIC stack for deterministic network-condition testing. Nothing in
//! this workspace exercises simulated network conditions, so only the
//! "native" mode (real OS sockets) is carried over here.

pub mod net;
