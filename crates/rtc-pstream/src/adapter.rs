use async_trait::async_trait;

use crate::error::Result;
use crate::packet::{Packet, PacketKind};

/// The three adapter roles a [`crate::stream::PacketStream`] orders: a
/// source only ever originates packets (via `PacketStream::write`), a
/// processor transforms them in place, a sink is terminal and never
/// returns a packet to continue downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterRole {
    Source,
    Processor,
    Sink,
}

/// A link in a [`crate::stream::PacketStream`]'s ordered adapter chain.
/// Processors run in ascending `order()`; equal orders run in the order
/// they were attached (a valid member of "unspecified" per the pipeline's
/// ordering contract).
#[async_trait]
pub trait StreamAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> AdapterRole;

    /// Lower values run earlier. Sources and sinks are exempt from
    /// ordering against each other (a source has nothing upstream, a sink
    /// nothing downstream) but still order among adapters of the same
    /// role.
    fn order(&self) -> i32 {
        0
    }

    /// Whether this adapter handles packets of `kind`. A processor that
    /// rejects a packet is skipped; if every processor rejects it and no
    /// sink accepts it, the stream reports `AdapterRejected`.
    fn accepts(&self, kind: &PacketKind) -> bool;

    /// Transforms (or consumes) one packet. Returning `Ok(None)` drops the
    /// packet for all adapters after this one; sinks always behave this
    /// way since they have no downstream.
    async fn process(&mut self, packet: Packet) -> Result<Option<Packet>>;
}
