use std::fmt;
use std::time::Duration;

/// A coarse type tag an adapter's `accepts()` matches against. Concrete
/// codecs (video/audio encoders, network sockets) define their own kinds;
/// the pipeline itself only needs equality and a stable debug form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Raw bytes with no further structure (e.g. a socket's inbound read).
    Raw,
    /// An encoded media frame ready for muxing or network transmission.
    Media,
    /// A control/metadata packet (e.g. keyframe requests, RTCP-like
    /// feedback) that processors may special-case.
    Control,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PacketKind::Raw => "raw",
            PacketKind::Media => "media",
            PacketKind::Control => "control",
        };
        write!(f, "{s}")
    }
}

/// One unit of data moving through a [`crate::stream::PacketStream`].
/// Sources emit these, processors transform them in place or replace them,
/// and sinks consume them.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub data: Vec<u8>,
    /// Presentation timestamp, relative to the stream's last `reset()`.
    pub time: Duration,
}

impl Packet {
    pub fn new(kind: PacketKind, data: Vec<u8>, time: Duration) -> Self {
        Packet { kind, data, time }
    }
}
