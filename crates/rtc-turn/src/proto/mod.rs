
pub mod addr;
pub mod chandata;
pub mod channum;
pub mod connid;
pub mod data;
pub mod dontfrag;
pub mod evenport;
pub mod lifetime;
pub mod peeraddr;
pub mod relayaddr;
pub mod reqtrans;
pub mod rsrvtoken;

use std::fmt;

/// `Protocol` is IANA assigned protocol number.
#[derive(PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct Protocol(pub u8);

/// `PROTO_UDP` is the IANA assigned protocol number for UDP.
pub const PROTO_UDP: Protocol = Protocol(17);
/// `PROTO_TCP` is the IANA assigned protocol number for TCP.
pub const PROTO_TCP: Protocol = Protocol(6);

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            PROTO_UDP => "UDP".to_owned(),
            PROTO_TCP => "TCP".to_owned(),
            Protocol(other) => other.to_string(),
        };

        write!(f, "{s}")
    }
}
