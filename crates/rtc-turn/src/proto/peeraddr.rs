#[cfg(test)]
mod peeraddr_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use stun::attributes::ATTR_XOR_PEER_ADDRESS;
use stun::message::*;
use stun::xoraddr::XorMappedAddress;

/// `PeerAddress` is an XOR-PEER-ADDRESS attribute.
///
/// The XOR-PEER-ADDRESS attribute specifies the address and port of the
/// peer as seen from the TURN server.
///
/// https://tools.ietf.org/html/rfc5766#section-14.3
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct PeerAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for PeerAddress {
    fn default() -> Self {
        PeerAddress {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl Setter for PeerAddress {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        let addr = XorMappedAddress {
            ip: self.ip,
            port: self.port,
        };
        addr.add_to_as(m, ATTR_XOR_PEER_ADDRESS)
    }
}

impl Getter for PeerAddress {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let mut addr = XorMappedAddress::default();
        addr.get_from_as(m, ATTR_XOR_PEER_ADDRESS)?;
        self.ip = addr.ip;
        self.port = addr.port;
        Ok(())
    }
}
