#[cfg(test)]
mod reqtrans_test;

use stun::attributes::ATTR_REQUESTED_TRANSPORT;
use stun::message::*;

use crate::error::*;

use super::{PROTO_TCP, PROTO_UDP, Protocol};

const REQUESTED_TRANSPORT_SIZE: usize = 4;

/// `RequestedTransport` is a REQUESTED-TRANSPORT attribute.
///
/// This attribute is used by the client to request a specific transport
/// protocol for the allocated transport address. RFC 5766 only allows
/// `PROTO_UDP`; the RFC 6062 TCP extension additionally allows `PROTO_TCP`.
///
/// https://tools.ietf.org/html/rfc5766#section-14.7
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
pub struct RequestedTransport {
    pub protocol: Protocol,
}

impl Setter for RequestedTransport {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        let mut v = vec![0; REQUESTED_TRANSPORT_SIZE];
        v[0] = self.protocol.0;
        // v[1..4] are RFFU and must be zero.
        m.add(ATTR_REQUESTED_TRANSPORT, &v);
        Ok(())
    }
}

impl Getter for RequestedTransport {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_REQUESTED_TRANSPORT)?;
        if v.is_empty() {
            return Err(stun::Error::ErrUnexpectedEof);
        }
        self.protocol = Protocol(v[0]);
        Ok(())
    }
}

impl RequestedTransport {
    /// Returns `Ok` if the requested protocol is one this implementation
    /// can allocate (`UDP` always, `TCP` for RFC 6062 allocations).
    pub fn is_supported(&self) -> Result<()> {
        if self.protocol == PROTO_UDP || self.protocol == PROTO_TCP {
            Ok(())
        } else {
            Err(Error::ErrUnsupportedTransportProtocol)
        }
    }
}
