#[cfg(test)]
mod connid_test;

use std::fmt;

use stun::attributes::ATTR_CONNECTION_ID;
use stun::message::*;

const CONNECTION_ID_SIZE: usize = 4;

/// `ConnectionId` is a CONNECTION-ID attribute, used by the RFC 6062 TCP
/// extension to pair a `Connect` response with the `ConnectionBind` request
/// made on the second, data-carrying connection.
///
/// https://tools.ietf.org/html/rfc6062#section-6.2.1
#[derive(PartialEq, Eq, Hash, Debug, Default, Copy, Clone)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Setter for ConnectionId {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        m.add(ATTR_CONNECTION_ID, &self.0.to_be_bytes());
        Ok(())
    }
}

impl Getter for ConnectionId {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_CONNECTION_ID)?;
        if v.len() < CONNECTION_ID_SIZE {
            return Err(stun::Error::ErrUnexpectedEof);
        }
        self.0 = u32::from_be_bytes([v[0], v[1], v[2], v[3]]);
        Ok(())
    }
}
