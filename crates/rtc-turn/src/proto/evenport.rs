#[cfg(test)]
mod evenport_test;

use stun::attributes::ATTR_EVEN_PORT;
use stun::message::*;

const RESERVE_NEXT_BIT: u8 = 0x80;

/// `EvenPort` is an EVEN-PORT attribute, requesting that the relayed
/// transport address have an even port number, optionally with a
/// reservation of the next-higher port for a second allocation.
///
/// https://tools.ietf.org/html/rfc5766#section-14.6
#[derive(PartialEq, Eq, Debug, Default, Copy, Clone)]
pub struct EvenPort {
    pub reserve_next: bool,
}

impl Setter for EvenPort {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        let b = if self.reserve_next { RESERVE_NEXT_BIT } else { 0 };
        m.add(ATTR_EVEN_PORT, &[b]);
        Ok(())
    }
}

impl Getter for EvenPort {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_EVEN_PORT)?;
        if v.is_empty() {
            return Err(stun::Error::ErrUnexpectedEof);
        }
        self.reserve_next = v[0] & RESERVE_NEXT_BIT != 0;
        Ok(())
    }
}
