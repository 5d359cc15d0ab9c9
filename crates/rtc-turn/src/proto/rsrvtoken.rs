#[cfg(test)]
mod rsrvtoken_test;

use stun::attributes::ATTR_RESERVATION_TOKEN;
use stun::message::*;

pub(crate) const RESERVATION_TOKEN_SIZE: usize = 8;

/// `ReservationToken` is a RESERVATION-TOKEN attribute, returned by an
/// Allocate response that reserved a second relayed port (via EVEN-PORT's
/// reserve-next flag) for a subsequent allocation to claim.
///
/// https://tools.ietf.org/html/rfc5766#section-14.9
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct ReservationToken(pub Vec<u8>);

impl Setter for ReservationToken {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        m.add(ATTR_RESERVATION_TOKEN, &self.0);
        Ok(())
    }
}

impl Getter for ReservationToken {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_RESERVATION_TOKEN)?;
        if v.len() != RESERVATION_TOKEN_SIZE {
            return Err(stun::Error::ErrUnexpectedEof);
        }
        self.0 = v.to_vec();
        Ok(())
    }
}
