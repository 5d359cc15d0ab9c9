#[cfg(test)]
mod lifetime_test;

use std::time::Duration;

use stun::attributes::ATTR_LIFETIME;
use stun::message::*;

/// `DEFAULT_LIFETIME` is the lifetime assigned to an allocation that did not
/// request a specific one, and is also the RFC 5766 Section 6.2 default.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// `MAX_LIFETIME` is the largest lifetime a server grants an allocation,
/// regardless of what the client requested.
pub const MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);

const LIFETIME_SIZE: usize = 4; // 32 bit

/// `Lifetime` is a LIFETIME attribute, in seconds.
///
/// https://tools.ietf.org/html/rfc5766#section-14.2
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct Lifetime(pub Duration);

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime(DEFAULT_LIFETIME)
    }
}

impl Setter for Lifetime {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        let secs = self.0.as_secs() as u32;
        m.add(ATTR_LIFETIME, &secs.to_be_bytes());
        Ok(())
    }
}

impl Getter for Lifetime {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_LIFETIME)?;
        if v.len() < LIFETIME_SIZE {
            return Err(stun::Error::ErrUnexpectedEof);
        }
        let secs = u32::from_be_bytes([v[0], v[1], v[2], v[3]]);
        self.0 = Duration::from_secs(secs as u64);
        Ok(())
    }
}
