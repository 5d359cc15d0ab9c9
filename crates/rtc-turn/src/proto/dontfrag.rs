#[cfg(test)]
mod dontfrag_test;

use stun::attributes::ATTR_DONT_FRAGMENT;
use stun::message::*;

/// `DontFragmentAttr` represents the DONT-FRAGMENT attribute.
///
/// This is a flag attribute with no value; its presence is the signal.
///
/// https://tools.ietf.org/html/rfc5766#section-14.8
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DontFragmentAttr;

impl Setter for DontFragmentAttr {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        m.add(ATTR_DONT_FRAGMENT, &[]);
        Ok(())
    }
}

impl Getter for DontFragmentAttr {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let _ = m.get(ATTR_DONT_FRAGMENT)?;
        Ok(())
    }
}
