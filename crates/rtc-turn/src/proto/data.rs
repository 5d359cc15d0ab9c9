#[cfg(test)]
mod data_test;

use stun::attributes::ATTR_DATA;
use stun::message::*;

/// `Data` is a DATA attribute payload.
///
/// The DATA attribute is present in all Send and Data indications. The
/// attribute contains the actual application data to be relayed.
///
/// https://tools.ietf.org/html/rfc5766#section-14.4
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct Data(pub Vec<u8>);

impl Setter for Data {
    fn add_to(&self, m: &mut Message) -> Result<(), stun::Error> {
        m.add(ATTR_DATA, &self.0);
        Ok(())
    }
}

impl Getter for Data {
    fn get_from(&mut self, m: &Message) -> Result<(), stun::Error> {
        let v = m.get(ATTR_DATA)?;
        self.0 = v.to_vec();
        Ok(())
    }
}
