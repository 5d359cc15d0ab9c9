use std::io::BufReader;

use super::*;
use stun::message::Message;

#[test]
fn test_channel_number_add_to() {
    let mut m = Message::new();
    let c = ChannelNumber(MIN_CHANNEL_NUMBER);
    c.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = ChannelNumber::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got, c);
}

#[test]
fn test_channel_number_valid_range() {
    assert!(ChannelNumber(MIN_CHANNEL_NUMBER).is_valid().is_ok());
    assert!(ChannelNumber(MAX_CHANNEL_NUMBER).is_valid().is_ok());
    assert!(ChannelNumber(MIN_CHANNEL_NUMBER - 1).is_valid().is_err());
    assert!(ChannelNumber(MAX_CHANNEL_NUMBER + 1).is_valid().is_err());
}
