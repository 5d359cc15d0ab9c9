use std::io::BufReader;

use super::*;
use stun::message::Message;

#[test]
fn test_dont_fragment_round_trip() {
    let mut m = Message::new();
    DontFragmentAttr.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = DontFragmentAttr;
    assert!(got.get_from(&decoded).is_ok());
}
