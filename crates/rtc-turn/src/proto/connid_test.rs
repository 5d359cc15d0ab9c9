use std::io::BufReader;

use super::*;
use stun::message::Message;

#[test]
fn test_connection_id_round_trip() {
    let mut m = Message::new();
    let c = ConnectionId(77);
    c.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = ConnectionId::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got, c);
}
