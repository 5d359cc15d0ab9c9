use std::io::BufReader;

use super::*;
use stun::message::Message;

#[test]
fn test_even_port_round_trip() {
    let mut m = Message::new();
    let e = EvenPort { reserve_next: true };
    e.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = EvenPort::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got, e);
}

#[test]
fn test_even_port_not_reserved() {
    let mut m = Message::new();
    EvenPort::default().add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = EvenPort { reserve_next: true };
    got.get_from(&decoded).unwrap();
    assert!(!got.reserve_next);
}
