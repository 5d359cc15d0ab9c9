use std::io::BufReader;

use super::*;
use stun::message::Message;

#[test]
fn test_reservation_token_round_trip() {
    let mut m = Message::new();
    let t = ReservationToken(vec![1, 2, 3, 4, 5, 6, 7, 8]);
    t.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = ReservationToken::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got, t);
}

#[test]
fn test_reservation_token_bad_length() {
    let mut m = Message::new();
    m.add(stun::attributes::ATTR_RESERVATION_TOKEN, &[1, 2, 3]);
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = ReservationToken::default();
    assert!(got.get_from(&decoded).is_err());
}
