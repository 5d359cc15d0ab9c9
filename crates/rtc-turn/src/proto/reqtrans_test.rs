use std::io::BufReader;

use super::*;
use stun::message::Message;

#[test]
fn test_requested_transport_udp_round_trip() {
    let mut m = Message::new();
    let r = RequestedTransport { protocol: PROTO_UDP };
    r.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = RequestedTransport::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got, r);
    assert!(got.is_supported().is_ok());
}

#[test]
fn test_requested_transport_rejects_unknown() {
    let r = RequestedTransport { protocol: Protocol(1) };
    assert!(r.is_supported().is_err());
}
