use std::io::BufReader;
use std::net::Ipv4Addr;

use super::*;
use stun::message::Message;

#[test]
fn test_relayed_address_round_trip() {
    let mut m = Message::new();
    let a = RelayedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5)),
        port: 50000,
    };
    a.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = RelayedAddress::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got, a);
}
