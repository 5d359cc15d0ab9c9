use std::io::BufReader;

use super::*;
use stun::message::Message;

#[test]
fn test_data_add_to() {
    let mut m = Message::new();
    let d = Data(b"helloworld".to_vec());
    d.add_to(&mut m).unwrap();
    m.write_header();

    let mut decoded = Message::new();
    let mut reader = BufReader::new(m.raw.as_slice());
    decoded.read_from(&mut reader).unwrap();

    let mut got = Data::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got, d);
}
