use super::*;

#[test]
fn test_channel_data_round_trip() {
    let mut cd = ChannelData {
        data: b"helloworld".to_vec(),
        number: ChannelNumber(MIN_CHANNEL_NUMBER),
        raw: vec![],
    };
    cd.encode();
    assert_eq!(cd.raw.len() % 4, 0, "raw must be 4-byte aligned");

    let mut decoded = ChannelData {
        raw: cd.raw.clone(),
        ..Default::default()
    };
    decoded.decode().unwrap();

    assert_eq!(decoded.number, cd.number);
    assert_eq!(decoded.data, cd.data);
}

#[test]
fn test_is_channel_data() {
    let mut cd = ChannelData {
        data: b"x".to_vec(),
        number: ChannelNumber(MIN_CHANNEL_NUMBER),
        raw: vec![],
    };
    cd.encode();
    assert!(is_channel_data(&cd.raw));

    let stun_like = [0u8, 1, 0, 0];
    assert!(!is_channel_data(&stun_like));
}

#[test]
fn test_channel_data_short_buffer_errors() {
    let mut cd = ChannelData {
        raw: vec![0x40, 0x00],
        ..Default::default()
    };
    assert!(cd.decode().is_err());
}
