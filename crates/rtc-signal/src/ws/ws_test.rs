use base64::Engine;

use super::*;
use crate::ws::handshake::{accept_key, generate_key, verify_accept};

#[test]
fn test_round_trips_a_text_frame() {
    let frame = Frame::text("hello world");
    let encoded = encode_frame(&frame, true);
    let (decoded, consumed) = decode_frame(&encoded, true).unwrap().unwrap();
    assert_eq!(consumed, encoded.len());
    assert_eq!(decoded.opcode, Opcode::Text);
    assert_eq!(decoded.payload, b"hello world");
    assert!(decoded.fin);
}

#[test]
fn test_round_trips_an_unmasked_server_frame() {
    let frame = Frame::binary(vec![1, 2, 3, 4, 5]);
    let encoded = encode_frame(&frame, false);
    let (decoded, _) = decode_frame(&encoded, false).unwrap().unwrap();
    assert_eq!(decoded.payload, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_round_trips_a_large_payload_using_64_bit_length() {
    let payload = vec![0xABu8; 70_000];
    let frame = Frame::binary(payload.clone());
    let encoded = encode_frame(&frame, true);
    assert_eq!(encoded[1] & 0x7F, 127);
    let (decoded, consumed) = decode_frame(&encoded, true).unwrap().unwrap();
    assert_eq!(consumed, encoded.len());
    assert_eq!(decoded.payload, payload);
}

#[test]
fn test_incomplete_frame_returns_none_without_erroring() {
    let frame = Frame::text("partial");
    let encoded = encode_frame(&frame, true);
    let truncated = &encoded[..encoded.len() - 2];
    assert!(decode_frame(truncated, true).unwrap().is_none());
}

#[test]
fn test_rejects_a_client_frame_with_no_mask_bit() {
    let frame = Frame::text("no mask");
    let encoded = encode_frame(&frame, false);
    assert!(decode_frame(&encoded, true).is_err());
}

#[test]
fn test_control_frames_are_marked_control() {
    assert!(Opcode::Close.is_control());
    assert!(Opcode::Ping.is_control());
    assert!(Opcode::Pong.is_control());
    assert!(!Opcode::Text.is_control());
}

#[test]
fn test_handshake_accept_key_matches_rfc6455_example() {
    // The worked example from RFC 6455 Section 1.3.
    let key = "dGhlIHNhbXBsZSBub25jZQ==";
    let expected = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";
    assert_eq!(accept_key(key), expected);
    assert!(verify_accept(key, expected));
    assert!(!verify_accept(key, "wrong"));
}

#[test]
fn test_generated_keys_are_sixteen_bytes_base64_encoded() {
    let key = generate_key();
    let decoded = base64::prelude::BASE64_STANDARD.decode(key).unwrap();
    assert_eq!(decoded.len(), 16);
}
