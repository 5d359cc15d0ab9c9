use super::*;

#[test]
fn test_parses_a_handshake_response_body() {
    let info = parse_handshake("4d4f185e96a7b:60:60:websocket,xhr-polling").unwrap();
    assert_eq!(info.session_id, "4d4f185e96a7b");
    assert_eq!(info.ping_interval, Duration::from_millis(60));
    assert_eq!(info.ping_timeout, Duration::from_millis(60));
    assert_eq!(info.transports, vec!["websocket", "xhr-polling"]);
}

#[test]
fn test_rejects_an_empty_session_id() {
    assert!(parse_handshake(":60:60:websocket").is_err());
}

#[test]
fn test_defaults_transports_to_websocket_when_absent() {
    let info = parse_handshake("abc:10:10").unwrap();
    assert_eq!(info.transports, vec!["websocket"]);
}
