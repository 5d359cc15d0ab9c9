use super::util::{allocation_lifetime, build_msg, rand_seq};
use super::*;

use std::net::IpAddr;
use std::str::FromStr;

use stun::agent::TransactionId;
use stun::error_code::*;
use stun::message::{BINDING_REQUEST, CLASS_ERROR_RESPONSE, CLASS_SUCCESS_RESPONSE};
use stun::xoraddr::XorMappedAddress;
use tokio::net::UdpSocket;

use crate::auth::{generate_auth_key, AuthHandler};
use crate::proto::lifetime::{Lifetime, DEFAULT_LIFETIME};
use crate::relay::relay_static::RelayAddressGeneratorStatic;
use util::vnet::net::Net;

struct TestAuthHandler;
impl AuthHandler for TestAuthHandler {
    fn auth_handle(&self, username: &str, realm: &str, _src_addr: SocketAddr) -> Result<Vec<u8>> {
        Ok(generate_auth_key(username, realm, "pass"))
    }
}

#[test]
fn test_rand_seq_length_and_alphabet() {
    let s = rand_seq(16);
    assert_eq!(s.len(), 16);
    assert!(s.chars().all(|c| c.is_ascii_alphabetic()));
}

#[test]
fn test_build_nonce_is_unique_and_hex() {
    let a = build_nonce().unwrap();
    let b = build_nonce().unwrap();
    assert_ne!(a, b, "two nonces minted back-to-back should not collide");
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_allocation_lifetime_defaults_without_attribute() {
    let mut m = Message::new();
    m.build(&[Box::new(TransactionId::new()), Box::new(BINDING_REQUEST)])
        .unwrap();
    assert_eq!(allocation_lifetime(&m), DEFAULT_LIFETIME);
}

#[test]
fn test_allocation_lifetime_clamps_to_maximum() {
    let mut m = Message::new();
    m.build(&[
        Box::new(TransactionId::new()),
        Box::new(BINDING_REQUEST),
        Box::new(Lifetime(Duration::from_secs(7200))),
    ])
    .unwrap();
    // A requested lifetime at or above the 3600s ceiling falls back to the
    // default rather than being clamped down to the ceiling itself, per
    // `allocation_lifetime`'s `<` comparison.
    assert_eq!(allocation_lifetime(&m), DEFAULT_LIFETIME);
}

#[test]
fn test_allocation_lifetime_honors_requested_value_under_ceiling() {
    let mut m = Message::new();
    m.build(&[
        Box::new(TransactionId::new()),
        Box::new(BINDING_REQUEST),
        Box::new(Lifetime(Duration::from_secs(120))),
    ])
    .unwrap();
    assert_eq!(allocation_lifetime(&m), Duration::from_secs(120));
}

async fn new_test_server() -> Result<(Server, u16)> {
    let conn = Arc::new(UdpSocket::bind("0.0.0.0:0").await?);
    let server_port = conn.local_addr()?.port();

    let server = Server::new(ServerConfig {
        conn_configs: vec![ConnConfig {
            conn,
            relay_addr_generator: Box::new(RelayAddressGeneratorStatic {
                relay_address: IpAddr::from_str("127.0.0.1")?,
                address: "0.0.0.0".to_owned(),
                net: Arc::new(Net::new(None)),
            }),
        }],
        realm: "webrtc.rs".to_owned(),
        auth_handler: Arc::new(TestAuthHandler {}),
        channel_bind_timeout: Duration::from_secs(0),
    })
    .await?;

    Ok((server, server_port))
}

#[tokio::test]
async fn test_binding_request_needs_no_credentials() -> Result<()> {
    let (server, server_port) = new_test_server().await?;

    let client = UdpSocket::bind("0.0.0.0:0").await?;
    client
        .connect(format!("127.0.0.1:{server_port}"))
        .await?;

    let mut req = Message::new();
    req.build(&[Box::new(TransactionId::new()), Box::new(BINDING_REQUEST)])?;
    client.send(&req.raw).await?;

    let mut buf = [0u8; 1500];
    let n = client.recv(&mut buf).await?;
    let mut resp = Message {
        raw: buf[..n].to_vec(),
        ..Default::default()
    };
    resp.decode()?;

    assert_eq!(resp.typ.class, CLASS_SUCCESS_RESPONSE);
    assert_eq!(resp.transaction_id, req.transaction_id);

    let mut xor_addr = XorMappedAddress::default();
    xor_addr.get_from(&resp)?;
    assert_eq!(xor_addr.ip, client.local_addr()?.ip());
    assert_eq!(xor_addr.port, client.local_addr()?.port());

    server.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_allocate_without_credentials_is_challenged() -> Result<()> {
    let (server, server_port) = new_test_server().await?;

    let client = UdpSocket::bind("0.0.0.0:0").await?;
    client
        .connect(format!("127.0.0.1:{server_port}"))
        .await?;

    let mut req = Message::new();
    req.build(&[
        Box::new(TransactionId::new()),
        Box::new(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST)),
    ])?;
    client.send(&req.raw).await?;

    let mut buf = [0u8; 1500];
    let n = client.recv(&mut buf).await?;
    let mut resp = Message {
        raw: buf[..n].to_vec(),
        ..Default::default()
    };
    resp.decode()?;

    assert_eq!(resp.typ.class, CLASS_ERROR_RESPONSE);
    let mut code = ErrorCodeAttribute::default();
    code.get_from(&resp)?;
    assert_eq!(code.code, CODE_UNAUTHORIZED);

    server.close().await?;
    Ok(())
}
