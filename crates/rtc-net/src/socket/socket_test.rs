use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;

use super::*;
use crate::adapter::SocketAdapter;

struct UppercaseAdapter;

#[async_trait]
impl SocketAdapter for UppercaseAdapter {
    fn name(&self) -> &str {
        "uppercase"
    }

    async fn on_send(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_ascii_uppercase())
    }

    async fn on_recv(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(Some(data.to_ascii_lowercase()))
    }
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)
}

#[tokio::test]
async fn test_udp_send_recv_round_trip_through_adapter() {
    let server = Socket::bind_udp(loopback(0)).await.unwrap();
    let server_addr = server.local_addr().await.unwrap();

    let client = Socket::bind_udp(loopback(0)).await.unwrap();
    client.adapters().push(Arc::new(UppercaseAdapter)).await;

    client.send(b"ping", Some(server_addr)).await.unwrap();

    let mut buf = vec![0u8; 64];
    let (data, _from) = server.recv(&mut buf).await.unwrap().unwrap();
    assert_eq!(data, b"PING");
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let socket = Socket::bind_udp(loopback(0)).await.unwrap();
    socket.close().await.unwrap();
    socket.close().await.unwrap();
    assert!(socket.is_closed());

    let err = socket.send(b"x", None).await.unwrap_err();
    matches!(err, Error::ErrClosed);
}

#[tokio::test]
async fn test_tcp_listen_accept_emits_socket_per_connection() {
    let listener = Listener::bind(loopback(0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let accept_task = tokio::spawn(async move { listener.accept().await });
    let client = Socket::connect_tcp(addr).await.unwrap();
    let server_side = accept_task.await.unwrap().unwrap();

    assert_eq!(server_side.transport(), Transport::Tcp);
    assert_eq!(client.transport(), Transport::Tcp);
}

#[tokio::test]
async fn test_adapter_replace_schedules_deferred_drop() {
    let socket = Socket::bind_udp(loopback(0)).await.unwrap();
    socket.adapters().push(Arc::new(UppercaseAdapter)).await;
    assert_eq!(socket.adapters().len().await, 1);

    socket
        .adapters()
        .replace("uppercase", Arc::new(UppercaseAdapter))
        .await
        .unwrap();
    assert_eq!(socket.adapters().len().await, 1);

    let err = socket
        .adapters()
        .replace("missing", Arc::new(UppercaseAdapter))
        .await
        .unwrap_err();
    matches!(err, Error::ErrAdapterNotFound(_));
}
