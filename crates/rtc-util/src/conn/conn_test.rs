use tokio::net::UdpSocket;

use super::*;

#[tokio::test]
async fn test_udp_conn_send_recv() -> Result<()> {
    let a = UdpConn::new(UdpSocket::bind("127.0.0.1:0").await?);
    let b = UdpConn::new(UdpSocket::bind("127.0.0.1:0").await?);

    let b_addr = b.local_addr().await?;
    let n = a.send_to(b"hello", b_addr).await?;
    assert_eq!(n, 5);

    let mut buf = [0u8; 32];
    let (n, from) = b.recv_from(&mut buf).await?;
    assert_eq!(&buf[..n], b"hello");
    assert_eq!(from, a.local_addr().await?);

    Ok(())
}

#[tokio::test]
async fn test_udp_conn_connect_then_send() -> Result<()> {
    let a = UdpConn::new(UdpSocket::bind("127.0.0.1:0").await?);
    let b = UdpConn::new(UdpSocket::bind("127.0.0.1:0").await?);
    let b_addr = b.local_addr().await?;

    a.connect(b_addr).await?;
    assert_eq!(a.remote_addr().await, Some(b_addr));

    a.send(b"ping").await?;
    let mut buf = [0u8; 32];
    let (n, _) = b.recv_from(&mut buf).await?;
    assert_eq!(&buf[..n], b"ping");

    Ok(())
}

#[tokio::test]
async fn test_udp_conn_closed_rejects_io() -> Result<()> {
    let a = UdpConn::new(UdpSocket::bind("127.0.0.1:0").await?);
    a.close().await?;

    let err = a.send(b"x").await.unwrap_err();
    assert_eq!(err, Error::ErrClosed);

    Ok(())
}
