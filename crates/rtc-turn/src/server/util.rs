use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use md5::{Digest, Md5};
use stun::agent::TransactionId;
use stun::message::*;
use tokio::time::Duration;
use util::Conn;

use crate::error::*;
use crate::proto::lifetime::*;

/// RFC 5766 Section 6.2 recommends 3600 seconds as the maximum lifetime a
/// server should grant regardless of what the client requested.
pub(crate) const MAXIMUM_ALLOCATION_LIFETIME: Duration = Duration::from_secs(3600);
/// RFC 5766 Section 4: how long an issued nonce remains valid.
pub(crate) const NONCE_LIFETIME: Duration = Duration::from_secs(3600);

pub(crate) fn rand_seq(n: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut buf = vec![0u8; n];
    for b in &mut buf {
        *b = LETTERS[rand::random::<usize>() % LETTERS.len()];
    }
    String::from_utf8(buf).unwrap_or_default()
}

pub(crate) fn build_nonce() -> Result<String> {
    let mut h = String::new();
    h.push_str(
        &SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_nanos()
            .to_string(),
    );
    h.push_str(&rand::random::<u64>().to_string());

    let mut hasher = Md5::new();
    hasher.update(h.as_bytes());
    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

pub(crate) async fn build_and_send(
    conn: &Arc<dyn Conn + Send + Sync>,
    dst: SocketAddr,
    attrs: &[Box<dyn Setter>],
) -> Result<()> {
    let mut msg = Message::new();
    msg.build(attrs)?;
    let _ = conn.send_to(&msg.raw, dst).await?;
    Ok(())
}

/// Sends `attrs` (normally an error response) and then returns `err` to the
/// caller, so the dispatch loop logs the real reason even though the client
/// already got a STUN error.
pub(crate) async fn build_and_send_err(
    conn: &Arc<dyn Conn + Send + Sync>,
    dst: SocketAddr,
    err: Error,
    attrs: &[Box<dyn Setter>],
) -> Result<()> {
    if let Err(send_err) = build_and_send(conn, dst, attrs).await {
        Err(send_err)
    } else {
        Err(err)
    }
}

pub(crate) fn build_msg(
    transaction_id: TransactionId,
    msg_type: MessageType,
    mut additional: Vec<Box<dyn Setter>>,
) -> Vec<Box<dyn Setter>> {
    let mut attrs: Vec<Box<dyn Setter>> = vec![
        Box::new(Message {
            transaction_id,
            ..Default::default()
        }),
        Box::new(msg_type),
    ];
    attrs.append(&mut additional);
    attrs
}

/// Reads the client's requested LIFETIME, clamped to
/// [`MAXIMUM_ALLOCATION_LIFETIME`], or [`DEFAULT_LIFETIME`] if absent.
pub(crate) fn allocation_lifetime(m: &Message) -> Duration {
    let mut lifetime_duration = DEFAULT_LIFETIME;

    let mut lifetime = Lifetime::default();
    if lifetime.get_from(m).is_ok() && lifetime.0 < MAXIMUM_ALLOCATION_LIFETIME {
        lifetime_duration = lifetime.0;
    }

    lifetime_duration
}
