use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::*;

struct CountingProcessor {
    name: String,
    order: i32,
    seen: Arc<AtomicUsize>,
}

#[async_trait]
impl StreamAdapter for CountingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AdapterRole {
        AdapterRole::Processor
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn accepts(&self, kind: &PacketKind) -> bool {
        *kind == PacketKind::Media
    }

    async fn process(&mut self, packet: Packet) -> Result<Option<Packet>> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(Some(packet))
    }
}

struct RejectingSink;

#[async_trait]
impl StreamAdapter for RejectingSink {
    fn name(&self) -> &str {
        "sink"
    }

    fn role(&self) -> AdapterRole {
        AdapterRole::Sink
    }

    fn order(&self) -> i32 {
        100
    }

    fn accepts(&self, kind: &PacketKind) -> bool {
        *kind == PacketKind::Control
    }

    async fn process(&mut self, _packet: Packet) -> Result<Option<Packet>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_packets_entering_stopped_stream_are_dropped() {
    let stream = PacketStream::new();
    let err = stream
        .write(Packet::new(PacketKind::Media, vec![1], Duration::from_secs(0)))
        .await
        .unwrap_err();
    assert_eq!(err, Error::ErrSourceStopped);
}

#[tokio::test]
async fn test_processors_run_in_ascending_priority_order() {
    let stream = PacketStream::new();
    let seen = Arc::new(AtomicUsize::new(0));

    stream
        .attach(Box::new(CountingProcessor {
            name: "first".to_owned(),
            order: 1,
            seen: Arc::clone(&seen),
        }))
        .await;
    stream
        .attach(Box::new(CountingProcessor {
            name: "second".to_owned(),
            order: 2,
            seen: Arc::clone(&seen),
        }))
        .await;

    stream.start().await.unwrap();
    stream
        .write(Packet::new(PacketKind::Media, vec![1, 2, 3], Duration::from_secs(0)))
        .await
        .unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unaccepted_packet_is_rejected() {
    let stream = PacketStream::new();
    stream.attach(Box::new(RejectingSink)).await;
    stream.start().await.unwrap();

    let err = stream
        .write(Packet::new(PacketKind::Media, vec![9], Duration::from_secs(0)))
        .await
        .unwrap_err();
    assert_eq!(err, Error::ErrAdapterRejected);
}

#[tokio::test]
async fn test_reset_keeps_adapters_but_clears_base_time() {
    let stream = PacketStream::new();
    let seen = Arc::new(AtomicUsize::new(0));
    stream
        .attach(Box::new(CountingProcessor {
            name: "p".to_owned(),
            order: 0,
            seen: Arc::clone(&seen),
        }))
        .await;
    stream.start().await.unwrap();

    stream
        .write(Packet::new(PacketKind::Media, vec![1], Duration::from_secs(1)))
        .await
        .unwrap();

    stream.reset().await.unwrap();
    assert_eq!(stream.state().await, State::Active);
    assert_eq!(stream.count(AdapterRole::Processor).await, 1);

    stream
        .write(Packet::new(PacketKind::Media, vec![2], Duration::from_secs(0)))
        .await
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_double_close_is_idempotent() {
    let stream = PacketStream::new();
    stream.start().await.unwrap();
    stream.close().await.unwrap();
    stream.close().await.unwrap();
    assert_eq!(stream.state().await, State::Closed);
}

#[tokio::test]
async fn test_detach_schedules_deferred_drop_and_does_not_panic_mid_dispatch() {
    let stream = PacketStream::new();
    let seen = Arc::new(AtomicUsize::new(0));
    stream
        .attach(Box::new(CountingProcessor {
            name: "p".to_owned(),
            order: 0,
            seen: Arc::clone(&seen),
        }))
        .await;
    stream.start().await.unwrap();
    stream.detach("p").await.unwrap();
    assert_eq!(stream.count(AdapterRole::Processor).await, 0);

    let err = stream
        .write(Packet::new(PacketKind::Media, vec![1], Duration::from_secs(0)))
        .await
        .unwrap_err();
    assert_eq!(err, Error::ErrAdapterRejected);
}
