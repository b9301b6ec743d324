use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::ports::{RawSignalRecord, SignalSource, Tick, TickSource};

/// Tokio-channel-backed `SignalSource`. Production wiring pushes records into
/// the sender half from whatever transport actually carries them (Kafka,
/// Redis Streams, a websocket); this type only owns the receiving half and
/// the ack bookkeeping.
pub struct ChannelSignalSource {
    receiver: mpsc::Receiver<RawSignalRecord>,
}

impl ChannelSignalSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<RawSignalRecord>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { receiver: rx })
    }
}

#[async_trait]
impl SignalSource for ChannelSignalSource {
    async fn recv(&mut self) -> Option<RawSignalRecord> {
        self.receiver.recv().await
    }

    async fn ack(&mut self, record: &RawSignalRecord) {
        debug!(offset = ?record.partition_offset, "signal record acked");
    }
}

/// Tokio-channel-backed `TickSource`, same shape as `ChannelSignalSource`.
pub struct ChannelTickSource {
    receiver: mpsc::Receiver<Tick>,
}

impl ChannelTickSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<Tick>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { receiver: rx })
    }
}

#[async_trait]
impl TickSource for ChannelTickSource {
    async fn recv(&mut self) -> Option<Tick> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_sent_records_in_order() {
        let (tx, mut source) = ChannelSignalSource::new(4);
        tx.send(RawSignalRecord { payload: vec![1], partition_offset: Some(0) }).await.unwrap();
        tx.send(RawSignalRecord { payload: vec![2], partition_offset: Some(1) }).await.unwrap();
        drop(tx);

        let first = source.recv().await.unwrap();
        assert_eq!(first.payload, vec![1]);
        let second = source.recv().await.unwrap();
        assert_eq!(second.payload, vec![2]);
        assert!(source.recv().await.is_none());
    }
}
