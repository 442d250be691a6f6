//! In-process channel transport: the literal `rpc` leaf kind (§2), and the
//! carrier `framing.rs` reaches for when a multipart/RPC-reply ephemeral
//! endpoint is opened on a primary endpoint whose own kind is itself `rpc`.
//!
//! Grounded on the teacher's `unix_domain_socket.rs` multi-client accept loop,
//! which forwards `(ConnectionId, Message)` pairs to callers over a
//! `tokio::sync::mpsc::channel` — the same bounded-channel-as-transport
//! pattern, collapsed here to a single address-keyed channel rather than a
//! per-connection fan-in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::transport::{Direction, Transport};

const CHANNEL_CAPACITY: usize = 256;

struct ChannelEntry {
    sender: mpsc::Sender<Vec<u8>>,
    receiver: Option<mpsc::Receiver<Vec<u8>>>,
    pending: Arc<AtomicI64>,
}

static CHANNELS: OnceLock<StdMutex<HashMap<String, ChannelEntry>>> = OnceLock::new();

fn registry() -> &'static StdMutex<HashMap<String, ChannelEntry>> {
    CHANNELS.get_or_init(|| StdMutex::new(HashMap::new()))
}

fn get_or_create(address: &str) -> (mpsc::Sender<Vec<u8>>, Arc<AtomicI64>) {
    let mut map = registry().lock().unwrap();
    let entry = map.entry(address.to_string()).or_insert_with(|| {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        ChannelEntry {
            sender: tx,
            receiver: Some(rx),
            pending: Arc::new(AtomicI64::new(0)),
        }
    });
    (entry.sender.clone(), entry.pending.clone())
}

fn take_receiver(address: &str) -> Option<(mpsc::Receiver<Vec<u8>>, Arc<AtomicI64>)> {
    let mut map = registry().lock().unwrap();
    let entry = map.entry(address.to_string()).or_insert_with(|| {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        ChannelEntry {
            sender: tx,
            receiver: Some(rx),
            pending: Arc::new(AtomicI64::new(0)),
        }
    });
    entry.receiver.take().map(|rx| (rx, entry.pending.clone()))
}

/// Frees the channel's slot once both ends are known gone. Best-effort: a
/// send-direction endpoint just drops its `Sender` clone.
fn forget(address: &str) {
    let mut map = registry().lock().unwrap();
    map.remove(address);
}

pub struct RpcChannelTransport {
    direction: Direction,
    address: String,
    max_msg_size: usize,
    sender: Option<mpsc::Sender<Vec<u8>>>,
    receiver: Option<mpsc::Receiver<Vec<u8>>>,
    pending: Arc<AtomicI64>,
}

impl RpcChannelTransport {
    pub fn open(direction: Direction, address: &str, max_msg_size: usize) -> anyhow::Result<Self> {
        match direction {
            Direction::Send => {
                let (sender, pending) = get_or_create(address);
                Ok(RpcChannelTransport {
                    direction,
                    address: address.to_string(),
                    max_msg_size,
                    sender: Some(sender),
                    receiver: None,
                    pending,
                })
            }
            Direction::Recv => {
                let (receiver, pending) = take_receiver(address).ok_or_else(|| {
                    anyhow::anyhow!("rpc channel {address} already has a receiver attached")
                })?;
                Ok(RpcChannelTransport {
                    direction,
                    address: address.to_string(),
                    max_msg_size,
                    sender: None,
                    receiver: Some(receiver),
                    pending,
                })
            }
        }
    }
}

#[async_trait]
impl Transport for RpcChannelTransport {
    async fn send(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("rpc channel {} is recv-only", self.address))?;
        sender
            .send(bytes.to_vec())
            .await
            .map_err(|e| anyhow::anyhow!("rpc channel {} closed: {e}", self.address))?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<Vec<u8>> {
        let receiver = self
            .receiver
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("rpc channel {} is send-only", self.address))?;
        let bytes = receiver
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("rpc channel {} closed", self.address))?;
        self.pending.fetch_sub(1, Ordering::AcqRel);
        Ok(bytes)
    }

    async fn nmsg(&self) -> anyhow::Result<i64> {
        Ok(self.pending.load(Ordering::Acquire).max(0))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        match self.direction {
            Direction::Send => {
                self.sender = None;
            }
            Direction::Recv => {
                self.receiver = None;
                forget(&self.address);
            }
        }
        Ok(())
    }

    fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_then_recv_round_trips() {
        let addr = format!("test-{}", uuid::Uuid::new_v4());
        let mut tx = RpcChannelTransport::open(Direction::Send, &addr, 4096).unwrap();
        let mut rx = RpcChannelTransport::open(Direction::Recv, &addr, 4096).unwrap();

        tx.send(b"hello").await.unwrap();
        assert_eq!(tx.nmsg().await.unwrap(), 1);
        let got = rx.recv().await.unwrap();
        assert_eq!(got, b"hello");
        assert_eq!(tx.nmsg().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_receiver_attach_fails() {
        let addr = format!("test-{}", uuid::Uuid::new_v4());
        let _rx = RpcChannelTransport::open(Direction::Recv, &addr, 4096).unwrap();
        assert!(RpcChannelTransport::open(Direction::Recv, &addr, 4096).is_err());
    }
}
