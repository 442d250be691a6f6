//! ZeroMQ transport (`zmq` kind) using a PUSH/PULL pair: the recv-direction
//! endpoint binds, the send-direction endpoint connects, mirroring the usual
//! ZeroMQ "stable side binds" convention.
//!
//! Grounded on `examples/other_examples/.../lnp-transport-mod.rs.rs`'s
//! `zmqsocket` module (a `#[cfg(feature = "zmq")]` transport built directly
//! on the `zmq` crate), which is the only ZeroMQ usage anywhere in the
//! retrieval pack; the teacher itself has no ZeroMQ driver.

use async_trait::async_trait;

use crate::transport::{Direction, Transport};

pub struct ZmqTransport {
    address: String,
    socket: zmq::Socket,
    max_msg_size: usize,
}

fn to_endpoint(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("ipc://{address}")
    }
}

impl ZmqTransport {
    pub fn open(direction: Direction, address: &str, max_msg_size: usize) -> anyhow::Result<Self> {
        let ctx = zmq::Context::new();
        let endpoint = to_endpoint(address);
        let socket = match direction {
            Direction::Send => {
                let socket = ctx.socket(zmq::PUSH)?;
                socket.connect(&endpoint)?;
                socket
            }
            Direction::Recv => {
                let socket = ctx.socket(zmq::PULL)?;
                socket.bind(&endpoint)?;
                socket
            }
        };
        Ok(ZmqTransport {
            address: endpoint,
            socket,
            max_msg_size,
        })
    }
}

#[async_trait]
impl Transport for ZmqTransport {
    async fn send(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.socket
            .send(bytes, 0)
            .map_err(|e| anyhow::anyhow!("zmq send on {} failed: {e}", self.address))
    }

    async fn recv(&mut self) -> anyhow::Result<Vec<u8>> {
        self.socket
            .recv_bytes(0)
            .map_err(|e| anyhow::anyhow!("zmq recv on {} failed: {e}", self.address))
    }

    async fn nmsg(&self) -> anyhow::Result<i64> {
        let events = self
            .socket
            .get_events()
            .map_err(|e| anyhow::anyhow!("zmq getsockopt(EVENTS) on {} failed: {e}", self.address))?;
        Ok(if events.contains(zmq::POLLIN) { 1 } else { 0 })
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        // `zmq::Socket` closes its underlying fd on drop; nothing additional
        // to release here (no unlink step, unlike a POSIX queue or UDS path).
        Ok(())
    }

    fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }
}
