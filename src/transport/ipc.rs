//! POSIX message queue transport (`ipc` kind, Linux only).
//!
//! Grounded on the teacher's `ipc/posix_message_queue.rs`: queue naming with a
//! leading `/`, `O_CREAT`-on-first-open with owner-only permissions, and
//! "only the creating side unlinks on close" cleanup discipline. Generalised
//! from the teacher's fixed client/server `_c2s`/`_s2c` queue pair to a single
//! named queue per `Endpoint` address, since this crate's `Endpoint` is
//! already single-direction (the teacher's bidirectional benchmark transport
//! had to fake two queues to get both directions out of one `IpcTransport`).

#![cfg(target_os = "linux")]

use async_trait::async_trait;
use nix::mqueue::{mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_unlink, MQ_OFlag, MqAttr, MqdT};
use nix::sys::stat::Mode;

use crate::transport::{Direction, Transport};

pub struct PosixMqTransport {
    name: String,
    mqd: Option<MqdT>,
    max_msg_size: usize,
    is_creator: bool,
}

fn normalize(address: &str) -> String {
    if address.starts_with('/') {
        address.to_string()
    } else {
        format!("/{address}")
    }
}

impl PosixMqTransport {
    pub fn open(direction: Direction, address: &str, max_msg_size: usize) -> anyhow::Result<Self> {
        let name = normalize(address);
        let oflag = match direction {
            Direction::Send => MQ_OFlag::O_WRONLY | MQ_OFlag::O_CREAT,
            Direction::Recv => MQ_OFlag::O_RDONLY | MQ_OFlag::O_CREAT,
        };
        let attr = MqAttr::new(0, 10, max_msg_size as i64, 0);
        let mqd = mq_open(name.as_str(), oflag, Mode::S_IRUSR | Mode::S_IWUSR, Some(&attr))
            .map_err(|e| anyhow::anyhow!("mq_open({name}) failed: {e}"))?;
        Ok(PosixMqTransport {
            name,
            mqd: Some(mqd),
            max_msg_size,
            // By convention the send-direction endpoint is considered the
            // owner responsible for unlinking the queue (the teacher applies
            // the analogous rule to whichever side issues O_CREAT as server).
            is_creator: matches!(direction, Direction::Send),
        })
    }
}

#[async_trait]
impl Transport for PosixMqTransport {
    async fn send(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        if bytes.len() > self.max_msg_size {
            anyhow::bail!(
                "message of {} bytes exceeds queue max_msg_size {}",
                bytes.len(),
                self.max_msg_size
            );
        }
        let mqd = self
            .mqd
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("queue {} already closed", self.name))?;
        mq_send(mqd, bytes, 0).map_err(|e| anyhow::anyhow!("mq_send({}) failed: {e}", self.name))
    }

    async fn recv(&mut self) -> anyhow::Result<Vec<u8>> {
        let mqd = self
            .mqd
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("queue {} already closed", self.name))?;
        let mut buf = vec![0u8; self.max_msg_size];
        let len = mq_receive(mqd, &mut buf, &mut 0)
            .map_err(|e| anyhow::anyhow!("mq_receive({}) failed: {e}", self.name))?;
        buf.truncate(len);
        Ok(buf)
    }

    async fn nmsg(&self) -> anyhow::Result<i64> {
        let mqd = self
            .mqd
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("queue {} already closed", self.name))?;
        let attr = mq_getattr(mqd).map_err(|e| anyhow::anyhow!("mq_getattr({}) failed: {e}", self.name))?;
        Ok(attr.curmsgs())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mqd) = self.mqd.take() {
            let _ = mq_close(mqd);
        }
        if self.is_creator {
            let _ = mq_unlink(self.name.as_str());
        }
        Ok(())
    }

    fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }
}
