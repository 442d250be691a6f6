//! Tabular file transport (`ascii_table` / `ascii_table_array` kinds).
//!
//! Grounded on `original_source/cis_interface/communication/AsciiTableComm.h`:
//! `init_ascii_table_comm` treats the table address as a file path, writes a
//! format-string header line on `send` open, and otherwise reads/writes one
//! row per line — the same newline-delimited file discipline as
//! `ascii_file.rs`, wrapped here to keep the table-specific bookkeeping (the
//! `tempASCIITable.N` ephemeral naming, §9) separate from the plain-text
//! driver. Row-level field tokenising stays out of scope per §1; this module
//! only deals in whole lines, same as the serializer negotiation layer
//! expects (`serializer.rs`).

use async_trait::async_trait;

use crate::transport::ascii_file::AsciiFileTransport;
use crate::transport::{Direction, Transport};

pub struct AsciiTableTransport {
    inner: AsciiFileTransport,
    as_array: bool,
}

impl AsciiTableTransport {
    pub async fn open(
        direction: Direction,
        path: &str,
        max_msg_size: usize,
        as_array: bool,
    ) -> anyhow::Result<Self> {
        let inner = AsciiFileTransport::open(direction, path, max_msg_size).await?;
        Ok(AsciiTableTransport { inner, as_array })
    }

    pub fn as_array(&self) -> bool {
        self.as_array
    }
}

#[async_trait]
impl Transport for AsciiTableTransport {
    async fn send(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.inner.send(bytes).await
    }

    async fn recv(&mut self) -> anyhow::Result<Vec<u8>> {
        self.inner.recv().await
    }

    async fn nmsg(&self) -> anyhow::Result<i64> {
        self.inner.nmsg().await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.inner.close().await
    }

    fn max_msg_size(&self) -> usize {
        self.inner.max_msg_size()
    }
}
