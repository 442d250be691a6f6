//! Plain-text file transport (`ascii_file` kind).
//!
//! Grounded on `original_source/cis_interface/communication/communication.h`'s
//! treatment of `is_file` endpoints (address is the file path, no EOF
//! propagation at the transport level) and `AsciiTableComm.h`'s file-open
//! discipline (`send` truncates/creates, `recv` reads from the start).
//! Records are newline-delimited, since the per-record serializer contract
//! (§6.2, out of scope here) already expects to hand the transport one
//! logical row/line at a time.

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::transport::{Direction, Transport};

pub struct AsciiFileTransport {
    path: String,
    direction: Direction,
    writer: Option<File>,
    reader: Option<BufReader<File>>,
    max_msg_size: usize,
}

impl AsciiFileTransport {
    pub async fn open(direction: Direction, path: &str, max_msg_size: usize) -> anyhow::Result<Self> {
        match direction {
            Direction::Send => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                Ok(AsciiFileTransport {
                    path: path.to_string(),
                    direction,
                    writer: Some(file),
                    reader: None,
                    max_msg_size,
                })
            }
            Direction::Recv => {
                let file = OpenOptions::new()
                    .read(true)
                    .create(true)
                    .write(true)
                    .open(path)
                    .await?;
                Ok(AsciiFileTransport {
                    path: path.to_string(),
                    direction,
                    writer: None,
                    reader: Some(BufReader::new(file)),
                    max_msg_size,
                })
            }
        }
    }
}

#[async_trait]
impl Transport for AsciiFileTransport {
    async fn send(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        // Files don't propagate EOF at the transport level (`SPEC_FULL.md` §6.4).
        if bytes == crate::config::EOF_SENTINEL {
            return Ok(());
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("{} is not open for writing", self.path))?;
        writer.write_all(bytes).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<Vec<u8>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("{} is not open for reading", self.path))?;
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            anyhow::bail!("end of file {}", self.path);
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Ok(line.into_bytes())
    }

    async fn nmsg(&self) -> anyhow::Result<i64> {
        // Counting remaining lines would require scanning the file; files are
        // defined to report 0 per the transport driver contract (§6.1).
        Ok(0)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().await?;
        }
        self.writer = None;
        self.reader = None;
        Ok(())
    }

    fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }
}
