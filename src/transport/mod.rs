//! Transport driver contract (`SPEC_FULL.md` §6.1) and the leaf transport
//! kinds. Grounded on the teacher's `ipc::IpcTransport` trait shape
//! (`#[async_trait] pub trait IpcTransport: Send + Sync`), generalised here to
//! cover byte-oriented send/recv rather than a typed `Message` envelope, since
//! the wire body is opaque bytes framed by `header.rs` rather than a
//! bincode-serialized struct (`SPEC_FULL.md` §10.2 dependency note).

pub mod ascii_file;
pub mod ascii_table;
pub mod ipc;
pub mod rpc_channel;
pub mod zmq_transport;

use async_trait::async_trait;

use crate::error::CommError;

/// One-shot direction of an endpoint (`SPEC_FULL.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

/// The leaf transport variants an `Endpoint` can wrap (§2's list, minus
/// `client`/`server`, which are RPC overlays rather than transport drivers —
/// see `rpc.rs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Ipc,
    Zmq,
    Rpc,
    AsciiFile,
    AsciiTable,
    AsciiTableArray,
}

impl TransportKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Ipc => "ipc",
            TransportKind::Zmq => "zmq",
            TransportKind::Rpc => "rpc",
            TransportKind::AsciiFile => "ascii_file",
            TransportKind::AsciiTable => "ascii_table",
            TransportKind::AsciiTableArray => "ascii_table_array",
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(
            self,
            TransportKind::AsciiFile | TransportKind::AsciiTable | TransportKind::AsciiTableArray
        )
    }
}

/// Every transport driver implements these five operations
/// (`init`/`new_address` happen in the driver's own constructor, which
/// returns a boxed `Transport`; `§6.1`'s `new_T_address`/`init_T_comm` split
/// collapses into a single constructor function per driver module since Rust
/// constructors either succeed or don't exist).
#[async_trait]
pub trait Transport: Send {
    /// `T_comm_send`: 0/-1 in the source, `Result<()>` here.
    async fn send(&mut self, bytes: &[u8]) -> anyhow::Result<()>;

    /// `T_comm_recv`: reads one frame. The source's `(buf, len, allow_realloc)`
    /// triple sized and grew a caller-owned fixed buffer, failing outright if
    /// growth wasn't permitted; there is no analog once `recv` returns an
    /// owned, self-growing `Vec<u8>` rather than writing into caller-supplied
    /// storage, so that case can't arise here (`DESIGN.md`'s Open Question
    /// resolution).
    async fn recv(&mut self) -> anyhow::Result<Vec<u8>>;

    /// `T_comm_nmsg`: pending-frame count, -1 on error in the source; here a
    /// plain `Result` with the count.
    async fn nmsg(&self) -> anyhow::Result<i64>;

    /// `free_T_comm`.
    async fn close(&mut self) -> anyhow::Result<()>;

    fn max_msg_size(&self) -> usize;
}

/// `SPEC_FULL.md` §6.5: when an endpoint is constructed with a name and no
/// address, read the address from a like-named environment variable.
pub fn resolve_address(name: &str, address: Option<String>) -> Option<String> {
    address.or_else(|| std::env::var(name).ok())
}

pub(crate) fn map_transport_err(kind: &'static str, err: anyhow::Error) -> CommError {
    CommError::transport(kind, err)
}
