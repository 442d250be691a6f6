//! The `Endpoint` record (`SPEC_FULL.md` §3, §4.1, §4.10).
//!
//! Replaces the source's `void* handle` + `comm_type` dispatch with the sum
//! type Design Notes §9 asks for: `Handle::{Leaf, Client, Server}`, matched
//! exhaustively rather than switched on an integer tag.

use std::time::Instant;

use tracing::debug;

use crate::config::EOF_SENTINEL;
use crate::error::{CommError, CommResult};
use crate::registry::Runtime;
use crate::rpc::{ClientState, ServerState};
use crate::serializer::Serializer;
use crate::transport::ascii_file::AsciiFileTransport;
use crate::transport::ascii_table::AsciiTableTransport;
use crate::transport::ipc::PosixMqTransport;
use crate::transport::rpc_channel::RpcChannelTransport;
use crate::transport::zmq_transport::ZmqTransport;
pub use crate::transport::{Direction, Transport, TransportKind};

/// The transport variant an endpoint wraps. `Client`/`Server` are RPC
/// overlays (§4.6/§4.7) built atop a base leaf kind, not leaf drivers
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommKind {
    Leaf(TransportKind),
    Client(TransportKind),
    Server(TransportKind),
}

impl CommKind {
    pub fn name(&self) -> &'static str {
        match self {
            CommKind::Leaf(k) => k.name(),
            CommKind::Client(_) => "client",
            CommKind::Server(_) => "server",
        }
    }

    fn base(&self) -> TransportKind {
        match self {
            CommKind::Leaf(k) | CommKind::Client(k) | CommKind::Server(k) => *k,
        }
    }
}

pub(crate) enum Handle {
    Leaf(Box<dyn Transport>),
    Client(Box<ClientState>),
    Server(Box<ServerState>),
}

/// A single-direction communication handle (`SPEC_FULL.md` §3's Endpoint
/// record, Glossary: "a single-direction communication handle tying an
/// identity to a transport instance").
pub struct Endpoint {
    pub(crate) name: String,
    pub(crate) address: String,
    pub(crate) direction: Direction,
    pub(crate) kind: CommKind,
    pub(crate) serializer: Serializer,
    /// `None` only ever so briefly, inside `release()`, which needs to move
    /// the handle out by value despite `Endpoint` implementing `Drop` (a
    /// type with a `Drop` impl can't have fields moved out of it directly,
    /// but `Option::take` through `&mut self` is exempt).
    pub(crate) handle: Option<Handle>,
    pub(crate) max_msg_size: usize,
    pub(crate) sent_eof: bool,
    pub(crate) recv_eof: bool,
    pub(crate) used: bool,
    pub(crate) always_send_header: bool,
    pub(crate) is_file: bool,
    pub(crate) valid: bool,
    pub(crate) last_send: Option<Instant>,
    registered: bool,
    released: bool,
}

async fn open_leaf_transport(
    kind: TransportKind,
    direction: Direction,
    address: &str,
    max_msg_size: usize,
) -> anyhow::Result<Box<dyn Transport>> {
    match kind {
        TransportKind::Rpc => {
            Ok(Box::new(RpcChannelTransport::open(direction, address, max_msg_size)?))
        }
        #[cfg(target_os = "linux")]
        TransportKind::Ipc => {
            Ok(Box::new(PosixMqTransport::open(direction, address, max_msg_size)?))
        }
        #[cfg(not(target_os = "linux"))]
        TransportKind::Ipc => {
            anyhow::bail!("the ipc (POSIX message queue) transport is only available on Linux")
        }
        TransportKind::Zmq => Ok(Box::new(ZmqTransport::open(direction, address, max_msg_size)?)),
        TransportKind::AsciiFile => Ok(Box::new(
            AsciiFileTransport::open(direction, address, max_msg_size).await?,
        )),
        TransportKind::AsciiTable => Ok(Box::new(
            AsciiTableTransport::open(direction, address, max_msg_size, false).await?,
        )),
        TransportKind::AsciiTableArray => Ok(Box::new(
            AsciiTableTransport::open(direction, address, max_msg_size, true).await?,
        )),
    }
}

impl Endpoint {
    /// `init_T_comm`/`register` (§6.1, §4.8): construct a named endpoint,
    /// resolving its address from the environment when not given explicitly
    /// (§6.5), and register it with the process-wide `Runtime`.
    pub async fn open(
        name: &str,
        address: Option<String>,
        direction: Direction,
        kind: CommKind,
    ) -> CommResult<Endpoint> {
        let resolved = crate::transport::resolve_address(name, address)
            .unwrap_or_else(|| name.to_string());
        let mut ep = Self::construct(name.to_string(), resolved, direction, kind).await?;
        ep.register();
        Ok(ep)
    }

    /// `new_T_address` (§6.1) as used for multipart chunk channels and RPC
    /// reply channels (§4.3c, §4.6): address-only, no name, both EOF flags
    /// pre-set (ephemerals never emit EOF, Glossary), and explicitly **not**
    /// registered (Glossary: "never registered").
    pub(crate) async fn open_ephemeral(direction: Direction, kind: TransportKind) -> CommResult<Endpoint> {
        let id = Runtime::global().next_ephemeral_id();
        let address = ephemeral_address(kind, id);
        Self::open_ephemeral_at(direction, kind, address).await
    }

    /// Same as `open_ephemeral`, but at a specific address rather than a
    /// freshly generated one — used by a multipart receiver to attach to the
    /// chunk carrier the sender named in its header's `address` field.
    pub(crate) async fn open_ephemeral_at(
        direction: Direction,
        kind: TransportKind,
        address: String,
    ) -> CommResult<Endpoint> {
        let mut ep = Self::construct(String::new(), address, direction, CommKind::Leaf(kind)).await?;
        ep.sent_eof = true;
        ep.recv_eof = true;
        Ok(ep)
    }

    /// The base transport kind backing a `Leaf` endpoint. Panics if called on
    /// a `Client`/`Server` overlay endpoint directly (those dispatch through
    /// their sub-endpoints, which are themselves `Leaf`).
    pub(crate) fn leaf_kind(&self) -> TransportKind {
        match self.kind {
            CommKind::Leaf(k) => k,
            _ => unreachable!("leaf_kind called on a non-leaf endpoint"),
        }
    }

    async fn construct(
        name: String,
        address: String,
        direction: Direction,
        kind: CommKind,
    ) -> CommResult<Endpoint> {
        let max_msg_size = Runtime::global().config().max_msg_size;
        let is_file = kind.base().is_file();
        let always_send_header = matches!(kind, CommKind::Client(_) | CommKind::Server(_));

        let handle = match kind {
            CommKind::Leaf(base) => {
                let transport = open_leaf_transport(base, direction, &address, max_msg_size)
                    .await
                    .map_err(|e| CommError::transport(base.name(), e))?;
                Handle::Leaf(transport)
            }
            CommKind::Client(base) => {
                let request = Box::new(
                    Endpoint::construct(name.clone(), address.clone(), Direction::Send, CommKind::Leaf(base))
                        .await?,
                );
                Handle::Client(Box::new(ClientState::new(request, base)))
            }
            CommKind::Server(base) => {
                let handle_ep = Box::new(
                    Endpoint::construct(name.clone(), address.clone(), Direction::Recv, CommKind::Leaf(base))
                        .await?,
                );
                Handle::Server(Box::new(ServerState::new(handle_ep, base)))
            }
        };

        Ok(Endpoint {
            name,
            address,
            direction,
            kind,
            serializer: Serializer::default(),
            handle: Some(handle),
            max_msg_size,
            sent_eof: false,
            recv_eof: false,
            used: false,
            always_send_header,
            is_file,
            valid: true,
            last_send: None,
            registered: false,
            released: false,
        })
    }

    fn register(&mut self) {
        Runtime::global().mark_registered();
        self.registered = true;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> CommKind {
        self.kind
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn used(&self) -> bool {
        self.used
    }

    pub fn sent_eof(&self) -> bool {
        self.sent_eof
    }

    pub fn recv_eof(&self) -> bool {
        self.recv_eof
    }

    pub fn last_send(&self) -> Option<Instant> {
        self.last_send
    }

    pub fn max_msg_size(&self) -> usize {
        self.max_msg_size
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub(crate) fn serializer_mut(&mut self) -> &mut Serializer {
        &mut self.serializer
    }

    /// The serializer that actually governs wire encoding for this endpoint
    /// (`SPEC_FULL.md` §4.9): for a `Leaf` endpoint that's `self.serializer`,
    /// but `Client`/`Server` overlays never negotiate their own — the request
    /// sub-endpoint (client) or handle sub-endpoint (server) does, so the
    /// variadic layer must read through to it rather than the overlay's own,
    /// permanently `Uninitialized`, field.
    pub(crate) fn active_serializer(&self) -> CommResult<&Serializer> {
        match self.handle.as_ref() {
            Some(Handle::Leaf(_)) => Ok(&self.serializer),
            Some(Handle::Client(state)) => Ok(state.request.serializer()),
            Some(Handle::Server(state)) => Ok(state.handle.serializer()),
            None => Err(CommError::InvalidEndpoint(self.name.clone())),
        }
    }

    /// Configure the serializer a sending endpoint advertises on its next
    /// framed send (`SPEC_FULL.md` §4.4: negotiation is driven by whatever
    /// the caller set on the sender, a receiver always adopts). Has no
    /// effect on `recv`-direction endpoints, which instead adopt whatever
    /// the peer advertised. On a `Client`/`Server` overlay this configures
    /// the sub-endpoint that actually negotiates and frames (the request or
    /// handle sub-endpoint, `SPEC_FULL.md` §4.9), not the overlay's own
    /// permanently `Uninitialized` field.
    pub fn set_serializer(&mut self, serializer: Serializer) {
        match self.handle.as_mut() {
            Some(Handle::Client(state)) => state.request.serializer = serializer,
            Some(Handle::Server(state)) => state.handle.serializer = serializer,
            _ => self.serializer = serializer,
        }
    }

    pub(crate) fn mark_used(&mut self) {
        self.used = true;
    }

    pub(crate) fn mark_sent_eof(&mut self) {
        self.sent_eof = true;
    }

    pub(crate) fn mark_recv_eof(&mut self) {
        self.recv_eof = true;
    }

    pub(crate) fn touch_last_send(&mut self) {
        self.last_send = Some(Instant::now());
    }

    pub(crate) fn handle_mut(&mut self) -> CommResult<&mut Handle> {
        self.handle
            .as_mut()
            .ok_or_else(|| CommError::InvalidEndpoint(self.name.clone()))
    }

    pub(crate) fn transport_mut(&mut self) -> CommResult<&mut Box<dyn Transport>> {
        match self.handle_mut()? {
            Handle::Leaf(t) => Ok(t),
            _ => Err(CommError::InvalidEndpoint(format!(
                "{} is an RPC overlay endpoint, not a leaf transport",
                self.name
            ))),
        }
    }

    pub async fn nmsg(&self) -> CommResult<i64> {
        if !self.valid {
            return Err(CommError::InvalidEndpoint(self.name.clone()));
        }
        match self.handle.as_ref() {
            Some(Handle::Leaf(t)) => t.nmsg().await.map_err(|e| CommError::transport(self.kind.name(), e)),
            Some(Handle::Client(state)) => state.request.nmsg().await,
            Some(Handle::Server(state)) => state.handle.nmsg().await,
            None => Err(CommError::InvalidEndpoint(self.name.clone())),
        }
    }

    /// `release_comm` (§4.8): emit EOF (unless the runtime's error flag is
    /// set), poll `nmsg` until it drains or the bounded timeout elapses
    /// (§9 "Drain correctness"), then close the transport. Idempotent (§8,
    /// "Idempotent release").
    pub async fn release(mut self) -> CommResult<()> {
        self.release_mut().await
    }

    async fn release_mut(&mut self) -> CommResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        if self.direction == Direction::Send
            && !matches!(self.kind, CommKind::Client(_))
            && self.valid
            && !self.sent_eof
            && !Runtime::global().error_flag()
        {
            if let Err(e) = crate::framing::send(self, EOF_SENTINEL).await {
                debug!("release({}): best-effort EOF send failed: {e}", self.name);
            }
        }

        let cfg = Runtime::global().config();
        let deadline = Instant::now() + cfg.drain_timeout;
        while Instant::now() < deadline {
            match self.nmsg().await {
                Ok(0) => break,
                Ok(_) => tokio::time::sleep(cfg.sleep_interval).await,
                Err(_) => break,
            }
        }

        let kind_name = self.kind.name();
        let close_result = match self.handle.take() {
            Some(Handle::Leaf(mut t)) => t.close().await.map_err(|e| CommError::transport(kind_name, e)),
            Some(Handle::Client(state)) => state.release().await,
            Some(Handle::Server(state)) => state.release().await,
            None => Ok(()),
        };

        if self.registered {
            Runtime::global().mark_released();
            self.registered = false;
        }
        self.valid = false;
        crate::error::observe(close_result)
    }
}

impl Drop for Endpoint {
    /// Safety-net cleanup for endpoints that went out of scope without an
    /// explicit `release().await`. This crate realises the source's
    /// process-wide `atexit` drain as ordinary RAII (`SPEC_FULL.md` §9,
    /// "Global mutable state") rather than a registered exit hook, but
    /// `SPEC_FULL.md` §8 scenario 6 requires the same "peer sees all frames
    /// then an EOF" outcome whether the endpoint was explicitly released or
    /// simply dropped. `Drop::drop` can't `.await`, so — the same way other
    /// async Rust libraries (connection pools, background writers) handle
    /// best-effort cleanup on drop — it detaches the still-owned transport
    /// handle into a fresh `Endpoint` value and hands it to
    /// `tokio::runtime::Handle::spawn` to run the ordinary `release_mut`
    /// drain on, fire-and-forget, if a runtime is reachable from this
    /// thread. Outside a runtime (e.g. dropped during non-async teardown)
    /// there is nothing to spawn onto, so it falls back to logging only.
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.registered {
            Runtime::global().mark_released();
            self.registered = false;
        }

        let should_drain = self.valid
            && self.direction == Direction::Send
            && !matches!(self.kind, CommKind::Client(_))
            && !self.sent_eof;
        if !should_drain {
            return;
        }

        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            debug!(
                "endpoint {} dropped outside a tokio runtime; skipping the best-effort EOF drain (call release().await to get it)",
                self.name
            );
            return;
        };
        let Some(handle) = self.handle.take() else {
            return;
        };

        let mut detached = Endpoint {
            name: std::mem::take(&mut self.name),
            address: std::mem::take(&mut self.address),
            direction: self.direction,
            kind: self.kind,
            serializer: self.serializer.clone(),
            handle: Some(handle),
            max_msg_size: self.max_msg_size,
            sent_eof: self.sent_eof,
            recv_eof: self.recv_eof,
            used: self.used,
            always_send_header: self.always_send_header,
            is_file: self.is_file,
            valid: self.valid,
            last_send: self.last_send,
            registered: false,
            released: false,
        };
        let name = detached.name.clone();
        debug!("endpoint {name} dropped without an explicit release(); draining it in a background task");
        rt.spawn(async move {
            if let Err(e) = detached.release_mut().await {
                debug!("background drain for dropped endpoint {name} failed: {e}");
            }
        });
    }
}

fn ephemeral_address(kind: TransportKind, id: u64) -> String {
    match kind {
        TransportKind::Ipc => format!("poly_comm_ephemeral_{id}"),
        TransportKind::Zmq => format!("ipc:///tmp/poly_comm_ephemeral_{id}.zmq"),
        TransportKind::Rpc => format!("poly_comm_ephemeral_{id}"),
        TransportKind::AsciiFile => format!("/tmp/poly_comm_ephemeral_{id}.txt"),
        TransportKind::AsciiTable => format!("/tmp/poly_comm_ephemeral_table_{id}.txt"),
        TransportKind::AsciiTableArray => format!("/tmp/poly_comm_ephemeral_table_array_{id}.txt"),
    }
}
