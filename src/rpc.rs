//! Client/server RPC overlays (`SPEC_FULL.md` §4.6, §4.7).
//!
//! Grounded on `original_source/cis_interface/communication/ClientComm.h` for
//! the client shape (a request sub-endpoint plus an ordered FIFO of pending
//! response sub-endpoints) and on this crate's own Open Question resolution
//! (`DESIGN.md`) for the server shape, which the excerpted source doesn't
//! fully specify: a handle sub-endpoint symmetric to the client's request
//! sub-endpoint, with the reply target remembered from the last recv.

use std::collections::VecDeque;

use crate::endpoint::{Direction, Endpoint, Handle};
use crate::error::{CommError, CommResult, RecvOutcome};
use crate::framing;
use crate::registry::Runtime;
use crate::transport::TransportKind;

/// State backing a `Client` overlay endpoint. `ClientComm.h`'s single
/// request handle plus a FIFO of response handles, generalised to any base
/// transport kind rather than hardcoded to one.
pub(crate) struct ClientState {
    pub(crate) request: Box<Endpoint>,
    pending_responses: VecDeque<Endpoint>,
    base_kind: TransportKind,
}

impl ClientState {
    pub(crate) fn new(request: Box<Endpoint>, base_kind: TransportKind) -> Self {
        ClientState {
            request,
            pending_responses: VecDeque::new(),
            base_kind,
        }
    }

    /// Consumes the overlay's state: drains and releases every still-pending
    /// response sub-endpoint, then releases the request sub-endpoint.
    pub(crate) async fn release(mut self) -> CommResult<()> {
        while let Some(pending) = self.pending_responses.pop_front() {
            pending.release().await?;
        }
        self.request.release().await
    }
}

/// State backing a `Server` overlay endpoint.
pub(crate) struct ServerState {
    pub(crate) handle: Box<Endpoint>,
    reply_target: Option<String>,
    base_kind: TransportKind,
}

impl ServerState {
    pub(crate) fn new(handle: Box<Endpoint>, base_kind: TransportKind) -> Self {
        ServerState {
            handle,
            reply_target: None,
            base_kind,
        }
    }

    /// Consumes the overlay's state and releases the handle sub-endpoint.
    pub(crate) async fn release(self) -> CommResult<()> {
        self.handle.release().await
    }
}

fn client_state(ep: &mut Endpoint) -> CommResult<&mut ClientState> {
    let name = ep.name().to_string();
    match ep.handle_mut()? {
        Handle::Client(state) => Ok(state),
        _ => Err(CommError::InvalidEndpoint(format!(
            "{name} is not a client overlay endpoint"
        ))),
    }
}

fn server_state(ep: &mut Endpoint) -> CommResult<&mut ServerState> {
    let name = ep.name().to_string();
    match ep.handle_mut()? {
        Handle::Server(state) => Ok(state),
        _ => Err(CommError::InvalidEndpoint(format!(
            "{name} is not a server overlay endpoint"
        ))),
    }
}

/// `vcommSend` for a client (§4.6): forward `bytes` on the request
/// sub-endpoint, first allocating a fresh ephemeral response sub-endpoint and
/// advertising its address as `response_address` so the server knows where
/// to route its reply.
pub(crate) async fn client_send(ep: &mut Endpoint, bytes: &[u8]) -> CommResult<()> {
    let base_kind = client_state(ep)?.base_kind;
    let response_ep = Endpoint::open_ephemeral(Direction::Recv, base_kind).await?;
    let response_address = response_ep.address().to_string();
    let request_id = Runtime::global().random_id().await;

    let state = client_state(ep)?;
    state.pending_responses.push_back(response_ep);
    framing::leaf_send(&mut state.request, bytes, Some(request_id), Some(response_address)).await
}

/// `vcommRecv` for a client (§4.6): pop the oldest pending response
/// sub-endpoint and read from it. FIFO order, not request-id matching, is
/// what correlates request and reply (`SPEC_FULL.md` §4.6, "Correlation").
pub(crate) async fn client_recv(ep: &mut Endpoint) -> CommResult<RecvOutcome> {
    let state = client_state(ep)?;
    let mut response_ep = state
        .pending_responses
        .pop_front()
        .ok_or(CommError::NoResponsePending)?;
    let (outcome, _header) = framing::leaf_recv(&mut response_ep).await?;
    response_ep.release().await?;
    Ok(outcome)
}

/// `vcommSend` for a server (§4.7): route the reply to the address
/// remembered from the last `recv`, consuming it so a second send without an
/// intervening recv fails with `NoResponsePending`.
pub(crate) async fn server_send(ep: &mut Endpoint, bytes: &[u8]) -> CommResult<()> {
    let base_kind = server_state(ep)?.base_kind;
    let target = server_state(ep)?
        .reply_target
        .take()
        .ok_or(CommError::NoResponsePending)?;

    let mut reply_ep = Endpoint::open_ephemeral_at(Direction::Send, base_kind, target).await?;
    let result = framing::leaf_send(&mut reply_ep, bytes, None, None).await;
    reply_ep.release().await?;
    result
}

/// `vcommRecv` for a server (§4.7): read from the handle sub-endpoint and
/// remember the header's `response_address` as the next reply target.
pub(crate) async fn server_recv(ep: &mut Endpoint) -> CommResult<RecvOutcome> {
    let state = server_state(ep)?;
    let (outcome, header) = framing::leaf_recv(&mut state.handle).await?;
    if let Some(header) = header {
        if let Some(addr) = header.response_address {
            state.reply_target = Some(addr);
        }
    }
    Ok(outcome)
}
