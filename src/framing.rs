//! Multipart framing over a single `Leaf` endpoint (`SPEC_FULL.md` §4.2–§4.5).
//!
//! Grounded on `original_source/communication.h`'s `comm_send`/
//! `comm_send_multipart`/`comm_recv`/`comm_recv_multipart`, with the header
//! presence rule resolved the way `DESIGN.md`'s Open Question entry
//! describes: every non-EOF framed send here always builds and sends a
//! header, rather than reproducing the source's raw single-frame fast path,
//! which is inconsistent with `comm_recv`'s unconditional header parsing.

use tracing::debug;

use crate::config::EOF_SENTINEL;
use crate::endpoint::{CommKind, Direction, Endpoint};
use crate::error::{CommError, CommResult, RecvOutcome};
use crate::header::{Header, SerializerTag};

/// Send `bytes` on `ep`, dispatching to the RPC overlay if `ep` is a
/// `Client`/`Server` rather than a plain leaf transport.
pub async fn send(ep: &mut Endpoint, bytes: &[u8]) -> CommResult<()> {
    let result = match ep.kind() {
        CommKind::Leaf(_) => leaf_send(ep, bytes, None, None).await,
        CommKind::Client(_) => crate::rpc::client_send(ep, bytes).await,
        CommKind::Server(_) => crate::rpc::server_send(ep, bytes).await,
    };
    crate::error::observe(result)
}

/// Receive the next frame on `ep`, dispatching to the RPC overlay if `ep` is
/// a `Client`/`Server`.
pub async fn recv(ep: &mut Endpoint) -> CommResult<RecvOutcome> {
    let result = match ep.kind() {
        CommKind::Leaf(_) => leaf_recv(ep).await.map(|(outcome, _header)| outcome),
        CommKind::Client(_) => crate::rpc::client_recv(ep).await,
        CommKind::Server(_) => crate::rpc::server_recv(ep).await,
    };
    crate::error::observe(result)
}

/// Core single-direction send used directly by `Leaf` endpoints and, via
/// their sub-endpoints, by the `Client`/`Server` overlays. `request_id` and
/// `response_address` are the only header fields the RPC overlay needs to
/// thread through that a bare leaf send never sets itself.
pub(crate) async fn leaf_send(
    ep: &mut Endpoint,
    bytes: &[u8],
    request_id: Option<String>,
    response_address: Option<String>,
) -> CommResult<()> {
    if !ep.valid() {
        return Err(CommError::InvalidEndpoint(ep.name().to_string()));
    }

    if bytes == EOF_SENTINEL {
        if ep.sent_eof() {
            return Err(CommError::EofAlreadySent);
        }
        ep.transport_mut()?
            .send(bytes)
            .await
            .map_err(|e| CommError::transport(ep.kind().name(), e))?;
        ep.mark_sent_eof();
        ep.touch_last_send();
        return Ok(());
    }

    let id = if ep.name().is_empty() {
        ep.address().to_string()
    } else {
        ep.name().to_string()
    };
    let mut header = Header::new(bytes.len(), id);
    header.request_id = request_id;
    header.response_address = response_address;
    if !ep.used() && !ep.is_file() {
        if let Some(tag) = ep.serializer().tag() {
            header.serializer_type = Some(tag);
            header.format_str = ep.serializer().format_str().map(|s| s.to_string());
            header.as_array = ep.serializer().as_array_flag();
        }
    }

    if fits_inline(header.encode().len(), bytes.len(), ep.max_msg_size()) {
        header.multipart = false;
        let mut frame = header.encode();
        frame.extend_from_slice(bytes);
        ep.transport_mut()?
            .send(&frame)
            .await
            .map_err(|e| CommError::transport(ep.kind().name(), e))?;
    } else {
        let base_kind = ep.leaf_kind();
        let mut chunk_ep = Endpoint::open_ephemeral(Direction::Send, base_kind).await?;
        header.multipart = true;
        header.address = Some(chunk_ep.address().to_string());
        let frame = header.encode();
        ep.transport_mut()?
            .send(&frame)
            .await
            .map_err(|e| CommError::transport(ep.kind().name(), e))?;

        let chunk_size = chunk_ep.max_msg_size().max(1);
        let mut offset = 0;
        while offset < bytes.len() {
            let end = (offset + chunk_size).min(bytes.len());
            chunk_ep
                .transport_mut()?
                .send(&bytes[offset..end])
                .await
                .map_err(|e| CommError::transport(chunk_ep.kind().name(), e))?;
            offset = end;
        }
        chunk_ep.release().await?;
    }

    ep.mark_used();
    ep.touch_last_send();
    Ok(())
}

/// Core single-direction recv. Returns the decoded header alongside the
/// outcome so the server overlay can pull `response_address` out of it; a
/// bare leaf recv just discards the header via `recv()` above.
pub(crate) async fn leaf_recv(ep: &mut Endpoint) -> CommResult<(RecvOutcome, Option<Header>)> {
    if !ep.valid() {
        return Err(CommError::InvalidEndpoint(ep.name().to_string()));
    }

    let frame = ep
        .transport_mut()?
        .recv()
        .await
        .map_err(|e| CommError::transport(ep.kind().name(), e))?;

    if frame == EOF_SENTINEL {
        ep.mark_recv_eof();
        return Ok((RecvOutcome::Eof, None));
    }

    let header = Header::decode(&frame)?;
    negotiate_serializer(ep, &header);

    let body = if header.multipart {
        let addr = header.address.clone().ok_or_else(|| {
            CommError::HeaderParseFailure("multipart frame is missing its chunk carrier address".to_string())
        })?;
        let base_kind = ep.leaf_kind();
        let mut chunk_ep = Endpoint::open_ephemeral_at(Direction::Recv, base_kind, addr).await?;
        let mut assembled = Vec::with_capacity(header.size);
        while assembled.len() < header.size {
            let chunk = chunk_ep
                .transport_mut()?
                .recv()
                .await
                .map_err(|e| CommError::transport(chunk_ep.kind().name(), e))?;
            if chunk.is_empty() {
                debug!("multipart carrier {} yielded an empty chunk before reaching {} bytes", chunk_ep.address(), header.size);
                break;
            }
            assembled.extend_from_slice(&chunk);
        }
        chunk_ep.release().await?;
        assembled
    } else {
        frame[header.bodybeg..header.bodybeg + header.bodysiz].to_vec()
    };

    ep.mark_used();
    Ok((RecvOutcome::Data(body), Some(header)))
}

/// Strict `<`, matching `SPEC_FULL.md` §4.2 ("if `size + header_len <
/// max_msg_size`, the body is appended") and the source: at the exact
/// boundary (`header_len + |bytes| == max_msg_size`) a send must chunk, not
/// inline, or the frame would hit the ceiling with nothing to spare.
fn fits_inline(header_len: usize, body_len: usize, max_msg_size: usize) -> bool {
    header_len + body_len < max_msg_size
}

fn negotiate_serializer(ep: &mut Endpoint, header: &Header) {
    if !ep.serializer().is_uninitialized() || ep.is_file() {
        return;
    }
    let Some(tag) = header.serializer_type else {
        return;
    };
    let format_str = header.format_str.clone();
    let as_array = header.as_array;
    ep.serializer_mut().adopt(tag, format_str, as_array);
    if matches!(tag, SerializerTag::Format | SerializerTag::AsciiTableFamily) {
        let name = if ep.name().is_empty() {
            ep.address().to_string()
        } else {
            ep.name().to_string()
        };
        ep.serializer_mut().adopt_table_address(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_boundary_chunks_rather_than_inlines() {
        assert!(fits_inline(10, 5, 16));
        assert!(!fits_inline(10, 6, 16));
        assert!(!fits_inline(10, 5, 15));
    }
}
