use anyhow::Result;
use poly_comm::{framing, CommError, CommKind, Direction, Endpoint, RecvOutcome, TransportKind};
use uuid::Uuid;

/// Sending the EOF sentinel terminates a stream: the peer's `recv` yields
/// `RecvOutcome::Eof`, and a second EOF send on the same endpoint is
/// rejected rather than silently repeated.
#[tokio::test]
async fn eof_terminates_stream_and_rejects_double_send() -> Result<()> {
    let address = format!("eof-{}", Uuid::new_v4());
    let mut sender = Endpoint::open(
        "",
        Some(address.clone()),
        Direction::Send,
        CommKind::Leaf(TransportKind::Rpc),
    )
    .await?;
    let mut receiver = Endpoint::open(
        "",
        Some(address),
        Direction::Recv,
        CommKind::Leaf(TransportKind::Rpc),
    )
    .await?;

    framing::send(&mut sender, b"last message").await?;
    framing::send(&mut sender, poly_comm::config::EOF_SENTINEL).await?;
    assert!(sender.sent_eof());

    match framing::recv(&mut receiver).await? {
        RecvOutcome::Data(bytes) => assert_eq!(bytes, b"last message"),
        RecvOutcome::Eof => panic!("expected data before EOF"),
    }
    match framing::recv(&mut receiver).await? {
        RecvOutcome::Eof => {}
        RecvOutcome::Data(_) => panic!("expected EOF"),
    }
    assert!(receiver.recv_eof());

    let second_eof = framing::send(&mut sender, poly_comm::config::EOF_SENTINEL).await;
    assert!(matches!(second_eof, Err(CommError::EofAlreadySent)));

    sender.release().await?;
    receiver.release().await?;
    Ok(())
}
