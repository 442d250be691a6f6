use anyhow::Result;
use poly_comm::{framing, CommKind, Direction, Endpoint, RecvOutcome, TransportKind};
use uuid::Uuid;

/// A payload larger than `max_msg_size` spills onto an ephemeral chunk
/// carrier and is reassembled byte-for-byte on the receive side.
#[tokio::test]
async fn multipart_round_trip() -> Result<()> {
    // Shrink the frame ceiling so a modest payload forces the multipart path
    // without allocating megabytes in the test. Must happen before the first
    // `Runtime::global()` access in this process.
    std::env::set_var("POLY_COMM_MAX_MSG", "256");

    let address = format!("multipart-{}", Uuid::new_v4());
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

    let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
    framing::send(&mut sender, &payload).await?;

    match framing::recv(&mut receiver).await? {
        RecvOutcome::Data(bytes) => assert_eq!(bytes, payload),
        RecvOutcome::Eof => panic!("expected data, got EOF"),
    }

    sender.release().await?;
    match framing::recv(&mut receiver).await? {
        RecvOutcome::Eof => {}
        RecvOutcome::Data(_) => panic!("expected the release EOF"),
    }
    receiver.release().await?;
    Ok(())
}
