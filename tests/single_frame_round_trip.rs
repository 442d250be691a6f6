use anyhow::Result;
use poly_comm::{framing, CommKind, Direction, Endpoint, RecvOutcome, TransportKind};
use uuid::Uuid;

/// A payload small enough to fit in one header+body frame round-trips
/// byte-for-byte over the in-process channel transport.
#[tokio::test]
async fn single_frame_round_trip() -> Result<()> {
    let address = format!("single-frame-{}", Uuid::new_v4());
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

    framing::send(&mut sender, b"hello there").await?;
    match framing::recv(&mut receiver).await? {
        RecvOutcome::Data(bytes) => assert_eq!(bytes, b"hello there"),
        RecvOutcome::Eof => panic!("expected data, got EOF"),
    }

    assert!(sender.used());
    assert!(receiver.used());

    sender.release().await?;
    match framing::recv(&mut receiver).await? {
        RecvOutcome::Eof => {}
        RecvOutcome::Data(_) => panic!("expected the release EOF, got another data frame"),
    }
    receiver.release().await?;
    Ok(())
}
