use std::time::Duration;

use anyhow::Result;
use poly_comm::{framing, CommKind, Direction, Endpoint, RecvOutcome, Runtime, TransportKind};
use uuid::Uuid;

/// Releasing every endpoint opened during a run leaves the process-wide
/// liveness counter at zero, the testable property `SPEC_FULL.md` §8
/// describes for the exit drain.
#[tokio::test]
async fn release_drains_the_liveness_counter() -> Result<()> {
    let before = Runtime::global().live_endpoint_count();

    let address = format!("liveness-{}", Uuid::new_v4());
    let sender = Endpoint::open(
        "",
        Some(address.clone()),
        Direction::Send,
        CommKind::Leaf(TransportKind::Rpc),
    )
    .await?;
    let receiver = Endpoint::open(
        "",
        Some(address),
        Direction::Recv,
        CommKind::Leaf(TransportKind::Rpc),
    )
    .await?;

    assert_eq!(Runtime::global().live_endpoint_count(), before + 2);

    sender.release().await?;
    receiver.release().await?;

    assert_eq!(Runtime::global().live_endpoint_count(), before);
    Ok(())
}

/// `SPEC_FULL.md` §8 scenario 6: an endpoint dropped without an explicit
/// `release()` must still deliver every frame it already sent followed by an
/// EOF, the same guarantee an explicit release gives. `Drop` detaches the
/// transport handle into a background task to get there without blocking the
/// synchronous `drop()`, so this polls `recv` with a generous timeout rather
/// than assuming the EOF is already in the channel the instant the sender's
/// scope ends.
#[tokio::test]
async fn drop_without_release_still_drains_frames_and_eof() -> Result<()> {
    let before = Runtime::global().live_endpoint_count();
    let address = format!("liveness-drop-{}", Uuid::new_v4());

    let mut receiver = Endpoint::open(
        "",
        Some(address.clone()),
        Direction::Recv,
        CommKind::Leaf(TransportKind::Rpc),
    )
    .await?;
    {
        let mut sender = Endpoint::open(
            "",
            Some(address),
            Direction::Send,
            CommKind::Leaf(TransportKind::Rpc),
        )
        .await?;
        framing::send(&mut sender, b"one").await?;
        framing::send(&mut sender, b"two").await?;
        framing::send(&mut sender, b"three").await?;
        assert_eq!(Runtime::global().live_endpoint_count(), before + 2);
        // `sender` drops here without an explicit `release().await`; its
        // background drain task owns emitting the trailing EOF from here on.
    }

    for expected in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
        let outcome = tokio::time::timeout(Duration::from_secs(2), framing::recv(&mut receiver)).await??;
        match outcome {
            RecvOutcome::Data(bytes) => assert_eq!(bytes, expected),
            RecvOutcome::Eof => panic!("expected data before the EOF"),
        }
    }
    let trailing = tokio::time::timeout(Duration::from_secs(2), framing::recv(&mut receiver)).await??;
    assert!(matches!(trailing, RecvOutcome::Eof));

    receiver.release().await?;
    assert_eq!(Runtime::global().live_endpoint_count(), before);
    Ok(())
}
