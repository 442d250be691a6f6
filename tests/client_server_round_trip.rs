use anyhow::Result;
use poly_comm::{framing, CommKind, Direction, Endpoint, RecvOutcome, TransportKind};
use uuid::Uuid;

/// A client's request lands on the server's handle sub-endpoint; the
/// server's reply is routed back to the client's response sub-endpoint that
/// request allocated, and a second client `recv` with nothing pending
/// reports `NoResponsePending`.
#[tokio::test]
async fn client_server_round_trip() -> Result<()> {
    let address = format!("rpc-service-{}", Uuid::new_v4());
    let mut client = Endpoint::open(
        "",
        Some(address.clone()),
        Direction::Send,
        CommKind::Client(TransportKind::Rpc),
    )
    .await?;
    let mut server = Endpoint::open(
        "",
        Some(address),
        Direction::Recv,
        CommKind::Server(TransportKind::Rpc),
    )
    .await?;

    framing::send(&mut client, b"ping").await?;
    match framing::recv(&mut server).await? {
        RecvOutcome::Data(bytes) => assert_eq!(bytes, b"ping"),
        RecvOutcome::Eof => panic!("expected data, got EOF"),
    }

    framing::send(&mut server, b"pong").await?;
    match framing::recv(&mut client).await? {
        RecvOutcome::Data(bytes) => assert_eq!(bytes, b"pong"),
        RecvOutcome::Eof => panic!("expected data, got EOF"),
    }

    let err = framing::recv(&mut client).await.unwrap_err();
    assert!(matches!(err, poly_comm::CommError::NoResponsePending));

    client.release().await?;
    server.release().await?;
    Ok(())
}

/// Request-reply ordering: the N-th client `recv` pairs with the N-th
/// request, regardless of how many requests were issued before any replies
/// were read back.
#[tokio::test]
async fn client_server_preserves_request_order() -> Result<()> {
    let address = format!("rpc-service-order-{}", Uuid::new_v4());
    let mut client = Endpoint::open(
        "",
        Some(address.clone()),
        Direction::Send,
        CommKind::Client(TransportKind::Rpc),
    )
    .await?;
    let mut server = Endpoint::open(
        "",
        Some(address),
        Direction::Recv,
        CommKind::Server(TransportKind::Rpc),
    )
    .await?;

    framing::send(&mut client, b"first").await?;
    framing::send(&mut client, b"second").await?;

    for expected in [b"first".to_vec(), b"second".to_vec()] {
        let RecvOutcome::Data(req) = framing::recv(&mut server).await? else {
            panic!("expected data");
        };
        assert_eq!(req, expected);
        let reply = [b"reply-to-".as_slice(), &req].concat();
        framing::send(&mut server, &reply).await?;
    }

    let RecvOutcome::Data(first_reply) = framing::recv(&mut client).await? else {
        panic!("expected data");
    };
    assert_eq!(first_reply, b"reply-to-first");

    let RecvOutcome::Data(second_reply) = framing::recv(&mut client).await? else {
        panic!("expected data");
    };
    assert_eq!(second_reply, b"reply-to-second");

    client.release().await?;
    server.release().await?;
    Ok(())
}
