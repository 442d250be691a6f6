use anyhow::Result;
use poly_comm::{variadic::Value, CommKind, Direction, Endpoint, Serializer, TransportKind};
use uuid::Uuid;

/// A sender configured with a `Format` serializer advertises it in the
/// first frame's header; the receiver, uninitialized until then, adopts the
/// same type and format string without being told explicitly.
#[tokio::test]
async fn receiver_adopts_senders_format_serializer() -> Result<()> {
    let address = format!("negotiate-{}", Uuid::new_v4());
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

    sender.set_serializer(Serializer::Format("%d %s".to_string()));
    assert!(receiver.serializer().is_uninitialized());

    let args = vec![Value::Int(42), Value::Str("answer".to_string())];
    poly_comm::variadic::vsend(&mut sender, &args).await?;

    let decoded = poly_comm::variadic::vrecv(&mut receiver)
        .await?
        .expect("data frame, not EOF");
    assert_eq!(decoded, args);
    assert!(matches!(receiver.serializer(), Serializer::Format(fmt) if fmt == "%d %s"));

    sender.release().await?;
    assert!(poly_comm::variadic::vrecv(&mut receiver).await?.is_none());
    receiver.release().await?;
    Ok(())
}

/// `vsend`/`vrecv` on a `Client`/`Server` overlay must resolve the serializer
/// that actually negotiates and frames — the request/handle sub-endpoint —
/// not the overlay endpoint's own field, which is never negotiated.
#[tokio::test]
async fn vsend_vrecv_work_through_client_server_overlays() -> Result<()> {
    let address = format!("negotiate-rpc-{}", Uuid::new_v4());
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

    client.set_serializer(Serializer::Format("%d %s".to_string()));

    let request = vec![Value::Int(7), Value::Str("ping".to_string())];
    poly_comm::variadic::vsend(&mut client, &request).await?;

    let decoded_request = poly_comm::variadic::vrecv(&mut server)
        .await?
        .expect("request, not EOF");
    assert_eq!(decoded_request, request);

    // The server's handle sub-endpoint adopted the client's format on
    // receipt; a server-side vsend with matching typed args must format
    // against that negotiated serializer rather than failing as if the
    // overlay were still `Uninitialized`.
    let reply = vec![Value::Int(1), Value::Str("pong".to_string())];
    poly_comm::variadic::vsend(&mut server, &reply).await?;

    let decoded_reply = poly_comm::variadic::vrecv(&mut client)
        .await?
        .expect("reply, not EOF");
    assert_eq!(decoded_reply, reply);

    client.release().await?;
    server.release().await?;
    Ok(())
}
