//! WebSocket session client integration tests.
//!
//! Every test runs against an in-process server reached through a hostname
//! override, so nothing here touches the network.

use futures::{SinkExt, StreamExt};
use network_monitor::base::neterror::NetError;
use network_monitor::dns::{Addrs, DnsResolverWithOverrides, GaiResolver, Name, Resolve, Resolving};
use network_monitor::ws::{ConnectionState, WebSocketClient};
use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

const TEST_HOST: &str = "echo.example.test";

/// Echo server: text frames are sent back verbatim, close is acknowledged.
async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind echo server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(_) => {
                            if ws.send(message).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => {
                            let _ = ws.close(None).await;
                            break;
                        }
                        _ => {}
                    }
                }
            });
        }
    });
    addr
}

/// Server that accepts the upgrade and immediately closes the session.
async fn spawn_closing_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let _ = ws.close(None).await;
                while ws.next().await.is_some() {}
            });
        }
    });
    addr
}

/// Server that accepts the upgrade and then goes silent: it never reads, so
/// a close is never acknowledged.
async fn spawn_mute_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(_ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                // Hold the stream open without driving it.
                std::future::pending::<()>().await;
            });
        }
    });
    addr
}

fn override_resolver(addr: SocketAddr) -> Arc<DnsResolverWithOverrides> {
    let mut overrides = HashMap::new();
    overrides.insert(Cow::Borrowed(TEST_HOST), vec![addr]);
    Arc::new(DnsResolverWithOverrides::new(
        Arc::new(GaiResolver::new()),
        overrides,
    ))
}

fn client_for(addr: SocketAddr) -> WebSocketClient {
    WebSocketClient::builder(TEST_HOST, "/echo", addr.port())
        .resolver(override_resolver(addr))
        .build(&Handle::current())
}

/// Connect and wait for the connect callback, forwarding messages to the
/// returned channel.
async fn connect_ok(client: &WebSocketClient) -> mpsc::UnboundedReceiver<Result<String, NetError>> {
    let (connect_tx, connect_rx) = oneshot::channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    client.connect(
        move |result| {
            let _ = connect_tx.send(result);
        },
        move |message| {
            let _ = message_tx.send(message);
        },
    );
    connect_rx
        .await
        .expect("connect callback fired")
        .expect("connect succeeded");
    message_rx
}

#[tokio::test]
async fn echo_round_trip() {
    let addr = spawn_echo_server().await;
    let client = client_for(addr);

    let mut messages = connect_ok(&client).await;
    assert_eq!(client.state(), ConnectionState::Open);

    let (send_tx, send_rx) = oneshot::channel();
    client.send("Hello WebSocket", move |result| {
        let _ = send_tx.send(result);
    });
    send_rx
        .await
        .expect("send callback fired")
        .expect("send succeeded");

    let echoed = messages
        .recv()
        .await
        .expect("receive callback fired")
        .expect("receive succeeded");
    assert_eq!(echoed, "Hello WebSocket");

    let (close_tx, close_rx) = oneshot::channel();
    client.close(move |result| {
        let _ = close_tx.send(result);
    });
    close_rx
        .await
        .expect("close callback fired")
        .expect("close succeeded");
    assert_eq!(client.state(), ConnectionState::Closed);
}

/// The original usage pattern: send from the connect callback, close from
/// the receive callback. Exercises that callbacks may issue follow-up
/// operations without deadlocking, and that a send issued the moment the
/// connect callback runs is observed by the peer (the echo proves the
/// frame went out after the upgrade).
#[tokio::test]
async fn callback_chain_scenario() {
    let addr = spawn_echo_server().await;
    let client = client_for(addr);

    let (echo_tx, echo_rx) = oneshot::channel();
    let (close_tx, close_rx) = oneshot::channel();

    let send_client = client.clone();
    let close_client = client.clone();
    let mut echo_tx = Some(echo_tx);
    let mut close_tx = Some(close_tx);
    client.connect(
        move |result| {
            result.expect("connect succeeded");
            send_client.send("Hello WebSocket", |result| {
                result.expect("send succeeded");
            });
        },
        move |message| {
            if let Ok(text) = message {
                if let Some(tx) = echo_tx.take() {
                    let _ = tx.send(text);
                    let mut done = close_tx.take();
                    close_client.close(move |result| {
                        if let Some(tx) = done.take() {
                            let _ = tx.send(result);
                        }
                    });
                }
            }
        },
    );

    assert_eq!(echo_rx.await.expect("echo received"), "Hello WebSocket");
    close_rx
        .await
        .expect("close callback fired")
        .expect("close succeeded");
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn sends_are_serialized_in_order() {
    let addr = spawn_echo_server().await;
    let client = client_for(addr);

    let mut messages = connect_ok(&client).await;

    // Two sends in flight at once; the driver must write them in
    // submission order.
    client.send("first", |result| result.expect("first send succeeded"));
    client.send("second", |result| result.expect("second send succeeded"));

    let first = messages.recv().await.expect("first echo").expect("text");
    let second = messages.recv().await.expect("second echo").expect("text");
    assert_eq!(first, "first");
    assert_eq!(second, "second");
}

#[tokio::test]
async fn connect_failure_leaves_client_failed() {
    // Reserve a port, then release it so the connect is refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = client_for(addr);
    let (connect_tx, connect_rx) = oneshot::channel();
    client.connect(
        move |result| {
            let _ = connect_tx.send(result);
        },
        |_message| {},
    );

    let err = connect_rx
        .await
        .expect("connect callback fired")
        .expect_err("connect failed");
    assert!(matches!(err, NetError::Connection { .. }), "got {err:?}");
    assert_eq!(client.state(), ConnectionState::Failed);

    // The session never opened; send must be rejected.
    let (send_tx, send_rx) = oneshot::channel();
    client.send("too late", move |result| {
        let _ = send_tx.send(result);
    });
    assert!(matches!(
        send_rx.await.expect("send callback fired"),
        Err(NetError::NotConnected)
    ));
}

struct FailingResolver;

impl Resolve for FailingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move { Err(NetError::resolution(name.as_str(), "no records")) })
    }
}

#[tokio::test]
async fn resolution_failure_is_specific() {
    let client = WebSocketClient::builder(TEST_HOST, "/echo", 80)
        .resolver(Arc::new(FailingResolver))
        .build(&Handle::current());

    let (connect_tx, connect_rx) = oneshot::channel();
    client.connect(
        move |result| {
            let _ = connect_tx.send(result);
        },
        |_message| {},
    );

    let err = connect_rx
        .await
        .expect("connect callback fired")
        .expect_err("connect failed");
    assert!(matches!(err, NetError::Resolution { .. }), "got {err:?}");
    assert_eq!(client.state(), ConnectionState::Failed);
}

struct EmptyResolver;

impl Resolve for EmptyResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        Box::pin(async move { Ok(Box::new(std::iter::empty()) as Addrs) })
    }
}

#[tokio::test]
async fn empty_candidate_sequence_is_resolution_failure() {
    let client = WebSocketClient::builder(TEST_HOST, "/echo", 80)
        .resolver(Arc::new(EmptyResolver))
        .build(&Handle::current());

    let (connect_tx, connect_rx) = oneshot::channel();
    client.connect(
        move |result| {
            let _ = connect_tx.send(result);
        },
        |_message| {},
    );

    let err = connect_rx
        .await
        .expect("connect callback fired")
        .expect_err("connect failed");
    assert!(matches!(err, NetError::Resolution { .. }), "got {err:?}");
}

struct HangingResolver;

impl Resolve for HangingResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        Box::pin(std::future::pending())
    }
}

#[tokio::test]
async fn close_during_connect_cancels_pipeline() {
    let client = WebSocketClient::builder(TEST_HOST, "/echo", 80)
        .resolver(Arc::new(HangingResolver))
        .build(&Handle::current());

    let (connect_tx, connect_rx) = oneshot::channel();
    client.connect(
        move |result| {
            let _ = connect_tx.send(result);
        },
        |_message| {},
    );

    // Let the driver enter the resolve phase.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.state(), ConnectionState::Resolving);

    let (close_tx, close_rx) = oneshot::channel();
    client.close(move |result| {
        let _ = close_tx.send(result);
    });

    let err = connect_rx
        .await
        .expect("connect callback fired")
        .expect_err("connect was cancelled");
    assert!(matches!(err, NetError::Cancelled), "got {err:?}");
    close_rx
        .await
        .expect("close callback fired")
        .expect("close succeeded");
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn double_close_is_idempotent() {
    let addr = spawn_echo_server().await;
    let client = client_for(addr);

    let _messages = connect_ok(&client).await;

    let (first_tx, first_rx) = oneshot::channel();
    client.close(move |result| {
        let _ = first_tx.send(result);
    });
    first_rx
        .await
        .expect("first close callback fired")
        .expect("first close succeeded");
    assert_eq!(client.state(), ConnectionState::Closed);

    let (second_tx, second_rx) = oneshot::channel();
    client.close(move |result| {
        let _ = second_tx.send(result);
    });
    second_rx
        .await
        .expect("second close callback fired")
        .expect("second close also reports success");
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let addr = spawn_echo_server().await;
    let client = client_for(addr);

    let _messages = connect_ok(&client).await;

    let (connect_tx, connect_rx) = oneshot::channel();
    client.connect(
        move |result| {
            let _ = connect_tx.send(result);
        },
        |_message| {},
    );

    let err = connect_rx
        .await
        .expect("connect callback fired")
        .expect_err("second connect rejected");
    assert!(matches!(err, NetError::AlreadyConnected), "got {err:?}");
    // The original session is untouched.
    assert_eq!(client.state(), ConnectionState::Open);
}

#[tokio::test]
async fn peer_initiated_close_surfaces_once() {
    let addr = spawn_closing_server().await;
    let client = client_for(addr);

    let mut messages = connect_ok(&client).await;

    let notice = messages.recv().await.expect("close notice delivered");
    assert!(matches!(notice, Err(NetError::ConnectionClosed)));
    assert_eq!(client.state(), ConnectionState::Closed);

    // The receive loop must not re-arm after the session ended.
    assert!(messages.recv().await.is_none());
}

#[tokio::test]
async fn close_without_acknowledgement_times_out_softly() {
    let addr = spawn_mute_server().await;
    let client = WebSocketClient::builder(TEST_HOST, "/echo", addr.port())
        .resolver(override_resolver(addr))
        .close_timeout(Duration::from_millis(200))
        .build(&Handle::current());

    let _messages = connect_ok(&client).await;

    let (close_tx, close_rx) = oneshot::channel();
    client.close(move |result| {
        let _ = close_tx.send(result);
    });

    let err = close_rx
        .await
        .expect("close callback fired")
        .expect_err("close timed out");
    assert!(matches!(err, NetError::CloseTimeout), "got {err:?}");
    // Soft failure: the transport is still released.
    assert_eq!(client.state(), ConnectionState::Closed);
}
