//! Session driver task.
//!
//! One driver task per client owns the transport, the state machine, and
//! every callback invocation. The task runs two phases: the handshake
//! pipeline (resolve → connect → TLS → upgrade), cancellable by a close,
//! and the open exchange loop, which serializes outbound frames from the
//! command queue while keeping a receive armed.

use crate::base::neterror::NetError;
use crate::dns::Resolve;
use crate::socket::connectjob::ConnectJob;
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::TlsConfig;
use crate::ws::client::{Endpoint, OnComplete, OnMessage};
use crate::ws::state::{ConnectionState, StateCell};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{client_async, WebSocketStream};

type WsSession = WebSocketStream<BoxedSocket>;

/// Operations forwarded from client handles to the driver.
///
/// The channel doubles as the outbound serialization queue: the driver
/// processes one command at a time, in submission order.
pub(crate) enum Command {
    Send {
        payload: String,
        on_complete: OnComplete,
    },
    Close {
        on_complete: OnComplete,
    },
}

pub(crate) struct Driver {
    endpoint: Endpoint,
    tls: Option<TlsConfig>,
    resolver: Arc<dyn Resolve>,
    close_timeout: Duration,
    state: Arc<StateCell>,
    rx: mpsc::UnboundedReceiver<Command>,
    on_message: OnMessage,
}

impl Driver {
    pub fn new(
        endpoint: Endpoint,
        tls: Option<TlsConfig>,
        resolver: Arc<dyn Resolve>,
        close_timeout: Duration,
        state: Arc<StateCell>,
        rx: mpsc::UnboundedReceiver<Command>,
        on_message: OnMessage,
    ) -> Self {
        Self {
            endpoint,
            tls,
            resolver,
            close_timeout,
            state,
            rx,
            on_message,
        }
    }

    pub async fn run(mut self, on_connect: OnComplete) {
        self.drive(on_connect).await;

        // Commands queued behind the session's end still get their
        // exactly-once completion.
        self.rx.close();
        while let Ok(command) = self.rx.try_recv() {
            match command {
                Command::Send { on_complete, .. } => on_complete(Err(NetError::NotConnected)),
                Command::Close { on_complete } => on_complete(Ok(())),
            }
        }
    }

    async fn drive(&mut self, on_connect: OnComplete) {
        let pipeline = Self::establish(
            self.endpoint.clone(),
            self.tls.clone(),
            Arc::clone(&self.resolver),
            Arc::clone(&self.state),
        );
        tokio::pin!(pipeline);

        // Phase 1: handshake pipeline. A close arriving here cancels the
        // pending I/O by dropping the pipeline future.
        let result = loop {
            tokio::select! {
                result = &mut pipeline => break result,
                command = self.rx.recv() => match command {
                    Some(Command::Send { on_complete, .. }) => {
                        on_complete(Err(NetError::NotConnected));
                    }
                    Some(Command::Close { on_complete }) => {
                        tracing::debug!("close requested before the session opened");
                        self.state.set(ConnectionState::Closed);
                        on_connect(Err(NetError::Cancelled));
                        on_complete(Ok(()));
                        return;
                    }
                    None => {
                        self.state.set(ConnectionState::Closed);
                        on_connect(Err(NetError::Cancelled));
                        return;
                    }
                },
            }
        };

        let session = match result {
            Ok(session) => session,
            Err(err) => {
                self.state.set(ConnectionState::Failed);
                tracing::warn!(error = %err, "session establishment failed");
                on_connect(Err(err));
                return;
            }
        };

        self.state.set(ConnectionState::Open);
        tracing::debug!(host = %self.endpoint.host(), "session open");
        on_connect(Ok(()));

        // Phase 2: exchange until closed or failed.
        self.exchange(session).await;
    }

    async fn establish(
        endpoint: Endpoint,
        tls: Option<TlsConfig>,
        resolver: Arc<dyn Resolve>,
        state: Arc<StateCell>,
    ) -> Result<WsSession, NetError> {
        state.set(ConnectionState::Resolving);
        let candidates =
            ConnectJob::resolve(&resolver, endpoint.host(), endpoint.port()).await?;

        state.set(ConnectionState::Connecting);
        let stream =
            ConnectJob::connect_tcp(candidates, endpoint.host(), endpoint.port()).await?;

        state.set(ConnectionState::Handshaking);
        let socket = match &tls {
            Some(tls) => ConnectJob::negotiate_tls(stream, endpoint.host(), tls).await?,
            None => BoxedSocket::new(stream),
        };

        let url = endpoint.ws_url(tls.is_some());
        let (session, response) = client_async(url.as_str(), socket).await.map_err(|e| {
            NetError::handshake(endpoint.host(), format!("WebSocket upgrade failed: {e}"))
        })?;
        tracing::debug!(status = %response.status(), "WebSocket upgrade accepted");
        Ok(session)
    }

    async fn exchange(&mut self, mut session: WsSession) {
        // `None` means every client handle is gone and there is no one
        // left to notify.
        let close_callback: Option<OnComplete> = loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(Command::Send { payload, on_complete }) => {
                        // One frame at a time, in submission order.
                        match session.send(Message::Text(payload)).await {
                            Ok(()) => on_complete(Ok(())),
                            Err(e) => {
                                self.state.set(ConnectionState::Failed);
                                tracing::warn!(error = %e, "write failed, session terminated");
                                on_complete(Err(NetError::write(e)));
                                return;
                            }
                        }
                    }
                    Some(Command::Close { on_complete }) => break Some(on_complete),
                    None => break None,
                },
                frame = session.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        // Deliver, then re-arm by looping.
                        (self.on_message)(Ok(text));
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!("ignoring binary frame on a text-only session");
                    }
                    Some(Ok(Message::Close(_))) => {
                        // Peer-initiated close. The acknowledgement is
                        // queued by the protocol layer; flush it out.
                        let _ = tokio::time::timeout(self.close_timeout, session.close(None)).await;
                        self.state.set(ConnectionState::Closed);
                        (self.on_message)(Err(NetError::ConnectionClosed));
                        return;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong handled by the protocol layer.
                    }
                    Some(Err(e)) => {
                        self.state.set(ConnectionState::Failed);
                        tracing::warn!(error = %e, "read failed, session terminated");
                        (self.on_message)(Err(NetError::read(e)));
                        return;
                    }
                    None => {
                        self.state.set(ConnectionState::Failed);
                        (self.on_message)(Err(NetError::read("connection closed unexpectedly")));
                        return;
                    }
                },
            }
        };

        match close_callback {
            Some(on_complete) => self.shutdown(session, on_complete).await,
            None => {
                self.state.set(ConnectionState::Closing);
                let _ = tokio::time::timeout(self.close_timeout, session.close(None)).await;
                self.state.set(ConnectionState::Closed);
            }
        }
    }

    async fn shutdown(&mut self, mut session: WsSession, on_complete: OnComplete) {
        self.state.set(ConnectionState::Closing);
        tracing::debug!("closing session");

        let result = tokio::time::timeout(self.close_timeout, async {
            if let Err(e) = session.close(None).await {
                match e {
                    WsError::ConnectionClosed | WsError::AlreadyClosed => {}
                    other => {
                        return Err(NetError::write(format!("close frame not sent: {other}")))
                    }
                }
            }

            // Drain until the peer acknowledges. Frames arriving while
            // closing are discarded, not delivered.
            while let Some(frame) = session.next().await {
                match frame {
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "transport error while draining close");
                        break;
                    }
                }
            }
            Ok(())
        })
        .await;

        // The transport is released regardless of how the wait ended.
        self.state.set(ConnectionState::Closed);
        match result {
            Ok(Ok(())) => on_complete(Ok(())),
            Ok(Err(err)) => on_complete(Err(err)),
            Err(_elapsed) => {
                tracing::warn!(timeout = ?self.close_timeout, "peer never acknowledged close");
                on_complete(Err(NetError::CloseTimeout));
            }
        }
    }
}
