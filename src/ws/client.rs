//! Callback-driven WebSocket session client.

use crate::base::neterror::NetError;
use crate::dns::{GaiResolver, Resolve};
use crate::socket::tls::TlsConfig;
use crate::ws::driver::{Command, Driver};
use crate::ws::state::{ConnectionState, StateCell};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// How long a close waits for the peer's acknowledgement.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection target. Immutable for the life of a client.
#[derive(Debug, Clone)]
pub struct Endpoint {
    host: String,
    path: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, path: impl Into<String>, port: u16) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Self {
            host: host.into(),
            path,
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL used for the upgrade request.
    pub(crate) fn ws_url(&self, secure: bool) -> String {
        let scheme = if secure { "wss" } else { "ws" };
        format!(
            "{scheme}://{host}:{port}{path}",
            host = self.host,
            port = self.port,
            path = self.path
        )
    }
}

/// Completion callback for connect, send and close operations.
///
/// Invoked exactly once, on the client's driver task, never re-entrantly
/// from within the call that registered it.
pub type OnComplete = Box<dyn FnOnce(Result<(), NetError>) + Send + 'static>;

/// Persistent callback receiving each inbound text message.
///
/// Registered once at connect time; invoked for every received frame until
/// the session ends. A session-terminating read failure or peer close is
/// delivered here exactly once as an `Err`.
pub type OnMessage = Box<dyn FnMut(Result<String, NetError>) + Send + 'static>;

/// Asynchronous WebSocket session client.
///
/// A client drives exactly one session. Handles are cheap to clone and
/// share the underlying session, which lets completion callbacks issue
/// follow-up operations (send from the connect callback, close from the
/// receive callback, and so on).
///
/// The execution context is injected: all driver work and callbacks run on
/// the [`Handle`] given at construction.
#[derive(Clone)]
pub struct WebSocketClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    endpoint: Endpoint,
    tls: Option<TlsConfig>,
    resolver: Arc<dyn Resolve>,
    close_timeout: Duration,
    handle: Handle,
    state: Arc<StateCell>,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl WebSocketClient {
    /// Create a client for a plain-TCP session.
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        port: u16,
        handle: &Handle,
    ) -> Self {
        Self::builder(host, path, port).build(handle)
    }

    /// Start building a client with non-default options.
    pub fn builder(
        host: impl Into<String>,
        path: impl Into<String>,
        port: u16,
    ) -> WebSocketClientBuilder {
        WebSocketClientBuilder::new(Endpoint::new(host, path, port))
    }

    /// The configured connection target.
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Current session state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Start the session: resolve, connect, optionally negotiate TLS, and
    /// perform the WebSocket upgrade.
    ///
    /// `on_connect` fires exactly once, with `Ok` when the session reaches
    /// `Open` or with the specific error that stopped the pipeline.
    /// `on_message` is registered for the life of the session and receives
    /// every inbound text frame.
    ///
    /// A client drives exactly one session; a second call fails with
    /// [`NetError::AlreadyConnected`].
    pub fn connect(
        &self,
        on_connect: impl FnOnce(Result<(), NetError>) + Send + 'static,
        on_message: impl FnMut(Result<String, NetError>) + Send + 'static,
    ) {
        let on_connect: OnComplete = Box::new(on_connect);

        let mut slot = self.lock_commands();
        if slot.is_some() || self.inner.state.get() != ConnectionState::Idle {
            drop(slot);
            self.defer(on_connect, Err(NetError::AlreadyConnected));
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        drop(slot);

        let driver = Driver::new(
            self.inner.endpoint.clone(),
            self.inner.tls.clone(),
            Arc::clone(&self.inner.resolver),
            self.inner.close_timeout,
            Arc::clone(&self.inner.state),
            rx,
            Box::new(on_message),
        );
        self.inner.handle.spawn(driver.run(on_connect));
    }

    /// Send one text frame.
    ///
    /// Valid only while the session is `Open`; otherwise `on_complete`
    /// observes [`NetError::NotConnected`]. Sends issued before a prior
    /// send completed are serialized by the driver and written in
    /// submission order.
    pub fn send(
        &self,
        message: impl Into<String>,
        on_complete: impl FnOnce(Result<(), NetError>) + Send + 'static,
    ) {
        let on_complete: OnComplete = Box::new(on_complete);

        if self.inner.state.get() != ConnectionState::Open {
            self.defer(on_complete, Err(NetError::NotConnected));
            return;
        }

        let sender = self.lock_commands().clone();
        let Some(sender) = sender else {
            self.defer(on_complete, Err(NetError::NotConnected));
            return;
        };

        let command = Command::Send {
            payload: message.into(),
            on_complete,
        };
        if let Err(rejected) = sender.send(command) {
            // The driver exited between the state check and the send.
            if let Command::Send { on_complete, .. } = rejected.0 {
                self.defer(on_complete, Err(NetError::NotConnected));
            }
        }
    }

    /// Close the session.
    ///
    /// From `Open`, a protocol close frame is sent and the call waits
    /// (bounded by the configured close timeout) for the peer's
    /// acknowledgement. From an earlier phase, the pending pipeline is
    /// cancelled and its connect callback observes
    /// [`NetError::Cancelled`]. Closing an already-closed or never-started
    /// client is a no-op reporting success, so best-effort cleanup can call
    /// this unconditionally.
    pub fn close(&self, on_complete: impl FnOnce(Result<(), NetError>) + Send + 'static) {
        let on_complete: OnComplete = Box::new(on_complete);

        let sender = self.lock_commands().clone();
        let Some(sender) = sender else {
            self.defer(on_complete, Ok(()));
            return;
        };

        if let Err(rejected) = sender.send(Command::Close { on_complete }) {
            // The driver already exited; the session is torn down.
            if let Command::Close { on_complete } = rejected.0 {
                self.defer(on_complete, Ok(()));
            }
        }
    }

    fn lock_commands(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<Command>>> {
        self.inner
            .commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Completion callbacks never run re-entrantly inside the call that
    /// registered them.
    fn defer(&self, callback: OnComplete, result: Result<(), NetError>) {
        self.inner.handle.spawn(async move { callback(result) });
    }
}

/// Builder for a [`WebSocketClient`].
pub struct WebSocketClientBuilder {
    endpoint: Endpoint,
    trust_store: Option<PathBuf>,
    resolver: Option<Arc<dyn Resolve>>,
    close_timeout: Duration,
}

impl WebSocketClientBuilder {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            trust_store: None,
            resolver: None,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Secure the session with TLS, verifying the peer certificate against
    /// the CA file at `path`.
    pub fn trust_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.trust_store = Some(path.into());
        self
    }

    /// Use a custom resolver instead of the system one.
    pub fn resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Bound the wait for the peer's close acknowledgement.
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Build the client on the given execution context.
    pub fn build(self, handle: &Handle) -> WebSocketClient {
        WebSocketClient {
            inner: Arc::new(ClientInner {
                endpoint: self.endpoint,
                tls: self.trust_store.map(TlsConfig::with_trust_store),
                resolver: self
                    .resolver
                    .unwrap_or_else(|| Arc::new(GaiResolver::new())),
                close_timeout: self.close_timeout,
                handle: handle.clone(),
                state: Arc::new(StateCell::new()),
                commands: Mutex::new(None),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_normalizes_path() {
        let endpoint = Endpoint::new("example.com", "echo", 80);
        assert_eq!(endpoint.path(), "/echo");

        let endpoint = Endpoint::new("example.com", "/echo", 80);
        assert_eq!(endpoint.path(), "/echo");
    }

    #[test]
    fn test_endpoint_ws_url() {
        let endpoint = Endpoint::new("example.com", "/echo", 8080);
        assert_eq!(endpoint.ws_url(false), "ws://example.com:8080/echo");
        assert_eq!(endpoint.ws_url(true), "wss://example.com:8080/echo");
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let client = WebSocketClient::new("example.invalid", "/", 80, &Handle::current());
        assert_eq!(client.state(), ConnectionState::Idle);

        let (tx, rx) = tokio::sync::oneshot::channel();
        client.send("hello", move |result| {
            let _ = tx.send(result);
        });

        let result = rx.await.expect("send callback fired");
        assert!(matches!(result, Err(NetError::NotConnected)));
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_close_before_connect_is_noop_success() {
        let client = WebSocketClient::new("example.invalid", "/", 80, &Handle::current());

        let (tx, rx) = tokio::sync::oneshot::channel();
        client.close(move |result| {
            let _ = tx.send(result);
        });

        assert!(rx.await.expect("close callback fired").is_ok());
        assert_eq!(client.state(), ConnectionState::Idle);
    }
}
