//! WebSocket session client.
//!
//! Drives one text-mode WebSocket session through its full lifecycle:
//! resolve → TCP connect → optional TLS → upgrade → open exchange → close.
//! Every operation completes through a callback; all callbacks for one
//! client run serialized on that client's driver task.
//!
//! # Example
//! ```ignore
//! use network_monitor::ws::WebSocketClient;
//! use tokio::runtime::Handle;
//!
//! let client = WebSocketClient::new("echo.example.com", "/echo", 80, &Handle::current());
//! client.connect(
//!     |result| println!("connected: {result:?}"),
//!     |message| println!("received: {message:?}"),
//! );
//! ```

mod client;
mod driver;
mod state;

pub use client::{Endpoint, OnComplete, OnMessage, WebSocketClient, WebSocketClientBuilder};
pub use state::ConnectionState;
