//! # network-monitor
//!
//! An asynchronous WebSocket session client for Rust.
//!
//! `network-monitor` drives a single WebSocket session through an explicit
//! lifecycle: DNS resolution, TCP connect over an ordered candidate list,
//! optional TLS negotiation against a caller-supplied trust store, the
//! WebSocket upgrade, and a text-frame exchange phase with a clean protocol
//! close. Every operation completes through a callback, and all callbacks
//! for one client run serialized on that client's driver task.
//!
//! ## Features
//!
//! - **Explicit session lifecycle**: observable state machine from `Idle`
//!   through `Open` to `Closed`/`Failed`
//! - **Pluggable DNS**: system resolver, hickory-dns, or hostname overrides
//! - **TLS**: BoringSSL with peer verification against a trust-store file
//! - **Serialized sends**: outbound frames written one at a time, in order
//! - **File download helper**: one-shot HTTP(S) GET for fetching a
//!   trust-store file before client construction
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use network_monitor::ws::WebSocketClient;
//! use tokio::runtime::Handle;
//!
//! let client = WebSocketClient::new("echo.example.com", "/echo", 80, &Handle::current());
//! client.connect(
//!     |result| println!("connected: {result:?}"),
//!     |message| println!("received: {message:?}"),
//! );
//! ```
//!
//! ## Modules
//!
//! - [`base`] - error taxonomy and context helpers
//! - [`dns`] - pluggable DNS resolution
//! - [`socket`] - stream types, TLS configuration, and the connect pipeline
//! - [`ws`] - the WebSocket session client
//! - [`download`] - one-shot HTTP(S) file download

pub mod base;
pub mod dns;
pub mod download;
pub mod socket;
pub mod ws;
