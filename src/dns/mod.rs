//! DNS Resolution Module
//!
//! Provides pluggable DNS resolution with support for:
//! - System resolver (getaddrinfo via thread pool)
//! - Async hickory-dns resolver
//! - Hostname-to-address override mechanism
//!
//! # Architecture
//!
//! The [`Resolve`] trait is the core abstraction. A resolver turns a
//! hostname into a lazy, finite, ordered sequence of candidate addresses;
//! the connect pipeline consumes the sequence in order until one candidate
//! accepts a connection or the sequence is exhausted.
//!
//! # Example
//!
//! ```rust,ignore
//! use network_monitor::dns::{GaiResolver, Name, Resolve};
//!
//! let resolver = GaiResolver::new();
//! let addrs = resolver.resolve(Name::new("example.com")).await?;
//! for addr in addrs {
//!     println!("Resolved: {}", addr);
//! }
//! ```

mod gai;
mod hickory;
mod resolve;

pub use gai::{GaiResolver, SocketAddrs};
pub use hickory::HickoryResolver;
pub use resolve::{Addrs, DnsResolverWithOverrides, Name, Resolve, Resolving};
