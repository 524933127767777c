//! Socket and connection establishment.
//!
//! - [`connectjob`]: DNS → TCP → TLS connection flow
//! - [`stream`]: polymorphic socket type over plain TCP and TLS
//! - [`tls`]: TLS configuration with BoringSSL

pub mod connectjob;
pub mod stream;
pub mod tls;
