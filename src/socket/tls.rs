//! TLS configuration with BoringSSL.

use boring::error::ErrorStack;
use boring::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use std::path::{Path, PathBuf};

/// TLS settings for a session.
///
/// When a trust store is configured, the peer certificate is verified
/// against that file; otherwise the system's default roots are used.
/// Verification failures are fatal to the handshake and never retried.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    trust_store: Option<PathBuf>,
}

impl TlsConfig {
    /// TLS with the system's default trust roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// TLS verifying the peer against the CA file at `path`.
    pub fn with_trust_store(path: impl Into<PathBuf>) -> Self {
        Self {
            trust_store: Some(path.into()),
        }
    }

    /// The configured trust-store file, if any.
    pub fn trust_store(&self) -> Option<&Path> {
        self.trust_store.as_deref()
    }

    /// Build a connector from this configuration.
    pub fn connector(&self) -> Result<SslConnector, ErrorStack> {
        let mut builder = SslConnector::builder(SslMethod::tls())?;
        builder.set_min_proto_version(Some(SslVersion::TLS1_2))?;
        if let Some(path) = &self.trust_store {
            builder.set_ca_file(path)?;
        }
        builder.set_verify(SslVerifyMode::PEER);
        Ok(builder.build())
    }

    /// Check if SNI should be set for this host.
    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.parse::<std::net::IpAddr>().is_err()
    }
}
