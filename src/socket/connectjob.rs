//! Manages the connection process: DNS -> TCP -> TLS.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::dns::{Addrs, Name, Resolve, SocketAddrs};
use crate::socket::stream::BoxedSocket;
use crate::socket::tls::TlsConfig;
use std::io;
use tokio::net::TcpStream;

/// Drives transport establishment for a single connection attempt.
///
/// The phases are exposed individually so callers can observe progress
/// between them; [`ConnectJob::connect`] chains them for one-shot use.
pub struct ConnectJob;

impl ConnectJob {
    /// Resolve `host` into an ordered candidate sequence with `port` applied.
    ///
    /// IP-literal hosts bypass DNS entirely.
    pub async fn resolve(
        resolver: &dyn Resolve,
        host: &str,
        port: u16,
    ) -> Result<Addrs, NetError> {
        if let Some(literal) = SocketAddrs::try_parse(host, port) {
            tracing::debug!(host = %host, "host is an IP literal, skipping DNS");
            return Ok(Box::new(literal) as Addrs);
        }

        let addrs = resolver.resolve(Name::new(host)).await?;
        Ok(Box::new(addrs.map(move |mut addr| {
            addr.set_port(port);
            addr
        })) as Addrs)
    }

    /// Try candidates in order until one accepts the connection.
    ///
    /// An exhausted sequence with no attempts is a resolution failure; an
    /// exhausted sequence after failed attempts is a connection failure.
    pub async fn connect_tcp(
        candidates: Addrs,
        host: &str,
        port: u16,
    ) -> Result<TcpStream, NetError> {
        let mut last_err: Option<io::Error> = None;
        let mut attempts = 0usize;

        for addr in candidates {
            attempts += 1;
            tracing::debug!(%addr, "attempting TCP connect");
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    tracing::debug!(%addr, "TCP connection established");
                    return Ok(stream);
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "TCP connect failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(err) => {
                tracing::debug!(host = %host, attempts, "candidate addresses exhausted");
                Err::<TcpStream, _>(err).connection_context(host, port)
            }
            None => Err(NetError::resolution(host, "no candidate addresses")),
        }
    }

    /// Wrap an established TCP stream in TLS, verifying the peer.
    pub async fn negotiate_tls(
        stream: TcpStream,
        host: &str,
        tls: &TlsConfig,
    ) -> Result<BoxedSocket, NetError> {
        let connector = tls.connector().map_err(|e| NetError::handshake(host, e))?;
        let mut config = connector
            .configure()
            .map_err(|e| NetError::handshake(host, e))?;
        if !TlsConfig::should_set_sni(host) {
            config.set_use_server_name_indication(false);
        }

        let tls_stream = tokio_boring::connect(config, host, stream)
            .await
            .map_err(|e| {
                NetError::handshake(host, format!("TLS negotiation failed: {e:?}"))
            })?;
        tracing::debug!(host = %host, "TLS negotiation complete");
        Ok(BoxedSocket::new(tls_stream))
    }

    /// Full pipeline: resolve, connect, then TLS when configured.
    pub async fn connect(
        resolver: &dyn Resolve,
        host: &str,
        port: u16,
        tls: Option<&TlsConfig>,
    ) -> Result<BoxedSocket, NetError> {
        let candidates = Self::resolve(resolver, host, port).await?;
        let stream = Self::connect_tcp(candidates, host, port).await?;
        match tls {
            Some(tls) => Self::negotiate_tls(stream, host, tls).await,
            None => Ok(BoxedSocket::new(stream)),
        }
    }
}
