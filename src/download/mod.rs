//! One-shot file download over HTTP(S).
//!
//! Used to fetch a TLS trust-store file before constructing a
//! [`WebSocketClient`](crate::ws::WebSocketClient). This is a boundary
//! collaborator, not part of the session protocol: one GET, streamed to
//! disk, no redirects, no retries.

use crate::base::neterror::NetError;
use crate::dns::GaiResolver;
use crate::socket::connectjob::ConnectJob;
use crate::socket::tls::TlsConfig;
use http::{header, Request};
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Download `file_url` to `destination`.
///
/// The parent directory of `destination` must exist. For `https` URLs the
/// peer certificate is verified against `ca_cert` when given, or the
/// system roots otherwise.
pub async fn download_file(
    file_url: &str,
    destination: &Path,
    ca_cert: Option<&Path>,
) -> Result<(), NetError> {
    let url =
        Url::parse(file_url).map_err(|e| NetError::InvalidUrl(format!("{file_url}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| NetError::InvalidUrl(format!("{file_url}: missing host")))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| NetError::InvalidUrl(format!("{file_url}: missing port")))?;

    let tls = match url.scheme() {
        "https" => Some(match ca_cert {
            Some(path) => TlsConfig::with_trust_store(path),
            None => TlsConfig::new(),
        }),
        "http" => None,
        other => {
            return Err(NetError::InvalidUrl(format!(
                "{file_url}: unsupported scheme {other}"
            )))
        }
    };

    let resolver = GaiResolver::new();
    let socket = ConnectJob::connect(&resolver, &host, port, tls.as_ref()).await?;

    let io = TokioIo::new(socket);
    let (mut sender, conn) = http1::handshake(io)
        .await
        .map_err(|e| NetError::handshake(&host, format!("HTTP handshake failed: {e}")))?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "download connection terminated");
        }
    });

    let authority = match (url.scheme(), port) {
        ("http", 80) | ("https", 443) => host.clone(),
        _ => format!("{host}:{port}"),
    };
    let mut path_and_query = url.path().to_string();
    if let Some(query) = url.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }

    let request = Request::builder()
        .method(http::Method::GET)
        .uri(path_and_query)
        .header(header::HOST, authority)
        .header(
            header::USER_AGENT,
            concat!("network-monitor/", env!("CARGO_PKG_VERSION")),
        )
        .body(Empty::<bytes::Bytes>::new())
        .map_err(|e| NetError::InvalidUrl(e.to_string()))?;

    tracing::debug!(url = %url, "downloading file");
    let response = sender
        .send_request(request)
        .await
        .map_err(|e| NetError::read(format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(status = %status, "download rejected");
        return Err(NetError::HttpStatus(status.as_u16()));
    }

    let mut file = tokio::fs::File::create(destination).await?;
    let mut body = response.into_body();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| NetError::read(format!("body stream failed: {e}")))?;
        if let Some(chunk) = frame.data_ref() {
            file.write_all(chunk).await?;
        }
    }
    file.flush().await?;

    tracing::debug!(destination = %destination.display(), "download complete");
    Ok(())
}
