//! Monitoring endpoint client.
//!
//! Issues single HTTP/1.1 GET requests against the streaming server's
//! `channelsz` endpoint over plain TCP or TLS, decodes the channel snapshot
//! and tells a missing channel apart from a misconfigured endpoint.
//! Nothing here retries; the controller polls again on its next cycle.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, HOST, USER_AGENT};
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tracing::{debug, error, info, warn};

use crate::config::StanMetadata;
use crate::endpoint::{channel_endpoint, channels_endpoint};
use crate::error::{ScalerError, ScalerResult, TransportError};
use crate::snapshot::ChannelSnapshot;

const USER_AGENT_VALUE: &str = concat!("stanscale/", env!("CARGO_PKG_VERSION"));

/// Caller-side bounds on one poll: an optional deadline and an optional
/// cancel signal.
///
/// Dropping the poll future also aborts the request; the context exists so
/// the caller gets a [`TransportError`] back instead.
#[derive(Debug, Clone, Default)]
pub struct PollContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl PollContext {
    /// A context with no deadline and no cancel signal.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abort in-flight requests once `true` is sent on the channel.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Time left before the deadline, if one is set.
    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Resolves once the cancel signal fires; never resolves without one.
    async fn cancelled(&self) {
        let Some(mut rx) = self.cancel.clone() else {
            return pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling.
                return pending().await;
            }
        }
    }
}

/// Status and full body of a monitoring response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// HTTP client for the monitoring endpoint.
///
/// Holds no per-request state, so one client can serve concurrent polls.
#[derive(Clone)]
pub struct MonitoringClient {
    tls: Arc<rustls::ClientConfig>,
    timeout: Duration,
}

impl std::fmt::Debug for MonitoringClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MonitoringClient {
    /// Create a client trusting the Mozilla root certificate store.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self::with_tls_config(timeout, Arc::new(config)))
    }

    /// Create a client with a pre-built TLS configuration.
    pub fn with_tls_config(timeout: Duration, tls: Arc<rustls::ClientConfig>) -> Self {
        Self { tls, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and read the whole body.
    ///
    /// Bounded by the client timeout and the context deadline, whichever
    /// is earlier.
    pub async fn get(&self, ctx: &PollContext, url: &str) -> Result<HttpResponse, TransportError> {
        if ctx.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let target = RequestTarget::parse(url)?;
        let budget = ctx
            .remaining()
            .map_or(self.timeout, |left| left.min(self.timeout));

        tokio::select! {
            result = tokio::time::timeout(budget, self.exchange(&target)) => {
                result.unwrap_or(Err(TransportError::Timeout(budget)))
            }
            _ = ctx.cancelled() => Err(TransportError::Cancelled),
        }
    }

    /// Fetch the snapshot of the configured channel.
    ///
    /// A 404 triggers a second request to the bare `channelsz` endpoint:
    /// another 404 means the channel does not exist yet, anything else
    /// means the endpoint itself is wrong.
    pub async fn fetch_channel(
        &self,
        ctx: &PollContext,
        meta: &StanMetadata,
    ) -> ScalerResult<ChannelSnapshot> {
        let url = channel_endpoint(&meta.monitoring_endpoint, meta.use_https, &meta.subject);

        let resp = self.get(ctx, &url).await.map_err(|e| {
            error!(
                error = %e,
                endpoint = %meta.monitoring_endpoint,
                "unable to access the streaming server monitoring endpoint"
            );
            e
        })?;

        if resp.status == StatusCode::NOT_FOUND {
            return Err(self.classify_not_found(ctx, meta, url).await);
        }

        if !resp.status.is_success() {
            warn!(status = %resp.status, %url, "unexpected monitoring response");
            return Err(ScalerError::UnexpectedStatus {
                endpoint: url,
                status: resp.status.as_u16(),
            });
        }

        ChannelSnapshot::from_json(&resp.body).map_err(|e| {
            error!(error = %e, %url, "unable to decode channel info");
            ScalerError::Decode(e)
        })
    }

    /// Classify a 404 on the channel endpoint.
    async fn classify_not_found(
        &self,
        ctx: &PollContext,
        meta: &StanMetadata,
        channel_url: String,
    ) -> ScalerError {
        let base_url = channels_endpoint(&meta.monitoring_endpoint, meta.use_https);
        let base = match self.get(ctx, &base_url).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    error = %e,
                    endpoint = %meta.monitoring_endpoint,
                    "unable to access the streaming server monitoring endpoint"
                );
                return e.into();
            }
        };

        if base.status == StatusCode::NOT_FOUND {
            info!(
                url = %channel_url,
                channel = %meta.subject,
                "streaming channel returned 404, ensure it has been created"
            );
            ScalerError::ChannelNotFound {
                subject: meta.subject.clone(),
            }
        } else {
            warn!(
                status = %base.status,
                endpoint = %meta.monitoring_endpoint,
                "unable to reach the streaming server, check the configured monitoring endpoint"
            );
            ScalerError::EndpointMisconfigured {
                endpoint: channel_url,
                status: base.status.as_u16(),
            }
        }
    }

    async fn exchange(&self, target: &RequestTarget) -> Result<HttpResponse, TransportError> {
        let address = format!("{}:{}", target.host, target.port);
        let tcp = TcpStream::connect(&address)
            .await
            .map_err(|source| TransportError::Connect {
                address: address.clone(),
                source,
            })?;

        if !target.https {
            return send_get(tcp, target).await;
        }

        let server_name = ServerName::try_from(target.host.clone()).map_err(|e| {
            TransportError::InvalidUrl {
                url: target.authority.clone(),
                reason: e.to_string(),
            }
        })?;
        let tls = TlsConnector::from(self.tls.clone())
            .connect(server_name, tcp)
            .await
            .map_err(|source| TransportError::Tls {
                host: target.host.clone(),
                source,
            })?;

        send_get(tls, target).await
    }
}

/// Where a monitoring URL points.
#[derive(Debug)]
struct RequestTarget {
    https: bool,
    host: String,
    port: u16,
    /// `host[:port]` for the Host header.
    authority: String,
    path_and_query: String,
}

impl RequestTarget {
    fn parse(url: &str) -> Result<Self, TransportError> {
        let invalid = |reason: &str| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        let https = match uri.scheme_str() {
            Some("http") => false,
            Some("https") => true,
            _ => return Err(invalid("scheme must be http or https")),
        };
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .ok_or_else(|| invalid("missing host"))?;

        Ok(Self {
            https,
            // IPv6 literals come back bracketed.
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: uri.port_u16().unwrap_or(if https { 443 } else { 80 }),
            authority,
            path_and_query: uri
                .path_and_query()
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        })
    }
}

async fn send_get<S>(stream: S, target: &RequestTarget) -> Result<HttpResponse, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "monitoring connection closed with error");
        }
    });

    let req = http::Request::builder()
        .method(Method::GET)
        .uri(target.path_and_query.as_str())
        .header(HOST, target.authority.as_str())
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header(ACCEPT, "application/json")
        .body(Empty::<Bytes>::new())?;

    let resp = sender.send_request(req).await?;
    let status = resp.status();
    let body = resp.into_body().collect().await?.to_bytes();

    debug!(%status, bytes = body.len(), path = %target.path_and_query, "monitoring response");
    Ok(HttpResponse { status, body })
}
