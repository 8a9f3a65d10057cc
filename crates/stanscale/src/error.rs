//! Error types for the STAN scaler.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for scaler operations.
pub type ScalerResult<T> = Result<T, ScalerError>;

/// Errors raised while turning trigger settings into [`crate::StanMetadata`].
///
/// A scaler is never constructed when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no {0} given")]
    Missing(&'static str),

    #[error("error parsing {key} ({value:?}): {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("metric target type {0:?} is not supported by this scaler")]
    UnsupportedMetricType(String),
}

/// Failures building, sending or reading a monitoring request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid monitoring url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tls client setup failed: {0}")]
    TlsSetup(#[from] rustls::Error),

    #[error("http exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled by caller")]
    Cancelled,
}

/// Errors surfaced by scaler operations.
#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("invalid scaler configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("monitoring endpoint unreachable: {0}")]
    Transport(#[from] TransportError),

    /// Primary and base endpoints both returned 404.
    #[error("channel {subject:?} does not exist on the streaming server")]
    ChannelNotFound { subject: String },

    /// Primary endpoint returned 404 but the base endpoint answered with
    /// some other status.
    #[error("monitoring endpoint {endpoint} returned 404; base channelsz endpoint returned {status}")]
    EndpointMisconfigured { endpoint: String, status: u16 },

    #[error("monitoring endpoint {endpoint} returned unexpected status {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("failed to decode channel info: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ScalerError {
    /// Whether the error means the channel is simply absent rather than a
    /// broken endpoint.
    pub fn is_channel_not_found(&self) -> bool {
        matches!(self, ScalerError::ChannelNotFound { .. })
    }
}
