//! Scaler configuration.
//!
//! The host resolves trigger settings and secrets into a [`ScalerConfig`];
//! [`StanMetadata::parse`] validates it once into an immutable structure.
//! Nothing downstream re-validates.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::lag::TargetIdentity;

/// Default lag per replica before scaling out.
pub const DEFAULT_LAG_THRESHOLD: i64 = 10;

/// Default lag above which the scaler activates from zero.
pub const DEFAULT_ACTIVATION_LAG_THRESHOLD: i64 = 0;

/// Default timeout for a single monitoring request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(3);

const KEY_ENDPOINT: &str = "natsServerMonitoringEndpoint";
const KEY_QUEUE_GROUP: &str = "queueGroup";
const KEY_DURABLE_NAME: &str = "durableName";
const KEY_SUBJECT: &str = "subject";
const KEY_LAG_THRESHOLD: &str = "lagThreshold";
const KEY_ACTIVATION_LAG_THRESHOLD: &str = "activationLagThreshold";
const KEY_USE_HTTPS: &str = "useHttps";

/// How the controller compares the reported metric against its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricTargetType {
    /// Target is divided across replicas.
    #[default]
    AverageValue,
    /// Target is compared against the raw value.
    Value,
}

impl FromStr for MetricTargetType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "AverageValue" => Ok(MetricTargetType::AverageValue),
            "Value" => Ok(MetricTargetType::Value),
            other => Err(ConfigError::UnsupportedMetricType(other.to_string())),
        }
    }
}

/// Settings handed over by the host's trigger resolver.
#[derive(Debug, Clone, Default)]
pub struct ScalerConfig {
    /// Plain trigger metadata.
    pub trigger_metadata: HashMap<String, String>,
    /// Values resolved from secrets; take precedence over metadata where
    /// a key may come from either.
    pub auth_params: HashMap<String, String>,
    /// Position of this trigger among the triggers of one scaled workload.
    pub scaler_index: usize,
    /// Raw metric target type, e.g. `"AverageValue"`.
    pub metric_type: String,
    /// Timeout applied to every monitoring request.
    pub global_http_timeout: Duration,
}

impl ScalerConfig {
    /// A config with the given metadata and host defaults for everything else.
    pub fn from_metadata<I, K, V>(metadata: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            trigger_metadata: metadata
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            global_http_timeout: DEFAULT_HTTP_TIMEOUT,
            ..Self::default()
        }
    }

    /// Look a key up in the auth params first, then in the metadata. An
    /// empty auth value does not shadow the metadata one.
    fn auth_or_meta(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.auth_params
            .get(key)
            .filter(|v| !v.is_empty())
            .or_else(|| self.trigger_metadata.get(key).filter(|v| !v.is_empty()))
            .map(String::as_str)
            .ok_or(ConfigError::Missing(key))
    }

    fn required(&self, key: &'static str) -> Result<&str, ConfigError> {
        self.trigger_metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(key))
    }
}

/// Validated, immutable STAN trigger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanMetadata {
    /// `host[:port]` of the monitoring endpoint.
    pub monitoring_endpoint: String,
    pub use_https: bool,
    pub subject: String,
    pub target: TargetIdentity,
    pub lag_threshold: i64,
    pub activation_lag_threshold: i64,
    pub scaler_index: usize,
    pub metric_type: MetricTargetType,
    pub http_timeout: Duration,
}

impl StanMetadata {
    /// Validate a resolver-supplied config.
    pub fn parse(config: &ScalerConfig) -> Result<Self, ConfigError> {
        let metric_type = config.metric_type.parse()?;
        let monitoring_endpoint = config.auth_or_meta(KEY_ENDPOINT)?.to_string();
        let queue_group = config.required(KEY_QUEUE_GROUP)?.to_string();
        let durable_name = config.required(KEY_DURABLE_NAME)?.to_string();
        let subject = config.required(KEY_SUBJECT)?.to_string();

        let lag_threshold =
            parse_optional(config, KEY_LAG_THRESHOLD, parse_int)?.unwrap_or(DEFAULT_LAG_THRESHOLD);
        let activation_lag_threshold =
            parse_optional(config, KEY_ACTIVATION_LAG_THRESHOLD, parse_int)?
                .unwrap_or(DEFAULT_ACTIVATION_LAG_THRESHOLD);
        let use_https = parse_optional(config, KEY_USE_HTTPS, parse_bool)?.unwrap_or(false);

        let http_timeout = if config.global_http_timeout.is_zero() {
            DEFAULT_HTTP_TIMEOUT
        } else {
            config.global_http_timeout
        };

        Ok(Self {
            monitoring_endpoint,
            use_https,
            subject,
            target: TargetIdentity::new(durable_name, queue_group),
            lag_threshold,
            activation_lag_threshold,
            scaler_index: config.scaler_index,
            metric_type,
            http_timeout,
        })
    }
}

fn parse_optional<T>(
    config: &ScalerConfig,
    key: &'static str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    match config.trigger_metadata.get(key) {
        Some(raw) => parse(raw).map(Some).map_err(|reason| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason,
        }),
        None => Ok(None),
    }
}

fn parse_int(s: &str) -> Result<i64, String> {
    s.parse::<i64>().map_err(|e| e.to_string())
}

/// Accepts the usual boolean spellings: `1 t T TRUE true True` and their
/// false counterparts.
fn parse_bool(s: &str) -> Result<bool, String> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err("invalid boolean syntax".to_string()),
    }
}
