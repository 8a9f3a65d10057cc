//! Trigger file parser.
//!
//! A trigger file stands in for the host's trigger resolver:
//!
//! ```toml
//! scaler_index = 0
//! metric_type = "AverageValue"
//! http_timeout = "3s"
//!
//! [metadata]
//! natsServerMonitoringEndpoint = "stan-nats-ss:8222"
//! queueGroup = "grp1"
//! durableName = "ImDurable"
//! subject = "orders"
//! lagThreshold = 10
//!
//! [auth]
//! # natsServerMonitoringEndpoint = "..."
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use stanscale::config::DEFAULT_HTTP_TIMEOUT;
use stanscale::ScalerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerFile {
    #[serde(default)]
    pub scaler_index: usize,
    #[serde(default)]
    pub metric_type: String,
    pub http_timeout: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, toml::Value>,
    #[serde(default)]
    pub auth: HashMap<String, toml::Value>,
}

impl TriggerFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trigger file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("invalid trigger file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Flatten into the string maps the scaler expects.
    pub fn to_scaler_config(&self) -> anyhow::Result<ScalerConfig> {
        let global_http_timeout = match &self.http_timeout {
            Some(raw) => parse_duration(raw)
                .with_context(|| format!("invalid http_timeout {raw:?}"))?,
            None => DEFAULT_HTTP_TIMEOUT,
        };

        Ok(ScalerConfig {
            trigger_metadata: stringify(&self.metadata)?,
            auth_params: stringify(&self.auth)?,
            scaler_index: self.scaler_index,
            metric_type: self.metric_type.clone(),
            global_http_timeout,
        })
    }
}

fn stringify(table: &HashMap<String, toml::Value>) -> anyhow::Result<HashMap<String, String>> {
    table
        .iter()
        .map(|(key, value)| {
            let s = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => bail!("{key}: unsupported value type {}", other.type_str()),
            };
            Ok((key.clone(), s))
        })
        .collect()
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
scaler_index = 2
metric_type = "Value"
http_timeout = "500ms"

[metadata]
natsServerMonitoringEndpoint = "stan:8222"
queueGroup = "grp1"
durableName = "ImDurable"
subject = "orders"
lagThreshold = 25
useHttps = false

[auth]
natsServerMonitoringEndpoint = "secret:8222"
"#;

    #[test]
    fn flattens_into_scaler_config() {
        let config = TriggerFile::from_toml(SAMPLE).unwrap().to_scaler_config().unwrap();
        assert_eq!(config.scaler_index, 2);
        assert_eq!(config.metric_type, "Value");
        assert_eq!(config.global_http_timeout, Duration::from_millis(500));
        assert_eq!(config.trigger_metadata["lagThreshold"], "25");
        assert_eq!(config.trigger_metadata["useHttps"], "false");
        assert_eq!(config.auth_params["natsServerMonitoringEndpoint"], "secret:8222");
    }

    #[test]
    fn resulting_config_validates() {
        let config = TriggerFile::from_toml(SAMPLE).unwrap().to_scaler_config().unwrap();
        let meta = stanscale::StanMetadata::parse(&config).unwrap();
        assert_eq!(meta.monitoring_endpoint, "secret:8222");
        assert_eq!(meta.lag_threshold, 25);
        assert_eq!(meta.scaler_index, 2);
    }

    #[test]
    fn defaults_when_omitted() {
        let config = TriggerFile::from_toml("[metadata]\nsubject = \"a\"\n")
            .unwrap()
            .to_scaler_config()
            .unwrap();
        assert_eq!(config.scaler_index, 0);
        assert_eq!(config.metric_type, "");
        assert_eq!(config.global_http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert!(config.auth_params.is_empty());
    }

    #[test]
    fn rejects_nested_values() {
        let file = TriggerFile::from_toml("[metadata]\nsubject = [\"a\", \"b\"]\n").unwrap();
        assert!(file.to_scaler_config().is_err());
    }

    #[test]
    fn rejects_bad_timeout() {
        let file = TriggerFile::from_toml("http_timeout = \"soon\"\n").unwrap();
        assert!(file.to_scaler_config().is_err());
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let trigger = TriggerFile::from_file(file.path()).unwrap();
        assert_eq!(trigger.scaler_index, 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(TriggerFile::from_file(Path::new("/nonexistent/trigger.toml")).is_err());
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("soon"), None);
    }
}
