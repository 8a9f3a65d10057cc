//! External metric definitions and values handed to the controller.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::MetricTargetType;

/// Characters not allowed in an external metric name.
const NAME_REPLACED_CHARS: &[char] = &['/', '.', ':', '%', '(', ')', '"', ' ', '<', '>', '$', '@'];

/// Target the controller scales the metric against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MetricTarget {
    Value(i64),
    AverageValue(i64),
}

impl MetricTarget {
    pub fn new(kind: MetricTargetType, value: i64) -> Self {
        match kind {
            MetricTargetType::Value => MetricTarget::Value(value),
            MetricTargetType::AverageValue => MetricTarget::AverageValue(value),
        }
    }

    pub fn value(&self) -> i64 {
        match *self {
            MetricTarget::Value(v) | MetricTarget::AverageValue(v) => v,
        }
    }
}

/// One external metric a scaler exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub target: MetricTarget,
}

/// A metric sample, stored in thousandths so fractional values survive an
/// integer pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMetricValue {
    pub metric_name: String,
    pub milli_value: i64,
    /// Unix timestamp (seconds) the sample was taken.
    pub timestamp: u64,
}

impl ExternalMetricValue {
    /// Build a sample from an integer count; exact for any count.
    pub fn from_count(metric_name: impl Into<String>, count: i64) -> Self {
        Self {
            metric_name: metric_name.into(),
            milli_value: count.saturating_mul(1000),
            timestamp: epoch_secs(),
        }
    }

    /// The sample as a plain value.
    pub fn value(&self) -> f64 {
        self.milli_value as f64 / 1000.0
    }
}

/// Replace characters that are invalid in metric names with `-`.
pub fn normalize_name(name: &str) -> String {
    name.replace(NAME_REPLACED_CHARS, "-")
}

/// Prefix a metric name with the scaler index so several triggers on one
/// workload never collide.
pub fn name_with_index(scaler_index: usize, metric_name: &str) -> String {
    format!("s{scaler_index}-{metric_name}")
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators() {
        assert_eq!(normalize_name("stan-orders.eu/v1"), "stan-orders-eu-v1");
        assert_eq!(normalize_name("stan-a:b c"), "stan-a-b-c");
        assert_eq!(normalize_name("stan-plain"), "stan-plain");
    }

    #[test]
    fn index_prefix() {
        assert_eq!(name_with_index(0, "stan-orders"), "s0-stan-orders");
        assert_eq!(name_with_index(2, "stan-orders"), "s2-stan-orders");
    }

    #[test]
    fn target_kinds() {
        assert_eq!(
            MetricTarget::new(MetricTargetType::AverageValue, 10),
            MetricTarget::AverageValue(10)
        );
        assert_eq!(MetricTarget::new(MetricTargetType::Value, 7).value(), 7);
    }

    #[test]
    fn milli_scaling() {
        let v = ExternalMetricValue::from_count("s0-stan-orders", 42);
        assert_eq!(v.metric_name, "s0-stan-orders");
        assert_eq!(v.milli_value, 42_000);
        assert_eq!(v.value(), 42.0);
        assert!(v.timestamp > 0);
    }

    #[test]
    fn count_scaling_is_exact() {
        let big = 9_007_199_254_740_993; // 2^53 + 1, not representable as f64
        let v = ExternalMetricValue::from_count("m", big);
        assert_eq!(v.milli_value / 1000, big);
        assert_eq!(ExternalMetricValue::from_count("m", -4).milli_value, -4000);
    }
}
