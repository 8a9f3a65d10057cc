//! stanscale — autoscaling signal for NATS Streaming durable queue groups.
//!
//! Polls the streaming server's `channelsz` monitoring endpoint and turns
//! the reported channel state into the two answers an autoscaling
//! controller needs: should the workload be active, and how far behind is
//! its queue group.
//!
//! # Architecture
//!
//! ```text
//! StanScaler (Scaler trait)
//!   ├── StanMetadata::parse()      ← trigger metadata + auth params
//!   ├── MonitoringClient::fetch_channel()
//!   │     ├── GET /streaming/channelsz?channel=<subject>&subs=1
//!   │     └── on 404: GET /streaming/channelsz to classify
//!   ├── lag::is_active()           → is_active()
//!   └── lag::max_msg_lag()         → metric_values() (milli-units)
//! ```
//!
//! # Lag
//!
//! ```text
//! lag = channel.last_seq - max(last_sent of subscribers with
//!                               queue_name == "<durable>:<group>")
//! ```
//!
//! The most advanced subscriber of the group wins; a group with no
//! subscribers reports the whole channel as backlog.
//!
//! Every call fetches its own snapshot. Nothing is cached and nothing is
//! retried; the controller's polling interval is the retry policy.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod lag;
pub mod metric;
pub mod prometheus;
pub mod scaler;
pub mod snapshot;

pub use client::{MonitoringClient, PollContext};
pub use config::{MetricTargetType, ScalerConfig, StanMetadata};
pub use error::{ConfigError, ScalerError, ScalerResult, TransportError};
pub use lag::TargetIdentity;
pub use metric::{ExternalMetricValue, MetricSpec, MetricTarget};
pub use prometheus::render_prometheus;
pub use scaler::{MetricSelector, Scaler, StanScaler};
pub use snapshot::{ChannelSnapshot, SubscriberSnapshot};
