//! The scaler contract and its NATS Streaming implementation.
//!
//! The controller owns scheduling and picks a [`Scaler`] per trigger; a
//! [`StanScaler`] answers for one durable queue group on one channel.
//! Activation checks and metric reads each fetch their own snapshot and
//! keep it local to the call, so both can run concurrently on one scaler.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::client::{MonitoringClient, PollContext};
use crate::config::{ScalerConfig, StanMetadata};
use crate::error::ScalerResult;
use crate::lag;
use crate::metric::{name_with_index, normalize_name, ExternalMetricValue, MetricSpec, MetricTarget};

/// Boxed future returned by [`Scaler`] operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Label selector passed through by the controller. STAN metrics carry no
/// labels, so it is not consulted.
pub type MetricSelector = BTreeMap<String, String>;

/// Capabilities a controller needs from one trigger.
pub trait Scaler: Send + Sync {
    /// Whether the workload should run at all (scale from zero).
    fn is_active<'a>(&'a self, ctx: &'a PollContext) -> BoxFuture<'a, ScalerResult<bool>>;

    /// External metrics this scaler reports, with their targets.
    fn metric_specs(&self, ctx: &PollContext) -> Vec<MetricSpec>;

    /// Current values for `metric_name`.
    fn metric_values<'a>(
        &'a self,
        ctx: &'a PollContext,
        metric_name: &'a str,
        selector: &'a MetricSelector,
    ) -> BoxFuture<'a, ScalerResult<Vec<ExternalMetricValue>>>;

    /// Release resources held by the scaler.
    fn close<'a>(&'a self, ctx: &'a PollContext) -> BoxFuture<'a, ScalerResult<()>>;
}

/// Scaler driven by the lag of a durable queue group on a STAN channel.
#[derive(Debug, Clone)]
pub struct StanScaler {
    metadata: StanMetadata,
    client: MonitoringClient,
}

impl StanScaler {
    /// Validate the trigger config and build a scaler.
    pub fn new(config: &ScalerConfig) -> ScalerResult<Self> {
        let metadata = StanMetadata::parse(config)?;
        let client = MonitoringClient::new(metadata.http_timeout)?;
        Ok(Self::with_client(metadata, client))
    }

    /// Build a scaler around an existing client.
    pub fn with_client(metadata: StanMetadata, client: MonitoringClient) -> Self {
        Self { metadata, client }
    }

    pub fn metadata(&self) -> &StanMetadata {
        &self.metadata
    }

    /// Name of the single external metric, unique per scaler index.
    pub fn metric_name(&self) -> String {
        let base = normalize_name(&format!("stan-{}", self.metadata.subject));
        name_with_index(self.metadata.scaler_index, &base)
    }
}

impl Scaler for StanScaler {
    fn is_active<'a>(&'a self, ctx: &'a PollContext) -> BoxFuture<'a, ScalerResult<bool>> {
        Box::pin(async move {
            let snapshot = self.client.fetch_channel(ctx, &self.metadata).await?;
            Ok(lag::is_active(
                &snapshot,
                &self.metadata.target,
                self.metadata.activation_lag_threshold,
            ))
        })
    }

    fn metric_specs(&self, _ctx: &PollContext) -> Vec<MetricSpec> {
        vec![MetricSpec {
            name: self.metric_name(),
            target: MetricTarget::new(self.metadata.metric_type, self.metadata.lag_threshold),
        }]
    }

    fn metric_values<'a>(
        &'a self,
        ctx: &'a PollContext,
        metric_name: &'a str,
        _selector: &'a MetricSelector,
    ) -> BoxFuture<'a, ScalerResult<Vec<ExternalMetricValue>>> {
        Box::pin(async move {
            let snapshot = self.client.fetch_channel(ctx, &self.metadata).await?;
            let total_lag = lag::max_msg_lag(&snapshot, &self.metadata.target);

            debug!(
                total_lag,
                lag_threshold = self.metadata.lag_threshold,
                channel = %self.metadata.subject,
                "providing metrics based on total lag"
            );

            Ok(vec![ExternalMetricValue::from_count(metric_name, total_lag)])
        })
    }

    fn close<'a>(&'a self, _ctx: &'a PollContext) -> BoxFuture<'a, ScalerResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
