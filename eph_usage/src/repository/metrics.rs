use async_trait::async_trait;
use helper::monitoring::{DatadogExporter, SubmissionError};
use model::domain::metric::MetricPoint;
use std::fmt::Debug;
use std::sync::Arc;

#[async_trait]
pub trait MetricEmitter: Debug + Sync + Send {
    /// Submit exactly one point.
    async fn emit(&self, point: &MetricPoint) -> Result<(), SubmissionError>;
    /// Submit all the points in a single request.
    async fn emit_batch(
        &self,
        points: &[MetricPoint],
    ) -> Result<(), SubmissionError>;
}

#[derive(Debug)]
pub struct DatadogEmitter {
    exporter: Arc<DatadogExporter>,
}

impl DatadogEmitter {
    pub fn new(exporter: Arc<DatadogExporter>) -> Self { Self { exporter } }
}

#[async_trait]
impl MetricEmitter for DatadogEmitter {
    #[instrument(level = "debug", skip(self, point), fields(metric = %point.name, value = point.value))]
    async fn emit(&self, point: &MetricPoint) -> Result<(), SubmissionError> {
        self.exporter.observe(point).await
    }

    #[instrument(level = "debug", skip_all, fields(n = points.len()))]
    async fn emit_batch(
        &self,
        points: &[MetricPoint],
    ) -> Result<(), SubmissionError> {
        self.exporter.observe_all(points).await
    }
}
