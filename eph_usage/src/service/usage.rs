use crate::repository::k8s::EphemeralLister;
use crate::repository::metrics::MetricEmitter;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use helper::err::IndividualErrorList;
use helper::monitoring::ClusterName;
use model::domain::metric::MetricPoint;
use model::domain::usage::UsageSnapshot;
use std::str::FromStr;
use std::sync::Arc;
use uom::si::time::{hour, minute, second};

/// How the two usage points reach the metrics backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionMode {
    /// One request per point, a failing point does not stop the other.
    #[default]
    Independent,
    /// A single request carrying both points, all or nothing.
    Batched,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown submission mode '{0}', expected 'independent' or 'batched'")]
pub struct UnknownSubmissionMode(String);

impl FromStr for SubmissionMode {
    type Err = UnknownSubmissionMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "independent" => Ok(SubmissionMode::Independent),
            "batched" => Ok(SubmissionMode::Batched),
            _ => Err(UnknownSubmissionMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub total_hours: f64,
    pub count:       u64,
    pub skipped:     usize,
}

#[derive(Debug)]
pub struct UsageReporter {
    lister:  Arc<dyn EphemeralLister>,
    emitter: Arc<dyn MetricEmitter>,
    host:    ClusterName,
    mode:    SubmissionMode,
}

impl UsageReporter {
    pub fn new(
        lister: Arc<dyn EphemeralLister>,
        emitter: Arc<dyn MetricEmitter>,
        host: ClusterName,
        mode: SubmissionMode,
    ) -> Self {
        Self { lister, emitter, host, mode }
    }

    /// List the ephemerals once, then report the monthly hours and the live
    /// count measured at `now`.
    #[instrument(level = "info", skip(self), fields(host = %self.host))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let listing = self
            .lister
            .list_ephemerals()
            .await
            .context("Failed to list the ephemerals from the cluster")?;
        if listing.skipped > 0 {
            warn!(
                "{} malformed ephemeral(s) left out of the usage",
                listing.skipped
            );
        }

        let snapshot = UsageSnapshot::compute(&listing.resources, now);
        info!(
            "total_eph_uptime for month: {:.0} seconds or {:.0} minutes or \
             {:.2} hours",
            snapshot.total.get::<second>(),
            snapshot.total.get::<minute>(),
            snapshot.total.get::<hour>()
        );
        info!("{} ephemeral(s) currently live", snapshot.count);

        let points = [
            MetricPoint::hours(&snapshot, &self.host),
            MetricPoint::count(&snapshot, &self.host),
        ];
        match self.mode {
            SubmissionMode::Independent => self.emit_each(&points).await?,
            SubmissionMode::Batched => self
                .emitter
                .emit_batch(&points)
                .await
                .context("Failed to submit the usage metrics")?,
        }

        Ok(RunReport {
            total_hours: snapshot.total_hours(),
            count:       snapshot.count,
            skipped:     listing.skipped,
        })
    }

    async fn emit_each(&self, points: &[MetricPoint]) -> Result<()> {
        let mut errors = IndividualErrorList::default();
        for point in points {
            match self.emitter.emit(point).await {
                Ok(()) => debug!("Submitted {} = {}", point.name, point.value),
                Err(err) => {
                    warn!("Failed to submit {}: {}", point.name, err);
                    errors.push(
                        anyhow::Error::new(err)
                            .context(format!("Failed to submit {}", point.name)),
                    );
                }
            }
        }
        errors
            .into_result()
            .context("Some usage metrics were not submitted")
    }
}
