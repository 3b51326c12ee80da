use crate::domain::usage::UsageSnapshot;
use chrono::{DateTime, Utc};
use helper::monitoring::{convert_timestamp, ClusterName, DatadogData, Series};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Accumulating total
    Count,
    /// Instantaneous value
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Count => "count",
            MetricKind::Gauge => "gauge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricName {
    #[serde(rename = "eph.hours")]
    Hours,
    #[serde(rename = "eph.eph_count")]
    EphemeralCount,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Hours => "eph.hours",
            MetricName::EphemeralCount => "eph.eph_count",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricName::Hours => MetricKind::Count,
            MetricName::EphemeralCount => MetricKind::Gauge,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub name:      MetricName,
    pub kind:      MetricKind,
    pub timestamp: DateTime<Utc>,
    pub value:     f64,
    pub host:      String,
    pub tags:      Vec<String>,
}

impl MetricPoint {
    pub fn new(
        name: MetricName,
        timestamp: DateTime<Utc>,
        value: f64,
        host: &ClusterName,
    ) -> Self {
        Self {
            name,
            kind: name.kind(),
            timestamp,
            value,
            host: host.to_string(),
            tags: Vec::new(),
        }
    }

    /// Hours accumulated by all ephemerals this month.
    pub fn hours(snapshot: &UsageSnapshot, host: &ClusterName) -> Self {
        Self::new(
            MetricName::Hours,
            snapshot.now,
            snapshot.total_hours(),
            host,
        )
    }

    /// Ephemerals currently live.
    pub fn count(snapshot: &UsageSnapshot, host: &ClusterName) -> Self {
        Self::new(
            MetricName::EphemeralCount,
            snapshot.now,
            snapshot.count as f64,
            host,
        )
    }
}

impl DatadogData for MetricPoint {
    fn export(&self) -> Series {
        Series {
            metric: self.name.as_str().to_string(),
            kind:   self.kind.as_str(),
            points: vec![(convert_timestamp(self.timestamp), self.value)],
            host:   self.host.clone(),
            tags:   self.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ephemeral::EphemeralResource;

    fn snapshot() -> UsageSnapshot {
        let now = "2024-03-15T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let created = "2024-02-20T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        UsageSnapshot::compute(&[EphemeralResource::new("pr-1", created)], now)
    }

    #[test]
    fn test_fixed_kinds() {
        assert_eq!(MetricName::Hours.kind(), MetricKind::Count);
        assert_eq!(MetricName::EphemeralCount.kind(), MetricKind::Gauge);
        assert_eq!(
            serde_json::to_value(MetricName::EphemeralCount).unwrap(),
            serde_json::json!("eph.eph_count")
        );
        assert_eq!(
            serde_json::to_value(MetricKind::Count).unwrap(),
            serde_json::json!("count")
        );
    }

    #[test]
    fn test_points_share_timestamp_and_host() {
        let host = ClusterName::new("ephemeral21a").unwrap();
        let snapshot = snapshot();

        let hours = MetricPoint::hours(&snapshot, &host);
        let count = MetricPoint::count(&snapshot, &host);

        assert_eq!(hours.timestamp, count.timestamp);
        assert_eq!(hours.host, "ephemeral21a");
        assert_eq!(count.host, "ephemeral21a");
        assert!((hours.value - 348.0).abs() < 1e-9);
        assert_eq!(count.value, 1.0);
        assert!(hours.tags.is_empty());
    }

    #[test]
    fn test_export_to_series() {
        let host = ClusterName::new("ephemeral21a").unwrap();
        let series = MetricPoint::count(&snapshot(), &host).export();

        assert_eq!(
            serde_json::to_value(&series).unwrap(),
            serde_json::json!({
                "metric": "eph.eph_count",
                "type": "gauge",
                "points": [[1_710_504_000, 1.0]],
                "host": "ephemeral21a",
                "tags": []
            })
        );
    }
}
