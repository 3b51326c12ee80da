use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validated view of one listed ephemeral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralResource {
    pub name:               String,
    pub creation_timestamp: DateTime<Utc>,
    /// Read from the cluster but not used by any aggregation.
    pub ttl:                Option<String>,
}

impl EphemeralResource {
    pub fn new(
        name: impl Into<String>,
        creation_timestamp: DateTime<Utc>,
    ) -> Self {
        Self { name: name.into(), creation_timestamp, ttl: None }
    }

    pub fn with_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }
}
