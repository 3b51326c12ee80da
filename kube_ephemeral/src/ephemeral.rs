use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;

/// Declared time-to-live of an ephemeral, usually a number of seconds or a
/// free form string such as `"48h"`. Any other shape is kept as is.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Ttl {
    Seconds(i64),
    Text(String),
    Other(serde_json::Value),
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Seconds(seconds) => write!(f, "{}s", seconds),
            Ttl::Text(text) => f.write_str(text),
            Ttl::Other(value) => write!(f, "{}", value),
        }
    }
}

#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default)]
pub struct EphemeralStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Ttl>,
}

/// `ephemerals.k8s.beam.dental`, a temporary environment managed by the
/// cluster.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug)]
pub struct Ephemeral {
    pub metadata: ObjectMeta,
    /// Opaque, never read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec:     Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status:   Option<EphemeralStatus>,
}

impl Ephemeral {
    pub fn ttl(&self) -> Option<&Ttl> {
        self.status.as_ref().and_then(|status| status.ttl.as_ref())
    }
}

impl k8s_openapi::Resource for Ephemeral {
    type Scope = k8s_openapi::ClusterResourceScope;

    const API_VERSION: &'static str = "k8s.beam.dental/v1";
    const GROUP: &'static str = "k8s.beam.dental";
    const KIND: &'static str = "Ephemeral";
    const URL_PATH_SEGMENT: &'static str = "ephemerals";
    const VERSION: &'static str = "v1";
}

impl k8s_openapi::ListableResource for Ephemeral {
    const LIST_KIND: &'static str = "EphemeralList";
}

impl k8s_openapi::Metadata for Ephemeral {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty { &self.metadata }

    fn metadata_mut(&mut self) -> &mut Self::Ty { &mut self.metadata }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const FIXTURE: &str = include_str!("../tests/fixtures/ephemerals.json");

    fn items() -> Vec<Ephemeral> {
        let list: serde_json::Value = serde_json::from_str(FIXTURE).unwrap();
        serde_json::from_value(list["items"].clone()).unwrap()
    }

    #[test]
    fn test_decode_listing() {
        let items = items();
        assert_eq!(items.len(), 5);

        let first = &items[0];
        assert_eq!(first.metadata.name.as_deref(), Some("pr-1042"));
        assert_eq!(
            first.metadata.creation_timestamp.as_ref().map(|time| time.0),
            Some(Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap())
        );
        assert_eq!(first.ttl(), Some(&Ttl::Text("72h".to_string())));
    }

    #[test]
    fn test_ttl_shapes() {
        let items = items();
        assert_eq!(items[1].ttl(), Some(&Ttl::Seconds(86400)));
        assert_eq!(items[1].ttl().map(ToString::to_string).as_deref(), Some("86400s"));
        assert!(items[2].status.is_none());
        assert!(items[2].ttl().is_none());
    }

    #[test]
    fn test_unexpected_ttl_shapes_are_kept() {
        let items = items();
        assert_eq!(items[3].ttl(), Some(&Ttl::Other(serde_json::json!(3600.5))));
        assert_eq!(items[3].ttl().map(ToString::to_string).as_deref(), Some("3600.5"));
        assert_eq!(
            items[4].ttl(),
            Some(&Ttl::Other(serde_json::json!({ "hours": 72 })))
        );
        assert_eq!(
            items[4].ttl().map(ToString::to_string).as_deref(),
            Some(r#"{"hours":72}"#)
        );
    }

    #[test]
    fn test_resource_coordinates() {
        use k8s_openapi::Resource;
        assert_eq!(Ephemeral::GROUP, "k8s.beam.dental");
        assert_eq!(Ephemeral::VERSION, "v1");
        assert_eq!(Ephemeral::URL_PATH_SEGMENT, "ephemerals");
    }
}
