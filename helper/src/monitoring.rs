use crate::reqwest_helper::deserialize_response;
use chrono::{DateTime, Utc};
use nutype::nutype;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, trace};

type HttpClient = ClientWithMiddleware;

const API_KEY_HEADER: &str = "DD-API-KEY";
const APP_KEY_HEADER: &str = "DD-APPLICATION-KEY";
const SERIES_PATH: &str = "/api/v1/series";

#[nutype(sanitize(trim), validate(predicate = is_api_key), derive(Clone))]
pub struct DatadogApiKey(String);

#[nutype(sanitize(trim), validate(predicate = is_app_key), derive(Clone))]
pub struct DatadogAppKey(String);

#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, len_char_max = 64, predicate = is_site),
    derive(Clone, Debug, PartialEq)
)]
pub struct DatadogSite(String);

#[nutype(
    sanitize(with = |url: String| url.trim().trim_end_matches('/').to_string()),
    validate(predicate = is_http_url),
    derive(Clone, Debug, PartialEq)
)]
pub struct DatadogUrl(String);

/// Host tag attached to every submitted point.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 253),
    derive(Clone, Debug, PartialEq, Display)
)]
pub struct ClusterName(String);

fn is_hex_of_len(input: &str, len: usize) -> bool {
    input.len() == len && input.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_api_key(input: &str) -> bool { is_hex_of_len(input, 32) }

fn is_app_key(input: &str) -> bool { is_hex_of_len(input, 40) }

fn is_site(input: &str) -> bool {
    input.contains('.')
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn is_http_url(input: &str) -> bool {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

impl DatadogUrl {
    /// Public API endpoint of a Datadog site, eg. `datadoghq.eu`.
    pub fn from_site(site: &DatadogSite) -> Result<Self, DatadogUrlError> {
        Self::new(format!("https://api.{}", site.clone().into_inner()))
    }
}

/// Embeds the timestamp in the precision the series endpoint expects.
pub fn convert_timestamp(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp()
}

/// One metric stream as accepted by the v1 series endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub metric: String,
    #[serde(rename = "type")]
    pub kind:   &'static str,
    pub points: Vec<(i64, f64)>,
    pub host:   String,
    pub tags:   Vec<String>,
}

pub trait DatadogData {
    fn export(&self) -> Series;
}

#[derive(Serialize)]
struct SeriesPayload<'a> {
    series: &'a [Series],
}

#[derive(Deserialize)]
struct SeriesAccepted {
    status: String,
}

#[derive(Deserialize)]
struct SeriesErrors {
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Failed to reach the metrics backend: {0}")]
    Transport(#[from] reqwest_middleware::Error),
    #[error("The metrics backend rejected the submission ({status}): {errors:?}")]
    Rejected { status: StatusCode, errors: Vec<String> },
    #[error("The metrics backend did not answer within {0:?}")]
    Timeout(Duration),
}

pub struct DatadogExporter {
    client:  HttpClient,
    url:     String,
    api_key: DatadogApiKey,
    app_key: Option<DatadogAppKey>,
    timeout: Duration,
}

impl fmt::Debug for DatadogExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatadogExporter")
            .field("url", &self.url)
            .field("app_key", &self.app_key.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DatadogExporter {
    pub fn new(
        address: DatadogUrl,
        api_key: DatadogApiKey,
        app_key: Option<DatadogAppKey>,
        timeout: Duration,
    ) -> Self {
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(TracingMiddleware::default())
            .build();
        Self {
            client,
            url: format!("{}{}", address.into_inner(), SERIES_PATH),
            api_key,
            app_key,
            timeout,
        }
    }

    /// Submit a single point.
    pub async fn observe(
        &self,
        data: &impl DatadogData,
    ) -> Result<(), SubmissionError> {
        self.submit(&[data.export()]).await
    }

    /// Submit every point in one request, the backend accepts or refuses
    /// them together.
    pub async fn observe_all<T: DatadogData>(
        &self,
        data: &[T],
    ) -> Result<(), SubmissionError> {
        let series: Vec<Series> = data.iter().map(DatadogData::export).collect();
        self.submit(&series).await
    }

    #[instrument(level = "debug", skip_all, fields(url = %self.url, n = series.len()))]
    async fn submit(&self, series: &[Series]) -> Result<(), SubmissionError> {
        timeout(self.timeout, self.post(SeriesPayload { series }))
            .await
            .map_err(|_| SubmissionError::Timeout(self.timeout))?
    }

    async fn post(
        &self,
        payload: SeriesPayload<'_>,
    ) -> Result<(), SubmissionError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, self.api_key.clone().into_inner())
            .json(&payload);
        if let Some(app_key) = &self.app_key {
            builder = builder.header(APP_KEY_HEADER, app_key.clone().into_inner());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let errors = deserialize_response::<SeriesErrors>(response)
                .await
                .map(|body| body.errors)
                .unwrap_or_default();
            return Err(SubmissionError::Rejected { status, errors });
        }

        // Any 2xx is an acceptance, the body only matters when it says
        // otherwise.
        match deserialize_response::<SeriesAccepted>(response).await {
            Ok(accepted) if accepted.status != "ok" => {
                return Err(SubmissionError::Rejected {
                    status,
                    errors: vec![accepted.status],
                });
            }
            Ok(_) => {}
            Err(err) => trace!("Ignoring the body of the acceptance: {}", err),
        }
        debug!("Series accepted with status {}", status);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use yare::parameterized;

    const API_KEY: &str = "0123456789abcdef0123456789abcdef";

    struct Point(&'static str, f64);

    impl DatadogData for Point {
        fn export(&self) -> Series {
            Series {
                metric: self.0.to_string(),
                kind:   "gauge",
                points: vec![(1_710_504_000, self.1)],
                host:   "ephemeral21a".to_string(),
                tags:   vec![],
            }
        }
    }

    fn exporter(server: &MockServer, wait: Duration) -> DatadogExporter {
        DatadogExporter::new(
            DatadogUrl::new(server.uri()).unwrap(),
            DatadogApiKey::new(API_KEY).unwrap(),
            None,
            wait,
        )
    }

    #[parameterized(
        us1 = {"datadoghq.com", "https://api.datadoghq.com"},
        eu = {" DatadogHQ.eu ", "https://api.datadoghq.eu"},
        us3 = {"us3.datadoghq.com", "https://api.us3.datadoghq.com"},
    )]
    fn test_url_from_site(site: &str, expected: &str) {
        let site = DatadogSite::new(site).unwrap();
        assert_eq!(
            DatadogUrl::from_site(&site).unwrap().into_inner(),
            expected
        );
    }

    #[parameterized(
        empty = {""},
        path = {"datadoghq.com/api"},
        no_domain = {"localhost"},
    )]
    fn test_invalid_site(site: &str) {
        assert!(DatadogSite::new(site).is_err());
    }

    #[parameterized(
        trailing_slash = {"http://127.0.0.1:8080/", "http://127.0.0.1:8080"},
        plain = {"https://api.datadoghq.com", "https://api.datadoghq.com"},
    )]
    fn test_url_sanitized(raw: &str, expected: &str) {
        assert_eq!(DatadogUrl::new(raw).unwrap().into_inner(), expected);
    }

    #[test]
    fn test_invalid_keys() {
        assert!(DatadogApiKey::new("DD-API-KEY").is_err());
        assert!(DatadogApiKey::new(API_KEY).is_ok());
        assert!(DatadogAppKey::new(API_KEY).is_err());
        assert!(ClusterName::new("   ").is_err());
    }

    #[tokio::test]
    async fn test_observe_posts_one_series() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SERIES_PATH))
            .and(header(API_KEY_HEADER, API_KEY))
            .and(body_json(json!({
                "series": [{
                    "metric": "eph.eph_count",
                    "type": "gauge",
                    "points": [[1_710_504_000, 3.0]],
                    "host": "ephemeral21a",
                    "tags": []
                }]
            })))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({ "status": "ok" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        exporter(&server, Duration::from_secs(5))
            .observe(&Point("eph.eph_count", 3.0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_observe_all_sends_a_single_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SERIES_PATH))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({ "status": "ok" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        exporter(&server, Duration::from_secs(5))
            .observe_all(&[Point("eph.hours", 348.0), Point("eph.eph_count", 1.0)])
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value =
            serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["series"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_app_key_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists(APP_KEY_HEADER))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({ "status": "ok" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let exporter = DatadogExporter::new(
            DatadogUrl::new(server.uri()).unwrap(),
            DatadogApiKey::new(API_KEY).unwrap(),
            Some(DatadogAppKey::new("0123456789abcdef0123456789abcdef01234567").unwrap()),
            Duration::from_secs(5),
        );
        exporter.observe(&Point("eph.hours", 1.0)).await.unwrap();
    }

    #[parameterized(
        empty = {202, ""},
        not_json = {202, "accepted"},
        ok_without_body = {200, ""},
    )]
    #[test_macro(tokio::test)]
    async fn test_success_status_without_body_is_accepted(code: u16, body: &str) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SERIES_PATH))
            .respond_with(ResponseTemplate::new(code).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        exporter(&server, Duration::from_secs(5))
            .observe(&Point("eph.hours", 1.0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_explicit_failure_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({ "status": "error" })),
            )
            .mount(&server)
            .await;

        let err = exporter(&server, Duration::from_secs(5))
            .observe(&Point("eph.hours", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::Rejected { ref errors, .. } if errors == &["error".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_rejection_carries_backend_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({ "errors": ["Forbidden"] })),
            )
            .mount(&server)
            .await;

        let err = exporter(&server, Duration::from_secs(5))
            .observe(&Point("eph.hours", 1.0))
            .await
            .unwrap_err();
        match err {
            SubmissionError::Rejected { status, errors } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(errors, vec!["Forbidden".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({ "status": "ok" }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = exporter(&server, Duration::from_millis(50))
            .observe(&Point("eph.hours", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Timeout(_)));
    }
}
