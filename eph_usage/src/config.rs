use crate::service::usage::SubmissionMode;
use anyhow::{Context, Result};
use helper::monitoring::{
    ClusterName, DatadogApiKey, DatadogAppKey, DatadogSite, DatadogUrl,
};
use helper::{env_load, env_load_opt, env_parse_or, env_var};
use std::time::Duration;

env_var!(DD_API_KEY);
env_var!(DD_APP_KEY);
env_var!(DD_SITE);
env_var!(DD_URL);
env_var!(CLUSTER_NAME);
env_var!(K8S_PAGE_SIZE);
env_var!(REQUEST_TIMEOUT_SECS);
env_var!(SUBMISSION_MODE);

const DEFAULT_SITE: &str = "datadoghq.com";
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Everything a run needs, loaded once at startup.
pub struct Config {
    pub api_key:         DatadogApiKey,
    pub app_key:         Option<DatadogAppKey>,
    pub datadog_url:     DatadogUrl,
    pub cluster:         ClusterName,
    pub page_size:       u32,
    pub request_timeout: Duration,
    pub submission_mode: SubmissionMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let datadog_url = match env_load_opt!(DatadogUrl, DD_URL) {
            Some(url) => url,
            None => {
                let site = env_load_opt!(DatadogSite, DD_SITE);
                let site = match site {
                    Some(site) => site,
                    None => DatadogSite::new(DEFAULT_SITE)
                        .context("Default Datadog site is invalid")?,
                };
                DatadogUrl::from_site(&site).with_context(|| {
                    format!("Cannot build the Datadog url from {}", DD_SITE)
                })?
            }
        };

        let page_size = env_parse_or!(u32, K8S_PAGE_SIZE, DEFAULT_PAGE_SIZE);
        anyhow::ensure!(page_size > 0, "{} must be positive", K8S_PAGE_SIZE);

        let timeout_secs = env_parse_or!(
            u64,
            REQUEST_TIMEOUT_SECS,
            DEFAULT_REQUEST_TIMEOUT_SECS
        );
        anyhow::ensure!(
            timeout_secs > 0,
            "{} must be positive",
            REQUEST_TIMEOUT_SECS
        );

        Ok(Self {
            api_key: env_load!(DatadogApiKey, DD_API_KEY),
            app_key: env_load_opt!(DatadogAppKey, DD_APP_KEY),
            datadog_url,
            cluster: env_load!(ClusterName, CLUSTER_NAME),
            page_size,
            request_timeout: Duration::from_secs(timeout_secs),
            submission_mode: env_parse_or!(
                SubmissionMode,
                SUBMISSION_MODE,
                SubmissionMode::default()
            ),
        })
    }
}
