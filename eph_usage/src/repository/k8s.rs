use async_trait::async_trait;
use kube::api::ListParams;
use kube::core::{ObjectList, Request};
use kube::{Client, Resource};
use kube_ephemeral::ephemeral::Ephemeral;
use model::domain::ephemeral::EphemeralResource;
use serde_json::Value;
use std::fmt::{self, Debug};
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to reach the k8s API server: {0}")]
    Connectivity(#[source] kube::Error),
    #[error("The k8s API server refused the credentials: {0}")]
    Auth(#[source] kube::Error),
    #[error("Listing the ephemerals did not complete within {0:?}")]
    Timeout(Duration),
    #[error("Failed to decode the listing of ephemerals: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Ephemeral '{name}' is malformed: {reason}")]
    DataAnomaly { name: String, reason: String },
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        let refused = match &err {
            kube::Error::Api(response) => {
                response.code == 401 || response.code == 403
            }
            kube::Error::Auth(_) => true,
            _ => false,
        };
        if refused {
            return Error::Auth(err);
        }

        match err {
            kube::Error::SerdeError(source) => Error::Malformed(source),
            err => Error::Connectivity(err),
        }
    }
}

/// Ephemerals of one listing, the records that failed validation are only
/// counted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub resources: Vec<EphemeralResource>,
    pub skipped:   usize,
}

#[async_trait]
pub trait EphemeralLister: Debug + Sync + Send {
    /// Complete listing of the ephemerals of the cluster, following the
    /// pagination until the last page.
    async fn list_ephemerals(&self) -> Result<Listing, Error>;
}

pub struct K8sImpl {
    client:    Client,
    request:   Request,
    page_size: u32,
    timeout:   Duration,
}

impl Debug for K8sImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("K8sImpl")
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl K8sImpl {
    /// Client configured from `KUBECONFIG` or from the in-cluster service
    /// account.
    pub async fn new(
        page_size: u32,
        timeout_after: Duration,
    ) -> Result<Self, Error> {
        let client = timeout(timeout_after, Client::try_default())
            .await
            .map_err(|_| Error::Timeout(timeout_after))??;
        Ok(Self::with_client(client, page_size, timeout_after))
    }

    pub fn with_client(
        client: Client,
        page_size: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            request: Request::new(Ephemeral::url_path(&(), None)),
            page_size,
            timeout,
        }
    }

    /// Items are kept as raw JSON so that a single undecodable record does
    /// not take the whole page down with it.
    async fn list_pages(&self) -> Result<Vec<Value>, Error> {
        let mut items = Vec::new();
        let mut params = ListParams::default().limit(self.page_size);
        loop {
            let request = self
                .request
                .list(&params)
                .map_err(kube::Error::BuildRequest)?;
            let page: ObjectList<Value> = self.client.request(request).await?;
            trace!("Fetched a page of {} ephemerals", page.items.len());
            items.extend(page.items);

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => {
                    params = params.continue_token(&token);
                }
                _ => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl EphemeralLister for K8sImpl {
    #[instrument(level = "debug", skip(self))]
    async fn list_ephemerals(&self) -> Result<Listing, Error> {
        let items = timeout(self.timeout, self.list_pages())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        debug!("Listed {} ephemerals", items.len());
        Ok(into_listing(items))
    }
}

/// Decode one raw item of the listing.
pub fn decode(item: Value) -> Result<Ephemeral, Error> {
    let name = item
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();
    serde_json::from_value(item)
        .map_err(|err| Error::DataAnomaly { name, reason: err.to_string() })
}

pub fn to_resource(ephemeral: Ephemeral) -> Result<EphemeralResource, Error> {
    let ttl = ephemeral.ttl().map(ToString::to_string);
    let name = ephemeral.metadata.name.ok_or_else(|| Error::DataAnomaly {
        name:   "<unnamed>".to_string(),
        reason: "missing 'metadata:name' key".to_string(),
    })?;
    let creation_timestamp =
        ephemeral.metadata.creation_timestamp.ok_or_else(|| {
            Error::DataAnomaly {
                name:   name.clone(),
                reason: "missing 'metadata:creationTimestamp' key".to_string(),
            }
        })?;

    Ok(EphemeralResource { name, creation_timestamp: creation_timestamp.0, ttl })
}

/// Keep the valid records, log and drop the others.
pub fn into_listing(items: Vec<Value>) -> Listing {
    let mut listing = Listing::default();
    for item in items {
        match decode(item).and_then(to_resource) {
            Ok(resource) => listing.resources.push(resource),
            Err(err) => {
                warn!("Skipping ephemeral: {}", err);
                listing.skipped += 1;
            }
        }
    }
    listing
}
