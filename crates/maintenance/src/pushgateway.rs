use malblock_common::PushgatewayConfig;
use malblock_reputation::Snapshot;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use thiserror::Error;

use crate::exposition;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reading response from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },
}

/// Pushes aggregate reputation metrics to a Prometheus Pushgateway.
///
/// Each push is a single POST bounded by the configured timeout. Failures
/// are returned to the caller; nothing is retried or queued.
pub struct PushgatewayExporter {
    client: Client,
    url: String,
    credentials: Option<(String, String)>,
    namespace: String,
}

impl PushgatewayExporter {
    pub fn new(config: &PushgatewayConfig) -> Result<Self, PushError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(PushError::Client)?;

        let url = format!(
            "{}/metrics/job/{}",
            config.address.trim_end_matches('/'),
            config.job
        );
        let credentials = (!config.username.is_empty())
            .then(|| (config.username.clone(), config.password.clone()));

        Ok(Self {
            client,
            url,
            credentials,
            namespace: config.namespace.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Render `snapshot` and POST it to the gateway.
    pub async fn push(&self, snapshot: &Snapshot) -> Result<(), PushError> {
        let payload = exposition::render(snapshot, &self.namespace)?;

        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await.map_err(|source| PushError::Request {
            url: self.url.clone(),
            source,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| PushError::Body {
            url: self.url.clone(),
            source,
        })?;

        if status.as_u16() > 299 {
            return Err(PushError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
