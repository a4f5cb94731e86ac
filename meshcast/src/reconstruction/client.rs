use super::{MeshAsset, Reconstruct, ReconstructionError};
use crate::api::models::convert::ConversionSettings;
use crate::config::FalConfig;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Input payload submitted to the queue: the image reference plus the
/// caller's settings, flattened exactly as the hosted model expects them.
#[derive(Debug, Serialize)]
struct QueueInput<'a> {
    image_url: &'a str,
    #[serde(flatten)]
    settings: &'a ConversionSettings,
}

/// Response to a queue submission.
#[derive(Debug, Deserialize)]
struct QueueSubmitResponse {
    request_id: String,
    status_url: String,
    response_url: String,
}

/// Response from the queue status endpoint.
///
/// The status is kept as a raw string so unexpected states can be reported
/// verbatim instead of being polled forever.
#[derive(Debug, Deserialize)]
struct QueueStatusResponse {
    status: String,
}

/// Result payload of a completed reconstruction.
///
/// All fields are optional at the wire level; [`ReconstructionOutput::into_mesh`]
/// validates them at the boundary rather than defaulting silently.
#[derive(Debug, Deserialize)]
pub(crate) struct ReconstructionOutput {
    #[serde(default)]
    model_mesh: Option<MeshPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct MeshPayload {
    url: Option<String>,
    content_type: Option<String>,
    file_name: Option<String>,
}

impl ReconstructionOutput {
    /// Validate the result: a usable mesh needs at least a non-empty download URL.
    pub(crate) fn into_mesh(self) -> Result<MeshAsset, ReconstructionError> {
        let mesh = self.model_mesh.unwrap_or_default();
        let url = mesh.url.filter(|u| !u.is_empty()).ok_or(ReconstructionError::MissingMeshUrl)?;
        Ok(MeshAsset {
            url,
            content_type: mesh.content_type.filter(|c| !c.is_empty()),
            file_name: mesh.file_name.filter(|f| !f.is_empty()),
        })
    }
}

/// Makes sure a url has a trailing slash.
///
/// This fixes a weird idiosyncracy in rusts 'join' method on urls, where joining URLs like
/// '/hello', 'world' gives you '/world', but '/hello/', 'world' gives you '/hello/world'.
/// Basically, call this before calling .join
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// The concrete fal.ai queue client.
///
/// Drives one conversion through submit -> status polling -> result fetch, then
/// downloads the produced asset. No retries at any step: a failed call fails
/// the whole conversion and the caller is expected to resubmit.
pub struct FalClient {
    client: Client,
    queue_url: Url,
    model: String,
    api_key: Option<String>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl FalClient {
    pub fn new(config: &FalConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            queue_url: config.queue_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval,
            poll_timeout: config.poll_timeout,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            request.header("Authorization", format!("Key {api_key}"))
        } else {
            request
        }
    }

    /// Send a request and parse a JSON body, reporting non-success statuses with
    /// their response body for operator diagnosis.
    async fn send_json<T: DeserializeOwned>(&self, url: &str, request: reqwest::RequestBuilder) -> Result<T, ReconstructionError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ReconstructionError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReconstructionError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let body_text = response.text().await.map_err(|e| ReconstructionError::Http {
            url: url.to_string(),
            source: e,
        })?;

        match serde_json::from_str::<T>(&body_text) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::error!("Failed to parse reconstruction service response as JSON. Error: {}", e);
                tracing::error!("Response body was: {}", body_text);
                Err(ReconstructionError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    body: format!("unparseable response body: {e}"),
                })
            }
        }
    }

    /// Submit the conversion input to the queue.
    async fn submit(&self, image_url: &str, settings: &ConversionSettings) -> Result<QueueSubmitResponse, ReconstructionError> {
        let url = ensure_slash(&self.queue_url).join(&self.model)?;

        debug!("Submitting reconstruction job to {}", url);

        let input = QueueInput { image_url, settings };
        self.send_json(url.as_str(), self.client.post(url.clone()).json(&input)).await
    }

    /// Poll the status endpoint until the job completes or the deadline passes.
    async fn wait_for_completion(&self, status_url: &str) -> Result<(), ReconstructionError> {
        let deadline = Instant::now() + self.poll_timeout;

        loop {
            let status: QueueStatusResponse = self.send_json(status_url, self.client.get(status_url)).await?;

            match status.status.as_str() {
                "COMPLETED" => return Ok(()),
                "IN_QUEUE" | "IN_PROGRESS" => {
                    if Instant::now() + self.poll_interval >= deadline {
                        return Err(ReconstructionError::DeadlineExceeded);
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                other => {
                    return Err(ReconstructionError::JobFailed {
                        status: other.to_string(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Reconstruct for FalClient {
    async fn reconstruct(&self, image_url: &str, settings: &ConversionSettings) -> Result<MeshAsset, ReconstructionError> {
        let submitted = self.submit(image_url, settings).await?;

        debug!(
            request_id = %submitted.request_id,
            "Reconstruction job queued, polling for completion"
        );

        self.wait_for_completion(&submitted.status_url).await?;

        let output: ReconstructionOutput = self.send_json(&submitted.response_url, self.client.get(&submitted.response_url)).await?;

        output.into_mesh()
    }

    async fn fetch_asset(&self, url: &str) -> Result<Bytes, ReconstructionError> {
        debug!("Fetching mesh asset from {}", url);

        // Asset URLs are pre-signed by the service; no Authorization header here.
        let response = self.client.get(url).send().await.map_err(|e| ReconstructionError::Http {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReconstructionError::AssetFetch {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.bytes().await.map_err(|e| ReconstructionError::Http {
            url: url.to_string(),
            source: e,
        })
    }
}
