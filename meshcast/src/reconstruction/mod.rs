//! Client for the external fal.ai reconstruction service.
//!
//! The relay never runs image-to-3D reconstruction itself; it drives fal.ai's
//! hosted queue API through three calls (submit, poll status, fetch result) and
//! then downloads the produced mesh asset. The [`Reconstruct`] trait is the seam
//! between the HTTP handlers and the concrete [`FalClient`] implementation, so
//! handler logic can be exercised against test doubles and the client against a
//! mock server.

mod client;

pub use client::FalClient;

use crate::api::models::convert::ConversionSettings;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error as ThisError;

/// Default media type for mesh payloads when the service omits one.
pub const DEFAULT_MESH_CONTENT_TYPE: &str = "model/gltf-binary";

/// Default download filename when the service omits one.
pub const DEFAULT_MESH_FILE_NAME: &str = "model.glb";

/// A completed reconstruction: where the mesh lives and how to label it.
///
/// Produced by validating the service's result payload at the boundary; the
/// download URL is required, the content type and filename fall back to safe
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshAsset {
    pub url: String,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl MeshAsset {
    /// Media type to serve the mesh under.
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_MESH_CONTENT_TYPE)
    }

    /// Filename for the `Content-Disposition` header.
    pub fn file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(DEFAULT_MESH_FILE_NAME)
    }
}

/// Errors from the external reconstruction call chain.
///
/// None of these are surfaced to callers verbatim; the handler collapses them
/// into a generic conversion failure and logs the chain for operators.
#[derive(ThisError, Debug)]
pub enum ReconstructionError {
    /// A request to the queue API could not be sent or its body read
    #[error("request to reconstruction service at {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The queue API answered with a non-success status
    #[error("reconstruction service returned HTTP {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// The queued job finished in a state other than completed
    #[error("reconstruction job ended in unexpected state '{status}'")]
    JobFailed { status: String },

    /// The job did not complete within the configured poll deadline
    #[error("reconstruction job did not complete within the configured deadline")]
    DeadlineExceeded,

    /// The result payload carried no usable mesh download URL
    #[error("reconstruction result did not include a mesh URL")]
    MissingMeshUrl,

    /// The mesh asset itself could not be fetched
    #[error("failed to fetch mesh asset from {url}: HTTP {status}")]
    AssetFetch { status: u16, url: String },

    /// The configured queue URL and model could not form a request URL
    #[error("invalid reconstruction request URL")]
    InvalidUrl(#[from] url::ParseError),
}

/// A reconstruction backend: submit an image, wait for the mesh, download it.
///
/// In practice this is fal.ai over HTTP via [`FalClient`]; tests substitute a
/// mock server or a double.
#[async_trait]
pub trait Reconstruct: Send + Sync {
    /// Run one conversion to completion and return the resulting mesh reference.
    async fn reconstruct(&self, image_url: &str, settings: &ConversionSettings) -> Result<MeshAsset, ReconstructionError>;

    /// Download the raw bytes of a produced mesh asset.
    async fn fetch_asset(&self, url: &str) -> Result<Bytes, ReconstructionError>;
}
