use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A conversion request from the browser client.
///
/// The image arrives either as a data URL (the client inlines the selected
/// file) or as a remote http(s) URL the reconstruction service can fetch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversionRequest {
    /// Data URL or fetchable http(s) URL of the source image
    #[serde(rename = "imageUrl")]
    #[schema(example = "data:image/png;base64,iVBORw0KGgo...")]
    pub image_url: String,
    /// Tunable parameters forwarded to the reconstruction model
    pub settings: ConversionSettings,
}

/// Tunable parameters of the TripoSR reconstruction, forwarded verbatim
/// (after boundary validation) to the external service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversionSettings {
    /// Mesh file format to produce
    pub output_format: OutputFormat,
    /// Whether the service should segment out the background first
    pub do_remove_background: bool,
    /// Fraction of the frame the foreground subject occupies, in (0, 1]
    #[schema(example = 0.9)]
    pub foreground_ratio: f64,
    /// Marching-cubes grid resolution, at least 1
    #[schema(example = 256)]
    pub mc_resolution: u32,
}

/// Supported mesh output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Glb,
    Obj,
}
