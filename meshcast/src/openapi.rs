//! OpenAPI documentation definition.
//!
//! The generated document is served interactively at `/docs` via Scalar.

use utoipa::OpenApi;

use crate::api::models::convert::{ConversionRequest, ConversionSettings, OutputFormat};
use crate::errors::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "meshcast",
        description = "Relay service converting 2D images into 3D meshes via fal.ai's hosted TripoSR model.",
    ),
    servers((url = "/api/v1")),
    paths(crate::api::handlers::convert::convert_image),
    components(schemas(ConversionRequest, ConversionSettings, OutputFormat, ErrorBody)),
    tags(
        (name = "convert", description = "Image-to-3D conversion"),
    )
)]
pub struct ApiDoc;
