use crate::AppState;
use crate::api::models::convert::ConversionRequest;
use crate::errors::{Error, ErrorBody, Result};
use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use url::Url;

/// Boundary validation of the caller-supplied request.
///
/// The original web app forwarded settings unchecked and let the external
/// service sort it out; rejecting obviously invalid values here saves a
/// round-trip through the queue.
fn validate_request(request: &ConversionRequest) -> Result<()> {
    if request.image_url.is_empty() {
        return Err(Error::BadRequest {
            message: "imageUrl cannot be empty".to_string(),
        });
    }

    if !request.image_url.starts_with("data:") {
        let is_fetchable = Url::parse(&request.image_url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !is_fetchable {
            return Err(Error::BadRequest {
                message: "imageUrl must be a data URL or an absolute http(s) URL".to_string(),
            });
        }
    }

    let ratio = request.settings.foreground_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(Error::BadRequest {
            message: format!("foreground_ratio must be in (0, 1], got {ratio}"),
        });
    }

    if request.settings.mc_resolution == 0 {
        return Err(Error::BadRequest {
            message: "mc_resolution must be at least 1".to_string(),
        });
    }

    Ok(())
}

#[utoipa::path(
    post,
    path = "/convert",
    tag = "convert",
    summary = "Convert an image to a 3D mesh",
    description = "Forwards the image and settings to the hosted reconstruction model, waits for \
                   completion, and streams the produced mesh file back. Each request is independent: \
                   nothing is cached or persisted, and a failed conversion is simply resubmitted by \
                   the caller.",
    request_body = ConversionRequest,
    responses(
        (status = 200, description = "Raw mesh bytes, served as an attachment", body = Vec<u8>, content_type = "model/gltf-binary"),
        (status = 400, description = "Invalid image reference or settings", body = ErrorBody),
        (status = 500, description = "Conversion failed", body = ErrorBody),
        (status = 503, description = "No reconstruction credential configured", body = ErrorBody)
    )
)]
pub async fn convert_image(State(state): State<AppState>, Json(request): Json<ConversionRequest>) -> Result<Response> {
    // Credential gate first: without it, no outbound call is ever attempted
    if state.config.fal.api_key.is_none() {
        return Err(Error::MissingCredential);
    }

    validate_request(&request)?;

    tracing::info!(
        output_format = ?request.settings.output_format,
        mc_resolution = request.settings.mc_resolution,
        "Submitting conversion to reconstruction service"
    );

    let mesh = state.reconstruction.reconstruct(&request.image_url, &request.settings).await?;
    let bytes = state.reconstruction.fetch_asset(&mesh.url).await?;

    tracing::info!(
        file_name = %mesh.file_name(),
        size_bytes = bytes.len(),
        "Streaming converted mesh to caller"
    );

    let headers = [
        (header::CONTENT_TYPE, mesh.content_type().to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", mesh.file_name())),
    ];

    Ok((headers, bytes).into_response())
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{convert_body, create_test_app, stub_completed_job, stub_mesh_asset, test_config};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test_log::test(tokio::test)]
    async fn test_convert_success_end_to_end() {
        let fal = MockServer::start().await;
        let mesh_bytes: &[u8] = b"glTF\x02\x00\x00\x00fake-binary-mesh";

        stub_completed_job(
            &fal,
            json!({
                "model_mesh": {
                    "url": format!("{}/files/model.glb", fal.uri()),
                    "content_type": "model/gltf-binary",
                    "file_name": "model.glb",
                }
            }),
        )
        .await;
        stub_mesh_asset(&fal, "/files/model.glb", mesh_bytes).await;

        let server = create_test_app(test_config(&fal.uri(), Some("test-key")));
        let response = server.post("/api/v1/convert").json(&convert_body()).await;

        response.assert_status_ok();
        assert_eq!(response.as_bytes().as_ref(), mesh_bytes, "relayed bytes must be identical to the asset");
        assert_eq!(response.header("content-type"), "model/gltf-binary");
        assert_eq!(response.header("content-disposition"), "attachment; filename=\"model.glb\"");
    }

    #[test_log::test(tokio::test)]
    async fn test_convert_defaults_mesh_labels() {
        let fal = MockServer::start().await;

        // Service reports only the URL; content type and filename fall back to defaults
        stub_completed_job(
            &fal,
            json!({
                "model_mesh": { "url": format!("{}/files/anonymous", fal.uri()) }
            }),
        )
        .await;
        stub_mesh_asset(&fal, "/files/anonymous", b"mesh").await;

        let server = create_test_app(test_config(&fal.uri(), Some("test-key")));
        let response = server.post("/api/v1/convert").json(&convert_body()).await;

        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "model/gltf-binary");
        assert_eq!(response.header("content-disposition"), "attachment; filename=\"model.glb\"");
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_credential_short_circuits_without_outbound_calls() {
        let fal = MockServer::start().await;

        let server = create_test_app(test_config(&fal.uri(), None));
        let response = server.post("/api/v1/convert").json(&convert_body()).await;

        assert_eq!(response.status_code().as_u16(), 503);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Reconstruction service is not configured");

        let outbound = fal.received_requests().await.unwrap();
        assert!(outbound.is_empty(), "no outbound calls may be made without a credential");
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_mesh_url_fails_generically_without_asset_fetch() {
        let fal = MockServer::start().await;

        stub_completed_job(&fal, json!({"model_mesh": {}})).await;

        // Any asset fetch would land here; it must not happen
        Mock::given(method("GET"))
            .and(path("/files/model.glb"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&fal)
            .await;

        let server = create_test_app(test_config(&fal.uri(), Some("test-key")));
        let response = server.post("/api/v1/convert").json(&convert_body()).await;

        assert_eq!(response.status_code().as_u16(), 500);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Failed to convert image");
    }

    #[test_log::test(tokio::test)]
    async fn test_asset_fetch_failure_fails_generically() {
        let fal = MockServer::start().await;

        stub_completed_job(
            &fal,
            json!({
                "model_mesh": {
                    "url": format!("{}/files/gone.glb", fal.uri()),
                    "content_type": "model/gltf-binary",
                    "file_name": "gone.glb",
                }
            }),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/files/gone.glb"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&fal)
            .await;

        let server = create_test_app(test_config(&fal.uri(), Some("test-key")));
        let response = server.post("/api/v1/convert").json(&convert_body()).await;

        assert_eq!(response.status_code().as_u16(), 500);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Failed to convert image");
    }

    #[test_log::test(tokio::test)]
    async fn test_external_call_failure_fails_generically() {
        let fal = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/fal-ai/triposr"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&fal)
            .await;

        let server = create_test_app(test_config(&fal.uri(), Some("test-key")));
        let response = server.post("/api/v1/convert").json(&convert_body()).await;

        assert_eq!(response.status_code().as_u16(), 500);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Failed to convert image");
    }

    #[test_log::test(tokio::test)]
    async fn test_repeat_requests_are_independent() {
        let fal = MockServer::start().await;

        // Two identical requests must produce two full external call chains
        Mock::given(method("POST"))
            .and(path("/fal-ai/triposr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "req-1",
                "status_url": format!("{}/requests/req-1/status", fal.uri()),
                "response_url": format!("{}/requests/req-1", fal.uri()),
            })))
            .expect(2)
            .mount(&fal)
            .await;
        Mock::given(method("GET"))
            .and(path("/requests/req-1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "COMPLETED"})))
            .mount(&fal)
            .await;
        Mock::given(method("GET"))
            .and(path("/requests/req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model_mesh": {
                    "url": format!("{}/files/model.glb", fal.uri()),
                    "content_type": "model/gltf-binary",
                    "file_name": "model.glb",
                }
            })))
            .mount(&fal)
            .await;

        stub_mesh_asset(&fal, "/files/model.glb", b"mesh").await;

        let server = create_test_app(test_config(&fal.uri(), Some("test-key")));
        let body = convert_body();

        server.post("/api/v1/convert").json(&body).await.assert_status_ok();
        server.post("/api/v1/convert").json(&body).await.assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_rejects_out_of_range_settings_without_outbound_calls() {
        let fal = MockServer::start().await;
        let server = create_test_app(test_config(&fal.uri(), Some("test-key")));

        let mut body = convert_body();
        body["settings"]["foreground_ratio"] = json!(1.5);
        let response = server.post("/api/v1/convert").json(&body).await;
        assert_eq!(response.status_code().as_u16(), 400);

        let mut body = convert_body();
        body["settings"]["mc_resolution"] = json!(0);
        let response = server.post("/api/v1/convert").json(&body).await;
        assert_eq!(response.status_code().as_u16(), 400);

        let mut body = convert_body();
        body["imageUrl"] = json!("ftp://example.com/cat.png");
        let response = server.post("/api/v1/convert").json(&body).await;
        assert_eq!(response.status_code().as_u16(), 400);

        let outbound = fal.received_requests().await.unwrap();
        assert!(outbound.is_empty(), "rejected requests may not reach the external service");
    }

    #[test_log::test(tokio::test)]
    async fn test_healthz() {
        let fal = MockServer::start().await;
        let server = create_test_app(test_config(&fal.uri(), None));

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }
}
