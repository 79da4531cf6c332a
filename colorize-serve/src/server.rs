use std::time::Duration;

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use colorize::pipeline::{ColorizationResult, ImageStore, Pipeline, Upload};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

const OWNER_HEADER: &str = "x-owner-id";

// multipart framing around the file itself
const BODY_SLACK_BYTES: usize = 64 * 1024;

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

/// Shared state of the handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub request_timeout: Duration,
}

/// Owner identity forwarded by the upstream authenticator.
pub struct Owner(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| ImageStore::validate_owner(v).is_ok())
            .ok_or(ApiError::MissingOwner)?;
        Ok(Owner(owner.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.pipeline.settings().limits.max_bytes as usize + BODY_SLACK_BYTES;

    Router::new()
        .route("/", get(|| async { "Welcome to colorize-rs!" }))
        .route("/health", get(health))
        .route(
            "/api/v0/colorize",
            post(colorize).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/v0/history", get(history))
        .route("/api/v0/results/:id", get(result))
        .route("/api/v0/results/:id/image", get(result_image))
        .route("/api/v0/images/:id/colorize", post(rerun))
        .route("/api/v0/images/:id", axum::routing::delete(delete_image))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.pipeline.ledger().health_check().await.is_ok();
    let model = state.pipeline.model();

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if database && model.is_available() { "ok" } else { "degraded" },
            "database": database,
            "model": model.describe(),
            "model_available": model.is_available(),
        })),
    )
}

async fn colorize(
    State(state): State<AppState>,
    Owner(owner): Owner,
    mut multipart: Multipart,
) -> Result<Json<ColorizationResult>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let mut file = Upload::new(bytes.to_vec(), filename);
        file.declared_content_type = content_type;
        upload = Some(file);
        break;
    }
    let upload = upload.ok_or(ApiError::MissingFile)?;

    // the pipeline keeps going on timeout so the pending row is always finalized
    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(async move { pipeline.run(upload, &owner).await });

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(joined) => Ok(Json(joined??)),
        Err(_) => Err(ApiError::Timeout(state.request_timeout.as_secs())),
    }
}

async fn history(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ColorizationResult>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    Ok(Json(state.pipeline.history(&owner, limit).await?))
}

async fn result(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<ColorizationResult>, ApiError> {
    Ok(Json(state.pipeline.result(id, &owner).await?))
}

async fn result_image(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (bytes, mime) = state.pipeline.result_image(id, &owner).await?;
    Ok(([(header::CONTENT_TYPE, mime)], bytes))
}

async fn rerun(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<ColorizationResult>, ApiError> {
    let pipeline = state.pipeline.clone();
    let task = tokio::spawn(async move { pipeline.rerun(id, &owner).await });

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(joined) => Ok(Json(joined??)),
        Err(_) => Err(ApiError::Timeout(state.request_timeout.as_secs())),
    }
}

async fn delete_image(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.pipeline.delete_image(id, &owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use colorize::dnn::{ColorizationModel, DnnError, ModelHandle, ModelOutput, PreprocessConfig};
    use colorize::image::{Image, Rgb8};
    use colorize::io::{functional, ImageFormat};
    use colorize::pipeline::{Ledger, PipelineSettings, UploadLimits};
    use tower::ServiceExt;

    type Error = Box<dyn std::error::Error + Send + Sync>;

    const BOUNDARY: &str = "colorize-test-boundary";

    struct Neutral;

    impl ColorizationModel for Neutral {
        fn forward(&self, input: &Image<f32, 1>) -> Result<ModelOutput, DnnError> {
            Ok(ModelOutput {
                channels: 2,
                size: input.size(),
                data: vec![0.0; 2 * input.size().area()],
            })
        }
    }

    async fn app(
        dir: &tempfile::TempDir,
        model: ModelHandle,
        max_bytes: u64,
    ) -> Result<Router, Error> {
        let store = ImageStore::new(dir.path().join("uploads"))?;
        let ledger = Ledger::open(dir.path().join("history.sqlite3")).await?;
        let settings = PipelineSettings {
            limits: UploadLimits {
                max_bytes,
                ..Default::default()
            },
            ..Default::default()
        };
        Ok(router(AppState {
            pipeline: Pipeline::new(store, ledger, model, settings),
            request_timeout: Duration::from_secs(30),
        }))
    }

    fn neutral() -> ModelHandle {
        ModelHandle::new(Neutral, PreprocessConfig::default(), None)
    }

    fn png(size: usize) -> Result<Vec<u8>, Error> {
        let image = Rgb8::from_size_val([size, size].into(), 90)?;
        Ok(functional::encode_image_rgb8(&image, ImageFormat::Png, 0)?)
    }

    fn upload_request(owner: &str, filename: &str, bytes: &[u8]) -> Result<Request<Body>, Error> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Ok(Request::post("/api/v0/colorize")
            .header(OWNER_HEADER, owner)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))?)
    }

    async fn json(response: axum::response::Response) -> Result<serde_json::Value, Error> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn upload_then_fetch() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let app = app(&dir, neutral(), 1024 * 1024).await?;

        let response = app
            .clone()
            .oneshot(upload_request("alice", "cat.png", &png(40)?)?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await?;
        assert_eq!(body["processing_status"], "succeeded");
        let id = body["id"].as_str().ok_or("no id")?.to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v0/results/{id}/image"))
                    .header(OWNER_HEADER, "alice")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(functional::decode_image_rgb8(&bytes)?.size(), [40, 40].into());

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v0/results/{id}"))
                    .header(OWNER_HEADER, "bob")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(
                Request::get("/api/v0/history?limit=5")
                    .header(OWNER_HEADER, "alice")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await?.as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn rejections_map_to_client_errors() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let app = app(&dir, neutral(), 1024).await?;

        let response = app
            .clone()
            .oneshot(upload_request("alice", "cat.gif", &png(4)?)?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(upload_request("alice", "big.png", &vec![7u8; 4096])?)
            .await?;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = app
            .clone()
            .oneshot(upload_request("", "cat.png", &png(4)?)?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(upload_request("alice", "fake.png", b"definitely not an image")?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json(response).await?;
        assert_eq!(body["step"], "decoded");
        assert_eq!(body["result"]["processing_status"], "failed");
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_model_is_503() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let model = ModelHandle::unavailable("no weights", PreprocessConfig::default());
        let app = app(&dir, model, 1024 * 1024).await?;

        let response = app
            .clone()
            .oneshot(upload_request("alice", "cat.png", &png(8)?)?)
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await?["status"], "degraded");
        Ok(())
    }

    #[tokio::test]
    async fn delete_then_not_found() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let app = app(&dir, neutral(), 1024 * 1024).await?;

        let response = app
            .clone()
            .oneshot(upload_request("alice", "cat.png", &png(8)?)?)
            .await?;
        let body = json(response).await?;
        let image_id = body["source_image_id"].as_str().ok_or("no image id")?.to_string();

        let delete = |owner: &str| {
            Request::delete(format!("/api/v0/images/{image_id}"))
                .header(OWNER_HEADER, owner)
                .body(Body::empty())
        };

        let response = app.clone().oneshot(delete("bob")?).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.clone().oneshot(delete("alice")?).await?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(delete("alice")?).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
