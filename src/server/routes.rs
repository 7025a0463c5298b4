//! Request handlers.

use super::error::ApiError;
use super::{AppState, Storage};
use crate::archive;
use crate::config::{CanvasSpec, ConversionConfig, OutputFormat, PageNaming};
use crate::convert::convert_document;
use crate::error::Pdf2ImgError;
use crate::pipeline::input::has_pdf_extension;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path as FsPath, PathBuf};
use tracing::info;
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub(super) fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/convert", post(convert))
        .route("/download/:job_id/:filename", get(download))
        .route("/cleanup", post(cleanup))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    /// Handle to pass to `/convert`.
    pub filename: String,
    pub original_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub filename: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_dpi", deserialize_with = "number_or_string")]
    pub dpi: u32,
    #[serde(default)]
    pub zip: bool,
    #[serde(default)]
    pub canvas: Option<CanvasSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub job_id: String,
    /// Produced files, in page order.
    pub files: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_file: Option<String>,
}

#[derive(Debug, Serialize)]
struct CleanupResponse {
    success: bool,
    removed: usize,
}

fn default_format() -> String {
    "PNG".to_string()
}

fn default_dpi() -> u32 {
    150
}

/// Accept `"dpi": 200` as well as `"dpi": "200"`.
fn number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }
    match Raw::deserialize(d)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid dpi '{s}'"))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "renderer": state.renderer.name(),
    }))
}

/// POST /upload (multipart, field `file`)
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.is_empty() {
            return Err(ApiError::bad_request("NO_FILE_SELECTED", "No file selected"));
        }
        if !has_pdf_extension(FsPath::new(&original_name)) {
            return Err(ApiError::bad_request(
                "INVALID_FILE_TYPE",
                "Invalid file type. Please upload a PDF file.",
            ));
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        let handle = state.storage.save_upload(&original_name, &data).await?;
        return Ok(Json(UploadResponse {
            success: true,
            filename: handle,
            original_name,
        }));
    }

    Err(ApiError::bad_request("NO_FILE", "No file part in the request"))
}

/// POST /convert
async fn convert(
    State(state): State<AppState>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(req) =
        payload.map_err(|e| ApiError::bad_request("INVALID_REQUEST", e.body_text()))?;

    let handle = req
        .filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("NO_FILENAME", "No filename provided"))?;
    let pdf = state
        .storage
        .upload_path(&handle)
        .ok_or_else(|| ApiError::bad_request("INVALID_FILENAME", "Invalid filename"))?;
    if !tokio::fs::try_exists(&pdf).await.unwrap_or(false) {
        return Err(ApiError::not_found("File not found"));
    }

    let format: OutputFormat = req.format.parse()?;
    let mut builder = ConversionConfig::builder()
        .dpi(req.dpi)
        .format(format)
        .naming(PageNaming::pages())
        .render_timeout_secs(state.config.render_timeout_secs);
    if let Some(canvas) = req.canvas {
        builder = builder.canvas(canvas);
    }
    let config = builder.build()?;

    let (job_id, job_dir) = state.storage.new_job();
    let output = match convert_document(&pdf, &job_dir, &config, state.renderer.as_ref()).await {
        Ok(output) => output,
        Err(e) => {
            state.storage.discard_job(&job_dir).await;
            return Err(e.into());
        }
    };
    let files = output.file_names();

    let zip_file = if req.zip && files.len() > 1 {
        let paths: Vec<PathBuf> = output.pages.iter().map(|p| p.path.clone()).collect();
        Some(bundle_job(&state.storage, &job_dir, paths).await?)
    } else {
        None
    };

    info!(
        "Job {}: {} → {} {} file(s){}",
        job_id,
        handle,
        files.len(),
        format,
        if zip_file.is_some() { " + zip" } else { "" }
    );

    Ok(Json(ConvertResponse {
        success: true,
        job_id,
        count: files.len(),
        files,
        zip_file,
    }))
}

/// Zip a job's pages under a random `converted_images_*.zip` name. A job
/// whose archive fails is discarded whole.
async fn bundle_job(
    storage: &Storage,
    job_dir: &FsPath,
    paths: Vec<PathBuf>,
) -> Result<String, ApiError> {
    let name = format!("converted_images_{}.zip", &Uuid::new_v4().simple().to_string()[..8]);
    let zip_path = job_dir.join(&name);
    let bundled = tokio::task::spawn_blocking(move || archive::bundle(&paths, &zip_path))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Archive task panicked: {e}")))
        .and_then(|r| r);
    match bundled {
        Ok(_) => Ok(name),
        Err(e) => {
            storage.discard_job(job_dir).await;
            Err(e.into())
        }
    }
}

/// GET /download/:job_id/:filename
async fn download(
    State(state): State<AppState>,
    Path((job_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let path = state
        .storage
        .output_file(&job_id, &filename)
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(Pdf2ImgError::io(&path, e).into()),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(data))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// POST /cleanup
async fn cleanup(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let removed = state.storage.purge().await?;
    Ok(Json(CleanupResponse {
        success: true,
        removed,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn multipart_error(e: MultipartError) -> ApiError {
    let status = e.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "FILE_TOO_LARGE"
    } else {
        "INVALID_UPLOAD"
    };
    ApiError::new(status, code, e.body_text())
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = FsPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn failed_archive_discards_the_job() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        let (_, job_dir) = storage.new_job();
        std::fs::create_dir_all(&job_dir).unwrap();
        let page = job_dir.join("page_1.png");
        std::fs::write(&page, b"png").unwrap();

        let err = bundle_job(&storage, &job_dir, vec![page, job_dir.join("page_2.png")])
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!job_dir.exists());
    }

    #[tokio::test]
    async fn archive_is_written_into_the_job() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        let (_, job_dir) = storage.new_job();
        std::fs::create_dir_all(&job_dir).unwrap();
        let pages: Vec<PathBuf> = (1..=2)
            .map(|i| {
                let p = job_dir.join(format!("page_{i}.png"));
                std::fs::write(&p, b"png").unwrap();
                p
            })
            .collect();

        let name = bundle_job(&storage, &job_dir, pages).await.unwrap();
        assert!(name.starts_with("converted_images_"));
        assert!(job_dir.join(name).is_file());
    }

    #[test]
    fn convert_request_defaults() {
        let req: ConvertRequest = serde_json::from_str(r#"{"filename": "x.pdf"}"#).unwrap();
        assert_eq!(req.format, "PNG");
        assert_eq!(req.dpi, 150);
        assert!(!req.zip);
        assert!(req.canvas.is_none());
    }

    #[test]
    fn dpi_may_be_a_string() {
        let req: ConvertRequest =
            serde_json::from_str(r#"{"filename": "x.pdf", "dpi": "300"}"#).unwrap();
        assert_eq!(req.dpi, 300);
        assert!(serde_json::from_str::<ConvertRequest>(r#"{"dpi": "high"}"#).is_err());
    }

    #[test]
    fn canvas_is_validated_on_parse() {
        let req: ConvertRequest = serde_json::from_str(
            r#"{"filename": "x.pdf", "canvas": {"width": 100, "height": 200, "background": "black"}}"#,
        )
        .unwrap();
        let canvas = req.canvas.unwrap();
        assert_eq!((canvas.width(), canvas.height()), (100, 200));

        let zero = r#"{"filename": "x.pdf", "canvas": {"width": 0, "height": 200}}"#;
        assert!(serde_json::from_str::<ConvertRequest>(zero).is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("page_1.png"), "image/png");
        assert_eq!(content_type_for("page_1.JPG"), "image/jpeg");
        assert_eq!(content_type_for("converted_images_ab12cd34.zip"), "application/zip");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }
}
