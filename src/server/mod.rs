//! HTTP service: upload a PDF, convert it, download the images.
//!
//! Endpoints:
//! - `GET  /`                            - upload page
//! - `GET  /health`                      - liveness
//! - `POST /upload`                      - multipart `file`, returns a stored-file handle
//! - `POST /convert`                     - `{filename, format, dpi, zip, canvas?}`
//! - `GET  /download/:job_id/:filename`  - one produced file
//! - `POST /cleanup`                     - purge uploads and outputs
//!
//! Every conversion writes into its own `outputs/<job id>/` directory, so
//! concurrent requests never see each other's files.

mod error;
mod routes;
mod storage;

pub use error::ApiError;
pub use routes::{ConvertRequest, ConvertResponse, UploadResponse};
pub use storage::{is_plain_file_name, secure_filename, Storage};

use crate::config::RendererConfig;
use crate::error::Pdf2ImgError;
use crate::pipeline::render::Renderer;
use axum::Router;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    /// Root holding `uploads/` and `outputs/`.
    pub data_dir: PathBuf,
    /// Largest accepted upload. Default: 20 MiB.
    pub max_upload_bytes: usize,
    pub render_timeout_secs: u64,
    pub renderer: RendererConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_dir: PathBuf::from("data"),
            max_upload_bytes: 20 * 1024 * 1024,
            render_timeout_secs: 120,
            renderer: RendererConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read `PDF2IMG_BIND`, `PDF2IMG_DATA_DIR` and `PDF2IMG_MAX_UPLOAD_MB`,
    /// falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, Pdf2ImgError> {
        let mut config = Self::default();
        if let Ok(bind) = env::var("PDF2IMG_BIND") {
            config.bind = bind.parse().map_err(|e| {
                Pdf2ImgError::InvalidConfig(format!("PDF2IMG_BIND '{bind}': {e}"))
            })?;
        }
        if let Ok(dir) = env::var("PDF2IMG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(mb) = env::var("PDF2IMG_MAX_UPLOAD_MB") {
            let mb: usize = mb.parse().map_err(|e| {
                Pdf2ImgError::InvalidConfig(format!("PDF2IMG_MAX_UPLOAD_MB '{mb}': {e}"))
            })?;
            config.max_upload_bytes = mb * 1024 * 1024;
        }
        Ok(config)
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub renderer: Arc<dyn Renderer>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// Create the storage directories and the renderer.
    pub async fn new(config: ServiceConfig) -> Result<Self, Pdf2ImgError> {
        let renderer = config.renderer.build();
        Self::with_renderer(config, renderer).await
    }

    /// Like [`AppState::new`] with an explicit renderer.
    pub async fn with_renderer(
        config: ServiceConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, Pdf2ImgError> {
        let storage = Storage::open(&config.data_dir).await?;
        Ok(Self {
            storage: Arc::new(storage),
            renderer,
            config: Arc::new(config),
        })
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    routes::router(state.config.max_upload_bytes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C / SIGTERM.
pub async fn serve(state: AppState) -> Result<(), Pdf2ImgError> {
    let addr = state.config.bind;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("cannot bind {addr}: {e}")))?;

    info!(
        "Listening on http://{} (data dir: {}, renderer: {})",
        addr,
        state.config.data_dir.display(),
        state.renderer.name()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("server error: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
