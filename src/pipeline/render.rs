//! PDF rasterisation: turn every page of a document into a `DynamicImage`.
//!
//! The rasteriser is an opaque external component behind the [`Renderer`]
//! trait. Two backends ship with the crate:
//!
//! * [`PopplerRenderer`] runs Poppler's `pdftoppm` into a scratch
//!   directory and decodes the PNGs it writes. The scratch directory is a
//!   `TempDir`, removed as soon as the pages are in memory.
//! * [`PdfiumRenderer`] loads pdfium through `pdfium-render`. pdfium is not
//!   async-safe, so it runs inside `spawn_blocking`.
//!
//! Callers go through [`render_pages`], which validates the input, applies
//! the timeout and rejects empty results.

use crate::config::{BinaryLocation, ConversionConfig};
use crate::error::RenderError;
use crate::pipeline::input;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-invocation rendering parameters.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub dpi: u32,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl RenderOptions {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            dpi: config.dpi,
            password: config.password.clone(),
            timeout: Duration::from_secs(config.render_timeout_secs),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

/// A PDF rasteriser producing one image per page, in page order.
///
/// Implementations must return pages in source order (index `i` is page
/// `i + 1`) and must report failures as [`RenderError`] rather than an
/// empty vector.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    async fn render(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
    ) -> Result<Vec<DynamicImage>, RenderError>;
}

/// Render every page of `pdf_path` with `renderer`.
///
/// Validates the document first and bounds the renderer by `options.timeout`.
pub async fn render_pages(
    renderer: &dyn Renderer,
    pdf_path: &Path,
    options: &RenderOptions,
) -> Result<Vec<DynamicImage>, RenderError> {
    let path = input::resolve_local(pdf_path)?;
    let start = Instant::now();

    let pages = match tokio::time::timeout(options.timeout, renderer.render(&path, options)).await
    {
        Ok(result) => result?,
        Err(_) => {
            warn!(
                "{} did not finish rendering {} within {}s",
                renderer.name(),
                path.display(),
                options.timeout.as_secs()
            );
            return Err(RenderError::Timeout {
                path,
                secs: options.timeout.as_secs(),
            });
        }
    };

    if pages.is_empty() {
        return Err(RenderError::NoPages { path });
    }

    info!(
        "Rendered {} page(s) of {} with {} in {}ms",
        pages.len(),
        path.display(),
        renderer.name(),
        start.elapsed().as_millis()
    );

    Ok(pages)
}

// ── Poppler (pdftoppm) ───────────────────────────────────────────────────

/// Renders through Poppler's `pdftoppm` executable.
#[derive(Debug, Clone, Default)]
pub struct PopplerRenderer {
    location: BinaryLocation,
}

impl PopplerRenderer {
    pub fn new(location: BinaryLocation) -> Self {
        Self { location }
    }

    /// Program to execute: a bare name resolved through `PATH`, or a full
    /// path inside the configured directory.
    pub fn program(&self) -> PathBuf {
        let exe = if cfg!(windows) {
            "pdftoppm.exe"
        } else {
            "pdftoppm"
        };
        match &self.location {
            BinaryLocation::SystemPath => PathBuf::from(exe),
            BinaryLocation::Directory(dir) => dir.join(exe),
        }
    }
}

#[async_trait]
impl Renderer for PopplerRenderer {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    async fn render(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
    ) -> Result<Vec<DynamicImage>, RenderError> {
        let failed = |detail: String| RenderError::RendererFailed {
            renderer: self.name().to_string(),
            path: pdf_path.to_path_buf(),
            detail,
        };

        let scratch = tempfile::Builder::new()
            .prefix("pdf2img-")
            .tempdir()
            .map_err(|e| failed(format!("cannot create scratch directory: {e}")))?;
        let prefix = scratch.path().join("page");

        let mut cmd = tokio::process::Command::new(self.program());
        cmd.arg("-r").arg(options.dpi.to_string()).arg("-png");
        if let Some(ref pwd) = options.password {
            cmd.arg("-upw").arg(pwd);
        }
        cmd.arg(pdf_path)
            .arg(&prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the future on timeout must not leave pdftoppm running.
            .kill_on_drop(true);

        debug!("Running {:?}", self.program());
        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                RenderError::RendererUnavailable {
                    renderer: self.name().to_string(),
                    detail: format!("cannot execute {}: {e}", self.program().display()),
                }
            }
            _ => failed(e.to_string()),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_pdftoppm_failure(
                pdf_path,
                output.status.code(),
                stderr,
            ));
        }

        // Decoding dozens of PNGs is CPU-bound.
        let pages = tokio::task::spawn_blocking(move || {
            let pages = collect_pages(scratch.path());
            drop(scratch);
            pages
        })
        .await
        .map_err(|e| failed(format!("page decode task panicked: {e}")))?
        .map_err(failed)?;

        Ok(pages)
    }
}

/// Map a failed `pdftoppm` run to a [`RenderError`].
///
/// Exit code 1 means the PDF could not be opened; its stderr says whether a
/// password was the problem. Everything else is a renderer failure.
fn classify_pdftoppm_failure(pdf_path: &Path, code: Option<i32>, stderr: String) -> RenderError {
    let path = pdf_path.to_path_buf();
    if stderr.to_ascii_lowercase().contains("password") {
        return RenderError::PasswordRequired { path };
    }
    match code {
        Some(1) => RenderError::Corrupt {
            path,
            detail: if stderr.is_empty() {
                "pdftoppm could not open the document".to_string()
            } else {
                stderr
            },
        },
        _ => RenderError::RendererFailed {
            renderer: "pdftoppm".to_string(),
            path,
            detail: match code {
                Some(c) => format!("exit code {c}: {stderr}"),
                None => format!("terminated by signal: {stderr}"),
            },
        },
    }
}

/// Page number encoded in a `pdftoppm` output name (`page-7.png`,
/// `page-007.png`, …).
fn page_number(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("page-")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Decode every `page-N.png` in `dir`, ordered by `N`.
///
/// `pdftoppm` zero-pads to the width of the page count, so lexical order is
/// not reliable across differently-sized documents; sort numerically.
fn collect_pages(dir: &Path) -> Result<Vec<DynamicImage>, String> {
    let mut numbered: Vec<(usize, PathBuf)> = std::fs::read_dir(dir)
        .map_err(|e| format!("cannot list rendered pages: {e}"))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            page_number(name.to_str()?).map(|n| (n, entry.path()))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);

    numbered
        .into_iter()
        .map(|(n, path)| {
            image::open(&path).map_err(|e| format!("cannot decode rendered page {n}: {e}"))
        })
        .collect()
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// Renders through the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    location: BinaryLocation,
}

impl PdfiumRenderer {
    pub fn new(location: BinaryLocation) -> Self {
        Self { location }
    }
}

#[async_trait]
impl Renderer for PdfiumRenderer {
    fn name(&self) -> &str {
        "pdfium"
    }

    async fn render(
        &self,
        pdf_path: &Path,
        options: &RenderOptions,
    ) -> Result<Vec<DynamicImage>, RenderError> {
        let path = pdf_path.to_path_buf();
        let location = self.location.clone();
        let dpi = options.dpi;
        let password = options.password.clone();

        // The blocking thread cannot be cancelled; on timeout `render_pages`
        // returns early and the thread finishes in the background.
        tokio::task::spawn_blocking(move || {
            render_pdfium_blocking(&location, &path, dpi, password.as_deref())
        })
        .await
        .map_err(|e| RenderError::RendererFailed {
            renderer: "pdfium".to_string(),
            path: pdf_path.to_path_buf(),
            detail: format!("render task panicked: {e}"),
        })?
    }
}

fn bind_pdfium(location: &BinaryLocation) -> Result<Pdfium, RenderError> {
    let bindings = match location {
        BinaryLocation::SystemPath => Pdfium::bind_to_system_library(),
        BinaryLocation::Directory(dir) => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        }
    }
    .map_err(|e| RenderError::RendererUnavailable {
        renderer: "pdfium".to_string(),
        detail: format!("{e:?}"),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of pdfium rendering.
fn render_pdfium_blocking(
    location: &BinaryLocation,
    pdf_path: &Path,
    dpi: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, RenderError> {
    let pdfium = bind_pdfium(location)?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            RenderError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        } else {
            RenderError::Corrupt {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    // PDF user space is 72 units per inch.
    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

    let pages = document.pages();
    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| RenderError::RendererFailed {
                    renderer: "pdfium".to_string(),
                    path: pdf_path.to_path_buf(),
                    detail: format!("page {}: {:?}", idx + 1, e),
                })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
