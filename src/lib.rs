//! # pdf2img
//!
//! Convert PDF documents into PNG/JPEG page images, optionally letterboxed
//! onto a fixed-size canvas and bundled into a ZIP archive.
//!
//! Rasterisation is delegated to an external renderer (Poppler's `pdftoppm`
//! or the pdfium shared library); resizing and encoding use the `image`
//! crate.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate the path (exists, readable, %PDF magic)
//!  ├─ 2. Render   one raster image per page via a Renderer backend
//!  ├─ 3. Canvas   shrink-to-fit and centre on a fixed background (optional)
//!  ├─ 4. Encode   PNG or JPEG (alpha flattened for JPEG)
//!  └─ 5. Persist  atomic writes, optional ZIP bundle
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2img::{convert_document, CanvasSpec, ConversionConfig, OutputFormat, RendererConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let renderer = RendererConfig::default().build(); // pdftoppm on PATH
//!     let config = ConversionConfig::builder()
//!         .format(OutputFormat::Jpeg)
//!         .canvas(CanvasSpec::new(1447, 2048, "white".parse()?)?)
//!         .build()?;
//!     let output = convert_document("document.pdf", "out/", &config, renderer.as_ref()).await?;
//!     for page in &output.pages {
//!         println!("{}", page.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdf2img` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`], the HTTP upload/convert/download service (axum) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Background, BatchConfig, BinaryLocation, CanvasSpec, ConversionConfig,
    ConversionConfigBuilder, FailurePolicy, OutputFormat, PageNaming, RendererBackend,
    RendererConfig,
};
pub use convert::{convert_batch, convert_document};
pub use error::{ErrorKind, Pdf2ImgError, RenderError};
pub use output::{BatchReport, ConversionOutput, ConversionStats, DocumentOutcome, DocumentResult, PageOutput};
pub use pipeline::canvas::normalize;
pub use pipeline::render::{render_pages, PdfiumRenderer, PopplerRenderer, RenderOptions, Renderer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
