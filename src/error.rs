//! Error types for the pdf2img library.
//!
//! Two error types reflect the two places a conversion can go wrong:
//!
//! * [`RenderError`] - the external rasteriser could not turn the document
//!   into page images (missing file, encrypted or corrupt PDF, renderer
//!   binary/library unavailable, timeout). Produced only by
//!   [`crate::pipeline::render`].
//!
//! * [`Pdf2ImgError`] - everything returned from the public entry points.
//!   Wraps [`RenderError`] and adds configuration and I/O failures.
//!
//! [`Pdf2ImgError::kind`] collapses both into an [`ErrorKind`] so the
//! service layer can tell "bad input" apart from "internal failure" without
//! matching on every variant.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of the renderer adapter.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF requires a password but none (or a wrong one) was provided.
    #[error("PDF '{path}' is encrypted and requires a valid password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    /// The renderer binary or shared library could not be located or loaded.
    #[error(
        "PDF renderer '{renderer}' is unavailable: {detail}\n\n\
Install poppler-utils (pdftoppm) or pdfium, or point --renderer-dir at the\n\
directory that contains it.\n"
    )]
    RendererUnavailable { renderer: String, detail: String },

    /// The renderer ran but reported a failure.
    #[error("PDF renderer '{renderer}' failed on '{path}': {detail}")]
    RendererFailed {
        renderer: String,
        path: PathBuf,
        detail: String,
    },

    /// The renderer did not finish within the configured timeout.
    #[error("Rendering '{path}' timed out after {secs}s")]
    Timeout { path: PathBuf, secs: u64 },

    /// The renderer succeeded but produced no pages.
    #[error("Rendering '{path}' produced no pages")]
    NoPages { path: PathBuf },
}

impl RenderError {
    /// `true` when the caller supplied a bad document, as opposed to the
    /// renderer itself misbehaving.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            RenderError::FileNotFound { .. }
                | RenderError::NotAPdf { .. }
                | RenderError::PasswordRequired { .. }
                | RenderError::Corrupt { .. }
        )
    }
}

/// Coarse classification of a [`Pdf2ImgError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Render,
    Config,
    Io,
    Internal,
}

/// All errors returned by the pdf2img library.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Render errors ─────────────────────────────────────────────────────
    #[error(transparent)]
    Render(#[from] RenderError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed or a value could not be parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading an input location or writing an output file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding a page image to PNG/JPEG failed.
    #[error("Failed to encode page {page}: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// Writing the ZIP archive failed.
    #[error("Failed to write archive '{path}': {detail}")]
    ArchiveFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2ImgError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2ImgError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2ImgError::Render(_) => ErrorKind::Render,
            Pdf2ImgError::InvalidConfig(_) => ErrorKind::Config,
            Pdf2ImgError::Io { .. } | Pdf2ImgError::ArchiveFailed { .. } => ErrorKind::Io,
            Pdf2ImgError::EncodeFailed { .. } | Pdf2ImgError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// `true` when retrying with the same input cannot succeed because the
    /// input itself (document or configuration) is at fault.
    pub fn is_bad_input(&self) -> bool {
        match self {
            Pdf2ImgError::Render(e) => e.is_bad_input(),
            Pdf2ImgError::InvalidConfig(_) => true,
            _ => false,
        }
    }
}
