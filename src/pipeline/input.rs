//! Input resolution: validate a document path and discover PDFs in a folder.
//!
//! We check existence, read permission and the PDF magic bytes (`%PDF`)
//! before invoking the renderer so callers get a precise [`RenderError`]
//! instead of whatever the external tool prints for garbage input.

use crate::error::{Pdf2ImgError, RenderError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` is an existing, readable PDF.
pub fn resolve_local(path: &Path) -> Result<PathBuf, RenderError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(RenderError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                return Err(RenderError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(RenderError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(RenderError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// `true` if the file name ends in `.pdf` (any case).
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// List the `*.pdf` files directly inside `dir`, sorted by file name.
pub async fn discover_pdfs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2ImgError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Pdf2ImgError::io(dir, e))?;

    let mut pdfs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Pdf2ImgError::io(dir, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file && has_pdf_extension(&path) {
            pdfs.push(path);
        }
    }

    pdfs.sort();
    debug!("Found {} PDF(s) in {}", pdfs.len(), dir.display());
    Ok(pdfs)
}
