//! Conversion entry points: one document, or every PDF in a folder.
//!
//! ## Partial-failure policy
//!
//! A document is converted all-or-nothing. Its output directory is only
//! created once rendering has succeeded, every page file is written through
//! a temp-file-and-rename, and if any page fails the files already written
//! for that document are removed before the error is returned.
//!
//! Across a batch, [`FailurePolicy`] decides whether a failed document stops
//! the run or is recorded in the [`BatchReport`] and skipped.

use crate::archive;
use crate::config::{BatchConfig, CanvasSpec, ConversionConfig, FailurePolicy, OutputFormat};
use crate::error::Pdf2ImgError;
use crate::output::{
    BatchReport, ConversionOutput, ConversionStats, DocumentOutcome, DocumentResult, PageOutput,
};
use crate::pipeline::render::{self, RenderOptions, Renderer};
use crate::pipeline::{canvas, encode, input};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert one PDF into page images inside `output_dir`.
///
/// # Arguments
/// * `pdf_path`   - the source document
/// * `output_dir` - created if missing; receives one file per page
/// * `config`     - conversion configuration
/// * `renderer`   - rasteriser backend
///
/// # Errors
/// Returns `Err(Pdf2ImgError)` if rendering fails or any page cannot be
/// written. No page files are left behind in that case.
pub async fn convert_document(
    pdf_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
    renderer: &dyn Renderer,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let total_start = Instant::now();
    let pdf_path = pdf_path.as_ref();
    let output_dir = output_dir.as_ref();
    info!("Starting conversion: {}", pdf_path.display());

    // ── Step 1: Rasterise ────────────────────────────────────────────────
    let render_start = Instant::now();
    let options = RenderOptions::from_config(config);
    let pages = render::render_pages(renderer, pdf_path, &options).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let total_pages = pages.len();

    // ── Step 2: Output location ──────────────────────────────────────────
    let created_dir = !output_dir.exists();
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Pdf2ImgError::io(output_dir, e))?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 3: Normalise, encode, persist ───────────────────────────────
    let process_start = Instant::now();
    let results: Vec<Result<PageOutput, Pdf2ImgError>> = stream::iter(
        pages.into_iter().enumerate().map(|(idx, page)| async move {
            let result = process_page(idx, page, output_dir, config).await;
            match &result {
                Ok(page) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_complete(page.page_num, total_pages, page.bytes);
                    }
                }
                Err(e) => {
                    warn!("Page {} of {} failed: {}", idx + 1, pdf_path.display(), e);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_error(idx + 1, total_pages, &e.to_string());
                    }
                }
            }
            result
        }),
    )
    .buffered(config.concurrency.max(1))
    .collect()
    .await;
    let normalize_duration_ms = process_start.elapsed().as_millis() as u64;

    let mut written = Vec::with_capacity(total_pages);
    let mut first_error = None;
    for result in results {
        match result {
            Ok(page) => written.push(page),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, written.len());
    }

    if let Some(err) = first_error {
        discard_outputs(&written, output_dir, created_dir).await;
        return Err(err);
    }

    // ── Step 4: Optional archive ─────────────────────────────────────────
    let archive = if config.zip {
        let stem = file_stem(pdf_path);
        let zip_path = output_dir.join(format!("{stem}.zip"));
        let files: Vec<PathBuf> = written.iter().map(|p| p.path.clone()).collect();
        let bundled = tokio::task::spawn_blocking(move || archive::bundle(&files, &zip_path))
            .await
            .map_err(|e| Pdf2ImgError::Internal(format!("Archive task panicked: {e}")))?;
        match bundled {
            Ok(path) => Some(path),
            Err(e) => {
                discard_outputs(&written, output_dir, created_dir).await;
                return Err(e);
            }
        }
    } else {
        None
    };

    let stats = ConversionStats {
        page_count: written.len(),
        total_bytes: written.iter().map(|p| p.bytes as u64).sum(),
        render_duration_ms,
        normalize_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} → {} page(s) in {}, {}ms total",
        pdf_path.display(),
        stats.page_count,
        output_dir.display(),
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        source: pdf_path.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        pages: written,
        archive,
        stats,
    })
}

/// Convert every `*.pdf` in `input_dir`.
///
/// Each document gets its own subdirectory of `output_dir`, named after the
/// PDF's file stem. When two documents share a stem (`a.pdf`, `a.PDF`),
/// the later one's directory keeps the extension.
///
/// # Errors
/// Returns `Err` if `input_dir` cannot be listed. Under
/// [`FailurePolicy::Abort`], also returns the first document's error.
pub async fn convert_batch(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
    renderer: &dyn Renderer,
) -> Result<BatchReport, Pdf2ImgError> {
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();

    let pdfs = input::discover_pdfs(input_dir).await?;
    if pdfs.is_empty() {
        warn!("No PDF files found in {}", input_dir.display());
    }

    let mut report = BatchReport::default();
    let mut claimed: HashSet<String> = HashSet::new();
    for pdf in pdfs {
        // `a.pdf` and `a.PDF` share a stem; the later one keeps its extension.
        let Some(dir_name) = [file_stem(&pdf), file_name(&pdf)]
            .into_iter()
            .find(|name| !claimed.contains(name))
        else {
            let doc_dir = output_dir.join(file_name(&pdf));
            let err = Pdf2ImgError::io(
                &doc_dir,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "output directory already claimed by another document",
                ),
            );
            warn!("Skipping {}: {}", pdf.display(), err);
            if config.failure_policy == FailurePolicy::Abort {
                return Err(err);
            }
            report.documents.push(DocumentOutcome {
                source: pdf,
                output_dir: doc_dir,
                result: DocumentResult::Failed {
                    error: err.to_string(),
                },
            });
            continue;
        };
        claimed.insert(dir_name.clone());

        let doc_dir = output_dir.join(dir_name);
        let result = convert_document(&pdf, &doc_dir, &config.conversion, renderer).await;

        let outcome = match result {
            Ok(output) => DocumentResult::Converted {
                pages: output.pages.len(),
            },
            Err(e) => {
                warn!("Failed to convert {}: {}", pdf.display(), e);
                if config.failure_policy == FailurePolicy::Abort {
                    return Err(e);
                }
                DocumentResult::Failed {
                    error: e.to_string(),
                }
            }
        };

        report.documents.push(DocumentOutcome {
            source: pdf,
            output_dir: doc_dir,
            result: outcome,
        });
    }

    info!(
        "Batch complete: {} converted, {} failed, {} page(s)",
        report.converted(),
        report.failed(),
        report.total_pages()
    );
    Ok(report)
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct EncodedPage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

/// Normalise and encode one page off the async runtime, then write it.
async fn process_page(
    idx: usize,
    page: DynamicImage,
    output_dir: &Path,
    config: &ConversionConfig,
) -> Result<PageOutput, Pdf2ImgError> {
    let page_num = idx + 1;
    let format = config.format;
    let quality = config.jpeg_quality;
    let canvas = config.canvas;

    let encoded = tokio::task::spawn_blocking(move || {
        prepare_page(page_num, page, canvas.as_ref(), format, quality)
    })
    .await
    .map_err(|e| Pdf2ImgError::Internal(format!("Page {page_num} task panicked: {e}")))??;

    let file_name = config.naming.file_name(idx, format);
    let path = output_dir.join(&file_name);
    write_atomic(&path, &encoded.bytes).await?;
    debug!("Wrote page {} → {}", page_num, path.display());

    Ok(PageOutput {
        page_num,
        file_name,
        path,
        width: encoded.width,
        height: encoded.height,
        bytes: encoded.bytes.len(),
    })
}

/// Letterbox (if a canvas is set) and encode. The raw page is dropped here.
///
/// The canvas composites transparency over its background, so the colour
/// model is only conformed for pages that keep their rendered size.
fn prepare_page(
    page_num: usize,
    page: DynamicImage,
    canvas: Option<&CanvasSpec>,
    format: OutputFormat,
    quality: u8,
) -> Result<EncodedPage, Pdf2ImgError> {
    let image = match canvas {
        Some(spec) => canvas::normalize(&page, spec),
        None => format.conform(page),
    };
    let bytes = encode::encode_page(&image, format, quality).map_err(|e| {
        Pdf2ImgError::EncodeFailed {
            page: page_num,
            detail: e.to_string(),
        }
    })?;
    Ok(EncodedPage {
        bytes,
        width: image.width(),
        height: image.height(),
    })
}

/// Write to `<path>.tmp`, then rename into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2ImgError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Pdf2ImgError::io(path, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Pdf2ImgError::io(path, e));
    }
    Ok(())
}

/// Remove the files of a failed document, and its directory if we made it.
async fn discard_outputs(written: &[PageOutput], output_dir: &Path, created_dir: bool) {
    for page in written {
        if let Err(e) = tokio::fs::remove_file(&page.path).await {
            warn!("Could not remove {}: {}", page.path.display(), e);
        }
    }
    if created_dir {
        // Only succeeds when empty, which is what we want.
        let _ = tokio::fs::remove_dir(output_dir).await;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
