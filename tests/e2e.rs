//! End-to-end tests against a real rasteriser.
//!
//! These need Poppler's `pdftoppm` (and, for the pdfium test, a pdfium shared
//! library in `PDFIUM_LIB_DIR`). They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use pdf2img::{
    convert_batch, convert_document, BatchConfig, BinaryLocation, CanvasSpec, ConversionConfig,
    OutputFormat, PdfiumRenderer, Pdf2ImgError, PopplerRenderer, RenderError,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// A small but well-formed PDF with `pages` blank pages of 200×300 pt.
fn blank_pdf(pages: usize) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {pages} >>",
            (0..pages)
                .map(|i| format!("{} 0 R", i + 3))
                .collect::<Vec<_>>()
                .join(" ")
        ),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 300] >>".to_string());
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

fn write_blank_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, blank_pdf(pages)).unwrap();
    path
}

#[tokio::test]
async fn poppler_renders_every_page_at_requested_dpi() {
    e2e_skip_unless_ready!();
    let tmp = TempDir::new().unwrap();
    let pdf = write_blank_pdf(tmp.path(), "blank.pdf", 3);
    let out = tmp.path().join("out");

    let config = ConversionConfig::builder().dpi(144).build().unwrap();
    let renderer = PopplerRenderer::default();
    let output = convert_document(&pdf, &out, &config, &renderer).await.unwrap();

    assert_eq!(output.file_names(), vec!["page_1.png", "page_2.png", "page_3.png"]);
    for page in &output.pages {
        // 200×300 pt at 144 DPI, allowing for pdftoppm's rounding.
        assert!(page.width.abs_diff(400) <= 1, "width {}", page.width);
        assert!(page.height.abs_diff(600) <= 1, "height {}", page.height);
    }
}

#[tokio::test]
async fn poppler_batch_fills_the_default_canvas() {
    e2e_skip_unless_ready!();
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in");
    std::fs::create_dir_all(&input).unwrap();
    write_blank_pdf(&input, "one.pdf", 1);
    write_blank_pdf(&input, "two.pdf", 2);
    let out = tmp.path().join("out");

    let config = BatchConfig::default();
    let report = convert_batch(&input, &out, &config, &PopplerRenderer::default())
        .await
        .unwrap();

    assert_eq!(report.converted(), 2);
    assert_eq!(report.total_pages(), 3);
    let img = image::open(out.join("two").join("resized_output_image_1.jpg")).unwrap();
    assert_eq!(
        (img.width(), img.height()),
        (CanvasSpec::DEFAULT_BATCH.width(), CanvasSpec::DEFAULT_BATCH.height())
    );
}

#[tokio::test]
async fn poppler_reports_corrupt_documents() {
    e2e_skip_unless_ready!();
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("truncated.pdf");
    std::fs::write(&pdf, b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog").unwrap();

    let err = convert_document(&pdf, tmp.path().join("out"), &ConversionConfig::default(), &PopplerRenderer::default())
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            Pdf2ImgError::Render(RenderError::Corrupt { .. } | RenderError::RendererFailed { .. })
        ),
        "{err:?}"
    );
    assert!(!tmp.path().join("out").exists());
}

#[tokio::test]
async fn pdfium_matches_poppler_page_count() {
    e2e_skip_unless_ready!();
    let Ok(lib_dir) = std::env::var("PDFIUM_LIB_DIR") else {
        println!("SKIP: set PDFIUM_LIB_DIR to the directory holding libpdfium");
        return;
    };
    let tmp = TempDir::new().unwrap();
    let pdf = write_blank_pdf(tmp.path(), "blank.pdf", 2);

    let config = ConversionConfig::builder()
        .format(OutputFormat::Jpeg)
        .build()
        .unwrap();
    let renderer = PdfiumRenderer::new(BinaryLocation::Directory(lib_dir.into()));
    let output = convert_document(&pdf, tmp.path().join("out"), &config, &renderer)
        .await
        .unwrap();

    assert_eq!(output.file_names(), vec!["page_1.jpg", "page_2.jpg"]);
}
