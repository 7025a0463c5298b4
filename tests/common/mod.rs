//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use pdf2img::{RenderError, RenderOptions, Renderer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Grey level of page `index` in images produced by [`FakeRenderer`].
pub fn shade(index: usize) -> u8 {
    (index * 50 % 250) as u8
}

enum Failure {
    None,
    CorruptStem(String),
    Unavailable,
}

/// In-memory renderer: returns solid-colour pages of fixed sizes, so the
/// pipeline can be tested without pdftoppm or pdfium installed.
pub struct FakeRenderer {
    sizes: Vec<(u32, u32)>,
    alpha: u8,
    delay: Option<Duration>,
    failure: Failure,
}

impl FakeRenderer {
    /// `count` opaque pages of `width × height`, page `i` filled with
    /// [`shade`]`(i)`.
    pub fn pages(count: usize, width: u32, height: u32) -> Self {
        Self {
            sizes: vec![(width, height); count],
            alpha: 255,
            delay: None,
            failure: Failure::None,
        }
    }

    pub fn empty() -> Self {
        Self::pages(0, 1, 1)
    }

    /// Fully transparent pages.
    pub fn transparent(mut self) -> Self {
        self.alpha = 0;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report documents whose file stem ends with `stem` as corrupt. Stored
    /// uploads carry a unique prefix, hence the suffix match.
    pub fn failing_on(mut self, stem: &str) -> Self {
        self.failure = Failure::CorruptStem(stem.to_string());
        self
    }

    /// Behave like a renderer whose binary is missing.
    pub fn unavailable(mut self) -> Self {
        self.failure = Failure::Unavailable;
        self
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn render(
        &self,
        pdf_path: &Path,
        _options: &RenderOptions,
    ) -> Result<Vec<DynamicImage>, RenderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.failure {
            Failure::None => {}
            Failure::CorruptStem(stem) => {
                let name = pdf_path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
                if name.ends_with(stem.as_str()) {
                    return Err(RenderError::Corrupt {
                        path: pdf_path.to_path_buf(),
                        detail: "xref table damaged".into(),
                    });
                }
            }
            Failure::Unavailable => {
                return Err(RenderError::RendererUnavailable {
                    renderer: "fake".into(),
                    detail: "not installed".into(),
                });
            }
        }

        Ok(self
            .sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| {
                let v = shade(i);
                DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([v, v, v, self.alpha])))
            })
            .collect())
    }
}

/// Write a file that passes the `%PDF` magic check.
pub fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n").unwrap();
    path
}

/// Sorted file names directly inside `dir`.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
