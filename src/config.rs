//! Configuration types for PDF-to-image conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Batch runs wrap it in a
//! [`BatchConfig`]; the renderer backend is chosen separately through
//! [`RendererConfig`] because one renderer is usually shared by many
//! conversions.

use crate::error::Pdf2ImgError;
use crate::pipeline::render::{PdfiumRenderer, PopplerRenderer, Renderer};
use crate::progress::ProgressCallback;
use image::{DynamicImage, ImageFormat, Rgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Lowest accepted rendering DPI.
pub const MIN_DPI: u32 = 72;
/// Highest accepted rendering DPI.
pub const MAX_DPI: u32 = 600;

/// Configuration for converting one PDF into page images.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2img::{CanvasSpec, ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .format(OutputFormat::Jpeg)
///     .canvas(CanvasSpec::new(1447, 2048, "white".parse().unwrap()).unwrap())
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI. Range: 72–600. Default: 150.
    pub dpi: u32,

    /// Encoding of the persisted page images. Default: PNG.
    pub format: OutputFormat,

    /// Fixed canvas every page is letterboxed onto. `None` keeps the
    /// rendered size. Default: `None`.
    pub canvas: Option<CanvasSpec>,

    /// How persisted page files are named. Default: `page_<n>`, 1-based.
    pub naming: PageNaming,

    /// JPEG quality, 1–100. Ignored for PNG. Default: 90.
    pub jpeg_quality: u8,

    /// Pages normalised and encoded in parallel after rendering. Default: 4.
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Upper bound on one renderer invocation, in seconds. Default: 120.
    pub render_timeout_secs: u64,

    /// Bundle all produced images into a ZIP next to them. Default: false.
    pub zip: bool,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            format: OutputFormat::default(),
            canvas: None,
            naming: PageNaming::default(),
            jpeg_quality: 90,
            concurrency: 4,
            password: None,
            render_timeout_secs: 120,
            zip: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("format", &self.format)
            .field("canvas", &self.canvas)
            .field("naming", &self.naming)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("concurrency", &self.concurrency)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("zip", &self.zip)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn canvas(mut self, canvas: CanvasSpec) -> Self {
        self.config.canvas = Some(canvas);
        self
    }

    pub fn naming(mut self, naming: PageNaming) -> Self {
        self.config.naming = naming;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn zip(mut self, v: bool) -> Self {
        self.config.zip = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ImgError> {
        let c = &self.config;
        if !(MIN_DPI..=MAX_DPI).contains(&c.dpi) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {}",
                c.dpi
            )));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        if c.render_timeout_secs == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "Render timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Configuration for converting every PDF in a folder.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub conversion: ConversionConfig,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchConfig {
    /// JPEG pages letterboxed onto a white 1447×2048 canvas, named
    /// `resized_output_image_<i>`.
    fn default() -> Self {
        Self {
            conversion: ConversionConfig {
                format: OutputFormat::Jpeg,
                canvas: Some(CanvasSpec::DEFAULT_BATCH),
                naming: PageNaming::batch(),
                ..ConversionConfig::default()
            },
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// What a batch run does when one document fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record the failure and move on to the next document. (default)
    #[default]
    Continue,
    /// Stop at the first failed document and return its error.
    Abort,
}

// ── Output format ────────────────────────────────────────────────────────

/// Encoding of persisted page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
        }
    }

    pub fn supports_alpha(self) -> bool {
        matches!(self, OutputFormat::Png)
    }

    /// Convert `img` to a colour model this format can encode.
    ///
    /// JPEG has no alpha channel, so anything that is not already RGB8 is
    /// flattened to RGB8 and its transparency dropped.
    pub fn conform(self, img: DynamicImage) -> DynamicImage {
        match (self, &img) {
            (OutputFormat::Png, _) | (OutputFormat::Jpeg, DynamicImage::ImageRgb8(_)) => img,
            (OutputFormat::Jpeg, _) => DynamicImage::ImageRgb8(img.to_rgb8()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Png => f.write_str("PNG"),
            OutputFormat::Jpeg => f.write_str("JPEG"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Pdf2ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(Pdf2ImgError::InvalidConfig(format!(
                "Unsupported output format '{other}' (expected PNG or JPEG)"
            ))),
        }
    }
}

// ── Canvas ───────────────────────────────────────────────────────────────

/// Solid background fill of a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub Rgb<u8>);

impl Background {
    pub const WHITE: Background = Background(Rgb([255, 255, 255]));
    pub const BLACK: Background = Background(Rgb([0, 0, 0]));
}

impl Default for Background {
    fn default() -> Self {
        Background::WHITE
    }
}

impl FromStr for Background {
    type Err = Pdf2ImgError;

    /// Accepts a colour name (`white`, `black`, `gray`, …) or `#rgb` /
    /// `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let rgb = match s.as_str() {
            "white" => [255, 255, 255],
            "black" => [0, 0, 0],
            "gray" | "grey" => [128, 128, 128],
            "lightgray" | "lightgrey" => [211, 211, 211],
            "red" => [255, 0, 0],
            "green" => [0, 128, 0],
            "blue" => [0, 0, 255],
            "yellow" => [255, 255, 0],
            hex if hex.starts_with('#') => parse_hex(&hex[1..]).ok_or_else(|| {
                Pdf2ImgError::InvalidConfig(format!("Invalid hex colour '{s}'"))
            })?,
            other => {
                return Err(Pdf2ImgError::InvalidConfig(format!(
                    "Unknown background colour '{other}'"
                )))
            }
        };
        Ok(Background(Rgb(rgb)))
    }
}

fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => {
            let mut out = [0u8; 3];
            for (i, slot) in out.iter_mut().enumerate() {
                *slot = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
            }
            Some(out)
        }
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Background {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for Background {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let [r, g, b] = self.0 .0;
        s.serialize_str(&format!("#{r:02x}{g:02x}{b:02x}"))
    }
}

/// Fixed output frame: every page is centred on a `width × height` canvas.
///
/// Dimensions are checked once, here, so the normaliser itself never has to
/// fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasSpec {
    width: u32,
    height: u32,
    background: Background,
}

impl CanvasSpec {
    /// Canvas used by batch mode: 1447×2048 on white.
    pub const DEFAULT_BATCH: CanvasSpec = CanvasSpec {
        width: 1447,
        height: 2048,
        background: Background::WHITE,
    };

    pub fn new(width: u32, height: u32, background: Background) -> Result<Self, Pdf2ImgError> {
        if width == 0 || height == 0 {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Canvas dimensions must be positive, got {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            background,
        })
    }

    /// Parse a `WIDTHxHEIGHT` size string such as `1447x2048`.
    pub fn parse_size(s: &str) -> Result<(u32, u32), Pdf2ImgError> {
        let bad = || Pdf2ImgError::InvalidConfig(format!("Invalid canvas size '{s}' (expected WxH)"));
        let lower = s.trim().to_ascii_lowercase();
        let (w, h) = lower.split_once('x').ok_or_else(bad)?;
        let w = w.trim().parse::<u32>().map_err(|_| bad())?;
        let h = h.trim().parse::<u32>().map_err(|_| bad())?;
        Ok((w, h))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Background {
        self.background
    }
}

impl<'de> Deserialize<'de> for CanvasSpec {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            width: u32,
            height: u32,
            #[serde(default)]
            background: Background,
        }
        let raw = Raw::deserialize(d)?;
        CanvasSpec::new(raw.width, raw.height, raw.background).map_err(serde::de::Error::custom)
    }
}

// ── File naming ──────────────────────────────────────────────────────────

/// Naming scheme for persisted page images: `<prefix><index>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNaming {
    pub prefix: String,
    /// Index given to the first page (0 or 1).
    pub first_index: usize,
}

impl PageNaming {
    /// `page_1.png`, `page_2.png`, …
    pub fn pages() -> Self {
        Self {
            prefix: "page_".into(),
            first_index: 1,
        }
    }

    /// `resized_output_image_0.jpg`, `resized_output_image_1.jpg`, …
    pub fn batch() -> Self {
        Self {
            prefix: "resized_output_image_".into(),
            first_index: 0,
        }
    }

    /// File name for the page at 0-based position `index`.
    pub fn file_name(&self, index: usize, format: OutputFormat) -> String {
        format!(
            "{}{}.{}",
            self.prefix,
            index + self.first_index,
            format.extension()
        )
    }
}

impl Default for PageNaming {
    fn default() -> Self {
        Self::pages()
    }
}

// ── Renderer selection ───────────────────────────────────────────────────

/// Where to find the external renderer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BinaryLocation {
    /// Search `PATH` (poppler) or the system library path (pdfium).
    #[default]
    SystemPath,
    /// Look only inside this directory.
    Directory(PathBuf),
}

/// Which rasteriser backs the [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererBackend {
    /// Poppler's `pdftoppm` command-line tool. (default)
    #[default]
    Poppler,
    /// The pdfium shared library via `pdfium-render`.
    Pdfium,
}

impl FromStr for RendererBackend {
    type Err = Pdf2ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poppler" | "pdftoppm" => Ok(RendererBackend::Poppler),
            "pdfium" => Ok(RendererBackend::Pdfium),
            other => Err(Pdf2ImgError::InvalidConfig(format!(
                "Unknown renderer '{other}' (expected poppler or pdfium)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RendererConfig {
    pub backend: RendererBackend,
    pub location: BinaryLocation,
}

impl RendererConfig {
    /// Instantiate the configured renderer.
    pub fn build(&self) -> Arc<dyn Renderer> {
        match self.backend {
            RendererBackend::Poppler => Arc::new(PopplerRenderer::new(self.location.clone())),
            RendererBackend::Pdfium => Arc::new(PdfiumRenderer::new(self.location.clone())),
        }
    }
}
