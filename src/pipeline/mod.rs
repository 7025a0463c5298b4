//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the rendering backend can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ canvas ──▶ encode
//! (path)    (pages)    (letterbox) (PNG/JPEG bytes)
//! ```
//!
//! 1. [`input`]  - validate the document path, list PDFs in a folder
//! 2. [`render`] - rasterise every page through a [`render::Renderer`]
//! 3. [`canvas`] - shrink-to-fit and centre each page on a fixed canvas
//! 4. [`encode`] - encode the final image for persistence

pub mod canvas;
pub mod encode;
pub mod input;
pub mod render;
