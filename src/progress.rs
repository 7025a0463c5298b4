//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline persists each page. The CLI uses this to drive its
//! progress bar; library callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use pdf2img::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, bytes: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} written ({} bytes)", page_num, total_pages, bytes);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page events may arrive from worker threads, so
/// implementations must be `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after rendering, before any page is normalised.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page has been encoded and written.
    ///
    /// # Arguments
    /// * `page_num`    - 1-indexed page number
    /// * `total_pages` - pages in the document
    /// * `bytes`       - size of the written file
    fn on_page_complete(&self, page_num: usize, total_pages: usize, bytes: usize) {
        let _ = (page_num, total_pages, bytes);
    }

    /// Called when a page could not be normalised, encoded or written.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
