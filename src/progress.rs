//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each page.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a job ledger, a WebSocket, a database record, or a
//! terminal progress bar — without the library knowing anything about how
//! the host application communicates. [`crate::job::LedgerProgress`] is
//! exactly such a forwarder, wiring these events into a
//! [`crate::job::JobLedger`] entry.

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// Implementations must be `Send + Sync` (jobs run on tokio tasks). All
/// methods have default no-op implementations so callers only override what
/// they care about. Pages are processed strictly sequentially within a job,
/// so events for one job arrive in page order.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the document is validated, before any page work.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages in the document
    fn on_conversion_start(&self, total_pages: u32) {
        let _ = total_pages;
    }

    /// Called just before a page enters the pipeline.
    fn on_page_start(&self, page: u32, total_pages: u32) {
        let _ = (page, total_pages);
    }

    /// Called when a page made it through render → recognize → analyze.
    ///
    /// # Arguments
    /// * `page`        — 1-indexed page number
    /// * `total_pages` — total pages
    /// * `word_count`  — recognized words on the page (0 for a blank page)
    fn on_page_complete(&self, page: u32, total_pages: u32, word_count: usize) {
        let _ = (page, total_pages, word_count);
    }

    /// Called when a page fails at any stage.
    ///
    /// The owned `String` (rather than `&str`) keeps `Arc<dyn …>` callbacks
    /// movable into spawned tasks without higher-ranked lifetime trouble.
    fn on_page_error(&self, page: u32, total_pages: u32, error: String) {
        let _ = (page, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    ///
    /// # Arguments
    /// * `total_pages`   — total pages in the document
    /// * `success_count` — pages that converted without error
    fn on_conversion_complete(&self, total_pages: u32, success_count: u32) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
