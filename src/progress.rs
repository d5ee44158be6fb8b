//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as pages are uploaded, rounds are sent, and artifacts are cleaned up.
//!
//! # Example
//!
//! ```rust
//! use edgequake_invoice::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct RetryCounter(AtomicU32);
//!
//! impl ExtractionProgressCallback for RetryCounter {
//!     fn on_retry(&self, round: u32, reason: &str, backoff_ms: u64) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("round {round} failed ({reason}); retrying in {backoff_ms}ms");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(RetryCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline at each milestone.
///
/// Implementations must be `Send + Sync`: uploads and deletions run
/// concurrently. All methods have default no-op implementations so callers
/// only override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first upload.
    fn on_upload_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each page is uploaded, in page order.
    ///
    /// # Arguments
    /// * `index` — 1-indexed page position
    /// * `total_pages` — number of pages being uploaded
    /// * `artifact_name` — remote resource name, e.g. `files/abc123`
    fn on_page_uploaded(&self, index: usize, total_pages: usize, artifact_name: &str) {
        let _ = (index, total_pages, artifact_name);
    }

    /// Called just before each request to the generate endpoint.
    ///
    /// # Arguments
    /// * `round` — 1-indexed round number
    /// * `max_rounds` — upper bound on rounds for this run
    fn on_round_start(&self, round: u32, max_rounds: u32) {
        let _ = (round, max_rounds);
    }

    /// Called when a round failed transiently and another will follow.
    fn on_retry(&self, round: u32, reason: &str, backoff_ms: u64) {
        let _ = (round, reason, backoff_ms);
    }

    /// Called when the model's function call is dispatched.
    fn on_tool_call(&self, name: &str, terminal: bool) {
        let _ = (name, terminal);
    }

    /// Called once after cleanup, whatever the outcome of the conversation.
    fn on_cleanup_complete(&self, deleted: usize, failed: usize) {
        let _ = (deleted, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
