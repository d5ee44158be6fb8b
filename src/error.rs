//! Error types for the edgequake-invoice library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`InvoiceError`] — **Fatal**: the extraction cannot proceed at all
//!   (bad input page, no credentials, non-retryable HTTP status, protocol
//!   violation). Returned as `Err(InvoiceError)` from the top-level
//!   `extract*` functions.
//!
//! * [`RoundError`] — **Non-fatal**: a single conversation round failed
//!   (HTTP 500, malformed JSON in the model reply, no text at all). The
//!   driver retries these against the shared budget and, once the budget is
//!   spent, turns the last one into a [`crate::output::Diagnostic`] instead
//!   of raising it.
//!
//! Cleanup failures are neither: they are logged at WARN and dropped.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-invoice library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No page images were supplied.
    #[error("No page images were given.\nPass at least one PNG or JPEG page of the invoice.")]
    NoPages,

    /// Input file was not found at the given path.
    #[error("Page image not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The page bytes are not a supported image format.
    #[error("Page '{name}' is not a supported image (PNG, JPEG, WEBP or GIF)")]
    NotAnImage { name: String },

    /// The declared content type disagrees with the sniffed image format.
    #[error("Page '{name}' is declared as '{declared}' but its content is '{detected}'")]
    ContentTypeMismatch {
        name: String,
        declared: String,
        detected: String,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No API key or access token could be found.
    #[error("Gemini credentials are not configured.\n{hint}")]
    AuthNotConfigured { hint: String },

    // ── Transport / protocol errors ───────────────────────────────────────
    /// The remote call failed or returned a non-retryable status.
    ///
    /// `status` is `None` when the request never produced a response
    /// (connection refused, timeout, TLS failure).
    #[error("Gemini API request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A success response did not have the expected shape.
    #[error("Unexpected Gemini API response: {detail}")]
    Protocol { detail: String },

    /// The model called a function that is not registered.
    #[error("Model called unknown function '{name}'")]
    UnknownTool { name: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or registry validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// `true` for errors caused by the caller's input rather than the remote side.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            InvoiceError::NoPages
                | InvoiceError::FileNotFound { .. }
                | InvoiceError::PermissionDenied { .. }
                | InvoiceError::NotAnImage { .. }
                | InvoiceError::ContentTypeMismatch { .. }
        )
    }
}

/// A recoverable failure of one conversation round.
///
/// Never returned from the public API; the driver either retries it or
/// converts it into a diagnostic result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    /// HTTP 500 from the generate endpoint.
    #[error("server error (HTTP {status}): {body}")]
    TransientServer { status: u16, body: String },

    /// The reply text did not contain parseable JSON.
    #[error("malformed JSON in model reply: {detail}")]
    Malformed { detail: String },

    /// The reply carried parts but none of them was text.
    #[error("model reply contained no text")]
    NoText,
}
