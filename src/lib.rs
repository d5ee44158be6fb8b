//! # edgequake-invoice
//!
//! Extract a structured invoice from page images with Gemini.
//!
//! ## Why this crate?
//!
//! Invoices arrive as scans and photos, with tables that text extractors
//! flatten into noise. This crate uploads the page images to the Gemini file
//! API, asks the model for a fixed JSON schema, and uses function calling to
//! pin the answer's shape. The interesting part is not the prompt but the
//! conversation around it: bounded retries, tool dispatch, tolerant JSON
//! extraction, and remote files that are always deleted again.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page images
//!  │
//!  ├─ 1. Input      sniff and validate formats (png, jpeg, webp, gif)
//!  ├─ 2. Upload     POST each page to the file API, order preserved
//!  ├─ 3. Converse   rounds against generateContent, one shared retry budget
//!  │     ├─ tools     terminal function call ends the run
//!  │     └─ response  fenced or raw JSON out of reply text
//!  ├─ 4. Cleanup    DELETE every uploaded file, on every path
//!  └─ 5. Output     RunResult (value or diagnostic) + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_invoice::{extract_files, ExtractionConfig, RunResult};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from GEMINI_API_KEY / GOOGLE_API_KEY / GEMINI_ACCESS_TOKEN
//!     let config = ExtractionConfig::default();
//!     let output = extract_files(&["page-1.png", "page-2.png"], &config).await?;
//!     match output.result {
//!         RunResult::Extracted(value) => println!("{value:#}"),
//!         RunResult::Diagnostic(d) => eprintln!("{d}"),
//!     }
//!     eprintln!("rounds: {}, retries: {}", output.stats.rounds, output.stats.retries);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2json` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-invoice = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod message;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{InvoiceError, RoundError};
pub use extract::{extract, extract_files, extract_sync, extract_to_file};
pub use message::{Message, Part, Role};
pub use output::{
    ConversationStats, Diagnostic, ExtractionOutput, ExtractionStats, Invoice, RunResult,
};
pub use pipeline::artifacts::{Artifact, ArtifactStore, CleanupReport, UploadFailure};
pub use pipeline::conversation::{run_conversation, ConversationOutcome};
pub use pipeline::input::{load_page, load_pages, validate_pages, PageImage};
pub use pipeline::response::extract_json;
pub use pipeline::tools::{ToolDeclaration, ToolHandler, ToolOutcome, ToolRegistry};
pub use pipeline::transport::{
    Auth, GeminiEndpoints, HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    ReqwestTransport, UploadForm,
};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
