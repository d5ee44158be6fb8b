//! End-to-end tests against the live Gemini API.
//!
//! These tests use invoice images in `./test_cases/` and make real API
//! calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GEMINI_API_KEY=... cargo test --test e2e -- --nocapture

use edgequake_invoice::{extract_files, ExtractionConfig, RunResult};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no image at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn assert_invoice_shape(result: &RunResult, context: &str) {
    let invoice = match result.invoice() {
        Some(inv) => inv,
        None => panic!("[{context}] expected an invoice object, got {result:?}"),
    };
    assert!(
        invoice.invoice_number.is_some() || invoice.total_cost.is_some(),
        "[{context}] neither invoiceNumber nor totalCost was returned"
    );
    assert!(
        !invoice.table.is_empty(),
        "[{context}] the line-item table is empty"
    );
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_single_page_with_tools() {
    let page = e2e_skip_unless_ready!(test_cases_dir().join("invoice.png"));

    let config = ExtractionConfig::default();
    let output = extract_files(&[page], &config).await.unwrap();

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
    assert_invoice_shape(&output.result, "tools");
    assert_eq!(output.stats.artifacts_deleted, 1);
}

#[tokio::test]
async fn e2e_single_page_text_mode() {
    let page = e2e_skip_unless_ready!(test_cases_dir().join("invoice.png"));

    let config = ExtractionConfig::builder()
        .tool_calling(false)
        .build()
        .unwrap();
    let output = extract_files(&[page], &config).await.unwrap();

    println!("{}", serde_json::to_string_pretty(&output).unwrap());
    assert_invoice_shape(&output.result, "text");
}
