//! Extraction entry points.
//!
//! [`extract`] owns the artifact set for one invocation: it uploads the
//! pages, lends the artifacts to the conversation driver, and deletes them
//! afterwards whether the conversation produced a value, a diagnostic, or
//! an error.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::output::{ExtractionOutput, ExtractionStats, RunResult};
use crate::pipeline::artifacts::ArtifactStore;
use crate::pipeline::conversation::run_conversation;
use crate::pipeline::input::{self, PageImage};
use crate::pipeline::transport::{Auth, GeminiEndpoints, HttpTransport, ReqwestTransport};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract an invoice from page images.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` whenever the conversation ran to an end, including
/// when it ended with a [`Diagnostic`](crate::output::Diagnostic) instead of
/// a value. Check `output.result`.
///
/// # Errors
/// Returns `Err(InvoiceError)` only for fatal errors:
/// - no pages, or a page that is not a supported image
/// - no credentials configured
/// - an upload failed, or the generate endpoint answered with a status
///   other than 200 or 500
/// - the model called a function that is not registered
pub async fn extract(
    pages: &[PageImage],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    let total_start = Instant::now();
    info!("Starting extraction: {} page(s)", pages.len());

    // ── Step 1: Validate input ───────────────────────────────────────────
    input::validate_pages(pages)?;

    // ── Step 2: Resolve transport and credentials ────────────────────────
    let auth = resolve_auth(config)?;
    let transport = resolve_transport(config)?;
    let endpoints = GeminiEndpoints::new(
        config.base_url.as_str(),
        config.api_version.as_str(),
        config.model.as_str(),
        auth,
    );
    debug!("Using model {}", endpoints.model());
    let store = ArtifactStore::new(Arc::clone(&transport), endpoints.clone());

    // ── Step 3: Upload pages ─────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_upload_start(pages.len());
    }
    let upload_start = Instant::now();
    let artifacts = store
        .upload_all(pages, config.upload_concurrency, |index, artifact| {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_uploaded(index, pages.len(), &artifact.name);
            }
        })
        .await
        .map_err(|failure| {
            if let Some(ref cb) = config.progress_callback {
                cb.on_cleanup_complete(failure.cleanup.deleted, failure.cleanup.failed);
            }
            failure.error
        })?;
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;

    // ── Step 4: Run the conversation ─────────────────────────────────────
    let conversation_start = Instant::now();
    let conversation = run_conversation(transport.as_ref(), &endpoints, &artifacts, config).await;
    let conversation_duration_ms = conversation_start.elapsed().as_millis() as u64;

    // ── Step 5: Cleanup, on every path ───────────────────────────────────
    let cleanup = store.delete_all(&artifacts).await;
    if cleanup.failed > 0 {
        warn!(
            "Cleanup: {} of {} artifact(s) could not be deleted",
            cleanup.failed,
            artifacts.len()
        );
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_cleanup_complete(cleanup.deleted, cleanup.failed);
    }

    let outcome = conversation?;

    // ── Step 6: Stats ────────────────────────────────────────────────────
    let mut stats = ExtractionStats {
        pages: pages.len(),
        upload_duration_ms,
        conversation_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    stats.record(outcome.stats, cleanup);

    match &outcome.result {
        RunResult::Extracted(_) => info!(
            "Extraction complete: {} round(s), {}ms total",
            stats.rounds, stats.total_duration_ms
        ),
        RunResult::Diagnostic(d) => warn!("Extraction ended without a value: {}", d),
    }

    Ok(ExtractionOutput {
        result: outcome.result,
        stats,
    })
}

/// Load page images from disk, then [`extract`].
pub async fn extract_files<P: AsRef<Path>>(
    paths: &[P],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    let pages = input::load_pages(paths).await?;
    extract(&pages, config).await
}

/// Extract and write the value as pretty-printed JSON to `output_path`.
///
/// Uses an atomic write (temp file in the same directory, then persist) so
/// a reader never sees a partial file. A diagnostic result writes nothing;
/// the output is returned either way.
pub async fn extract_to_file<P: AsRef<Path>>(
    paths: &[P],
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    let output = extract_files(paths, config).await?;
    let path = output_path.as_ref();

    let Some(value) = output.result.value() else {
        info!("No value extracted; not writing {}", path.display());
        return Ok(output);
    };

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| InvoiceError::Internal(format!("Failed to serialise result: {e}")))?;
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&target, json.as_bytes()))
        .await
        .map_err(|e| InvoiceError::Internal(format!("Write task failed: {e}")))??;

    info!("Wrote {}", path.display());
    Ok(output)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    pages: &[PageImage],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, InvoiceError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(pages, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Credentials from the config, falling back to the environment.
fn resolve_auth(config: &ExtractionConfig) -> Result<Auth, InvoiceError> {
    config
        .auth
        .clone()
        .or_else(Auth::from_env)
        .ok_or_else(|| InvoiceError::AuthNotConfigured {
            hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY), or GEMINI_ACCESS_TOKEN for \
                   bearer auth, or pass credentials via ExtractionConfig::builder()"
                .to_string(),
        })
}

/// The injected transport, or a reqwest client with the configured timeout.
fn resolve_transport(config: &ExtractionConfig) -> Result<Arc<dyn HttpTransport>, InvoiceError> {
    if let Some(ref transport) = config.transport {
        return Ok(Arc::clone(transport));
    }
    Ok(Arc::new(ReqwestTransport::new(config.api_timeout_secs)?))
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), InvoiceError> {
    let write_err = |source: std::io::Error| InvoiceError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
