//! Artifact store client: upload page images to the Gemini Files API and
//! delete them again.
//!
//! Uploaded files exist only for the duration of one extraction. Deletion
//! is best-effort: a failed delete is logged and counted, and never changes
//! the extraction result.

use crate::error::InvoiceError;
use crate::pipeline::input::PageImage;
use crate::pipeline::transport::{GeminiEndpoints, HttpTransport, UploadForm};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A page image stored on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Resource name used for deletion, e.g. `files/abc123`.
    pub name: String,
    /// URI referenced from `fileData` parts.
    pub uri: String,
    pub mime_type: String,
    pub display_name: String,
}

/// Outcome of deleting a set of artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
}

/// A failed upload phase: the first error, and how the rollback went.
#[derive(Debug)]
pub struct UploadFailure {
    pub error: InvoiceError,
    pub cleanup: CleanupReport,
}

#[derive(Deserialize)]
struct UploadEnvelope {
    file: Option<UploadedFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    uri: Option<String>,
    name: Option<String>,
    mime_type: Option<String>,
}

/// Thin client over the upload and delete endpoints.
#[derive(Clone)]
pub struct ArtifactStore {
    transport: Arc<dyn HttpTransport>,
    endpoints: GeminiEndpoints,
}

impl ArtifactStore {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: GeminiEndpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// Upload one page.
    ///
    /// # Errors
    /// * [`InvoiceError::Transport`] — the call failed or returned a non-2xx status
    /// * [`InvoiceError::Protocol`] — the success body lacks `uri`, `name` or `mimeType`
    pub async fn upload(&self, page: &PageImage) -> Result<Artifact, InvoiceError> {
        let form = UploadForm {
            metadata: serde_json::json!({ "file": { "displayName": page.name } }),
            file_name: page.name.clone(),
            mime_type: page.mime_type.clone(),
            data: page.data.clone(),
        };

        let response = self.transport.send(self.endpoints.upload(form)).await?;
        if !response.is_success() {
            return Err(InvoiceError::Transport {
                status: Some(response.status),
                message: format!("upload of '{}' failed: {}", page.name, response.body),
            });
        }

        let envelope: UploadEnvelope =
            serde_json::from_str(&response.body).map_err(|e| InvoiceError::Protocol {
                detail: format!("upload response for '{}' is not JSON: {e}", page.name),
            })?;
        let missing = |field: &str| InvoiceError::Protocol {
            detail: format!("upload response for '{}' lacks file.{field}", page.name),
        };
        let file = envelope.file.ok_or_else(|| missing("*"))?;

        let artifact = Artifact {
            uri: file.uri.ok_or_else(|| missing("uri"))?,
            name: file.name.ok_or_else(|| missing("name"))?,
            mime_type: file.mime_type.ok_or_else(|| missing("mimeType"))?,
            display_name: page.name.clone(),
        };
        debug!("Uploaded '{}' as {}", artifact.display_name, artifact.name);
        Ok(artifact)
    }

    /// Upload every page with at most `concurrency` requests in flight.
    ///
    /// The returned artifacts are in page order. If any upload fails, the
    /// ones that already succeeded are deleted before the error is returned,
    /// so a failed upload phase never leaks remote files. The rollback's
    /// [`CleanupReport`] travels with the error.
    pub async fn upload_all(
        &self,
        pages: &[PageImage],
        concurrency: usize,
        mut on_uploaded: impl FnMut(usize, &Artifact),
    ) -> Result<Vec<Artifact>, UploadFailure> {
        let results: Vec<Result<Artifact, InvoiceError>> = stream::iter(pages)
            .map(|page| self.upload(page))
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let mut uploaded = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(artifact) => {
                    on_uploaded(uploaded.len() + 1, &artifact);
                    uploaded.push(artifact);
                }
                Err(e) => {
                    warn!("Upload failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => {
                info!("Uploaded {} page(s)", uploaded.len());
                Ok(uploaded)
            }
            Some(error) => Err(UploadFailure {
                error,
                cleanup: self.delete_all(&uploaded).await,
            }),
        }
    }

    /// Delete one artifact. Returns `false` (after logging) on any failure.
    pub async fn delete(&self, name: &str) -> bool {
        match self.transport.send(self.endpoints.delete(name)).await {
            Ok(resp) if resp.is_success() => {
                debug!("Deleted {}", name);
                true
            }
            Ok(resp) => {
                warn!("Cleanup: could not delete {} (HTTP {}): {}", name, resp.status, resp.body);
                false
            }
            Err(e) => {
                warn!("Cleanup: could not delete {}: {}", name, e);
                false
            }
        }
    }

    /// Delete every artifact exactly once, concurrently.
    pub async fn delete_all(&self, artifacts: &[Artifact]) -> CleanupReport {
        let outcomes = join_all(artifacts.iter().map(|a| self.delete(&a.name))).await;
        let deleted = outcomes.iter().filter(|ok| **ok).count();
        CleanupReport {
            deleted,
            failed: outcomes.len() - deleted,
        }
    }
}
