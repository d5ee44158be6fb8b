//! Shared test helpers: a scripted in-memory Gemini.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_invoice::{
    ExtractionConfig, ExtractionConfigBuilder, HttpMethod, HttpRequest, HttpResponse,
    HttpTransport, InvoiceError, PageImage,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// A transport that answers the three Gemini endpoints:
/// uploads get sequential `files/N` handles, generate calls pop a queued
/// reply, deletes answer with `delete_status`.
pub struct ScriptedGemini {
    generate_replies: Mutex<VecDeque<(u16, String)>>,
    upload_status: u16,
    failing_upload: Option<(usize, u16)>,
    delete_status: u16,
    next_file: AtomicUsize,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedGemini {
    pub fn new() -> Self {
        Self {
            generate_replies: Mutex::new(VecDeque::new()),
            upload_status: 200,
            failing_upload: None,
            delete_status: 200,
            next_file: AtomicUsize::new(1),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_uploads(mut self, status: u16) -> Self {
        self.upload_status = status;
        self
    }

    /// Only the `n`th upload (1-based) answers with `status`.
    pub fn failing_upload_at(mut self, n: usize, status: u16) -> Self {
        self.failing_upload = Some((n, status));
        self
    }

    pub fn failing_deletes(mut self, status: u16) -> Self {
        self.delete_status = status;
        self
    }

    /// Queue a raw generate reply.
    pub fn reply(self, status: u16, body: Value) -> Self {
        self.generate_replies
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
        self
    }

    /// Queue a 200 reply whose single part is `text`.
    pub fn text(self, text: &str) -> Self {
        self.reply(
            200,
            json!({"candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]}),
        )
    }

    /// Queue a 200 reply carrying one function call.
    pub fn call(self, name: &str, args: Value) -> Self {
        self.reply(
            200,
            json!({"candidates": [{
                "content": {"role": "model", "parts": [{"functionCall": {"name": name, "args": args}}]},
                "finishReason": "STOP"
            }]}),
        )
    }

    /// Queue `n` HTTP 500 replies.
    pub fn server_errors(mut self, n: usize) -> Self {
        for _ in 0..n {
            self = self.reply(500, json!({"error": {"code": 500, "status": "INTERNAL"}}));
        }
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.contains(":generateContent"))
            .count()
    }

    pub fn uploads(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.contains("/upload/"))
            .count()
    }

    /// URLs of every DELETE, in the order sent.
    pub fn deletes(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| r.method == HttpMethod::Delete)
            .map(|r| r.url.clone())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedGemini {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, InvoiceError> {
        let url = request.url.clone();
        let method = request.method;
        self.requests.lock().unwrap().push(request);

        let (status, body) = if method == HttpMethod::Delete {
            (self.delete_status, "{}".to_string())
        } else if url.contains("/upload/") {
            let n = self.next_file.fetch_add(1, Ordering::SeqCst);
            let status = match self.failing_upload {
                Some((at, status)) if at == n => status,
                _ => self.upload_status,
            };
            (
                status,
                json!({"file": {
                    "name": format!("files/{n}"),
                    "uri": format!("https://files.example/{n}"),
                    "mimeType": "image/png"
                }})
                .to_string(),
            )
        } else {
            self.generate_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected generate call to {url}"))
        };
        Ok(HttpResponse { status, body })
    }
}

pub fn png_page(name: &str) -> PageImage {
    PageImage::new(name, "image/png", PNG_MAGIC.to_vec())
}

/// Builder preloaded for tests: API key, zero backoff, injected transport.
pub fn config_with(transport: Arc<ScriptedGemini>) -> ExtractionConfigBuilder {
    ExtractionConfig::builder()
        .api_key("test-key")
        .retry_backoff_ms(0)
        .transport(transport)
}
