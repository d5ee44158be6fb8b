//! Wire-level tests: the reqwest transport against a mock Gemini server.

mod common;

use common::{png_page, PNG_MAGIC};
use edgequake_invoice::{extract, Diagnostic, ExtractionConfig, InvoiceError, RunResult};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-test:generateContent";

async fn mount_upload(server: &MockServer, name: &str) {
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(query_param("uploadType", "multipart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {
                "name": name,
                "uri": format!("{}/v1beta/{}", server.uri(), name),
                "mimeType": "image/png"
            }
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_delete(server: &MockServer, name: &str) {
    Mock::given(method("DELETE"))
        .and(path(format!("/v1beta/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ExtractionConfig {
    ExtractionConfig::builder()
        .base_url(server.uri())
        .model("gemini-test")
        .api_key("test-key")
        .retry_backoff_ms(0)
        .build()
        .unwrap()
}

#[tokio::test]
async fn full_round_trip_with_api_key() {
    let server = MockServer::start().await;
    mount_upload(&server, "files/abc").await;
    mount_delete(&server, "files/abc").await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("function_declarations"))
        .and(body_string_contains("files/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"functionCall": {
                        "name": "output_json_object",
                        "args": {"items": {"invoiceNumber": "INV-42", "totalCost": "$99"}}
                    }}]
                },
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = extract(&[png_page("page-1.png")], &config(&server))
        .await
        .unwrap();

    let invoice = output.result.invoice().unwrap();
    assert_eq!(invoice.invoice_number.as_deref(), Some("INV-42"));
    assert_eq!(invoice.total_cost.as_deref(), Some("$99"));
    assert_eq!(output.stats.artifacts_deleted, 1);
}

#[tokio::test]
async fn upload_sends_multipart_with_metadata_and_bytes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(query_param("key", "test-key"))
        .and(MultipartBody(&[
            b"\"displayName\":\"scan.png\"",
            b"name=\"file\"; filename=\"scan.png\"",
            PNG_MAGIC,
        ]))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {"name": "files/s", "uri": "https://f/s", "mimeType": "image/png"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_delete(&server, "files/s").await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"ok\": true}"}]}}]
        })))
        .mount(&server)
        .await;

    let page = edgequake_invoice::PageImage::new("scan.png", "image/png", PNG_MAGIC.to_vec());
    let output = extract(&[page], &config(&server)).await.unwrap();
    assert_eq!(output.result, RunResult::Extracted(json!({"ok": true})));
}

/// Multipart content type, and a body containing every needle.
///
/// The body carries raw image bytes, so it is searched as bytes.
struct MultipartBody(&'static [&'static [u8]]);

impl wiremock::Match for MultipartBody {
    fn matches(&self, request: &wiremock::Request) -> bool {
        let multipart = request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));
        multipart
            && self.0.iter().all(|needle| {
                request
                    .body
                    .windows(needle.len())
                    .any(|w| w == *needle)
            })
    }
}

#[tokio::test]
async fn bearer_token_goes_in_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/v1beta/files"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": {"name": "files/b", "uri": "https://f/b", "mimeType": "image/png"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "[]"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1beta/files/b"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = ExtractionConfig::builder()
        .base_url(server.uri())
        .model("gemini-test")
        .bearer_token("tok-1")
        .build()
        .unwrap();
    let output = extract(&[png_page("p.png")], &config).await.unwrap();

    assert_eq!(output.result, RunResult::Extracted(json!([])));
    for request in server.received_requests().await.unwrap() {
        let query = request.url.query().unwrap_or_default();
        assert!(!query.contains("key="), "{}", request.url);
    }
}

#[tokio::test]
async fn server_errors_are_retried_then_succeed() {
    let server = MockServer::start().await;
    mount_upload(&server, "files/r").await;
    mount_delete(&server, "files/r").await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "```json\n{\"x\": 1}\n```"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = extract(&[png_page("p.png")], &config(&server)).await.unwrap();

    assert_eq!(output.result, RunResult::Extracted(json!({"x": 1})));
    assert_eq!(output.stats.retries, 3);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_budget_and_still_clean_up() {
    let server = MockServer::start().await;
    mount_upload(&server, "files/e").await;
    mount_delete(&server, "files/e").await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = ExtractionConfig::builder()
        .base_url(server.uri())
        .model("gemini-test")
        .api_key("test-key")
        .max_retries(2)
        .retry_backoff_ms(0)
        .build()
        .unwrap();
    let output = extract(&[png_page("p.png")], &config).await.unwrap();

    assert!(matches!(
        output.result,
        RunResult::Diagnostic(Diagnostic::RetriesExhausted { rounds: 3, .. })
    ));
}

#[tokio::test]
async fn client_error_is_fatal_and_still_cleans_up() {
    let server = MockServer::start().await;
    mount_upload(&server, "files/f").await;
    mount_delete(&server, "files/f").await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = extract(&[png_page("p.png")], &config(&server))
        .await
        .unwrap_err();

    match err {
        InvoiceError::Transport { status, message } => {
            assert_eq!(status, Some(400));
            assert!(message.contains("API key not valid"));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_success_body_is_protocol_error() {
    let server = MockServer::start().await;
    mount_upload(&server, "files/h").await;
    mount_delete(&server, "files/h").await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = extract(&[png_page("p.png")], &config(&server))
        .await
        .unwrap_err();
    assert!(matches!(err, InvoiceError::Protocol { .. }));
}

#[tokio::test]
async fn connection_failure_is_transport_error_without_status() {
    // Nothing listens on port 1.
    let config = ExtractionConfig::builder()
        .base_url("http://127.0.0.1:1")
        .api_key("SUPER-SECRET-KEY")
        .api_timeout_secs(2)
        .build()
        .unwrap();

    let err = extract(&[png_page("p.png")], &config).await.unwrap_err();
    assert!(matches!(err, InvoiceError::Transport { status: None, .. }));

    let rendered = format!("{err} {err:?}");
    assert!(!rendered.contains("SUPER-SECRET-KEY"), "{rendered}");
    assert!(rendered.contains("key=***"), "{rendered}");
}
