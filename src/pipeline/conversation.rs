//! Conversation driver: the request/response loop with the model.
//!
//! One run is a sequence of rounds over an append-only history:
//!
//! ```text
//!            ┌──────────────────────────── Continue (non-terminal tool) ─┐
//!            ▼                                                            │
//! BUILD_REQUEST ─▶ SEND ─▶ INSPECT ─┬─▶ DISPATCH_TOOL ─┬─ terminal ─▶ DONE
//!            ▲                      │                  └──────────────────┘
//!            │                      └─▶ EXTRACT_TEXT ──┬─ value ────▶ DONE
//!            └──────────── Retry (HTTP 500, malformed, no text) ──────────┘
//! ```
//!
//! ## Retry budget
//!
//! A single counter, initialised from
//! [`ExtractionConfig::max_retries`](crate::config::ExtractionConfig::max_retries),
//! pays for every round after the first, whatever caused it. The run
//! therefore sends at most `max_retries + 1` requests. Only HTTP 500 waits
//! for `retry_backoff_ms` before resending; a malformed reply is resent
//! immediately. Retries never touch the history: the same request is sent
//! again.
//!
//! ## Exit paths
//!
//! Every path returns exactly one [`RunResult`]. Budget exhaustion and
//! filtered or empty responses are diagnostics, not errors. Only a
//! non-200/non-500 status, an unparseable success body, or an unknown
//! function name abort the run with `Err`.

use crate::config::ExtractionConfig;
use crate::error::{InvoiceError, RoundError};
use crate::message::{FunctionCall, GenerateResponse, Message};
use crate::output::{ConversationStats, Diagnostic, RunResult};
use crate::pipeline::artifacts::Artifact;
use crate::pipeline::response::extract_json;
use crate::pipeline::tools::{FunctionDeclaration, ToolRegistry};
use crate::pipeline::transport::{GeminiEndpoints, HttpTransport};
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Finish reasons that mark a candidate's output as unusable.
pub const FILTERED_FINISH_REASONS: [&str; 2] = ["OTHER", "RECITATION"];

/// Result of a finished conversation.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub result: RunResult,
    pub stats: ConversationStats,
    /// Full history at the end of the run, seed message included.
    pub history: Vec<Message>,
}

/// What the driver does after inspecting one response.
#[derive(Debug)]
enum Step {
    Done(RunResult),
    /// A non-terminal tool answered; send the grown history.
    Continue,
    /// Resend the unchanged history.
    Retry(RoundError),
}

/// History plus the fixed parts of every request.
struct Conversation<'a> {
    history: Vec<Message>,
    tools: Option<&'a ToolRegistry>,
    declarations: Option<Vec<FunctionDeclaration>>,
}

impl<'a> Conversation<'a> {
    fn new(prompt: &str, artifacts: &[Artifact], tools: Option<&'a ToolRegistry>) -> Self {
        Self {
            history: vec![Message::user_with_files(prompt, artifacts)],
            tools,
            declarations: tools.map(ToolRegistry::declarations),
        }
    }

    fn request_body(&self) -> Value {
        let mut body = json!({ "contents": &self.history });
        if let Some(decls) = &self.declarations {
            body["tools"] = json!([{ "function_declarations": decls }]);
        }
        body
    }

    /// Classify a 200 response and update the history.
    fn inspect(
        &mut self,
        body: &str,
        stats: &mut ConversationStats,
        config: &ExtractionConfig,
    ) -> Result<Step, InvoiceError> {
        let response: GenerateResponse =
            serde_json::from_str(body).map_err(|e| InvoiceError::Protocol {
                detail: format!("generateContent body is not a valid envelope: {e}"),
            })?;

        let Some(candidate) = response.candidates.into_iter().next() else {
            debug!("Round {}: no candidates", stats.rounds);
            return Ok(Step::Done(RunResult::Diagnostic(Diagnostic::NoValues)));
        };

        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|r| FILTERED_FINISH_REASONS.contains(r))
        {
            warn!("Round {}: response stopped with finish reason {}", stats.rounds, reason);
            return Ok(Step::Done(RunResult::Diagnostic(Diagnostic::Filtered {
                finish_reason: reason.to_string(),
            })));
        }

        let parts = match candidate.into_parts() {
            Some(parts) if !parts.is_empty() => parts,
            _ => {
                debug!("Round {}: candidate carried no content parts", stats.rounds);
                return Ok(Step::Done(RunResult::Diagnostic(Diagnostic::NoValues)));
            }
        };

        let calls: Vec<FunctionCall> = Message::function_calls(&parts)
            .into_iter()
            .cloned()
            .collect();
        if !calls.is_empty() {
            let registry = self.tools.ok_or_else(|| InvoiceError::UnknownTool {
                name: calls[0].name.clone(),
            })?;

            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                stats.tool_calls += 1;
                let outcome = registry.dispatch(&call.name, call.args)?;
                info!(
                    "Round {}: dispatched function '{}' (terminal: {})",
                    stats.rounds, call.name, outcome.terminal
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_tool_call(&call.name, outcome.terminal);
                }

                if outcome.terminal {
                    // A non-structured answer is retried like malformed text,
                    // so the history is left as it was sent.
                    return Ok(match outcome.result {
                        v @ (Value::Object(_) | Value::Array(_)) => {
                            self.history.push(Message::model(parts));
                            Step::Done(RunResult::Extracted(v))
                        }
                        other => Step::Retry(RoundError::Malformed {
                            detail: format!(
                                "function '{}' returned {} instead of an object or array",
                                call.name,
                                json_kind(&other)
                            ),
                        }),
                    });
                }
                responses.push((call.name, outcome.result));
            }

            self.history.push(Message::model(parts));
            self.history.push(Message::function_responses(responses));
            return Ok(Step::Continue);
        }

        let Some(text) = Message::joined_text(&parts) else {
            return Ok(Step::Retry(RoundError::NoText));
        };
        Ok(match extract_json(&text) {
            Ok(value) => Step::Done(RunResult::Extracted(value)),
            Err(e) => Step::Retry(e),
        })
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Run the conversation for already-uploaded artifacts.
///
/// The artifacts are only referenced; deleting them is the caller's job.
pub async fn run_conversation(
    transport: &dyn HttpTransport,
    endpoints: &GeminiEndpoints,
    artifacts: &[Artifact],
    config: &ExtractionConfig,
) -> Result<ConversationOutcome, InvoiceError> {
    let tools = config.tool_calling.then_some(&config.tools);
    let mut conversation = Conversation::new(config.effective_prompt(), artifacts, tools);
    let max_rounds = config.max_rounds();
    let mut budget = config.max_retries;
    let mut stats = ConversationStats::default();

    loop {
        stats.rounds += 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_round_start(stats.rounds, max_rounds);
        }
        debug!(
            "Round {}/{}: sending {} message(s) to {}",
            stats.rounds,
            max_rounds,
            conversation.history.len(),
            endpoints.model()
        );

        let response = transport
            .send(endpoints.generate(conversation.request_body()))
            .await?;

        let step = match response.status {
            200 => conversation.inspect(&response.body, &mut stats, config)?,
            500 => Step::Retry(RoundError::TransientServer {
                status: 500,
                body: response.body,
            }),
            status => {
                return Err(InvoiceError::Transport {
                    status: Some(status),
                    message: response.body,
                })
            }
        };

        let err = match step {
            Step::Done(result) => {
                info!(
                    "Conversation finished after {} round(s), {} retr{}",
                    stats.rounds,
                    stats.retries,
                    if stats.retries == 1 { "y" } else { "ies" }
                );
                return Ok(ConversationOutcome {
                    result,
                    stats,
                    history: conversation.history,
                });
            }
            Step::Continue if budget > 0 => {
                budget -= 1;
                continue;
            }
            Step::Continue => RoundError::Malformed {
                detail: "function response was not followed by an answer".into(),
            },
            Step::Retry(err) if budget > 0 => {
                budget -= 1;
                stats.retries += 1;
                let backoff = match err {
                    RoundError::TransientServer { .. } => config.retry_backoff_ms,
                    _ => 0,
                };
                warn!(
                    "Round {}: {}; retry {}/{} after {}ms",
                    stats.rounds, err, stats.retries, config.max_retries, backoff
                );
                if let Some(ref cb) = config.progress_callback {
                    cb.on_retry(stats.rounds, &err.to_string(), backoff);
                }
                if backoff > 0 {
                    sleep(Duration::from_millis(backoff)).await;
                }
                continue;
            }
            Step::Retry(err) => err,
        };

        // Budget exhausted.
        warn!("Retry budget exhausted after {} round(s): {}", stats.rounds, err);
        let diagnostic = match err {
            RoundError::NoText => Diagnostic::NoText,
            other => Diagnostic::RetriesExhausted {
                rounds: stats.rounds,
                last_error: other.to_string(),
            },
        };
        return Ok(ConversationOutcome {
            result: RunResult::Diagnostic(diagnostic),
            stats,
            history: conversation.history,
        });
    }
}
