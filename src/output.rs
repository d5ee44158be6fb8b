//! Result types returned by the extraction entry points.
//!
//! A run produces exactly one [`RunResult`]: either the structured value the
//! model returned, or a [`Diagnostic`] explaining why there is none. Callers
//! branch on the shape, not on an error:
//!
//! ```rust
//! use edgequake_invoice::{Diagnostic, RunResult};
//!
//! fn report(result: &RunResult) {
//!     match result {
//!         RunResult::Extracted(value) => println!("{value}"),
//!         RunResult::Diagnostic(d) => eprintln!("{d}"),
//!     }
//! }
//! # report(&RunResult::Diagnostic(Diagnostic::NoValues));
//! ```

use crate::pipeline::artifacts::CleanupReport;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Why a run ended without a structured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The response carried no candidate or no content.
    NoValues,
    /// The model stopped with a finish reason that marks the output unusable.
    Filtered { finish_reason: String },
    /// The last reply had parts but no text, and the budget was spent.
    NoText,
    /// Every round failed transiently.
    RetriesExhausted { rounds: u32, last_error: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NoValues => write!(f, "No values."),
            Diagnostic::Filtered { finish_reason } => {
                write!(f, "No values. The response was stopped with finish reason {finish_reason}.")
            }
            Diagnostic::NoText => write!(f, "No values. The response contained no text."),
            Diagnostic::RetriesExhausted { rounds, last_error } => write!(
                f,
                "No values after {rounds} rounds. Please try it again. Last error: {last_error}"
            ),
        }
    }
}

/// The single outcome of a run that did not fail fatally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum RunResult {
    Extracted(Value),
    Diagnostic(Diagnostic),
}

impl RunResult {
    pub fn is_extracted(&self) -> bool {
        matches!(self, RunResult::Extracted(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            RunResult::Extracted(v) => Some(v),
            RunResult::Diagnostic(_) => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            RunResult::Diagnostic(d) => Some(d),
            RunResult::Extracted(_) => None,
        }
    }

    /// Typed view of an extracted invoice object.
    ///
    /// Returns `None` for diagnostics and for values that are not objects.
    pub fn invoice(&self) -> Option<Invoice> {
        match self.value()? {
            v @ Value::Object(_) => serde_json::from_value(v.clone()).ok(),
            _ => None,
        }
    }
}

/// Counters for one conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStats {
    /// Requests sent to the generate endpoint.
    pub rounds: u32,
    /// Rounds repeated because of HTTP 500, malformed JSON, or missing text.
    pub retries: u32,
    /// Function calls dispatched (terminal and non-terminal).
    pub tool_calls: u32,
}

/// Statistics for a complete extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub pages: usize,
    pub rounds: u32,
    pub retries: u32,
    pub tool_calls: u32,
    pub artifacts_deleted: usize,
    pub cleanup_failures: usize,
    pub upload_duration_ms: u64,
    pub conversation_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ExtractionStats {
    pub(crate) fn record(&mut self, conversation: ConversationStats, cleanup: CleanupReport) {
        self.rounds = conversation.rounds;
        self.retries = conversation.retries;
        self.tool_calls = conversation.tool_calls;
        self.artifacts_deleted = cleanup.deleted;
        self.cleanup_failures = cleanup.failed;
    }
}

/// What [`crate::extract::extract`] returns on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub result: RunResult,
    pub stats: ExtractionStats,
}

// ── Typed invoice ─────────────────────────────────────────────────────────

/// The invoice schema requested by [`crate::prompts::DEFAULT_INVOICE_PROMPT`].
///
/// Models return numbers and strings interchangeably (`"totalCost": 120.5`
/// vs `"totalCost": "$120.50"`), so scalar fields accept both and are kept
/// as text. Missing fields are `None`; the prompt's `"no value"` placeholder
/// is preserved as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_destination_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub invoice_destination_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub total_cost: Option<String>,
    /// Header row first, then one row per line item.
    #[serde(default, deserialize_with = "lenient_table")]
    pub table: Vec<Vec<String>>,
}

impl Invoice {
    /// Rows after the header.
    pub fn line_items(&self) -> &[Vec<String>] {
        self.table.get(1..).unwrap_or_default()
    }
}

fn value_to_text(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(value_to_text(Value::deserialize(d)?))
}

fn lenient_table<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<String>>, D::Error> {
    let rows = match Value::deserialize(d)? {
        Value::Array(rows) => rows,
        _ => return Ok(Vec::new()),
    };
    Ok(rows
        .into_iter()
        .filter_map(|row| match row {
            Value::Array(cells) => Some(
                cells
                    .into_iter()
                    .map(|c| value_to_text(c).unwrap_or_default())
                    .collect(),
            ),
            _ => None,
        })
        .collect())
}
