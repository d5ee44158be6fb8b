//! Conversation data model in the Gemini `generateContent` wire shape.
//!
//! [`Message`] and [`Part`] serialise exactly as the API expects them in the
//! `contents` array, so the driver can hand its history to `serde_json`
//! without a separate request DTO:
//!
//! ```text
//! {"role":"user","parts":[{"text":"…"},{"fileData":{"fileUri":"…","mimeType":"image/png"}}]}
//! {"role":"model","parts":[{"functionCall":{"name":"…","args":{…}}}]}
//! {"role":"function","parts":[{"functionResponse":{"name":"…","response":{…}}}]}
//! ```
//!
//! Response parts are deserialised leniently (see [`WirePart`]) because the
//! API adds fields over time (`thought`, `thoughtSignature`, …) that a
//! strict externally-tagged enum would reject.

use crate::pipeline::artifacts::Artifact;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    Function,
}

/// One element of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FileData(FileData),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

/// Reference to an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub file_uri: String,
    pub mime_type: String,
}

/// A function call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

/// The result of a local function, fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    /// The opening user turn: prompt text, then one file reference per artifact.
    pub fn user_with_files(prompt: &str, artifacts: &[Artifact]) -> Self {
        let mut parts = Vec::with_capacity(artifacts.len() + 1);
        parts.push(Part::Text(prompt.to_string()));
        parts.extend(artifacts.iter().map(|a| {
            Part::FileData(FileData {
                file_uri: a.uri.clone(),
                mime_type: a.mime_type.clone(),
            })
        }));
        Self {
            role: Role::User,
            parts,
        }
    }

    /// A model turn, replayed verbatim into the history.
    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// A function turn with one response part per `(name, content)` pair,
    /// in the order given.
    ///
    /// Each response object repeats the function name next to the content,
    /// which is the shape Gemini documents for `functionResponse.response`.
    pub fn function_responses<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Self {
            role: Role::Function,
            parts: responses
                .into_iter()
                .map(|(name, content)| {
                    Part::FunctionResponse(FunctionResponse {
                        response: serde_json::json!({ "name": name, "content": content }),
                        name,
                    })
                })
                .collect(),
        }
    }

    /// Every function call among the parts, in order.
    pub fn function_calls(parts: &[Part]) -> Vec<&FunctionCall> {
        parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall(fc) => Some(fc),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text of all text parts, or `None` when there are none.
    pub fn joined_text(parts: &[Part]) -> Option<String> {
        let texts: Vec<&str> = parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

// ── Response envelope ────────────────────────────────────────────────────

/// `generateContent` response body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    pub parts: Option<Vec<WirePart>>,
}

/// A response part as received; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePart {
    pub text: Option<String>,
    pub file_data: Option<FileData>,
    pub function_call: Option<FunctionCall>,
    pub function_response: Option<FunctionResponse>,
}

impl WirePart {
    /// Convert into a [`Part`]; parts with none of the known fields are dropped.
    pub fn into_part(self) -> Option<Part> {
        if let Some(fc) = self.function_call {
            Some(Part::FunctionCall(fc))
        } else if let Some(t) = self.text {
            Some(Part::Text(t))
        } else if let Some(fd) = self.file_data {
            Some(Part::FileData(fd))
        } else {
            self.function_response.map(Part::FunctionResponse)
        }
    }
}

impl Candidate {
    /// The candidate's parts, or `None` for a degenerate candidate without content.
    pub fn into_parts(self) -> Option<Vec<Part>> {
        let parts = self.content?.parts?;
        Some(parts.into_iter().filter_map(WirePart::into_part).collect())
    }
}
