//! Tool registry: function declarations offered to the model and the local
//! handlers that answer them.
//!
//! Handlers are a closed enum rather than boxed closures. The registry is
//! validated once at construction (unique, non-empty names), so the only
//! mismatch left at dispatch time is the model naming a function that was
//! never declared, which surfaces as [`InvoiceError::UnknownTool`].
//!
//! Whether a tool ends the conversation is an explicit
//! [`ToolDeclaration::is_terminal`] flag. A terminal tool's result *is* the
//! answer; a non-terminal tool's result is fed back as a `functionResponse`.

use crate::error::InvoiceError;
use crate::prompts::STRUCTURED_OUTPUT_DESCRIPTION;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Name of the built-in terminal tool.
pub const STRUCTURED_OUTPUT_TOOL: &str = "output_json_object";

/// What a tool does with the model's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolHandler {
    /// Return `args.items` verbatim, or the whole argument object when
    /// `items` is absent.
    StructuredOutput,
    /// Return the arguments unchanged.
    Echo,
}

impl ToolHandler {
    fn invoke(self, args: Value) -> Value {
        match self {
            ToolHandler::StructuredOutput => match args {
                Value::Object(mut map) => match map.remove("items") {
                    Some(items) if !items.is_null() => items,
                    _ => Value::Object(map),
                },
                other => other,
            },
            ToolHandler::Echo => args,
        }
    }
}

/// A callable function offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema in the Gemini `OBJECT`/`STRING` dialect.
    pub parameters: Value,
    pub is_terminal: bool,
    pub handler: ToolHandler,
}

impl ToolDeclaration {
    /// The terminal structured-output tool.
    ///
    /// Forces the model to deliver its answer as a call argument instead of
    /// free text, which sidesteps fenced-JSON parsing entirely.
    pub fn structured_output() -> Self {
        Self {
            name: STRUCTURED_OUTPUT_TOOL.to_string(),
            description: STRUCTURED_OUTPUT_DESCRIPTION.to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "items": {
                        "type": "OBJECT",
                        "description": STRUCTURED_OUTPUT_DESCRIPTION,
                    }
                },
                "required": ["items"],
            }),
            is_terminal: true,
            handler: ToolHandler::StructuredOutput,
        }
    }
}

/// The metadata part of a declaration, as sent in `function_declarations`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Result of dispatching one function call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub result: Value,
    pub terminal: bool,
}

/// Name → declaration mapping, fixed at construction.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDeclaration>,
    index: HashMap<String, usize>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::invoice_default()
    }
}

impl ToolRegistry {
    /// Build a registry, rejecting empty or duplicate names.
    pub fn new(tools: Vec<ToolDeclaration>) -> Result<Self, InvoiceError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if tool.name.trim().is_empty() {
                return Err(InvoiceError::InvalidConfig(
                    "Tool names must not be empty".into(),
                ));
            }
            if index.insert(tool.name.clone(), i).is_some() {
                return Err(InvoiceError::InvalidConfig(format!(
                    "Tool '{}' is declared more than once",
                    tool.name
                )));
            }
        }
        Ok(Self { tools, index })
    }

    /// The registry used for invoice extraction: one terminal structured-output tool.
    pub fn invoice_default() -> Self {
        let tool = ToolDeclaration::structured_output();
        let index = HashMap::from([(tool.name.clone(), 0)]);
        Self {
            tools: vec![tool],
            index,
        }
    }

    /// A registry with no tools.
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Declarations in registration order.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDeclaration> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Run the handler registered under `name`.
    pub fn dispatch(&self, name: &str, args: Value) -> Result<ToolOutcome, InvoiceError> {
        let tool = self.get(name).ok_or_else(|| InvoiceError::UnknownTool {
            name: name.to_string(),
        })?;
        Ok(ToolOutcome {
            result: tool.handler.invoke(args),
            terminal: tool.is_terminal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(name: &str) -> ToolDeclaration {
        ToolDeclaration {
            name: name.into(),
            description: "echo".into(),
            parameters: json!({"type": "OBJECT"}),
            is_terminal: false,
            handler: ToolHandler::Echo,
        }
    }

    #[test]
    fn structured_output_unwraps_items() {
        let reg = ToolRegistry::invoice_default();
        let out = reg
            .dispatch(STRUCTURED_OUTPUT_TOOL, json!({"items": {"a": 1}}))
            .unwrap();
        assert_eq!(out.result, json!({"a": 1}));
        assert!(out.terminal);
    }

    #[test]
    fn structured_output_without_items_returns_args() {
        let reg = ToolRegistry::invoice_default();
        let out = reg
            .dispatch(STRUCTURED_OUTPUT_TOOL, json!({"invoiceTitle": "INVOICE"}))
            .unwrap();
        assert_eq!(out.result, json!({"invoiceTitle": "INVOICE"}));
    }

    #[test]
    fn unknown_tool_is_an_error() {
        let reg = ToolRegistry::invoice_default();
        let err = reg.dispatch("rm_rf", json!({})).unwrap_err();
        assert!(matches!(err, InvoiceError::UnknownTool { name } if name == "rm_rf"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = ToolRegistry::new(vec![echo("a"), echo("a")]).unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidConfig(_)));
        assert!(ToolRegistry::new(vec![echo(" ")]).is_err());
    }

    #[test]
    fn declarations_keep_registration_order() {
        let reg = ToolRegistry::new(vec![echo("b"), ToolDeclaration::structured_output(), echo("a")])
            .unwrap();
        let names: Vec<_> = reg.declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", STRUCTURED_OUTPUT_TOOL, "a"]);
    }

    #[test]
    fn echo_is_not_terminal() {
        let reg = ToolRegistry::new(vec![echo("lookup")]).unwrap();
        let out = reg.dispatch("lookup", json!({"q": 1})).unwrap();
        assert!(!out.terminal);
        assert_eq!(out.result, json!({"q": 1}));
    }

    #[test]
    fn declaration_serialises_for_the_api() {
        let decl = &ToolRegistry::invoice_default().declarations()[0];
        let v = serde_json::to_value(decl).unwrap();
        assert_eq!(v["name"], STRUCTURED_OUTPUT_TOOL);
        assert_eq!(v["parameters"]["required"], json!(["items"]));
    }
}
