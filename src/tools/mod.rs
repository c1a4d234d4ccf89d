///
/// MCP tools, one module per Mission Control resource family.
///
/// Each module defines its parameter structs, an orchestration function that
/// talks to a `SplunkTransport` and returns a `ToolOutcome`, and a thin
/// adapter that turns the outcome into a `CallToolResult`.
///
pub mod finding;
pub mod investigation;
pub mod investigation_type;
pub mod notes;
pub mod response_plan;

use crate::mapping::Document;
use crate::paths::ApiScope;
use crate::splunk::{SplunkError, SplunkResult};
use rmcp::{ErrorData, model::*, schemars};
use serde::Serialize;
use serde_json::Value;

/// Path prefix overrides accepted by every tool.
#[derive(Debug, Clone, Default, serde::Deserialize, schemars::JsonSchema)]
pub struct ApiScopeParams {
    #[schemars(description = "Optional: REST namespace segment. Defaults to 'servicesNS'.")]
    pub api_namespace: Option<String>,
    #[schemars(description = "Optional: REST user segment. Defaults to 'nobody'.")]
    pub api_user: Option<String>,
    #[schemars(
        description = "Optional: REST app segment. Defaults to 'missioncontrol' ('SplunkEnterpriseSecuritySuite' for findings)."
    )]
    pub api_app: Option<String>,
}

impl ApiScopeParams {
    pub fn scope(&self, default: ApiScope) -> ApiScope {
        ApiScope::resolve(
            self.api_namespace.as_deref(),
            self.api_user.as_deref(),
            self.api_app.as_deref(),
            default,
        )
    }
}

/// Result of one tool invocation: a change flag, an optional message and the
/// tool-specific payload (e.g. `investigations`, or `finding: {before, after}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub changed: bool,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub payload: Document,
}

impl ToolOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn changed(changed: bool) -> Self {
        Self { changed, ..Self::default() }
    }

    /// A non-fatal failure such as a missing parameter or a missing resource.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            msg: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// `{before, after}` change record.
pub fn change_record(before: Option<Document>, after: Option<Document>) -> Value {
    let mut record = Document::new();
    record.insert("before".into(), before.map(Value::Object).unwrap_or(Value::Null));
    record.insert("after".into(), after.map(Value::Object).unwrap_or(Value::Null));
    Value::Object(record)
}

pub fn list_value(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(Value::Object).collect())
}

/// Objects of a list response. The API answers either with a bare array or
/// with `{"items": [...]}`.
pub fn response_items(response: &Value) -> Vec<Document> {
    let items = match response {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("items") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .filter(|o| !o.is_empty())
        .cloned()
        .collect()
}

/// A non-empty JSON object response, if any.
pub fn response_object(response: &Value) -> Option<Document> {
    response.as_object().filter(|o| !o.is_empty()).cloned()
}

/// Treats a 404 as "no result" for lookups where absence is normal.
pub fn absent_on_not_found<T: Default>(result: SplunkResult<T>) -> SplunkResult<T> {
    match result {
        Err(e) if e.is_not_found() => Ok(T::default()),
        other => other,
    }
}

/// Keys of `want` whose value differs from `have`.
pub fn dict_diff(have: &Document, want: &Document) -> Document {
    want.iter()
        .filter(|(k, v)| have.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn insert_opt<T: Serialize>(doc: &mut Document, key: &str, value: Option<&T>) {
    if let Some(v) = value {
        if let Ok(v) = serde_json::to_value(v) {
            if !v.is_null() {
                doc.insert(key.to_string(), v);
            }
        }
    }
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Rejects a value outside a closed set of choices.
pub fn check_choice(field: &str, value: Option<&str>, choices: &[&str]) -> Option<String> {
    let value = value?;
    if choices.contains(&value) {
        None
    } else {
        Some(format!(
            "Invalid {} '{}'. Must be one of: {:?}",
            field, value, choices
        ))
    }
}

/// Packages an orchestration result for MCP. Non-fatal failures are returned
/// as error results carrying the outcome; transport failures become an error
/// result naming the operation.
pub fn respond(operation: &str, outcome: SplunkResult<ToolOutcome>) -> Result<CallToolResult, ErrorData> {
    match outcome {
        Ok(outcome) => {
            let failed = outcome.failed;
            if failed {
                tracing::warn!(operation = %operation, msg = ?outcome.msg, "Tool reported failure");
            }
            let content = Content::json(outcome)
                .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
            if failed {
                Ok(CallToolResult::error(vec![content]))
            } else {
                Ok(CallToolResult::success(vec![content]))
            }
        }
        Err(e) => Ok(transport_failure(operation, &e)),
    }
}

fn transport_failure(operation: &str, e: &SplunkError) -> CallToolResult {
    let err_msg = format!("Failed to {}: {}", operation, e);
    tracing::error!("{}", err_msg);
    CallToolResult::error(vec![Content::text(err_msg)])
}
