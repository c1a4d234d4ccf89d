///
/// Finding documents and composite finding reference ids.
///
use super::enums::{DISPOSITION, STATUS};
use super::{Document, copy_field, rename_keys, rename_keys_reverse};
use regex::Regex;
use serde_json::{Number, Value};
use std::sync::LazyLock;

/// `(api_key, tool_key)`.
pub const FINDING_KEY_TRANSFORM: &[(&str, &str)] = &[
    ("rule_title", "title"),
    ("rule_description", "description"),
    ("security_domain", "security_domain"),
    ("risk_object", "entity"),
    ("risk_object_type", "entity_type"),
    ("risk_score", "finding_score"),
    ("owner", "owner"),
    ("status", "status"),
    ("urgency", "urgency"),
    ("disposition", "disposition"),
];

pub const UPDATABLE_FIELDS: &[&str] = &["owner", "status", "urgency", "disposition"];

/// `(tool_key, api_key)` for the mission control update endpoint.
const UPDATE_KEY_TRANSFORM: &[(&str, &str)] = &[
    ("owner", "assignee"),
    ("status", "status"),
    ("urgency", "urgency"),
    ("disposition", "disposition"),
];

pub const CREATE_REQUIRED_FIELDS: &[&str] = &[
    "description",
    "security_domain",
    "entity",
    "entity_type",
    "finding_score",
];

pub const FINDING_APP: &str = "SplunkEnterpriseSecuritySuite";
pub const FINDING_CREATOR: &str = "admin";

static NOTABLE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time(\d+)$").expect("static regex"));

/// Extracts the epoch suffix of `uuid@@notable@@time{epoch}`.
pub fn extract_notable_time(ref_id: &str) -> Option<String> {
    NOTABLE_TIME
        .captures(ref_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `"25.0"` and `25.7` become `25`; anything unparseable is returned as-is.
fn coerce_score(value: &Value) -> Value {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    // Out-of-range scores are kept rather than saturated.
    match parsed
        .map(f64::trunc)
        .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
    {
        Some(f) => Value::Number(Number::from(f as i64)),
        None => value.clone(),
    }
}

fn is_blank(value: &Value) -> bool {
    value.is_null() || value.as_str().is_some_and(str::is_empty)
}

pub fn map_finding_from_api(doc: &Document) -> Document {
    let mut res = Document::new();
    copy_field(doc, "finding_id", &mut res, "ref_id");
    res.extend(rename_keys(doc, FINDING_KEY_TRANSFORM));

    if let Some(status) = res.get("status").filter(|v| !is_blank(v)) {
        let converted = STATUS.from_api(status, true);
        res.insert("status".to_string(), converted);
    }
    if let Some(disposition) = res.get("disposition").filter(|v| !is_blank(v)) {
        let converted = DISPOSITION.from_api(disposition, true);
        res.insert("disposition".to_string(), converted);
    }
    if let Some(score) = res.get("finding_score").filter(|v| !is_blank(v)) {
        let converted = coerce_score(score);
        res.insert("finding_score".to_string(), converted);
    }
    res
}

fn translate_enum(value: &Value, table: super::enums::EnumTable) -> Value {
    match value.as_str() {
        Some(token) if !token.is_empty() => Value::String(table.to_api(token)),
        _ => value.clone(),
    }
}

/// Create payload for the findings endpoint. Custom `fields` entries
/// (`{name, value}`) are flattened into top-level keys.
pub fn map_finding_to_api(params: &Document) -> Document {
    let mut res = rename_keys_reverse(params, FINDING_KEY_TRANSFORM);
    res.insert("app".to_string(), Value::String(FINDING_APP.to_string()));
    res.insert("creator".to_string(), Value::String(FINDING_CREATOR.to_string()));

    if let Some(status) = res.get("status") {
        let converted = translate_enum(status, STATUS);
        res.insert("status".to_string(), converted);
    }
    if let Some(disposition) = res.get("disposition") {
        let converted = translate_enum(disposition, DISPOSITION);
        res.insert("disposition".to_string(), converted);
    }

    if let Some(Value::Array(fields)) = params.get("fields") {
        for field in fields {
            if let (Some(name), Some(value)) = (field.get("name").and_then(Value::as_str), field.get("value")) {
                res.insert(name.to_string(), value.clone());
            }
        }
    }
    res
}

/// Update payload for the mission control update endpoint.
pub fn map_finding_update_to_api(params: &Document) -> Document {
    let mut res = Document::new();
    for (tool_key, api_key) in UPDATE_KEY_TRANSFORM {
        let Some(value) = params.get(*tool_key).filter(|v| !v.is_null()) else {
            continue;
        };
        let value = match *tool_key {
            "status" => translate_enum(value, STATUS),
            "disposition" => translate_enum(value, DISPOSITION),
            _ => value.clone(),
        };
        res.insert(api_key.to_string(), value);
    }
    res
}
