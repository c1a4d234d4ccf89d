///
/// Investigation documents.
///
use super::enums::{DISPOSITION, SENSITIVITY, STATUS};
use super::{Document, copy_field};
use serde_json::Value;

/// Fields the update endpoint accepts. `name` is fixed at creation.
pub const UPDATABLE_FIELDS: &[&str] = &[
    "description",
    "status",
    "disposition",
    "owner",
    "urgency",
    "sensitivity",
];

const COPIED_FIELDS: &[&str] = &[
    "name",
    "description",
    "status",
    "disposition",
    "owner",
    "urgency",
    "sensitivity",
];

pub const FINDING_IDS_FIELD: &str = "finding_ids";

/// `consolidated_findings.event_id` holds a single id or a list of ids.
fn extract_finding_ids(doc: &Document) -> Option<Vec<Value>> {
    let event_ids = doc.get("consolidated_findings")?.get("event_id")?;
    let ids = match event_ids {
        Value::Array(items) => items.clone(),
        Value::Null => return None,
        Value::String(s) if s.is_empty() => return None,
        single => vec![single.clone()],
    };
    if ids.is_empty() { None } else { Some(ids) }
}

fn convert_enum(res: &mut Document, field: &str, table: super::enums::EnumTable, stringify_key: bool) {
    if let Some(value) = res.get(field) {
        if value.as_str().is_some_and(str::is_empty) {
            return;
        }
        let converted = table.from_api(value, stringify_key);
        res.insert(field.to_string(), converted);
    }
}

pub fn map_investigation_from_api(doc: &Document) -> Document {
    let mut res = Document::new();
    copy_field(doc, "investigation_guid", &mut res, "investigation_ref_id");
    for field in COPIED_FIELDS {
        copy_field(doc, field, &mut res, field);
    }
    if let Some(ids) = extract_finding_ids(doc) {
        res.insert(FINDING_IDS_FIELD.to_string(), Value::Array(ids));
    }

    convert_enum(&mut res, "status", STATUS, true);
    convert_enum(&mut res, "disposition", DISPOSITION, true);
    convert_enum(&mut res, "sensitivity", SENSITIVITY, false);
    res
}

fn translate_to_api(field: &str, value: &Value) -> Value {
    let Some(token) = value.as_str().filter(|s| !s.is_empty()) else {
        return value.clone();
    };
    let translated = match field {
        "status" => STATUS.to_api(token),
        "disposition" => DISPOSITION.to_api(token),
        "sensitivity" => SENSITIVITY.to_api(token),
        _ => return value.clone(),
    };
    Value::String(translated)
}

/// Create payload: every supplied field, enums translated to API tokens.
pub fn map_investigation_to_api(params: &Document) -> Document {
    params
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), translate_to_api(k, v)))
        .collect()
}

/// Update payload: only [`UPDATABLE_FIELDS`], enums translated.
pub fn map_investigation_update_to_api(params: &Document) -> Document {
    UPDATABLE_FIELDS
        .iter()
        .filter_map(|field| {
            params
                .get(*field)
                .filter(|v| !v.is_null())
                .map(|v| (field.to_string(), translate_to_api(field, v)))
        })
        .collect()
}
