///
/// Investigation type documents (`incident_type` in API terms).
///
/// Response plan associations are declarative: the update payload always
/// carries the full `response_template_ids` list and the API replaces the
/// stored set with it. An empty list clears every association.
///
use super::{Document, str_or_empty};
use serde_json::Value;

fn id_list(doc: &Document, key: &str) -> Vec<Value> {
    match doc.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

pub fn map_investigation_type_from_api(doc: &Document) -> Document {
    let mut res = Document::new();
    res.insert("name".into(), Value::String(str_or_empty(doc, "incident_type")));
    res.insert("description".into(), Value::String(str_or_empty(doc, "description")));
    res.insert(
        "response_plan_ids".into(),
        Value::Array(id_list(doc, "response_template_ids")),
    );
    res
}

/// The create endpoint does not accept plan associations.
pub fn map_investigation_type_to_api_create(params: &Document) -> Document {
    let mut res = Document::new();
    res.insert("incident_type".into(), Value::String(str_or_empty(params, "name")));
    res.insert("description".into(), Value::String(str_or_empty(params, "description")));
    res
}

pub fn map_investigation_type_to_api_update(params: &Document) -> Document {
    let mut res = map_investigation_type_to_api_create(params);
    res.insert(
        "response_template_ids".into(),
        Value::Array(id_list(params, "response_plan_ids")),
    );
    res
}

/// Sorted copy of the string ids in `response_plan_ids`, for order-insensitive
/// comparison.
pub fn sorted_plan_ids(doc: &Document) -> Vec<String> {
    let mut ids: Vec<String> = id_list(doc, "response_plan_ids")
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    ids.sort();
    ids
}
