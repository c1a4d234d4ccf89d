///
/// Response plan templates and applied response plans.
///
/// Plans nest phases, phases nest tasks. The API stores names and
/// descriptions URL-encoded, so every level decodes them. Phase and task
/// order is kept exactly as the API returns it.
///
use super::enums::TASK_STATUS;
use super::{Document, decoded_field, str_field, str_or_empty};
use serde_json::Value;

fn objects<'a>(doc: &'a Document, key: &str) -> impl Iterator<Item = &'a Document> {
    doc.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn owner_or_unassigned(doc: &Document) -> Value {
    Value::String(str_field(doc, "owner").unwrap_or("unassigned").to_string())
}

fn note_required(doc: &Document) -> Value {
    Value::Bool(doc.get("is_note_required").and_then(Value::as_bool).unwrap_or(false))
}

pub fn task_status_to_api(status: &str) -> String {
    TASK_STATUS.to_api(status)
}

pub fn map_task_from_api(task: &Document) -> Document {
    let mut res = Document::new();
    res.insert("id".into(), Value::String(str_or_empty(task, "id")));
    res.insert("name".into(), Value::String(decoded_field(task, "name")));
    res.insert("description".into(), Value::String(decoded_field(task, "description")));
    res.insert("owner".into(), owner_or_unassigned(task));
    res.insert("is_note_required".into(), note_required(task));
    res.insert(
        "status".into(),
        Value::String(TASK_STATUS.from_api_str(&str_or_empty(task, "status"))),
    );
    res
}

pub fn map_phase_from_api(phase: &Document) -> Document {
    let tasks: Vec<Value> = objects(phase, "tasks")
        .map(|t| Value::Object(map_task_from_api(t)))
        .collect();

    let mut res = Document::new();
    res.insert("id".into(), Value::String(str_or_empty(phase, "id")));
    res.insert("name".into(), Value::String(decoded_field(phase, "name")));
    res.insert("tasks".into(), Value::Array(tasks));
    res
}

pub fn map_applied_response_plan_from_api(plan: &Document) -> Document {
    let phases: Vec<Value> = objects(plan, "phases")
        .map(|p| Value::Object(map_phase_from_api(p)))
        .collect();

    // GET responses carry `template_id`, POST responses `source_template_id`.
    let template_id = str_field(plan, "source_template_id")
        .filter(|s| !s.is_empty())
        .or_else(|| str_field(plan, "template_id"))
        .unwrap_or_default();

    let mut res = Document::new();
    res.insert("id".into(), Value::String(str_or_empty(plan, "id")));
    res.insert("name".into(), Value::String(decoded_field(plan, "name")));
    res.insert("description".into(), Value::String(decoded_field(plan, "description")));
    res.insert("source_template_id".into(), Value::String(template_id.to_string()));
    res.insert("phases".into(), Value::Array(phases));
    res
}

fn map_search_from_api(search: &Document) -> Value {
    let mut res = Document::new();
    res.insert("name".into(), Value::String(decoded_field(search, "name")));
    res.insert("description".into(), Value::String(decoded_field(search, "description")));
    res.insert("spl".into(), Value::String(decoded_field(search, "spl")));
    Value::Object(res)
}

fn map_template_task_from_api(task: &Document) -> Value {
    let searches: Vec<Value> = task
        .get("suggestions")
        .and_then(Value::as_object)
        .map(|s| objects(s, "searches").map(map_search_from_api).collect())
        .unwrap_or_default();

    let mut res = Document::new();
    res.insert("id".into(), Value::String(str_or_empty(task, "id")));
    res.insert("name".into(), Value::String(decoded_field(task, "name")));
    res.insert("description".into(), Value::String(decoded_field(task, "description")));
    res.insert("is_note_required".into(), note_required(task));
    res.insert("owner".into(), owner_or_unassigned(task));
    res.insert("searches".into(), Value::Array(searches));
    Value::Object(res)
}

fn map_template_phase_from_api(phase: &Document) -> Value {
    let tasks: Vec<Value> = objects(phase, "tasks").map(map_template_task_from_api).collect();

    let mut res = Document::new();
    res.insert("id".into(), Value::String(str_or_empty(phase, "id")));
    res.insert("name".into(), Value::String(decoded_field(phase, "name")));
    res.insert("tasks".into(), Value::Array(tasks));
    Value::Object(res)
}

/// Response plan template as listed by `v1/responsetemplates`.
pub fn map_response_template_from_api(template: &Document) -> Document {
    let phases: Vec<Value> = objects(template, "phases").map(map_template_phase_from_api).collect();

    let mut res = Document::new();
    res.insert("id".into(), Value::String(str_or_empty(template, "id")));
    res.insert("template_id".into(), Value::String(str_or_empty(template, "template_id")));
    res.insert("name".into(), Value::String(decoded_field(template, "name")));
    res.insert("description".into(), Value::String(decoded_field(template, "description")));
    res.insert(
        "template_status".into(),
        Value::String(str_field(template, "template_status").unwrap_or("draft").to_string()),
    );
    res.insert("phases".into(), Value::Array(phases));
    res
}
