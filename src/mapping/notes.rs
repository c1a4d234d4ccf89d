///
/// Note documents. Notes carry only an id and free-text `content`.
///
use super::{Document, str_or_empty};
use serde_json::Value;

pub fn map_note_from_api(note: &Document) -> Document {
    let mut res = Document::new();
    res.insert("note_id".into(), Value::String(str_or_empty(note, "id")));
    res.insert("content".into(), Value::String(str_or_empty(note, "content")));
    res
}

/// Only `content` is writable; it is sent when supplied and non-null.
pub fn map_note_to_api(note: &Document) -> Document {
    let mut payload = Document::new();
    if let Some(content) = note.get("content").filter(|v| !v.is_null()) {
        payload.insert("content".into(), content.clone());
    }
    payload
}
