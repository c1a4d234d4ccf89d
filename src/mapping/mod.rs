///
/// Field mapping between Splunk API documents and tool documents.
///
/// Every mapper reads its input by reference and builds a fresh output map;
/// the caller's document is never modified. Mappers do not fail: malformed
/// or unknown values are carried through as-is.
///
pub mod enums;
pub mod finding;
pub mod investigation;
pub mod investigation_type;
pub mod notes;
pub mod response_plan;

use serde_json::{Map, Value};

pub type Document = Map<String, Value>;

/// Copies `src_key` from `src` into `dst` under `dst_key` when it is present
/// and not null.
pub(crate) fn copy_field(src: &Document, src_key: &str, dst: &mut Document, dst_key: &str) {
    if let Some(value) = src.get(src_key) {
        if !value.is_null() {
            dst.insert(dst_key.to_string(), value.clone());
        }
    }
}

/// Renames keys through an `(api_key, tool_key)` table into a new map.
pub fn rename_keys(src: &Document, table: &[(&str, &str)]) -> Document {
    let mut out = Document::new();
    for (from, to) in table {
        copy_field(src, from, &mut out, to);
    }
    out
}

/// Inverse of [`rename_keys`]: reads tool keys, writes API keys.
pub fn rename_keys_reverse(src: &Document, table: &[(&str, &str)]) -> Document {
    let mut out = Document::new();
    for (api, tool) in table {
        copy_field(src, tool, &mut out, api);
    }
    out
}

pub(crate) fn str_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

/// Reads a string field, defaulting to `""` when absent or not a string.
pub(crate) fn str_or_empty(doc: &Document, key: &str) -> String {
    str_field(doc, key).unwrap_or_default().to_string()
}

/// Percent-decodes text the API stores URL-encoded. Invalid sequences are
/// returned unchanged.
pub fn url_decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

pub(crate) fn decoded_field(doc: &Document, key: &str) -> String {
    url_decode(&str_or_empty(doc, key))
}
