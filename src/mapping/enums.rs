///
/// Enum translation tables between Splunk API tokens and tool tokens.
///
/// The tables are closed over the values the API is known to emit, but a
/// lookup never fails: an unknown API value degrades to its lower-cased form
/// and an unknown tool value is sent to the API unchanged.
///
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct EnumTable {
    /// `(api_token, tool_token)` pairs.
    pairs: &'static [(&'static str, &'static str)],
}

impl EnumTable {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self { pairs }
    }

    pub fn lookup_api(&self, api_token: &str) -> Option<&'static str> {
        self.pairs
            .iter()
            .find(|(api, _)| *api == api_token)
            .map(|(_, tool)| *tool)
    }

    pub fn lookup_tool(&self, tool_token: &str) -> Option<&'static str> {
        self.pairs
            .iter()
            .find(|(_, tool)| *tool == tool_token)
            .map(|(api, _)| *api)
    }

    pub fn from_api_str(&self, api_token: &str) -> String {
        self.lookup_api(api_token)
            .map(str::to_string)
            .unwrap_or_else(|| api_token.to_lowercase())
    }

    /// Translates a raw API value.
    ///
    /// With `stringify_key` the lookup key is the value's string form, so a
    /// numeric status `2` matches the `"2"` entry. Without it only JSON
    /// strings are looked up, case-sensitively.
    pub fn from_api(&self, value: &Value, stringify_key: bool) -> Value {
        let key = match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) if stringify_key => Some(n.to_string()),
            Value::Bool(b) if stringify_key => Some(b.to_string()),
            _ => None,
        };
        if let Some(tool) = key.as_deref().and_then(|k| self.lookup_api(k)) {
            return Value::String(tool.to_string());
        }
        match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other.clone(),
        }
    }

    pub fn to_api(&self, tool_token: &str) -> String {
        self.lookup_tool(&tool_token.to_lowercase())
            .map(str::to_string)
            .unwrap_or_else(|| tool_token.to_string())
    }

    pub fn tool_tokens(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(_, tool)| *tool)
    }

    pub fn api_tokens(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(api, _)| *api)
    }
}

pub const STATUS: EnumTable = EnumTable::new(&[
    ("0", "unassigned"),
    ("1", "new"),
    ("2", "in_progress"),
    ("3", "pending"),
    ("4", "resolved"),
    ("5", "closed"),
]);

pub const DISPOSITION: EnumTable = EnumTable::new(&[
    ("disposition:0", "unassigned"),
    ("disposition:1", "true_positive"),
    ("disposition:2", "benign_positive"),
    ("disposition:3", "false_positive"),
    ("disposition:4", "false_positive_inaccurate_data"),
    ("disposition:5", "other"),
    ("disposition:6", "undetermined"),
]);

pub const SENSITIVITY: EnumTable = EnumTable::new(&[
    ("White", "white"),
    ("Green", "green"),
    ("Amber", "amber"),
    ("Red", "red"),
    ("Unassigned", "unassigned"),
]);

pub const TASK_STATUS: EnumTable = EnumTable::new(&[
    ("Pending", "pending"),
    ("Started", "started"),
    ("Ended", "ended"),
    ("Reopened", "reopened"),
]);

pub const URGENCY_CHOICES: &[&str] = &["informational", "low", "medium", "high", "critical", "unknown"];
