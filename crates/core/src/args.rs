use serde_json::Value;

/// Tolerant view over a tool-argument payload
///
/// Tool arguments arrive as free-form JSON produced by the model. Every
/// accessor here is total: malformed payloads decode to an empty tree and
/// missing or mistyped fields read as absent, never as errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Value);

impl ToolArgs {
    /// Parse a raw payload; invalid JSON yields an empty tree
    pub fn parse(raw: &str) -> Self {
        Self(serde_json::from_str(raw).unwrap_or(Value::Null))
    }

    /// Wrap an already-decoded value
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// The underlying JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Whether nothing usable was decoded
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// First string value found under any of the given keys
    pub fn str_field(&self, keys: &[&str]) -> Option<&str> {
        let obj = self.0.as_object()?;
        keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_str))
    }

    /// First unsigned integer found under any of the given keys
    ///
    /// Accepts numbers and numeric strings (models emit both).
    pub fn u64_field(&self, keys: &[&str]) -> Option<u64> {
        let obj = self.0.as_object()?;
        keys.iter().find_map(|k| {
            let v = obj.get(*k)?;
            v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
    }

    /// First boolean found under any of the given keys
    pub fn bool_field(&self, keys: &[&str]) -> Option<bool> {
        let obj = self.0.as_object()?;
        keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_bool))
    }

    /// First array found under any of the given keys
    ///
    /// When the payload itself is an array, it is returned for any key.
    pub fn array_field(&self, keys: &[&str]) -> Option<&[Value]> {
        if let Value::Array(items) = &self.0 {
            return Some(items);
        }
        let obj = self.0.as_object()?;
        keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_array)).map(|v| v.as_slice())
    }

    /// Flat "field: value" pairs for the generic fallback display
    ///
    /// Scalar fields render their value, containers a short placeholder.
    pub fn entries(&self) -> Vec<(String, String)> {
        let Some(obj) = self.0.as_object() else {
            return Vec::new();
        };
        obj.iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => "null".to_string(),
                    Value::Array(items) => format!("[{} items]", items.len()),
                    Value::Object(_) => "{...}".to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invalid_json_is_empty() {
        let args = ToolArgs::parse("{not json");
        assert!(args.is_empty());
        assert_eq!(args.str_field(&["path"]), None);
        assert!(args.entries().is_empty());
    }

    #[test]
    fn test_str_field_fallback_order() {
        let args = ToolArgs::parse(r#"{"file_path": "/tmp/a.rs", "path": "/tmp/b.rs"}"#);
        assert_eq!(args.str_field(&["path", "file_path"]), Some("/tmp/b.rs"));
        assert_eq!(args.str_field(&["filePath", "file_path"]), Some("/tmp/a.rs"));
        assert_eq!(args.str_field(&["missing"]), None);
    }

    #[test]
    fn test_u64_field_accepts_numeric_strings() {
        let args = ToolArgs::parse(r#"{"id": "17", "count": 4}"#);
        assert_eq!(args.u64_field(&["id"]), Some(17));
        assert_eq!(args.u64_field(&["count"]), Some(4));
        assert_eq!(args.u64_field(&["other"]), None);
    }

    #[test]
    fn test_bool_field() {
        let args = ToolArgs::parse(r#"{"replace": true}"#);
        assert_eq!(args.bool_field(&["replace"]), Some(true));
        assert_eq!(args.bool_field(&["append"]), None);
    }

    #[test]
    fn test_array_field_on_object_and_bare_array() {
        let args = ToolArgs::parse(r#"{"items": [1, 2, 3]}"#);
        assert_eq!(args.array_field(&["items"]).map(|a| a.len()), Some(3));

        let bare = ToolArgs::parse(r#"[{"title": "x"}]"#);
        assert_eq!(bare.array_field(&["anything"]).map(|a| a.len()), Some(1));
    }

    #[test]
    fn test_entries_renders_scalars_and_placeholders() {
        let args = ToolArgs::parse(r#"{"query": "cats", "limit": 5, "deep": {"a": 1}, "tags": ["x"]}"#);
        let entries = args.entries();
        assert!(entries.contains(&("query".to_string(), "cats".to_string())));
        assert!(entries.contains(&("limit".to_string(), "5".to_string())));
        assert!(entries.contains(&("deep".to_string(), "{...}".to_string())));
        assert!(entries.contains(&("tags".to_string(), "[1 items]".to_string())));
    }

    #[test]
    fn test_entries_on_non_object() {
        assert!(ToolArgs::parse("42").entries().is_empty());
        assert!(ToolArgs::parse("null").entries().is_empty());
    }
}
