use serde_json::Value;

use crate::error::{Error, Result};

/// JSON-shaped configuration consumed by the pass pipeline.
///
/// Typed getters fall back to a default when the key is absent and report a
/// descriptive error naming the key and the expected type when the value has
/// the wrong shape. Bool getters accept the lenient spellings legacy configs
/// use ("0"/"1", "off"/"on", "no"/"yes", "false"/"true").
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    root: Value,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl JsonConfig {
    #[must_use]
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    fn wrong_type(key: &str, expected: &'static str, found: &Value) -> Error {
        Error::ConfigType {
            key: key.to_owned(),
            expected,
            found: type_name(found),
        }
    }

    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64> {
        match self.value(key) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => value
                .as_i64()
                .ok_or_else(|| Self::wrong_type(key, "integer", value)),
        }
    }

    pub fn get_str(&self, key: &str, default: &str) -> Result<String> {
        match self.value(key) {
            None | Some(Value::Null) => Ok(default.to_owned()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(value) => Err(Self::wrong_type(key, "string", value)),
        }
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        let Some(value) = self.value(key) else {
            return Ok(default);
        };
        match value {
            Value::Null => Ok(default),
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(Self::wrong_type(key, "bool", value)),
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "0" | "false" | "off" | "no" => Ok(false),
                "1" | "true" | "on" | "yes" => Ok(true),
                _ => Err(Self::wrong_type(key, "bool", value)),
            },
            Value::Array(_) | Value::Object(_) => Err(Self::wrong_type(key, "bool", value)),
        }
    }

    pub fn get_str_list(&self, key: &str) -> Result<Vec<String>> {
        let Some(value) = self.value(key) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(Self::wrong_type(key, "array of strings", value));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(Self::wrong_type(key, "array of strings", other)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(text: &str) -> JsonConfig {
        JsonConfig::parse(text).expect("valid test config")
    }

    #[test]
    fn defaults_for_missing_keys() {
        let cfg = config("{}");
        assert_eq!(cfg.get_i64("threads", 4).unwrap(), 4);
        assert_eq!(cfg.get_str("outdir", "out").unwrap(), "out");
        assert!(cfg.get_bool("verbose", true).unwrap());
        assert!(cfg.get_str_list("no_optimizations_annotations").unwrap().is_empty());
    }

    #[test]
    fn typed_values() {
        let cfg = config(r#"{"threads": 8, "outdir": "build", "list": ["a", "b"]}"#);
        assert_eq!(cfg.get_i64("threads", 4).unwrap(), 8);
        assert_eq!(cfg.get_str("outdir", "out").unwrap(), "build");
        assert_eq!(cfg.get_str_list("list").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn lenient_bools() {
        let cfg = config(r#"{"a": "off", "b": "Yes", "c": 1, "d": "0"}"#);
        assert!(!cfg.get_bool("a", true).unwrap());
        assert!(cfg.get_bool("b", false).unwrap());
        assert!(cfg.get_bool("c", false).unwrap());
        assert!(!cfg.get_bool("d", true).unwrap());
    }

    #[test]
    fn errors_name_key_and_types() {
        let cfg = config(r#"{"threads": "many"}"#);
        let err = cfg.get_i64("threads", 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "config key `threads`: expected integer, found string"
        );
    }

    #[test]
    fn bad_bool_spelling_is_an_error() {
        let cfg = config(r#"{"flag": "maybe"}"#);
        assert!(cfg.get_bool("flag", false).is_err());
    }
}
