use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OeisError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    fields: Map<String, Value>,
}

impl Metadata {
    pub fn from_value(value: Value) -> Result<Self, OeisError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(OeisError::Decode(format!(
                "expected an entry object, found {other}"
            ))),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn lines(&self, key: &str) -> Vec<&str> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str()).collect(),
            Some(Value::String(line)) => vec![line.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn number(&self) -> Option<&Value> {
        self.fields.get("number")
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn data(&self) -> Option<&str> {
        self.str_field("data")
    }

    pub fn offset(&self) -> Option<&str> {
        self.str_field("offset")
    }

    pub fn keyword(&self) -> Option<&str> {
        self.str_field("keyword")
    }

    pub fn author(&self) -> Option<&str> {
        self.str_field("author")
    }

    pub fn time(&self) -> Option<&str> {
        self.str_field("time")
    }

    pub fn created(&self) -> Option<&str> {
        self.str_field("created")
    }

    pub fn revision(&self) -> Option<u64> {
        self.fields.get("revision").and_then(|v| v.as_u64())
    }

    pub fn references(&self) -> Option<u64> {
        self.fields.get("references").and_then(|v| v.as_u64())
    }

    pub fn formula(&self) -> Vec<&str> {
        self.lines("formula")
    }

    pub fn program(&self) -> Vec<&str> {
        self.lines("program")
    }

    pub fn maple(&self) -> Vec<&str> {
        self.lines("maple")
    }

    pub fn mathematica(&self) -> Vec<&str> {
        self.lines("mathematica")
    }

    pub fn xref(&self) -> Vec<&str> {
        self.lines("xref")
    }

    pub fn comment(&self) -> Vec<&str> {
        self.lines("comment")
    }

    pub fn example(&self) -> Vec<&str> {
        self.lines("example")
    }

    pub fn reference(&self) -> Vec<&str> {
        self.lines("reference")
    }

    pub fn link(&self) -> Vec<&str> {
        self.lines("link")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_follows_objects_and_arrays() {
        let meta = Metadata::from_value(json!({
            "program": ["(PARI) a(n)=fibonacci(n)"],
            "nested": {"inner": {"value": 7}}
        }))
        .unwrap();
        assert_eq!(
            meta.lookup("program.0").and_then(|v| v.as_str()),
            Some("(PARI) a(n)=fibonacci(n)")
        );
        assert_eq!(meta.lookup("nested.inner.value"), Some(&json!(7)));
        assert_eq!(meta.lookup("nested.missing"), None);
        assert_eq!(meta.lookup("program.x"), None);
    }

    #[test]
    fn lines_accept_single_strings() {
        let meta = Metadata::from_value(json!({"comment": "only one", "xref": 3})).unwrap();
        assert_eq!(meta.comment(), vec!["only one"]);
        assert!(meta.xref().is_empty());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(Metadata::from_value(json!([1, 2])).is_err());
    }
}
