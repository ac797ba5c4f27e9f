//! Field access for rules
//!
//! Values are read from a type's serde serialization, so rules see a
//! `serde_json::Value` plus the object it was taken from.

use serde_json::{Map, Value};

use crate::translation::to_snake_case;

/// What a rule sees when it runs
#[derive(Debug, Clone, Copy)]
pub struct FieldLevel<'a> {
    field: &'a str,
    value: &'a Value,
    param: Option<&'a str>,
    parent: Option<&'a Map<String, Value>>,
}

impl<'a> FieldLevel<'a> {
    /// Bundle a value with its rule param and owning object
    pub fn new(
        field: &'a str,
        value: &'a Value,
        param: Option<&'a str>,
        parent: Option<&'a Map<String, Value>>,
    ) -> Self {
        Self {
            field,
            value,
            param,
            parent,
        }
    }

    /// Name of the field as it appears in the serialized struct
    pub fn field(&self) -> &'a str {
        self.field
    }

    /// Serialized value under validation
    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// Rule param, the text after `=`
    pub fn param(&self) -> Option<&'a str> {
        self.param
    }

    /// The struct the field belongs to, absent for single-value validation
    pub fn parent(&self) -> Option<&'a Map<String, Value>> {
        self.parent
    }

    /// String form of the value: strings verbatim, numbers and booleans
    /// printed, null and containers empty
    pub fn as_text(&self) -> String {
        value_text(self.value)
    }

    /// Sibling field by name, also matching on the snake-cased name so
    /// `userId` and `UserID` both answer to `user_id`
    pub fn sibling(&self, name: &str) -> Option<&'a Value> {
        let parent = self.parent?;
        if let Some(value) = parent.get(name) {
            return Some(value);
        }

        let wanted = to_snake_case(name);
        parent
            .iter()
            .find(|(key, _)| to_snake_case(key) == wanted)
            .map(|(_, value)| value)
    }
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Whether a value counts as empty: null, zero, false, or an empty
/// string or collection
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map(|f| f == 0.0).unwrap_or(false),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
