use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Keys assigned by the store. They never live inside `Document::fields`.
pub const RESERVED_FIELDS: [&str; 3] = ["_id", "created", "updated"];

/// A stored record: a store-assigned identifier, timestamps, and whatever
/// fields the resource's schema declares.
///
/// Serializes flat, the way a document database hands records back:
/// `{"_id": ..., "created": ..., "updated": ..., "name": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: Uuid, fields: Map<String, Value>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created: now,
            updated: now,
            fields: strip_reserved(fields),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(Value::as_bool)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if !RESERVED_FIELDS.contains(&field.as_str()) {
            self.fields.insert(field, value);
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Value used when matching store queries. `_id` resolves to the
    /// identifier; absent fields resolve to `null`.
    pub fn query_value(&self, field: &str) -> Value {
        match field {
            "_id" => Value::String(self.id.to_string()),
            _ => self.fields.get(field).cloned().unwrap_or(Value::Null),
        }
    }
}

/// Drops `_id`, `created` and `updated` from caller-supplied fields.
pub fn strip_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
    fields
}
