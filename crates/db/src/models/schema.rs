//! Declared field sets.
//!
//! Each resource describes its fields once (name, type, mutability,
//! default). Controllers consult the description at request time to build
//! default objects, coerce query-string values and pick the update
//! whitelist; forms use it to validate path updates.

use serde_json::{Map, Number, Value, json};

use super::resource::ResourceKind;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Text,
    Boolean,
    Number,
    Date,
    Ref(ResourceKind),
    Array(Box<FieldType>),
    Object(FieldSet),
}

impl FieldType {
    pub fn type_name(&self) -> String {
        match self {
            FieldType::String => "String".to_string(),
            FieldType::Text => "Text".to_string(),
            FieldType::Boolean => "Boolean".to_string(),
            FieldType::Number => "Number".to_string(),
            FieldType::Date => "Date".to_string(),
            FieldType::Ref(kind) => format!("Ref<{}>", kind.display_name()),
            FieldType::Array(inner) => format!("Array<{}>", inner.type_name()),
            FieldType::Object(_) => "Object".to_string(),
        }
    }

    /// Empty value for a freshly created instance.
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::String | FieldType::Text => Value::String(String::new()),
            FieldType::Boolean => Value::Bool(false),
            FieldType::Number => Value::Number(Number::from(0)),
            FieldType::Date | FieldType::Ref(_) => Value::Null,
            FieldType::Array(_) => Value::Array(Vec::new()),
            FieldType::Object(fields) => Value::Object(fields.default_object()),
        }
    }

    /// Whether `value` has the JSON shape this type declares. `null` is
    /// accepted for references and dates only.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::String | FieldType::Text, Value::String(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Date, Value::String(_) | Value::Null) => true,
            (FieldType::Ref(_), Value::String(_) | Value::Null) => true,
            (FieldType::Array(inner), Value::Array(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (FieldType::Object(fields), Value::Object(map)) => map
                .iter()
                .all(|(key, item)| fields.get(key).is_some_and(|spec| spec.field_type.accepts(item))),
            _ => false,
        }
    }

    fn describe(&self) -> Value {
        match self {
            FieldType::Object(fields) => json!({
                "type": self.type_name(),
                "fields": fields.describe_fields(),
            }),
            _ => json!({ "type": self.type_name() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub mutable: bool,
    pub required: bool,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mutable: false,
            required: false,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn reference(name: impl Into<String>, target: ResourceKind) -> Self {
        Self::new(name, FieldType::Ref(target))
    }

    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.field_type.default_value())
    }
}

/// Ordered collection of field declarations for one resource (or one nested
/// object inside a resource).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<FieldSpec>,
}

impl FieldSet {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    /// Names of the fields `update` is allowed to overwrite.
    pub fn mutable_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|spec| spec.mutable)
            .map(|spec| spec.name.as_str())
    }

    pub fn default_object(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|spec| (spec.name.clone(), spec.default_value()))
            .collect()
    }

    /// Converts a raw query-string value into the JSON type declared for
    /// `field`. Values that don't parse, and undeclared fields, stay strings.
    pub fn coerce(&self, field: &str, raw: &str) -> Value {
        let Some(spec) = self.get(field) else {
            return Value::String(raw.to_string());
        };
        match spec.field_type {
            FieldType::Boolean => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            FieldType::Number => raw
                .parse::<i64>()
                .map(Number::from)
                .ok()
                .or_else(|| raw.parse::<f64>().ok().and_then(Number::from_f64))
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Schema document served to admin tooling.
    pub fn describe(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("_id".to_string(), json!({ "type": "ObjectId", "mutable": false }));
        fields.insert("created".to_string(), json!({ "type": "Date", "mutable": false }));
        fields.insert("updated".to_string(), json!({ "type": "Date", "mutable": false }));
        if let Value::Object(declared) = self.describe_fields() {
            fields.extend(declared);
        }
        Value::Object(fields)
    }

    fn describe_fields(&self) -> Value {
        let described = self
            .fields
            .iter()
            .map(|spec| {
                let mut entry = spec.field_type.describe();
                if let Value::Object(map) = &mut entry {
                    map.insert("mutable".to_string(), Value::Bool(spec.mutable));
                    map.insert("required".to_string(), Value::Bool(spec.required));
                    map.insert("default".to_string(), spec.default_value());
                }
                (spec.name.clone(), entry)
            })
            .collect::<Map<String, Value>>();
        Value::Object(described)
    }
}
