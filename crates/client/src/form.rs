//! Form state as immutable snapshots.
//!
//! A form holds named slots (`task`, `note`, ...) seeded from copies of
//! default objects or cached records. Inputs address values with dotted
//! paths such as `note.name`, and every edit yields a new snapshot after the
//! path and value are checked against the slot's field set.

use std::{collections::HashMap, fmt, str::FromStr};

use db::models::{
    resource::ResourceKind,
    schema::{FieldSet, FieldType},
};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("invalid field path `{0}`")]
    InvalidPath(String),
    #[error("unknown form slot `{0}`")]
    UnknownSlot(String),
    #[error("`{path}` is not a declared field")]
    UnknownField { path: String },
    #[error("`{path}` expects {expected}")]
    TypeMismatch { path: String, expected: String },
}

/// Dotted path to a form value: the slot name followed by at least one
/// field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, FormError> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.len() < 2 || segments.iter().any(|segment| segment.trim().is_empty()) {
            return Err(FormError::InvalidPath(raw.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn slot(&self) -> &str {
        &self.segments[0]
    }

    /// Field names below the slot.
    pub fn fields(&self) -> &[String] {
        &self.segments[1..]
    }
}

impl FromStr for FieldPath {
    type Err = FormError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Field set backing each slot of a form.
#[derive(Debug, Clone, Default)]
pub struct FormSchemas {
    slots: HashMap<String, &'static FieldSet>,
}

impl FormSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(mut self, slot: impl Into<String>, kind: ResourceKind) -> Self {
        self.slots.insert(slot.into(), kind.fields());
        self
    }

    pub fn get(&self, slot: &str) -> Option<&'static FieldSet> {
        self.slots.get(slot).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    slots: Map<String, Value>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot with `slot` replaced by `value`.
    pub fn with_slot(&self, slot: impl Into<String>, value: Map<String, Value>) -> Self {
        let mut next = self.clone();
        next.slots.insert(slot.into(), Value::Object(value));
        next
    }

    pub fn slot(&self, slot: &str) -> Option<&Map<String, Value>> {
        self.slots.get(slot).and_then(Value::as_object)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        let mut current = self.slots.get(path.slot())?;
        for field in path.fields() {
            current = current.as_object()?.get(field)?;
        }
        Some(current)
    }

    /// Returns a snapshot with the value at `path` replaced. Intermediate
    /// objects are created when missing. `self` is never modified.
    pub fn with_field(
        &self,
        path: &FieldPath,
        value: Value,
        schemas: &FormSchemas,
    ) -> Result<Self, FormError> {
        let unknown_slot = || FormError::UnknownSlot(path.slot().to_string());
        let fields = schemas.get(path.slot()).ok_or_else(unknown_slot)?;
        if !self.slots.contains_key(path.slot()) {
            return Err(unknown_slot());
        }
        let declared = resolve(fields, path)?;
        if !declared.accepts(&value) {
            return Err(FormError::TypeMismatch {
                path: path.to_string(),
                expected: declared.type_name(),
            });
        }

        let mut next = self.clone();
        let mut current = next
            .slots
            .get_mut(path.slot())
            .ok_or_else(unknown_slot)?;
        let (last, parents) = path
            .fields()
            .split_last()
            .ok_or_else(|| FormError::InvalidPath(path.to_string()))?;
        for field in parents {
            current = ensure_object(current, path)?
                .entry(field.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(current, path)?.insert(last.clone(), value);
        Ok(next)
    }
}

/// Declared type of the field `path` points at, walking nested objects.
fn resolve<'a>(fields: &'a FieldSet, path: &FieldPath) -> Result<&'a FieldType, FormError> {
    let unknown = || FormError::UnknownField {
        path: path.to_string(),
    };
    let mut set = fields;
    let mut declared: Option<&'a FieldType> = None;
    for field in path.fields() {
        if let Some(parent) = declared {
            match parent {
                FieldType::Object(nested) => set = nested,
                _ => return Err(unknown()),
            }
        }
        declared = Some(&set.get(field).ok_or_else(unknown)?.field_type);
    }
    declared.ok_or_else(unknown)
}

/// Replaces a non-object (e.g. a `null` preferences field) with `{}`.
fn ensure_object<'a>(
    value: &'a mut Value,
    path: &FieldPath,
) -> Result<&'a mut Map<String, Value>, FormError> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .ok_or_else(|| FormError::InvalidPath(path.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn schemas() -> FormSchemas {
        FormSchemas::new()
            .with_slot("task", ResourceKind::Task)
            .with_slot("note", ResourceKind::Note)
            .with_slot("user", ResourceKind::User)
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(FieldPath::parse("note.name").is_ok());
        for bad in ["", "note", "note.", ".name", "user..theme"] {
            assert_eq!(
                FieldPath::parse(bad),
                Err(FormError::InvalidPath(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn with_field_returns_new_snapshot() {
        let form = FormState::new().with_slot("note", obj(json!({"name": ""})));
        let path = FieldPath::parse("note.name").unwrap();
        let next = form.with_field(&path, json!("hello"), &schemas()).unwrap();

        assert_eq!(next.get(&path), Some(&json!("hello")));
        assert_eq!(form.get(&path), Some(&json!("")));
    }

    #[test]
    fn nested_object_fields_are_reachable() {
        let form = FormState::new().with_slot("user", obj(json!({"username": "ada"})));
        let path = FieldPath::parse("user.preferences.theme").unwrap();
        let next = form.with_field(&path, json!("dark"), &schemas()).unwrap();
        assert_eq!(
            next.slot("user").unwrap()["preferences"],
            json!({"theme": "dark"})
        );
    }

    #[test]
    fn undeclared_fields_and_slots_are_rejected() {
        let form = FormState::new().with_slot("task", obj(json!({"name": ""})));
        let schemas = schemas();

        let err = form
            .with_field(&FieldPath::parse("task.bogus").unwrap(), json!(1), &schemas)
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownField { .. }));

        let err = form
            .with_field(&FieldPath::parse("task.name.first").unwrap(), json!("x"), &schemas)
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownField { .. }));

        let err = form
            .with_field(&FieldPath::parse("note.name").unwrap(), json!("x"), &schemas)
            .unwrap_err();
        assert_eq!(err, FormError::UnknownSlot("note".to_string()));
    }

    #[test]
    fn values_must_match_declared_type() {
        let form = FormState::new().with_slot("task", obj(json!({"name": "", "complete": false})));
        let err = form
            .with_field(&FieldPath::parse("task.complete").unwrap(), json!("yes"), &schemas())
            .unwrap_err();
        assert_eq!(
            err,
            FormError::TypeMismatch {
                path: "task.complete".to_string(),
                expected: "Boolean".to_string(),
            }
        );

        let cleared = form
            .with_field(&FieldPath::parse("task._flow").unwrap(), Value::Null, &schemas())
            .unwrap();
        assert_eq!(cleared.slot("task").unwrap()["_flow"], Value::Null);
    }
}
