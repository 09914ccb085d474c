use serde_json::Value;

use super::document::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value; `null` also matches an absent field.
    Eq(Value),
    /// Field equals any of the values.
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub condition: Condition,
}

/// Conjunction of field filters plus an optional page window, evaluated in
/// stored order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    pub filters: Vec<Filter>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl StoreQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality filter. A later filter on the same field replaces the
    /// earlier one.
    pub fn eq(self, field: impl Into<String>, value: Value) -> Self {
        self.with_condition(field.into(), Condition::Eq(value))
    }

    pub fn any_of(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.with_condition(field.into(), Condition::In(values))
    }

    pub fn paginate(mut self, skip: u64, limit: u64) -> Self {
        self.skip = Some(skip);
        self.limit = Some(limit);
        self
    }

    fn with_condition(mut self, field: String, condition: Condition) -> Self {
        match self.filters.iter_mut().find(|filter| filter.field == field) {
            Some(existing) => existing.condition = condition,
            None => self.filters.push(Filter { field, condition }),
        }
        self
    }

    /// First field name that cannot be used in a store query, if any.
    pub fn invalid_field(&self) -> Option<&str> {
        self.filters
            .iter()
            .map(|filter| filter.field.as_str())
            .find(|field| !is_valid_field_name(field))
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.filters.iter().all(|filter| {
            let actual = document.query_value(&filter.field);
            match &filter.condition {
                Condition::Eq(expected) => values_equal(&filter.field, &actual, expected),
                Condition::In(expected) => expected
                    .iter()
                    .any(|candidate| values_equal(&filter.field, &actual, candidate)),
            }
        })
    }
}

/// Field names are restricted to ASCII letters, digits and underscores.
pub fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn values_equal(field: &str, actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) if field == "_id" => a.eq_ignore_ascii_case(b),
        _ => actual == expected,
    }
}
