//! Context types and derivation rules

use crate::types::Record;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Key-value parameters handed from a parent record to a child stream instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Context {
    values: BTreeMap<String, String>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterate over keys and values in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context has no keys
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

/// Which parent records produce a child context
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RecordPredicate {
    /// Every record
    #[default]
    Always,
    /// Records where a field equals a value (e.g. `object == "page"`)
    FieldEquals {
        /// Dot path into the record
        field: String,
        /// Expected value
        value: Value,
    },
    /// Records where a field is `true`, a non-empty string or a non-zero number
    FieldTruthy {
        /// Dot path into the record
        field: String,
    },
}

impl RecordPredicate {
    /// Create an equality predicate
    pub fn field_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a truthiness predicate
    pub fn field_truthy(field: impl Into<String>) -> Self {
        Self::FieldTruthy {
            field: field.into(),
        }
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Always => true,
            Self::FieldEquals { field, value } => lookup(record, field) == Some(value),
            Self::FieldTruthy { field } => match lookup(record, field) {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) => !s.is_empty(),
                Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
                _ => false,
            },
        }
    }
}

/// Where a context value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// A dot path into the parent record (e.g. `id`)
    Record(String),
    /// A key of the parent's own context (e.g. `page_id` for nested blocks)
    Parent(String),
}

/// How a parent record turns into a child context
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRule {
    /// Records that qualify
    pub predicate: RecordPredicate,
    /// Context keys and where their values come from
    pub fields: Vec<(String, FieldSource)>,
}

impl ContextRule {
    /// Create a rule for every record with no fields yet
    pub fn new(predicate: RecordPredicate) -> Self {
        Self {
            predicate,
            fields: Vec::new(),
        }
    }

    /// Map a record field into a context key
    #[must_use]
    pub fn from_record(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.fields
            .push((key.into(), FieldSource::Record(path.into())));
        self
    }

    /// Carry a key over from the parent's context
    #[must_use]
    pub fn from_parent(mut self, key: impl Into<String>, parent_key: impl Into<String>) -> Self {
        self.fields
            .push((key.into(), FieldSource::Parent(parent_key.into())));
        self
    }

    /// Context keys this rule produces
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    /// Derive the child context of one parent record
    ///
    /// `None` when the record does not qualify or a mapped value is missing.
    pub fn derive(&self, record: &Record, parent: Option<&Context>) -> Option<Context> {
        if !self.predicate.matches(record) {
            return None;
        }

        let mut context = Context::new();
        for (key, source) in &self.fields {
            let value = match source {
                FieldSource::Record(path) => lookup(record, path).and_then(scalar_to_string)?,
                FieldSource::Parent(parent_key) => parent?.get(parent_key)?.to_string(),
            };
            context.insert(key.clone(), value);
        }
        Some(context)
    }
}

/// Follow a dot path into a record
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
