use serde_json::{Map, Value};

use super::StoreError;

/// A stored document. Always a JSON object at the top level.
pub type Document = Value;

/// Conjunction of equality tests on (possibly dotted) field paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Vec<(String, Value)>,
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.fields
            .iter()
            .all(|(path, expected)| lookup(document, path) == Some(expected))
    }
}

/// Ordered `$set` assignments applied to a single document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(String, Value)>,
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and_set(field, value)
    }

    pub fn and_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.set
    }

    /// Applies every assignment, creating intermediate objects along the path.
    /// Returns true when the document changed.
    pub fn apply(&self, document: &mut Document) -> bool {
        let mut modified = false;
        for (path, value) in &self.set {
            if lookup(document, path) == Some(value) {
                continue;
            }
            assign(document, path, value.clone());
            modified = true;
        }
        modified
    }
}

pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

fn assign(document: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = document;

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };

        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Converts a dotted field path into a SQLite JSON path (`agents.limit` -> `$."agents"."limit"`).
///
/// SQLite path labels have no escape syntax, so segments containing `"` are rejected.
pub fn json_path(path: &str) -> Result<String, StoreError> {
    let mut quoted = Vec::new();
    for segment in path.split('.') {
        if segment.contains('"') {
            return Err(StoreError::Query(format!(
                "field path {path} contains a double quote"
            )));
        }
        quoted.push(format!("\"{segment}\""));
    }
    Ok(format!("$.{}", quoted.join(".")))
}
