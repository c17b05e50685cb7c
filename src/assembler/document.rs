use serde_json::{Map, Value};
use tracing::trace;

/// Builds one document from an immutable template.
///
/// Fields follow the `<name>: [{"value": ...}]` layout; nested fields repeat it
/// inside the parent's `value`. Setting an absent value removes the field node
/// instead of writing null.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    doc: Value,
    fields: &'static str,
}

impl DocumentBuilder {
    /// Top-level entity: fields live under `attributes`.
    pub fn entity(template: &Value) -> Self {
        Self {
            doc: template.clone(),
            fields: "attributes",
        }
    }

    /// Nested row or reference: fields live under `value`.
    pub fn nested(template: &Value) -> Self {
        Self {
            doc: template.clone(),
            fields: "value",
        }
    }

    pub fn field(self, name: &str, value: Option<Value>) -> Self {
        self.field_path(&[name], value)
    }

    /// Sets a (possibly nested) field or removes its node when `value` is
    /// absent or empty.
    pub fn field_path(mut self, path: &[&str], value: Option<Value>) -> Self {
        match present(value) {
            Some(value) => {
                let pointer = format!("{}/0/value", self.node_pointer(path));
                self.put(&pointer, value);
                self
            }
            None => self.remove_path(path),
        }
    }

    pub fn remove_path(mut self, path: &[&str]) -> Self {
        if let Some((last, parent)) = path.split_last() {
            let parent_pointer = if parent.is_empty() {
                format!("/{}", self.fields)
            } else {
                format!("{}/0/value", self.node_pointer(parent))
            };
            if let Some(object) = self.doc.pointer_mut(&parent_pointer).and_then(Value::as_object_mut) {
                object.remove(*last);
            }
        }
        self
    }

    /// Writes `value` at a raw JSON pointer that the template already has.
    pub fn set(mut self, pointer: &str, value: impl Into<Value>) -> Self {
        self.put(pointer, value.into());
        self
    }

    /// Inserts a whole field node, creating it when the template lacks it.
    pub fn insert_field(mut self, name: &str, node: Value) -> Self {
        let fields = self.fields;
        if !self.doc.get(fields).is_some_and(Value::is_object) {
            if let Some(root) = self.doc.as_object_mut() {
                root.insert(fields.to_string(), Value::Object(Map::new()));
            }
        }
        if let Some(object) = self.doc.get_mut(fields).and_then(Value::as_object_mut) {
            object.insert(name.to_string(), node);
        }
        self
    }

    pub fn build(self) -> Value {
        self.doc
    }

    fn node_pointer(&self, path: &[&str]) -> String {
        let mut pointer = format!("/{}", self.fields);
        for (depth, segment) in path.iter().enumerate() {
            if depth > 0 {
                pointer.push_str("/0/value");
            }
            pointer.push('/');
            pointer.push_str(&segment.replace('~', "~0").replace('/', "~1"));
        }
        pointer
    }

    fn put(&mut self, pointer: &str, value: Value) {
        match self.doc.pointer_mut(pointer) {
            Some(slot) => *slot = value,
            None => trace!(target: "assembler", pointer, "template has no node at pointer"),
        }
    }
}

/// `None`, null and blank strings all count as absent.
pub fn present(value: Option<Value>) -> Option<Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        other => other,
    }
}

pub fn text(value: &Option<String>) -> Option<Value> {
    value.as_deref().map(Value::from)
}

pub fn number(value: Option<f64>) -> Option<Value> {
    value.map(Value::from)
}

/// Numbers the store expects as strings, e.g. revenue and ACV.
pub fn number_text(value: Option<f64>) -> Option<Value> {
    value.map(|n| Value::from(n.to_string()))
}

pub fn integer(value: Option<f64>) -> Option<Value> {
    value.map(|n| Value::from(n.trunc() as i64))
}

pub fn flag(value: Option<bool>) -> Option<Value> {
    value.map(Value::from)
}
