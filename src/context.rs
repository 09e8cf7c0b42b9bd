//! Evaluation context: the caller-supplied variable mapping
//!
//! A context maps top-level names to values. Evaluation never mutates it;
//! the same context can back any number of concurrent evaluations.

use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Caller-supplied variables for one or more evaluations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    root: Map,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object.
    ///
    /// Returns a type error when the JSON value is not an object, since
    /// paths resolve against named top-level entries.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Value::from_json(json) {
            Value::Map(root) => Ok(Self { root }),
            other => Err(Error::Type {
                message: format!("context must be a JSON object, got {}", other.kind_name()),
                span: Default::default(),
            }),
        }
    }

    /// Set a top-level variable
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.root.insert(name.into(), value.into());
    }

    /// Look up a top-level variable
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// View the whole context as a mapping value (used by resolvers)
    pub fn to_value(&self) -> Value {
        Value::Map(self.root.clone())
    }

    /// Borrow the underlying mapping
    pub fn entries(&self) -> &Map {
        &self.root
    }

    /// Serialize the context for resolvers that operate on JSON documents
    pub fn to_json(&self) -> serde_json::Value {
        Value::Map(self.root.clone()).to_json()
    }
}

impl From<Map> for Context {
    fn from(root: Map) -> Self {
        Self { root }
    }
}
