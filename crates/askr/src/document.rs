//! # Document: a Generic Key/Typed-Value Tree
//!
//! Scenes are saved to a format-neutral tree of named entries. The core only
//! builds and reads this tree; turning it into bytes is the job of
//! [`scene_file`](crate::scene_file).
//!
//! ```text
//! Document
//! └── Entry "scene"      Container
//!     ├── Entry "entities" Array
//!     │   └── Entry "entity" Container
//!     │       ├── Entry "name"  String("crate")
//!     │       ├── Entry "px"    Float(1.5)
//!     │       └── Entry "children" Array [...]
//!     └── Entry "lights"   Array [...]
//! ```
//!
//! Arrays and containers both hold a list of entries. The difference is
//! intent: a container is looked up by name, an array is iterated in order
//! and its entry names are informational.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Float(f32),
    Int(i32),
    Bool(bool),
    String(String),
    Array(Vec<Entry>),
    Container(Vec<Entry>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Container(_) => "container",
        }
    }
}

/// One named value in a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub value: Value,
}

impl Entry {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn float(name: impl Into<String>, value: f32) -> Self {
        Self::new(name, Value::Float(value))
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, Value::Int(value))
    }

    pub fn bool(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, Value::Bool(value))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Value::String(value.into()))
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, Value::Array(Vec::new()))
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self::new(name, Value::Container(Vec::new()))
    }

    /// Builder form of [`push`](Entry::push).
    pub fn with(mut self, entry: Entry) -> Self {
        self.push(entry);
        self
    }

    /// Append a child entry. Ignored (with a warning) on scalar entries.
    pub fn push(&mut self, entry: Entry) {
        match &mut self.value {
            Value::Array(entries) | Value::Container(entries) => entries.push(entry),
            other => log::warn!(
                "document: cannot add '{}' to {} entry '{}'",
                entry.name,
                other.type_name(),
                self.name
            ),
        }
    }

    /// Child entries of an array or container; empty for scalars.
    pub fn children(&self) -> &[Entry] {
        match &self.value {
            Value::Array(entries) | Value::Container(entries) => entries,
            _ => &[],
        }
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Entry> {
        self.children().iter().find(|e| e.name == name)
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.value {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f32),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    // ── Typed lookups ───────────────────────────────────────────────────

    fn require(&self, name: &str) -> Result<&Entry> {
        self.child(name)
            .ok_or_else(|| Error::MissingEntry(format!("{}.{}", self.name, name)))
    }

    fn wrong_type(&self, name: &str, expected: &'static str) -> Error {
        Error::WrongType {
            name: format!("{}.{}", self.name, name),
            expected,
        }
    }

    pub fn get_float(&self, name: &str) -> Result<f32> {
        self.require(name)?
            .as_float()
            .ok_or_else(|| self.wrong_type(name, "float"))
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        self.require(name)?
            .as_int()
            .ok_or_else(|| self.wrong_type(name, "int"))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(name, "bool"))
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| self.wrong_type(name, "string"))
    }

    /// Children of a named array or container entry.
    pub fn get_list(&self, name: &str) -> Result<&[Entry]> {
        let entry = self.require(name)?;
        match &entry.value {
            Value::Array(entries) | Value::Container(entries) => Ok(entries),
            _ => Err(self.wrong_type(name, "array")),
        }
    }

    /// Optional float with a fallback when absent. A present entry of the
    /// wrong type is still an error.
    pub fn float_or(&self, name: &str, default: f32) -> Result<f32> {
        match self.child(name) {
            Some(_) => self.get_float(name),
            None => Ok(default),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.child(name) {
            Some(_) => self.get_bool(name),
            None => Ok(default),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.child(name) {
            Some(_) => self.get_str(name),
            None => Ok(default),
        }
    }
}

/// A whole saved tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub root: Entry,
}

impl Document {
    /// An empty document whose root is a container named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root: Entry::container(root_name),
        }
    }

    pub fn root(&self) -> &Entry {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Entry {
        &mut self.root
    }
}
