//! Content-type schema model.
//!
//! A [`Schema`] is an immutable snapshot of the content types known to the
//! CMS, handed over by a [`SchemaProvider`]. The generator reads it and never
//! mutates it.

use crate::error::SchemaError;
use crate::naming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether a type describes routable content or an embeddable element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Routable content.
    #[default]
    Content,
    /// Element or mixin-only type.
    Element,
}

/// A content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeModel {
    /// Schema-level alias, e.g. `blogPost`.
    pub alias: String,

    /// Model name override; derived from the alias when absent.
    #[serde(default, rename = "name", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    #[serde(default)]
    pub kind: ItemKind,

    /// Alias of the parent type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    /// Aliases of the composed mixins, in declaration order.
    #[serde(default)]
    pub mixins: Vec<String>,

    /// Properties declared by this type itself.
    #[serde(default)]
    pub properties: Vec<PropertyModel>,
}

/// A property of a content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyModel {
    /// Schema-level alias, stable across renames.
    pub alias: String,

    /// Accessor name override; derived from the alias when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Rust type of the property values, e.g. `String` or `Vec<i64>`.
    pub value_type: String,

    /// Whether this property is excluded from generation.
    #[serde(default)]
    pub ignored: bool,
}

impl TypeModel {
    /// Create a content type with no properties.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            class_name: None,
            kind: ItemKind::Content,
            base: None,
            mixins: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Create an element type with no properties.
    pub fn element(alias: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Element,
            ..Self::new(alias)
        }
    }

    /// Set the model name explicitly.
    pub fn with_class_name(mut self, name: impl Into<String>) -> Self {
        self.class_name = Some(name.into());
        self
    }

    /// Set the parent type.
    pub fn with_base(mut self, alias: impl Into<String>) -> Self {
        self.base = Some(alias.into());
        self
    }

    /// Append a mixin.
    pub fn with_mixin(mut self, alias: impl Into<String>) -> Self {
        self.mixins.push(alias.into());
        self
    }

    /// Append a property.
    pub fn with_property(mut self, property: PropertyModel) -> Self {
        self.properties.push(property);
        self
    }

    /// Model name used in generated code.
    pub fn model_name(&self) -> String {
        match &self.class_name {
            Some(name) if !name.trim().is_empty() => naming::sanitize_class_name(name),
            _ => naming::class_name_for(&self.alias),
        }
    }

    /// Whether this type is an element rather than routable content.
    pub fn is_element(&self) -> bool {
        self.kind == ItemKind::Element
    }
}

impl PropertyModel {
    /// Create a property.
    pub fn new(alias: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            name: None,
            value_type: value_type.into(),
            ignored: false,
        }
    }

    /// Set the accessor name explicitly.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the property as excluded from generation.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Accessor name before marker renames and sanitising.
    pub fn default_local_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => naming::sanitize_class_name(name),
            _ => naming::local_name_for(&self.alias),
        }
    }
}

/// Immutable snapshot of every content type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub types: Vec<TypeModel>,
}

impl Schema {
    /// Create a schema from a list of types.
    pub fn new(types: Vec<TypeModel>) -> Self {
        Self { types }
    }

    /// Look a type up by alias.
    pub fn get(&self, alias: &str) -> Option<&TypeModel> {
        self.types.iter().find(|t| t.alias == alias)
    }

    /// Parse a JSON schema document.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Render the schema as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Source of schema snapshots.
pub trait SchemaProvider: Send + Sync {
    /// Take a snapshot of the current schema.
    fn snapshot(&self) -> Result<Schema, SchemaError>;
}

impl SchemaProvider for Schema {
    fn snapshot(&self) -> Result<Schema, SchemaError> {
        Ok(self.clone())
    }
}

/// Schema provider backed by a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonSchemaFile {
    path: PathBuf,
}

impl JsonSchemaFile {
    /// Create a provider reading the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the schema document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SchemaProvider for JsonSchemaFile {
    fn snapshot(&self) -> Result<Schema, SchemaError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| SchemaError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        Schema::from_json(&content).map_err(|e| SchemaError::Invalid {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }
}
