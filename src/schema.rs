//! Resource schema model and the provider contract consumed by the parser
//! and serializer.
//!
//! Schemas are immutable per request: context-dependent concerns such as
//! creatable/updatable field sets are resolved by whoever builds the
//! registry for the current request.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::format::AttributeFormat;

/// Association cardinality, matched exhaustively at every branch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// A declared association on a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub cardinality: Cardinality,
    /// Canonical type name of the association target.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Name of the foreign-key field on the owning resource.
    pub foreign_key: String,
}

/// Declared schema for one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Canonical (unformatted) type name.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Attribute names in declaration order, primary key excluded.
    #[serde(default)]
    pub attributes: Vec<String>,
    /// Format tags for attributes that are not `default`.
    #[serde(default)]
    pub attribute_formats: BTreeMap<String, AttributeFormat>,
    #[serde(default)]
    pub associations: BTreeMap<String, Association>,
    #[serde(default)]
    pub filterable_fields: BTreeSet<String>,
    #[serde(default)]
    pub sortable_fields: BTreeSet<String>,
    #[serde(default)]
    pub creatable_fields: BTreeSet<String>,
    #[serde(default)]
    pub updatable_fields: BTreeSet<String>,
    /// Request-param name carrying the parent key in association actions.
    /// Defaults to the singularized type name suffixed with `_id`.
    #[serde(default)]
    pub parent_key_param: Option<String>,
    /// Keys accepted by `verify_key`. `None` accepts every key.
    #[serde(default)]
    pub known_keys: Option<BTreeSet<String>>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl ResourceSchema {
    /// All selectable field names: attributes then association names.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = self.attributes.clone();
        fields.extend(self.associations.keys().cloned());
        fields
    }

    /// Format tag for an attribute. Primary keys default to `id`.
    pub fn attribute_format(&self, name: &str) -> AttributeFormat {
        if let Some(format) = self.attribute_formats.get(name) {
            return *format;
        }
        if name == self.primary_key {
            AttributeFormat::Id
        } else {
            AttributeFormat::Default
        }
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    pub fn has_association(&self, name: &str) -> bool {
        self.associations.contains_key(name)
    }

    /// The primary key is always filterable; everything else must be
    /// declared in `filterable_fields`.
    pub fn allowed_filter(&self, name: &str) -> bool {
        name == self.primary_key || self.filterable_fields.contains(name)
    }

    /// Param name carrying the parent key in association actions.
    pub fn parent_key_param(&self) -> String {
        match &self.parent_key_param {
            Some(name) => name.clone(),
            None => format!("{}_id", self.type_name.trim_end_matches('s')),
        }
    }
}

/// Contract supplied by the schema/storage layer.
///
/// `verify_key` may perform blocking I/O; the core treats it as synchronous.
pub trait SchemaProvider {
    /// Schema for a canonical type name.
    fn schema(&self, type_name: &str) -> Option<&ResourceSchema>;

    /// Resolve a raw key for a type.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` when the key does not identify a record.
    fn verify_key(&self, type_name: &str, key: &str) -> Result<String, ProtocolError>;

    /// Resolve a batch of keys, failing on the first unknown key.
    fn verify_keys(&self, type_name: &str, keys: &[String]) -> Result<Vec<String>, ProtocolError> {
        keys.iter()
            .map(|key| self.verify_key(type_name, key))
            .collect()
    }
}

/// In-memory schema registry, deserializable from a JSON description.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    resources: BTreeMap<String, ResourceSchema>,
}

#[derive(Deserialize)]
struct RegistryFile {
    resources: Vec<ResourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its canonical type name.
    pub fn insert(&mut self, schema: ResourceSchema) {
        self.resources.insert(schema.type_name.clone(), schema);
    }

    /// Build a registry from a `{"resources": [...]}` JSON document.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error for malformed input.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let file: RegistryFile = serde_json::from_value(value)?;
        let mut registry = Self::new();
        for schema in file.resources {
            registry.insert(schema);
        }
        Ok(registry)
    }
}

impl SchemaProvider for SchemaRegistry {
    fn schema(&self, type_name: &str) -> Option<&ResourceSchema> {
        self.resources.get(type_name)
    }

    fn verify_key(&self, type_name: &str, key: &str) -> Result<String, ProtocolError> {
        let known = self
            .resources
            .get(type_name)
            .and_then(|schema| schema.known_keys.as_ref());
        match known {
            None => Ok(key.to_string()),
            Some(keys) if keys.contains(key) => Ok(key.to_string()),
            Some(_) => Err(ProtocolError::RecordNotFound {
                id: key.to_string(),
            }),
        }
    }
}
