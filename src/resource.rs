//! Resolved resource instances consumed by the serializer.
//!
//! The storage layer fetches and filters records; the serializer only sees
//! these already-resolved values plus a graph to look related records up in.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::{Map, Value};

/// One resolved record: canonical attribute values plus foreign keys.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceInstance {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
    /// Canonical attribute names to canonical values, in declaration order.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// To-one foreign-key values, keyed by foreign-key name.
    #[serde(default)]
    pub to_one: BTreeMap<String, Option<String>>,
    /// To-many foreign-key values, keyed by foreign-key name.
    #[serde(default)]
    pub to_many: BTreeMap<String, Vec<String>>,
    /// Visibility filter from the authorization layer. `None` means every
    /// declared field is fetchable.
    #[serde(default)]
    pub fetchable_fields: Option<BTreeSet<String>>,
}

impl ResourceInstance {
    /// Whether the visibility filter allows serializing this field.
    pub fn fetchable(&self, field: &str) -> bool {
        match &self.fetchable_fields {
            None => true,
            Some(fields) => fields.contains(field),
        }
    }
}

/// Discriminated primary input for a serialization call.
///
/// Callers state the shape explicitly; the serializer never probes for
/// collection-like behavior.
#[derive(Debug, Clone, Copy)]
pub enum Primary<'a> {
    Single(&'a ResourceInstance),
    Many(&'a [ResourceInstance]),
}

impl<'a> Primary<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a ResourceInstance> {
        match self {
            Primary::Single(resource) => std::slice::from_ref(*resource).iter(),
            Primary::Many(resources) => resources.iter(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Primary::Many(_))
    }
}

/// Lookup table of resolved records keyed by (type, id).
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    records: BTreeMap<(String, String), ResourceInstance>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: ResourceInstance) {
        self.records
            .insert((resource.type_name.clone(), resource.id.clone()), resource);
    }

    pub fn get(&self, type_name: &str, id: &str) -> Option<&ResourceInstance> {
        self.records
            .get(&(type_name.to_string(), id.to_string()))
    }

    pub fn from_resources(resources: Vec<ResourceInstance>) -> Self {
        let mut graph = Self::new();
        for resource in resources {
            graph.insert(resource);
        }
        graph
    }
}
