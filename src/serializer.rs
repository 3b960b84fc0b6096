//! Document serialization - resolved resources plus an include graph to a
//! JSON:API document.
//!
//! The serializer walks the primary resources and every requested include
//! path, registering each distinct (type, id) pair at most once. A resource
//! reached again through a second path is never rebuilt; its fragment is
//! reused, and it is promoted into `data` if it later turns out to also be a
//! primary result. A malformed include spec or a record missing from the
//! graph is a contract violation and panics rather than producing a
//! recoverable error.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::format::{AttributeFormat, KeyFormat};
use crate::include::IncludeSpec;
use crate::resource::{Primary, ResourceGraph, ResourceInstance};
use crate::schema::{Association, Cardinality, ResourceSchema, SchemaProvider};

/// Caller-supplied serialization inputs.
#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions<'a> {
    /// Canonical type name to selected canonical field names. A missing
    /// type key selects all fetchable fields for that type.
    pub fields: &'a BTreeMap<String, Vec<String>>,
    /// Canonical dotted include paths.
    pub include: &'a [String],
    pub key_format: KeyFormat,
    pub base_url: &'a str,
}

/// Serialize primary resources into a JSON:API document.
///
/// The `data` member preserves the input shape (object for
/// [`Primary::Single`], array for [`Primary::Many`]); `included` is present
/// only when at least one side-loaded fragment exists.
pub fn serialize(
    primary: Primary<'_>,
    graph: &ResourceGraph,
    provider: &dyn SchemaProvider,
    options: &SerializeOptions<'_>,
) -> Value {
    let include_spec = IncludeSpec::parse(options.include);

    let mut serializer = Serializer {
        graph,
        provider,
        fields: options.fields,
        key_format: options.key_format,
        base_url: options.base_url,
        linked: LinkedObjects::default(),
    };

    for resource in primary.iter() {
        serializer.process_primary(resource, &include_spec);
    }

    serializer.into_document(primary.is_collection())
}

/// Per-call registry of every serialized fragment, keyed by
/// (formatted type, id). Insertion is idempotent; re-registration can only
/// promote an entry from side-loaded to primary.
#[derive(Debug, Default)]
struct LinkedObjects {
    objects: BTreeMap<(String, String), LinkedObject>,
    primary_order: Vec<(String, String)>,
}

#[derive(Debug)]
struct LinkedObject {
    primary: bool,
    fragment: Map<String, Value>,
}

impl LinkedObjects {
    fn contains(&self, key: &(String, String)) -> bool {
        self.objects.contains_key(key)
    }

    fn insert(&mut self, key: (String, String), fragment: Map<String, Value>, primary: bool) {
        if self.objects.contains_key(&key) {
            if primary {
                self.promote(&key);
            }
            return;
        }
        self.objects.insert(
            key.clone(),
            LinkedObject { primary, fragment },
        );
        if primary {
            self.primary_order.push(key);
        }
    }

    fn promote(&mut self, key: &(String, String)) {
        if let Some(object) = self.objects.get_mut(key) {
            if !object.primary {
                object.primary = true;
                self.primary_order.push(key.clone());
            }
        }
    }
}

struct Serializer<'a> {
    graph: &'a ResourceGraph,
    provider: &'a dyn SchemaProvider,
    fields: &'a BTreeMap<String, Vec<String>>,
    key_format: KeyFormat,
    base_url: &'a str,
    linked: LinkedObjects,
}

impl<'a> Serializer<'a> {
    fn format_key(&self, key: &str) -> String {
        self.key_format.format(key)
    }

    fn schema_for(&self, resource: &ResourceInstance) -> &'a ResourceSchema {
        match self.provider.schema(&resource.type_name) {
            Some(schema) => schema,
            None => panic!("no schema registered for type {}", resource.type_name),
        }
    }

    fn object_key(&self, type_name: &str, id: &str) -> (String, String) {
        (self.format_key(type_name), id.to_string())
    }

    fn process_primary(&mut self, resource: &ResourceInstance, include: &IncludeSpec) {
        let key = self.object_key(&resource.type_name, &resource.id);
        if self.linked.contains(&key) {
            // Fragment already built through an earlier include path; keep
            // it, promote it, and still walk this level's includes.
            self.linked.promote(&key);
            let schema = self.schema_for(resource);
            self.links_hash(resource, schema, include);
        } else {
            let fragment = self.object_hash(resource, include);
            self.linked.insert(key, fragment, true);
        }
    }

    /// Full document fragment for one resource: selected attributes, the
    /// mandatory `type` and `id` members, and the links block.
    fn object_hash(&mut self, resource: &ResourceInstance, include: &IncludeSpec) -> Map<String, Value> {
        let schema = self.schema_for(resource);
        let mut fragment = self.attribute_hash(resource, schema);
        let links = self.links_hash(resource, schema, include);

        fragment.insert(
            "type".to_string(),
            Value::String(self.format_key(&resource.type_name)),
        );
        fragment.insert(
            "id".to_string(),
            AttributeFormat::Id.format(&Value::String(resource.id.clone())),
        );
        fragment.insert("links".to_string(), Value::Object(links));
        fragment
    }

    /// Attribute members, intersected with the visibility filter and the
    /// caller's field selection.
    fn attribute_hash(
        &self,
        resource: &ResourceInstance,
        schema: &ResourceSchema,
    ) -> Map<String, Value> {
        let requested = self.fields.get(&schema.type_name);

        let mut fragment = Map::new();
        for name in &schema.attributes {
            if !resource.fetchable(name) {
                continue;
            }
            if let Some(requested) = requested {
                if !requested.contains(name) {
                    continue;
                }
            }
            let value = resource.attributes.get(name).unwrap_or(&Value::Null);
            fragment.insert(
                self.format_key(name),
                schema.attribute_format(name).format(value),
            );
        }
        fragment
    }

    /// Links block for one resource, also descending into every included
    /// association to register side-loaded fragments.
    fn links_hash(
        &mut self,
        resource: &ResourceInstance,
        schema: &ResourceSchema,
        include: &IncludeSpec,
    ) -> Map<String, Value> {
        let requested = self.fields.get(&schema.type_name);
        let self_href = self.self_href(resource);

        let mut links = Map::new();
        links.insert("self".to_string(), Value::String(self_href.clone()));

        for (name, assoc) in &schema.associations {
            if !resource.fetchable(name) {
                continue;
            }

            let node = include.get(name);
            let materialize = node.map(|n| n.include).unwrap_or(false);
            let descend = node.map(|n| n.include_children).unwrap_or(false);
            let selected = requested.map(|fields| fields.contains(name)).unwrap_or(true);

            if selected {
                links.insert(
                    self.format_key(name),
                    self.link_object(resource, name, assoc, &self_href, materialize),
                );
            }

            // Even an already-registered target may have children that were
            // not captured yet, so traversal cannot stop at the dedup check.
            if materialize || descend {
                let empty = IncludeSpec::default();
                let children = node.map(|n| &n.children).unwrap_or(&empty);
                match assoc.cardinality {
                    Cardinality::ToOne => {
                        let related = resource.to_one.get(&assoc.foreign_key).cloned().flatten();
                        if let Some(id) = related {
                            self.process_related(assoc, &id, materialize, descend, children);
                        }
                    }
                    Cardinality::ToMany => {
                        let ids = resource
                            .to_many
                            .get(&assoc.foreign_key)
                            .cloned()
                            .unwrap_or_default();
                        for id in &ids {
                            self.process_related(assoc, id, materialize, descend, children);
                        }
                    }
                }
            }
        }
        links
    }

    fn process_related(
        &mut self,
        assoc: &Association,
        id: &str,
        materialize: bool,
        descend: bool,
        children: &IncludeSpec,
    ) {
        let key = self.object_key(&assoc.type_name, id);
        let already = self.linked.contains(&key);

        let Some(related) = self.graph.get(&assoc.type_name, id) else {
            panic!("resource {}/{id} not present in graph", assoc.type_name);
        };

        if materialize && !already {
            let fragment = self.object_hash(related, children);
            self.linked.insert(key, fragment, false);
        } else if descend || already {
            let schema = self.schema_for(related);
            self.links_hash(related, schema, children);
        }
    }

    fn link_object(
        &self,
        resource: &ResourceInstance,
        name: &str,
        assoc: &Association,
        self_href: &str,
        materialize: bool,
    ) -> Value {
        let route = self.format_key(name);

        let mut link = Map::new();
        link.insert(
            "self".to_string(),
            Value::String(format!("{self_href}/links/{route}")),
        );
        link.insert(
            "resource".to_string(),
            Value::String(format!("{self_href}/{route}")),
        );

        if materialize {
            link.insert(
                "type".to_string(),
                Value::String(self.format_key(&assoc.type_name)),
            );
            match assoc.cardinality {
                Cardinality::ToOne => {
                    let id = resource.to_one.get(&assoc.foreign_key).cloned().flatten();
                    let id = match id {
                        Some(id) => AttributeFormat::Id.format(&Value::String(id)),
                        None => Value::Null,
                    };
                    link.insert("id".to_string(), id);
                }
                Cardinality::ToMany => {
                    let ids = resource
                        .to_many
                        .get(&assoc.foreign_key)
                        .cloned()
                        .unwrap_or_default();
                    let ids = ids
                        .into_iter()
                        .map(|id| AttributeFormat::Id.format(&Value::String(id)))
                        .collect();
                    link.insert("ids".to_string(), Value::Array(ids));
                }
            }
        }
        Value::Object(link)
    }

    fn self_href(&self, resource: &ResourceInstance) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.format_key(&resource.type_name),
            resource.id
        )
    }

    fn into_document(self, is_collection: bool) -> Value {
        let LinkedObjects {
            objects,
            primary_order,
        } = self.linked;

        let mut primary: Vec<Value> = Vec::with_capacity(primary_order.len());
        for key in &primary_order {
            if let Some(object) = objects.get(key) {
                primary.push(Value::Object(object.fragment.clone()));
            }
        }

        let included: Vec<Value> = objects
            .values()
            .filter(|object| !object.primary)
            .map(|object| Value::Object(object.fragment.clone()))
            .collect();

        let data = if is_collection {
            Value::Array(primary)
        } else {
            primary.into_iter().next().unwrap_or(Value::Null)
        };

        let mut document = Map::new();
        document.insert("data".to_string(), data);
        if !included.is_empty() {
            document.insert("included".to_string(), Value::Array(included));
        }
        Value::Object(document)
    }
}
