//! Request parsing - raw action parameters to typed operations.
//!
//! `parse_request` never fails for validation problems: every recoverable
//! fault becomes an entry in [`ParsedRequest::errors`]. Independent sections
//! (fields, include, filter, sort) are parsed even when another section has
//! already failed; a fault inside one mutation payload aborts only that
//! payload, and bulk array elements are parsed independently.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::format::{display_value, scalar_to_string, KeyFormat};
use crate::operation::{Operation, VerifiedParamSet};
use crate::schema::{Association, Cardinality, ResourceSchema, SchemaProvider};

/// Request parameters that are never treated as filters.
const ALLOWED_REQUEST_PARAMS: &[&str] = &[
    "include",
    "fields",
    "format",
    "controller",
    "action",
    "sort",
    "page",
];

/// Inbound controller action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Index,
    Show,
    ShowAssociation,
    Create,
    CreateAssociation,
    Update,
    UpdateAssociation,
    Destroy,
    DestroyAssociation,
}

impl Action {
    /// Parse an action name. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "index" => Some(Action::Index),
            "show" => Some(Action::Show),
            "show_association" => Some(Action::ShowAssociation),
            "create" => Some(Action::Create),
            "create_association" => Some(Action::CreateAssociation),
            "update" => Some(Action::Update),
            "update_association" => Some(Action::UpdateAssociation),
            "destroy" => Some(Action::Destroy),
            "destroy_association" => Some(Action::DestroyAssociation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One element of the requested ordering, direction already split off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Everything the parser extracted from one request.
///
/// Callers must check `errors` before executing `operations`.
#[derive(Debug, Clone, Default)]
pub struct ParsedRequest {
    /// Canonical type name to canonical selected field names.
    pub fields: BTreeMap<String, Vec<String>>,
    /// Requested include paths, canonical, in request order. Paths that
    /// failed validation are retained; `errors` records the failures.
    pub include: Vec<String>,
    /// Validated filters; values are passed through raw.
    pub filters: BTreeMap<String, Value>,
    pub sort: Vec<SortKey>,
    pub operations: Vec<Operation>,
    pub errors: Vec<ProtocolError>,
}

impl ParsedRequest {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse one action's raw parameters against the primary resource type.
///
/// An unknown `primary_type` yields a single `InvalidResource` error and no
/// further parsing; callers are expected to have routed to a real type.
pub fn parse_request(
    action: Action,
    params: &Map<String, Value>,
    primary_type: &str,
    provider: &dyn SchemaProvider,
    key_format: KeyFormat,
) -> ParsedRequest {
    let Some(schema) = provider.schema(primary_type) else {
        return ParsedRequest {
            errors: vec![ProtocolError::InvalidResource {
                resource: primary_type.to_string(),
            }],
            ..ParsedRequest::default()
        };
    };

    let mut parser = Parser {
        schema,
        provider,
        key_format,
        out: ParsedRequest::default(),
    };

    match action {
        Action::Index => {
            parser.parse_fields(params);
            parser.parse_include(params);
            parser.parse_filters(params);
            parser.parse_sort(params);
        }
        Action::Show => {
            parser.parse_fields(params);
            parser.parse_include(params);
        }
        Action::ShowAssociation => {}
        Action::Create => {
            parser.parse_fields(params);
            parser.parse_include(params);
            parser.parse_create(params);
        }
        Action::Update => {
            parser.parse_fields(params);
            parser.parse_include(params);
            parser.parse_update(params);
        }
        Action::Destroy => parser.parse_destroy(params),
        Action::CreateAssociation => parser.parse_association_mutation(params, AssocMutation::Create),
        Action::UpdateAssociation => {
            parser.parse_association_mutation(params, AssocMutation::Replace)
        }
        Action::DestroyAssociation => parser.parse_destroy_association(params),
    }

    parser.out
}

#[derive(Clone, Copy)]
enum AssocMutation {
    Create,
    Replace,
}

/// To-one relationship reference after shape validation.
enum ToOneLink {
    /// `null` - clear the association.
    Clear,
    Ref { type_name: String, id: Option<String> },
}

struct Parser<'a> {
    schema: &'a ResourceSchema,
    provider: &'a dyn SchemaProvider,
    key_format: KeyFormat,
    out: ParsedRequest,
}

impl<'a> Parser<'a> {
    fn format_key(&self, key: &str) -> String {
        self.key_format.format(key)
    }

    fn unformat_key(&self, key: &str) -> String {
        self.key_format.unformat(key)
    }

    fn error(&mut self, error: ProtocolError) {
        self.out.errors.push(error);
    }

    // --- Field selection ---

    fn parse_fields(&mut self, params: &Map<String, Value>) {
        let Some(raw) = params.get("fields") else {
            return;
        };

        // Either one comma-separated list for the primary type, or a
        // per-type mapping of comma-separated lists.
        let mut requested: Vec<(String, Option<Vec<String>>)> = Vec::new();
        match raw {
            Value::String(_) => {
                let wire_type = self.format_key(&self.schema.type_name);
                requested.push((wire_type, field_list(raw)));
            }
            Value::Object(map) => {
                for (wire_type, value) in map {
                    requested.push((wire_type.clone(), field_list(value)));
                }
            }
            _ => return,
        }

        for (wire_type, values) in requested {
            let canonical_type = self.unformat_key(&wire_type);
            let type_schema = self.provider.schema(&canonical_type);
            let resolvable = canonical_type == self.schema.type_name
                || self.schema.has_association(&canonical_type);

            let Some(type_schema) = type_schema.filter(|_| resolvable) else {
                self.error(ProtocolError::InvalidResource {
                    resource: wire_type,
                });
                continue;
            };

            let Some(values) = values else {
                self.error(ProtocolError::InvalidField {
                    type_name: wire_type,
                    field: "nil".to_string(),
                });
                continue;
            };

            let mut valid_fields: Vec<String> =
                vec![self.format_key(&type_schema.primary_key)];
            valid_fields.extend(type_schema.fields().iter().map(|f| self.format_key(f)));

            let mut selected = Vec::new();
            for field in values {
                if valid_fields.contains(&field) {
                    selected.push(self.unformat_key(&field));
                } else {
                    self.error(ProtocolError::InvalidField {
                        type_name: wire_type.clone(),
                        field,
                    });
                }
            }
            self.out.fields.insert(canonical_type, selected);
        }
    }

    // --- Include ---

    fn parse_include(&mut self, params: &Map<String, Value>) {
        let Some(Value::String(raw)) = params.get("include") else {
            return;
        };
        if raw.is_empty() {
            return;
        }

        for path in parse_comma_list(raw) {
            self.check_include_path(&path);
            self.out.include.push(self.unformat_path(&path));
        }
    }

    fn unformat_path(&self, path: &str) -> String {
        path.split('.')
            .map(|segment| self.unformat_key(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Validate every dot-separated segment against the association chain.
    /// The first invalid segment records one error and stops this path.
    fn check_include_path(&mut self, path: &str) {
        let mut current = self.schema;
        for segment in path.split('.') {
            let canonical = self.unformat_key(segment);
            let next = current
                .association(&canonical)
                .and_then(|assoc| self.provider.schema(&assoc.type_name));
            match next {
                Some(schema) => current = schema,
                None => {
                    self.error(ProtocolError::InvalidInclude {
                        resource: self.format_key(&current.type_name),
                        association: segment.to_string(),
                    });
                    return;
                }
            }
        }
    }

    // --- Filters ---

    fn parse_filters(&mut self, params: &Map<String, Value>) {
        for (key, value) in params {
            if ALLOWED_REQUEST_PARAMS.contains(&key.as_str()) {
                continue;
            }

            // ids is a synonym for the primary-key filter
            let filter = if key == "ids" {
                self.schema.primary_key.clone()
            } else {
                self.unformat_key(key)
            };

            if self.schema.allowed_filter(&filter) {
                self.out.filters.insert(filter, value.clone());
            } else {
                self.error(ProtocolError::FilterNotAllowed { filter });
            }
        }
    }

    // --- Sort ---

    fn parse_sort(&mut self, params: &Map<String, Value>) {
        let Some(Value::String(raw)) = params.get("sort") else {
            return;
        };
        if raw.is_empty() {
            return;
        }

        for token in parse_comma_list(raw) {
            // The dash is direction, not part of the name; strip it before
            // unformatting.
            let (direction, name) = match token.strip_prefix('-') {
                Some(rest) => (SortDirection::Desc, rest),
                None => (SortDirection::Asc, token.as_str()),
            };
            let field = self.unformat_key(name);

            if !self.schema.sortable_fields.contains(&field) {
                self.error(ProtocolError::InvalidSortParam {
                    resource: self.format_key(&self.schema.type_name),
                    sort_param: field.clone(),
                });
            }
            self.out.sort.push(SortKey { field, direction });
        }
    }

    // --- Create ---

    fn parse_create(&mut self, params: &Map<String, Value>) {
        let Some(data) = params.get("data") else {
            self.error(ProtocolError::ParameterMissing {
                param: "data".to_string(),
            });
            return;
        };

        match data {
            Value::Array(elements) => {
                for element in elements {
                    if let Err(error) = self.parse_single_create(element) {
                        self.error(error);
                    }
                }
            }
            other => {
                if let Err(error) = self.parse_single_create(other) {
                    self.error(error);
                }
            }
        }
    }

    fn parse_single_create(&mut self, raw: &Value) -> Result<(), ProtocolError> {
        let object = expect_object(raw)?;
        let object = self.verify_and_remove_type(object)?;
        let params = self.parse_params(object, &self.schema.creatable_fields)?;
        self.out.operations.push(Operation::CreateResource {
            type_name: self.schema.type_name.clone(),
            params,
        });
        Ok(())
    }

    // --- Update ---

    fn parse_update(&mut self, params: &Map<String, Value>) {
        let Some(data) = params.get("data") else {
            self.error(ProtocolError::ParameterMissing {
                param: "data".to_string(),
            });
            return;
        };

        let primary_key = self.schema.primary_key.clone();
        let url_keys = match params.get(&primary_key).and_then(key_list) {
            Some(keys) if !keys.is_empty() => keys,
            _ => {
                self.error(ProtocolError::ParameterMissing { param: primary_key });
                return;
            }
        };

        match data {
            Value::Array(elements) => {
                if elements.len() != url_keys.len() {
                    self.error(ProtocolError::CountMismatch);
                    return;
                }
                for element in elements {
                    if let Err(error) = self.parse_single_replace(element, &url_keys, true) {
                        self.error(error);
                    }
                }
            }
            other => {
                if let Err(error) = self.parse_single_replace(other, &url_keys, false) {
                    self.error(error);
                }
            }
        }
    }

    fn parse_single_replace(
        &mut self,
        raw: &Value,
        url_keys: &[String],
        bulk: bool,
    ) -> Result<(), ProtocolError> {
        let object = expect_object(raw)?;
        let primary_key = self.schema.primary_key.clone();

        let body_key = object
            .get(&primary_key)
            .filter(|v| !v.is_null())
            .map(|v| scalar_to_string(v).ok_or_else(|| invalid_links_object(v)))
            .transpose()?;

        let key = if bulk {
            let Some(body_key) = body_key else {
                return Err(ProtocolError::MissingKey);
            };
            if !url_keys.contains(&body_key) {
                return Err(ProtocolError::KeyNotIncludedInURL { key: body_key });
            }
            body_key
        } else {
            let url_key = url_keys[0].clone();
            if let Some(body_key) = body_key {
                if body_key != url_key {
                    return Err(ProtocolError::KeyNotIncludedInURL { key: body_key });
                }
            }
            url_key
        };

        let mut object = self.verify_and_remove_type(object)?;
        object.shift_remove(&primary_key);
        let params = self.parse_params(object, &self.schema.updatable_fields)?;
        self.out.operations.push(Operation::ReplaceFields {
            type_name: self.schema.type_name.clone(),
            key,
            params,
        });
        Ok(())
    }

    // --- Destroy ---

    fn parse_destroy(&mut self, params: &Map<String, Value>) {
        let primary_key = self.schema.primary_key.clone();
        let Some(raw_keys) = params.get(&primary_key).and_then(key_list) else {
            self.error(ProtocolError::ParameterMissing { param: primary_key });
            return;
        };

        match self.provider.verify_keys(&self.schema.type_name, &raw_keys) {
            Ok(keys) => {
                for key in keys {
                    self.out.operations.push(Operation::RemoveResource {
                        type_name: self.schema.type_name.clone(),
                        key,
                    });
                }
            }
            Err(error) => self.error(error),
        }
    }

    // --- Association mutations ---

    fn parse_association_mutation(&mut self, params: &Map<String, Value>, mutation: AssocMutation) {
        if let Err(error) = self.try_association_mutation(params, mutation) {
            self.error(error);
        }
    }

    fn try_association_mutation(
        &mut self,
        params: &Map<String, Value>,
        mutation: AssocMutation,
    ) -> Result<(), ProtocolError> {
        let (name, cardinality) = self.association_target(params)?;
        let parent_key = self.parent_key(params)?;

        let wire_name = self.format_key(&name);
        let value = params
            .get(&wire_name)
            .filter(|v| !v.is_null())
            .ok_or(ProtocolError::ParameterMissing { param: wire_name.clone() })?;

        // Route the value through the same permitted-field and link-object
        // checks as an update payload.
        let mut links = Map::new();
        links.insert(wire_name.clone(), value.clone());
        let mut object = Map::new();
        object.insert("links".to_string(), Value::Object(links));
        let verified = self.parse_params(object, &self.schema.updatable_fields)?;

        let type_name = self.schema.type_name.clone();
        let operation = match (cardinality, mutation) {
            (Cardinality::ToOne, AssocMutation::Create) => Operation::CreateHasOneAssociation {
                type_name,
                parent_key,
                association: name.clone(),
                key: verified.has_one.get(&name).cloned().unwrap_or(None),
            },
            (Cardinality::ToOne, AssocMutation::Replace) => Operation::ReplaceHasOneAssociation {
                type_name,
                parent_key,
                association: name.clone(),
                key: verified.has_one.get(&name).cloned().unwrap_or(None),
            },
            (Cardinality::ToMany, AssocMutation::Create) => Operation::CreateHasManyAssociation {
                type_name,
                parent_key,
                association: name.clone(),
                keys: verified.has_many.get(&name).cloned().unwrap_or_default(),
            },
            (Cardinality::ToMany, AssocMutation::Replace) => Operation::ReplaceHasManyAssociation {
                type_name,
                parent_key,
                association: name.clone(),
                keys: verified.has_many.get(&name).cloned().unwrap_or_default(),
            },
        };
        self.out.operations.push(operation);
        Ok(())
    }

    fn parse_destroy_association(&mut self, params: &Map<String, Value>) {
        if let Err(error) = self.try_destroy_association(params) {
            self.error(error);
        }
    }

    fn try_destroy_association(&mut self, params: &Map<String, Value>) -> Result<(), ProtocolError> {
        let (name, cardinality) = self.association_target(params)?;
        let parent_key = self.parent_key(params)?;
        let type_name = self.schema.type_name.clone();

        match cardinality {
            Cardinality::ToMany => {
                let raw_keys = params
                    .get("keys")
                    .and_then(key_list)
                    .ok_or(ProtocolError::ParameterMissing {
                        param: "keys".to_string(),
                    })?;
                let target_type = self
                    .schema
                    .association(&name)
                    .map(|assoc| assoc.type_name.clone())
                    .unwrap_or_else(|| type_name.clone());
                let keys = self.provider.verify_keys(&target_type, &raw_keys)?;
                for key in keys {
                    self.out.operations.push(Operation::RemoveHasManyAssociation {
                        type_name: type_name.clone(),
                        parent_key: parent_key.clone(),
                        association: name.clone(),
                        key,
                    });
                }
            }
            Cardinality::ToOne => {
                self.out.operations.push(Operation::RemoveHasOneAssociation {
                    type_name,
                    parent_key,
                    association: name,
                });
            }
        }
        Ok(())
    }

    fn association_target(
        &self,
        params: &Map<String, Value>,
    ) -> Result<(String, Cardinality), ProtocolError> {
        let raw = params
            .get("association")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::ParameterMissing {
                param: "association".to_string(),
            })?;
        let name = self.unformat_key(raw);
        match self.schema.association(&name) {
            Some(assoc) => Ok((name, assoc.cardinality)),
            None => Err(ProtocolError::InvalidField {
                type_name: self.schema.type_name.clone(),
                field: raw.to_string(),
            }),
        }
    }

    fn parent_key(&self, params: &Map<String, Value>) -> Result<String, ProtocolError> {
        let param = self.schema.parent_key_param();
        params
            .get(&param)
            .and_then(scalar_to_string)
            .ok_or(ProtocolError::ParameterMissing { param })
    }

    // --- Payload validation ---

    /// Remove the `type` member, checking it names the primary type.
    fn verify_and_remove_type(
        &self,
        object: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ProtocolError> {
        match object.get("type") {
            None | Some(Value::Null) => Err(ProtocolError::ParameterMissing {
                param: "type".to_string(),
            }),
            Some(Value::String(t)) if *t == self.schema.type_name => {
                let mut object = object.clone();
                object.shift_remove("type");
                Ok(object)
            }
            Some(other) => Err(ProtocolError::TypeMismatch {
                type_name: display_value(other),
            }),
        }
    }

    /// Validate a flat payload against the permitted-fields set, producing
    /// the verified attribute and association sections.
    ///
    /// The whole payload fails on the first fault; unrecognized keys are
    /// reported together in one `ParametersNotAllowed`.
    fn parse_params(
        &self,
        mut object: Map<String, Value>,
        permitted: &BTreeSet<String>,
    ) -> Result<VerifiedParamSet, ProtocolError> {
        // Relationship references live under `links`; flatten them into the
        // same namespace as attributes for the permitted check.
        if let Some(links) = object.shift_remove("links") {
            match links {
                Value::Object(links) => {
                    for (key, value) in links {
                        object.insert(key, value);
                    }
                }
                other => return Err(invalid_links_object(&other)),
            }
        }

        self.verify_permitted_params(&object, permitted)?;

        let mut verified = VerifiedParamSet::default();
        for (key, value) in &object {
            let name = self.unformat_key(key);
            match self.schema.association(&name) {
                Some(assoc) => match assoc.cardinality {
                    Cardinality::ToOne => {
                        let key = self.parse_to_one_reference(assoc, value)?;
                        verified.has_one.insert(name, key);
                    }
                    Cardinality::ToMany => {
                        let keys = self.parse_to_many_reference(assoc, value)?;
                        verified.has_many.insert(name, keys);
                    }
                },
                None => {
                    let format = self.schema.attribute_format(&name);
                    let unformatted = format.unformat(&name, value)?;
                    verified.attributes.insert(name, unformatted);
                }
            }
        }
        Ok(verified)
    }

    fn verify_permitted_params(
        &self,
        object: &Map<String, Value>,
        permitted: &BTreeSet<String>,
    ) -> Result<(), ProtocolError> {
        let formatted: Vec<String> = permitted.iter().map(|f| self.format_key(f)).collect();
        let offenders: Vec<String> = object
            .keys()
            .filter(|key| !formatted.contains(key))
            .cloned()
            .collect();
        if offenders.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ParametersNotAllowed { params: offenders })
        }
    }

    fn parse_to_one_reference(
        &self,
        assoc: &Association,
        value: &Value,
    ) -> Result<Option<String>, ProtocolError> {
        match parse_to_one_link(value)? {
            ToOneLink::Clear => Ok(None),
            ToOneLink::Ref { type_name, id } => {
                if type_name != assoc.type_name {
                    return Err(ProtocolError::TypeMismatch { type_name });
                }
                match id {
                    None => Ok(None),
                    Some(id) => Ok(Some(self.provider.verify_key(&assoc.type_name, &id)?)),
                }
            }
        }
    }

    fn parse_to_many_reference(
        &self,
        assoc: &Association,
        value: &Value,
    ) -> Result<Vec<String>, ProtocolError> {
        let groups = parse_to_many_link(value)?;
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        if groups.len() > 1 || !groups.contains_key(&assoc.type_name) {
            let offender = groups
                .keys()
                .find(|t| **t != assoc.type_name)
                .cloned()
                .unwrap_or_else(|| assoc.type_name.clone());
            return Err(ProtocolError::TypeMismatch {
                type_name: offender,
            });
        }
        let ids = &groups[&assoc.type_name];
        self.provider.verify_keys(&assoc.type_name, ids)
    }
}

// --- Link object shapes ---

fn parse_to_one_link(raw: &Value) -> Result<ToOneLink, ProtocolError> {
    match raw {
        Value::Null => Ok(ToOneLink::Clear),
        Value::Object(map) => {
            if map.len() != 2 || !map.contains_key("type") || !map.contains_key("id") {
                return Err(invalid_links_object(raw));
            }
            let type_name = display_value(&map["type"]);
            let id = match &map["id"] {
                Value::Null => None,
                value => Some(scalar_to_string(value).ok_or_else(|| invalid_links_object(raw))?),
            };
            Ok(ToOneLink::Ref { type_name, id })
        }
        _ => Err(invalid_links_object(raw)),
    }
}

/// Returns ids grouped by referenced type. An empty collection is a valid
/// "replace with nothing"; `null` is not.
fn parse_to_many_link(raw: &Value) -> Result<BTreeMap<String, Vec<String>>, ProtocolError> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    match raw {
        Value::Object(map) if map.is_empty() => Ok(groups),
        Value::Object(map) => {
            let ids = match map.get("ids") {
                Some(Value::Array(ids)) => ids,
                _ => return Err(invalid_links_object(raw)),
            };
            if map.len() != 2 || !map.contains_key("type") {
                return Err(invalid_links_object(raw));
            }
            let type_name = display_value(&map["type"]);
            let mut keys = Vec::with_capacity(ids.len());
            for id in ids {
                keys.push(scalar_to_string(id).ok_or_else(|| invalid_links_object(raw))?);
            }
            groups.insert(type_name, keys);
            Ok(groups)
        }
        Value::Array(elements) => {
            for element in elements {
                match parse_to_one_link(element)? {
                    ToOneLink::Ref {
                        type_name,
                        id: Some(id),
                    } => groups.entry(type_name).or_default().push(id),
                    _ => return Err(invalid_links_object(element)),
                }
            }
            Ok(groups)
        }
        _ => Err(invalid_links_object(raw)),
    }
}

fn invalid_links_object(value: &Value) -> ProtocolError {
    ProtocolError::InvalidLinksObject {
        value: display_value(value),
    }
}

// --- Raw parameter helpers ---

fn expect_object(raw: &Value) -> Result<&Map<String, Value>, ProtocolError> {
    raw.as_object().ok_or_else(|| invalid_links_object(raw))
}

/// A comma-separated field list; `None` for an absent/empty value.
fn field_list(raw: &Value) -> Option<Vec<String>> {
    match raw {
        Value::String(s) if !s.is_empty() => Some(parse_comma_list(s)),
        _ => None,
    }
}

/// URL key parameter: a single scalar, a comma-separated string, or an array.
fn key_list(raw: &Value) -> Option<Vec<String>> {
    match raw {
        Value::String(s) if !s.is_empty() => Some(parse_comma_list(s)),
        Value::Number(_) => Some(vec![display_value(raw)]),
        Value::Array(values) => values.iter().map(scalar_to_string).collect(),
        _ => None,
    }
}

/// Split a comma-separated list, honoring double-quoted entries so one
/// malformed or comma-bearing value cannot corrupt its neighbors.
pub(crate) fn parse_comma_list(raw: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                // Doubled quote is an escaped literal quote.
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    entries.push(current);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parse() {
        assert_eq!(Action::parse("index"), Some(Action::Index));
        assert_eq!(
            Action::parse("destroy_association"),
            Some(Action::DestroyAssociation)
        );
        assert_eq!(Action::parse("patch"), None);
    }

    #[test]
    fn comma_list_plain() {
        assert_eq!(parse_comma_list("a,b,c"), ["a", "b", "c"]);
    }

    #[test]
    fn comma_list_quoted_comma() {
        assert_eq!(parse_comma_list(r#""a,b",c"#), ["a,b", "c"]);
    }

    #[test]
    fn comma_list_escaped_quote() {
        assert_eq!(parse_comma_list(r#""say ""hi""",x"#), [r#"say "hi""#, "x"]);
    }

    #[test]
    fn comma_list_unterminated_quote_stays_local() {
        // The malformed entry absorbs its own tail only.
        assert_eq!(parse_comma_list(r#"a,"b,c"#), ["a", "b,c"]);
    }

    #[test]
    fn key_list_shapes() {
        assert_eq!(key_list(&Value::String("8,9".into())).unwrap(), ["8", "9"]);
        assert_eq!(key_list(&serde_json::json!(7)).unwrap(), ["7"]);
        assert_eq!(
            key_list(&serde_json::json!(["1", 2])).unwrap(),
            ["1", "2"]
        );
        assert!(key_list(&Value::Null).is_none());
    }

    #[test]
    fn to_one_link_shapes() {
        assert!(matches!(
            parse_to_one_link(&Value::Null).unwrap(),
            ToOneLink::Clear
        ));
        assert!(matches!(
            parse_to_one_link(&serde_json::json!({"type": "tags"})),
            Err(ProtocolError::InvalidLinksObject { .. })
        ));
        match parse_to_one_link(&serde_json::json!({"type": "tags", "id": 5})).unwrap() {
            ToOneLink::Ref { type_name, id } => {
                assert_eq!(type_name, "tags");
                assert_eq!(id.as_deref(), Some("5"));
            }
            ToOneLink::Clear => panic!("expected a reference"),
        }
    }

    #[test]
    fn to_many_link_shapes() {
        assert!(matches!(
            parse_to_many_link(&Value::Null),
            Err(ProtocolError::InvalidLinksObject { .. })
        ));
        assert!(parse_to_many_link(&serde_json::json!([])).unwrap().is_empty());
        assert!(parse_to_many_link(&serde_json::json!({})).unwrap().is_empty());

        let groups =
            parse_to_many_link(&serde_json::json!({"type": "tags", "ids": [3, 4]})).unwrap();
        assert_eq!(groups["tags"], ["3", "4"]);

        let groups = parse_to_many_link(&serde_json::json!([
            {"type": "tags", "id": "3"},
            {"type": "tags", "id": "4"}
        ]))
        .unwrap();
        assert_eq!(groups["tags"], ["3", "4"]);
    }
}
