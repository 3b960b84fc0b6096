//! JSON:API protocol core
//!
//! Request-side and response-side protocol logic for a JSON:API resource
//! layer: raw HTTP parameters become validated, typed operations against a
//! resource schema, and resolved domain records become a JSON:API document
//! with deduplicated side-loaded includes.
//!
//! Storage, routing, and authorization stay outside: the parser consumes a
//! [`SchemaProvider`] and emits [`Operation`]s it never executes; the
//! serializer consumes already-fetched [`ResourceInstance`]s.
//!
//! # Example
//!
//! ```
//! use jsonapi_core::{parse_request, Action, KeyFormat, SchemaRegistry};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::from_json(json!({
//!     "resources": [{
//!         "type": "posts",
//!         "attributes": ["title", "body"],
//!         "filterable_fields": ["title"],
//!         "sortable_fields": ["title"]
//!     }]
//! }))
//! .unwrap();
//!
//! let params = json!({ "sort": "-title", "title": "Rust" });
//! let parsed = parse_request(
//!     Action::Index,
//!     params.as_object().unwrap(),
//!     "posts",
//!     &registry,
//!     KeyFormat::Camelized,
//! );
//!
//! assert!(parsed.is_valid());
//! assert_eq!(parsed.filters["title"], json!("Rust"));
//! assert_eq!(parsed.sort[0].field, "title");
//! ```
//!
//! Callers must check [`ParsedRequest::errors`] before executing any of the
//! returned operations; a non-empty error list means "render the error
//! document instead".

mod error;
mod format;
mod include;
mod operation;
mod request;
mod resource;
mod schema;
mod serializer;

pub use error::{codes, error_objects, ErrorObject, ProtocolError};
pub use format::{AttributeFormat, KeyFormat};
pub use include::{IncludeNode, IncludeSpec};
pub use operation::{Operation, VerifiedParamSet};
pub use request::{parse_request, Action, ParsedRequest, SortDirection, SortKey};
pub use resource::{Primary, ResourceGraph, ResourceInstance};
pub use schema::{Association, Cardinality, ResourceSchema, SchemaProvider, SchemaRegistry};
pub use serializer::{serialize, SerializeOptions};
