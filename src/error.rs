//! Protocol error taxonomy for JSON:API request parsing.
//!
//! Every recoverable validation fault maps to one `ProtocolError` value.
//! Errors are accumulated by the parser, never raised across independent
//! sections; callers render them through [`ProtocolError::error_objects`]
//! and must not execute operations when any are present.

use serde::Serialize;
use thiserror::Error;

/// Numeric protocol codes, stable across releases.
pub mod codes {
    pub const VALIDATION_ERROR: u16 = 100;
    pub const INVALID_RESOURCE: u16 = 101;
    pub const FILTER_NOT_ALLOWED: u16 = 102;
    pub const INVALID_FIELD_VALUE: u16 = 103;
    pub const INVALID_FIELD: u16 = 104;
    pub const PARAM_NOT_ALLOWED: u16 = 105;
    pub const PARAM_MISSING: u16 = 106;
    pub const INVALID_FILTER_VALUE: u16 = 107;
    pub const COUNT_MISMATCH: u16 = 108;
    pub const MISSING_KEY: u16 = 109;
    pub const KEY_NOT_INCLUDED_IN_URL: u16 = 110;
    pub const RECORD_NOT_FOUND: u16 = 111;
    pub const INVALID_INCLUDE: u16 = 112;
    pub const RELATION_EXISTS: u16 = 113;
    pub const INVALID_SORT_PARAM: u16 = 114;
    pub const INVALID_LINKS_OBJECT: u16 = 115;
    pub const TYPE_MISMATCH: u16 = 116;
    pub const LOCKED: u16 = 117;
}

/// A recoverable protocol-level fault.
///
/// One value may render to more than one [`ErrorObject`]
/// (`ParametersNotAllowed` emits one per key, `ValidationErrors` one per
/// (field, message) pair).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{resource} is not a valid resource.")]
    InvalidResource { resource: String },

    #[error("The record identified by {id} could not be found.")]
    RecordNotFound { id: String },

    #[error("The relation already exists.")]
    HasOneRelationExists,

    #[error("The relation to {id} already exists.")]
    HasManyRelationExists { id: String },

    #[error("{filter} is not allowed.")]
    FilterNotAllowed { filter: String },

    #[error("{value} is not a valid value for {filter}.")]
    InvalidFilterValue { filter: String, value: String },

    #[error("{value} is not a valid value for {field}.")]
    InvalidFieldValue { field: String, value: String },

    #[error("{value} is not a valid Links Object.")]
    InvalidLinksObject { value: String },

    #[error("{type_name} is not a valid type for this operation.")]
    TypeMismatch { type_name: String },

    #[error("{field} is not a valid field for {type_name}.")]
    InvalidField { type_name: String, field: String },

    #[error("{association} is not a valid association of {resource}")]
    InvalidInclude {
        resource: String,
        association: String,
    },

    #[error("{sort_param} is not a valid sort param for {resource}")]
    InvalidSortParam {
        resource: String,
        sort_param: String,
    },

    #[error("{} {} not allowed.", params.join(", "), if params.len() == 1 { "is" } else { "are" })]
    ParametersNotAllowed { params: Vec<String> },

    #[error("The required parameter, {param}, is missing.")]
    ParameterMissing { param: String },

    #[error("The resource collection does not contain the same number of objects as the number of keys.")]
    CountMismatch,

    #[error("The URL does not support the key {key}")]
    KeyNotIncludedInURL { key: String },

    #[error("The resource object does not contain a key.")]
    MissingKey,

    #[error("{message}")]
    RecordLocked { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    ValidationErrors { errors: Vec<(String, String)> },
}

impl ProtocolError {
    /// Numeric protocol code for this error kind.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidResource { .. } => codes::INVALID_RESOURCE,
            Self::RecordNotFound { .. } => codes::RECORD_NOT_FOUND,
            Self::HasOneRelationExists | Self::HasManyRelationExists { .. } => {
                codes::RELATION_EXISTS
            }
            Self::FilterNotAllowed { .. } => codes::FILTER_NOT_ALLOWED,
            Self::InvalidFilterValue { .. } => codes::INVALID_FILTER_VALUE,
            Self::InvalidFieldValue { .. } => codes::INVALID_FIELD_VALUE,
            Self::InvalidLinksObject { .. } => codes::INVALID_LINKS_OBJECT,
            Self::TypeMismatch { .. } => codes::TYPE_MISMATCH,
            Self::InvalidField { .. } => codes::INVALID_FIELD,
            Self::InvalidInclude { .. } => codes::INVALID_INCLUDE,
            Self::InvalidSortParam { .. } => codes::INVALID_SORT_PARAM,
            Self::ParametersNotAllowed { .. } => codes::PARAM_NOT_ALLOWED,
            Self::ParameterMissing { .. } => codes::PARAM_MISSING,
            Self::CountMismatch => codes::COUNT_MISMATCH,
            Self::KeyNotIncludedInURL { .. } => codes::KEY_NOT_INCLUDED_IN_URL,
            Self::MissingKey => codes::MISSING_KEY,
            Self::RecordLocked { .. } => codes::LOCKED,
            Self::ValidationErrors { .. } => codes::VALIDATION_ERROR,
        }
    }

    /// HTTP status for this error kind.
    pub fn status(&self) -> u16 {
        match self {
            Self::RecordNotFound { .. } => 404,
            Self::RecordLocked { .. } => 423,
            Self::ValidationErrors { .. } => 422,
            _ => 400,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::InvalidResource { .. } => "Invalid resource",
            Self::RecordNotFound { .. } => "Record not found",
            Self::HasOneRelationExists | Self::HasManyRelationExists { .. } => "Relation exists",
            Self::FilterNotAllowed { .. } => "Filter not allowed",
            Self::InvalidFilterValue { .. } => "Invalid filter value",
            Self::InvalidFieldValue { .. } => "Invalid field value",
            Self::InvalidLinksObject { .. } => "Invalid Links Object",
            Self::TypeMismatch { .. } => "Type Mismatch",
            Self::InvalidField { .. } => "Invalid field",
            Self::InvalidInclude { .. } => "Invalid field",
            Self::InvalidSortParam { .. } => "Invalid sort param",
            Self::ParametersNotAllowed { .. } => "Param not allowed",
            Self::ParameterMissing { .. } => "Missing Parameter",
            Self::CountMismatch => "Count to key mismatch",
            Self::KeyNotIncludedInURL { .. } => "Key is not included in URL",
            Self::MissingKey => "A key is required",
            Self::RecordLocked { .. } => "Locked resource",
            Self::ValidationErrors { .. } => "Validation error",
        }
    }

    /// Render this error into JSON:API error document elements.
    pub fn error_objects(&self) -> Vec<ErrorObject> {
        match self {
            Self::ParametersNotAllowed { params } => params
                .iter()
                .map(|param| ErrorObject {
                    code: self.code(),
                    status: self.status(),
                    title: self.title().to_string(),
                    detail: format!("{param} is not allowed."),
                    path: None,
                })
                .collect(),
            Self::ValidationErrors { errors } => errors
                .iter()
                .map(|(field, message)| ErrorObject {
                    code: self.code(),
                    status: self.status(),
                    title: format!("{field} - {message}"),
                    detail: message.clone(),
                    path: Some(format!("/{field}")),
                })
                .collect(),
            _ => vec![ErrorObject {
                code: self.code(),
                status: self.status(),
                title: self.title().to_string(),
                detail: self.to_string(),
                path: None,
            }],
        }
    }
}

/// Render a batch of accumulated errors into error document elements.
pub fn error_objects(errors: &[ProtocolError]) -> Vec<ErrorObject> {
    errors.iter().flat_map(ProtocolError::error_objects).collect()
}

/// A single element of a JSON:API error document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorObject {
    pub code: u16,
    pub status: u16,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail)
    }
}
