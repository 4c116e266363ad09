//! Error types for the record model.

use thiserror::Error;

/// Synthetic location used for whole-object failures (decode errors, root
/// validator failures, wrapped-scalar unwrapping).
pub const ROOT_LOC: &str = "__root__";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("'{0}' is not a registered record type name")]
    UnknownType(String),

    #[error("exclude specification must be a set of names or a per-key mapping, got {0}")]
    UnsupportedExclude(&'static str),

    #[error("format error: {0}")]
    Format(#[from] opal_format::FormatError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One or more field-level failures raised while validating a record.
#[derive(Debug, Error)]
#[error("{}", render_errors(.type_name, .errors))]
pub struct ValidationError {
    pub type_name: String,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(type_name: impl Into<String>, loc: impl Into<String>, kind: ErrorKind) -> Self {
        ValidationError {
            type_name: type_name.into(),
            errors: vec![FieldError::new(loc, kind)],
        }
    }
}

/// A single failure, anchored to the field path that produced it.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub loc: String,
    pub kind: ErrorKind,
}

impl FieldError {
    pub fn new(loc: impl Into<String>, kind: ErrorKind) -> Self {
        FieldError {
            loc: loc.into(),
            kind,
        }
    }

    /// Re-anchor a nested record's failure under its parent field.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.loc = format!("{prefix}.{}", self.loc);
        self
    }
}

#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    #[error(
        "`{qualified_name}` expects resource type `{expected}`, but got `{given}`. \
         Make sure the resource type name is correct and the right model type has been chosen"
    )]
    WrongResourceType {
        expected: String,
        given: String,
        qualified_name: String,
    },

    #[error("{message}")]
    ExtraField { message: String },

    #[error("field required")]
    Missing,

    #[error("{message}")]
    Type { message: String },

    #[error("{message}")]
    Decode { message: String },

    #[error("{message}")]
    Custom { message: String },
}

fn render_errors(type_name: &str, errors: &[FieldError]) -> String {
    let mut out = format!(
        "{} validation error{} for {}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" },
        type_name
    );
    for error in errors {
        out.push_str(&format!("\n  {}: {}", error.loc, error.kind));
    }
    out
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("`{type_name}` already has a member named '{name}'")]
    DuplicateMember { type_name: String, name: String },

    #[error("`{type_name}` already has a field named '{name}'")]
    DuplicateField { type_name: String, name: String },

    #[error("invalid root validator name '{0}': must be a plain identifier")]
    InvalidValidatorName(String),

    #[error("record type '{0}' is already registered")]
    DuplicateSchema(String),

    #[error("field '{field}' declares extension companion '{companion}', which is not a declared field")]
    UnknownExtensionCompanion { field: String, companion: String },

    #[error("duplicate field name '{name}' on `{type_name}`")]
    DuplicateFieldName { type_name: String, name: String },
}
