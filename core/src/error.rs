use crate::types::FieldValue;
use dicom_core::Tag;
use thiserror::Error;

/// Result type for dcmw operations
pub type Result<T> = std::result::Result<T, DcmwError>;

/// Error types for dcmw operations
#[derive(Error, Debug)]
pub enum DcmwError {
    /// Schema definitions could not be loaded
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A row was rejected for one source
    #[error("Row validation error: {0}")]
    RowValidation(#[from] RowValidationError),

    /// Two sources disagree on a unique or required field
    #[error("Merge conflict: {0}")]
    MergeConflict(#[from] MergeConflictError),

    /// Pipeline configuration could not be read
    #[error("Config error: {0}")]
    Config(String),

    /// DICOM reading error
    #[error("DICOM error: {0}")]
    DicomError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<dicom_object::ReadError> for DcmwError {
    fn from(e: dicom_object::ReadError) -> Self {
        DcmwError::DicomError(format!("{}", e))
    }
}

impl From<toml::de::Error> for DcmwError {
    fn from(e: toml::de::Error) -> Self {
        DcmwError::Config(e.to_string())
    }
}

/// Fatal errors raised while loading table definitions.
///
/// Any of these aborts startup before a single header is extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("could not parse table definitions: {0}")]
    Parse(String),

    #[error("could not read table definitions from {path}: {message}")]
    Io { path: String, message: String },

    #[error("table {table}: field {field} has malformed tag literal '{literal}'")]
    MalformedTag {
        table: String,
        field: String,
        literal: String,
    },

    #[error("table {table}: field {field} has unknown type '{value}'")]
    UnknownType {
        table: String,
        field: String,
        value: String,
    },

    #[error("table {table}: unknown vendor '{value}'")]
    UnknownVendor { table: String, value: String },

    #[error("table {table}: unknown entity level '{value}'")]
    UnknownLevel { table: String, value: String },

    #[error("table {table}: field name '{field}' is not in PascalCase")]
    InvalidFieldName { table: String, field: String },

    #[error("table {table}: field {field} is declared more than once")]
    DuplicateField { table: String, field: String },

    #[error("table {table}: tag {tag} is declared by both {first} and {second}")]
    DuplicateTag {
        table: String,
        tag: Tag,
        first: String,
        second: String,
    },

    #[error("table {table}: field {field} declares a length but is not a String")]
    LengthOnNonString { table: String, field: String },

    #[error("table {table} declares no fields")]
    EmptyTable { table: String },
}

/// Why a single field could not be coerced to its declared type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldErrorKind {
    #[error("value '{value}' is not a valid {expected}")]
    Unparsable {
        value: String,
        expected: &'static str,
    },

    #[error("value has {length} characters, maximum is {max}")]
    TooLong { length: usize, max: usize },
}

/// A field that failed coercion and was stored as null
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_id}: {table}.{field} {tag}: {kind}")]
pub struct FieldExtractionError {
    pub source_id: String,
    pub table: String,
    pub field: String,
    pub tag: Tag,
    pub kind: FieldErrorKind,
}

/// Why a row was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowRejection {
    #[error("required field is missing or empty")]
    RequiredFieldMissing,

    #[error("required field failed: {0}")]
    RequiredFieldInvalid(FieldErrorKind),

    #[error("no {0} identifier in header")]
    MissingIdentifier(&'static str),
}

/// A row rejected for one (source, table) pair
///
/// Only the named table is skipped for the source; every other table
/// of the same source is still extracted.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_id}: row for table {table} rejected{}: {reason}", describe_field(.field, .tag))]
pub struct RowValidationError {
    pub source_id: String,
    pub table: String,
    pub field: Option<String>,
    pub tag: Option<Tag>,
    pub reason: RowRejection,
}

fn describe_field(field: &Option<String>, tag: &Option<Tag>) -> String {
    match (field, tag) {
        (Some(field), Some(tag)) => format!(" (field {} {})", field, tag),
        (Some(field), None) => format!(" (field {})", field),
        _ => String::new(),
    }
}

/// Two sources disagree on a unique or required field of one entity
///
/// The incoming row is not merged; both values are kept here for manual
/// resolution.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "{table}[{key}].{field}: '{existing}' from {existing_sources:?} conflicts with '{incoming}' from {incoming_source}"
)]
pub struct MergeConflictError {
    pub table: String,
    pub key: String,
    pub field: String,
    pub existing: FieldValue,
    pub existing_sources: Vec<String>,
    pub incoming: FieldValue,
    pub incoming_source: String,
}
