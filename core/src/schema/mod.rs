//! Declarative table definitions
//!
//! A [`SchemaModel`] is loaded once from TOML and shared read-only by every
//! extraction worker. Each [`TableSpec`] lists the [`FieldSpec`]s extracted
//! into it and the entity level whose identifier keys its rows.

mod loader;

pub use loader::{is_pascal_case, parse_tag_literal, to_snake_case};

use crate::error::SchemaError;
use crate::types::{EntityLevel, ValueType, Vendor};
use dicom_core::Tag;
use std::path::Path;
use std::sync::OnceLock;

/// Table definitions shipped with the crate
const BUILTIN_DEFINITIONS: &str = include_str!("../../config/table_config.toml");

/// One declared column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Owning table name
    pub table: String,
    /// PascalCase field name
    pub name: String,
    /// snake_case column name derived from `name`
    pub column: String,
    pub tag: Tag,
    /// Sequence holding `tag` when it is not found at top level
    pub parent_tag: Option<Tag>,
    pub value_type: ValueType,
    /// Maximum character length, String fields only
    pub max_length: Option<usize>,
    pub unique: bool,
    pub not_null: bool,
    /// `None` for vendor-neutral fields
    pub vendor: Option<Vendor>,
}

impl FieldSpec {
    /// Returns true if the field applies to sources of `vendor`
    pub fn applies_to(&self, vendor: Vendor) -> bool {
        self.vendor.map_or(true, |scope| scope == vendor)
    }

    /// Fields whose disagreement between sources is a merge conflict
    pub fn is_identifying(&self) -> bool {
        self.unique || self.not_null
    }
}

/// A named, ordered set of fields at one entity level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub level: EntityLevel,
    /// Vendor-specific tables are only activated for matching sources
    pub vendor: Option<Vendor>,
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns true if rows of this table are extracted for `vendor`
    pub fn is_active_for(&self, vendor: Vendor) -> bool {
        self.vendor.map_or(true, |scope| scope == vendor)
    }
}

/// Immutable set of table definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaModel {
    tables: Vec<TableSpec>,
}

impl SchemaModel {
    /// Parses and validates TOML table definitions
    ///
    /// # Example
    ///
    /// ```
    /// use dcmw_core::schema::SchemaModel;
    ///
    /// let schema = SchemaModel::from_toml_str(r#"
    /// [Series]
    /// level = "series"
    /// fields = [
    ///     { name = "SeriesInstanceUid", hex_tag = [0x0020, 0x000E], type = "String", not_null = true, unique = true },
    ///     { name = "SeriesNumber", hex_tag = "(0020,0011)", type = "Integer" },
    /// ]
    /// "#).unwrap();
    ///
    /// let series = schema.table("Series").unwrap();
    /// assert_eq!(series.fields[1].column, "series_number");
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        loader::load(text)
    }

    /// Reads and validates table definitions from a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Built-in definitions, parsed once per process
    pub fn builtin() -> Result<&'static SchemaModel, SchemaError> {
        static BUILTIN: OnceLock<Result<SchemaModel, SchemaError>> = OnceLock::new();
        BUILTIN
            .get_or_init(|| Self::from_toml_str(BUILTIN_DEFINITIONS))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub(crate) fn new(tables: Vec<TableSpec>) -> Self {
        Self { tables }
    }

    /// Tables in declaration order
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables extracted for sources of `vendor`, in declaration order
    pub fn active_tables(&self, vendor: Vendor) -> impl Iterator<Item = &TableSpec> {
        self.tables.iter().filter(move |t| t.is_active_for(vendor))
    }

    /// Tables at `level`, in declaration order
    pub fn tables_at(&self, level: EntityLevel) -> impl Iterator<Item = &TableSpec> {
        self.tables.iter().filter(move |t| t.level == level)
    }
}
