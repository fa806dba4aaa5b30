use crate::error::{FieldExtractionError, RowRejection, RowValidationError};
use crate::extraction::coerce::coerce;
use crate::extraction::header::{EntityIdentity, HeaderRecord};
use crate::extraction::vendor::VendorResolver;
use crate::schema::{SchemaModel, TableSpec};
use crate::types::{EntityLevel, FieldValue, Vendor};
use log::{debug, warn};
use std::collections::BTreeMap;

/// A typed, validated row for one table, extracted from one source
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct EntityRow {
    pub table: String,
    pub level: EntityLevel,
    /// Identifier of the row's entity at `level`
    pub key: String,
    pub identity: EntityIdentity,
    /// Field name to value; `None` for missing or failed optional fields
    pub fields: BTreeMap<String, Option<FieldValue>>,
    pub source: String,
}

impl EntityRow {
    /// Value of a field, if present and not null
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).and_then(|v| v.as_ref())
    }
}

/// A row plus the optional fields that failed and were stored as null
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub row: EntityRow,
    pub warnings: Vec<FieldExtractionError>,
}

/// Everything extracted from one header source
#[derive(Debug, Clone, Default)]
pub struct SourceExtraction {
    pub source: String,
    pub vendor: Vendor,
    pub rows: Vec<EntityRow>,
    /// Tables skipped for this source
    pub rejections: Vec<RowValidationError>,
    pub warnings: Vec<FieldExtractionError>,
}

/// Turns header records into rows following the schema
pub struct AttributeExtractor<'a> {
    schema: &'a SchemaModel,
}

impl<'a> AttributeExtractor<'a> {
    pub fn new(schema: &'a SchemaModel) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'a SchemaModel {
        self.schema
    }

    /// Extracts the row of `table` from one header
    ///
    /// # Errors
    ///
    /// Returns a [`RowValidationError`] if:
    /// - A `not_null` field is missing, blank or fails coercion
    /// - The header has no identifier for the table's entity level
    ///
    /// Failures of other fields do not reject the row: the field is stored
    /// as null and reported in [`ExtractedRow::warnings`].
    pub fn extract(
        &self,
        header: &HeaderRecord,
        table: &TableSpec,
        vendor: Vendor,
    ) -> Result<ExtractedRow, RowValidationError> {
        let source = header.source();
        let reject = |field: Option<&str>, tag, reason| RowValidationError {
            source_id: source.to_string(),
            table: table.name.clone(),
            field: field.map(str::to_string),
            tag,
            reason,
        };

        let mut fields = BTreeMap::new();
        let mut warnings = Vec::new();

        for field in VendorResolver::field_set_for(vendor, table) {
            let raw = header.lookup(field.tag, field.parent_tag);
            match coerce(raw, field) {
                Ok(Some(value)) => {
                    fields.insert(field.name.clone(), Some(value));
                }
                Ok(None) if field.not_null => {
                    return Err(reject(
                        Some(field.name.as_str()),
                        Some(field.tag),
                        RowRejection::RequiredFieldMissing,
                    ));
                }
                Ok(None) => {
                    fields.insert(field.name.clone(), None);
                }
                Err(kind) if field.not_null => {
                    return Err(reject(
                        Some(field.name.as_str()),
                        Some(field.tag),
                        RowRejection::RequiredFieldInvalid(kind),
                    ));
                }
                Err(kind) => {
                    let warning = FieldExtractionError {
                        source_id: source.to_string(),
                        table: table.name.clone(),
                        field: field.name.clone(),
                        tag: field.tag,
                        kind,
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                    fields.insert(field.name.clone(), None);
                }
            }
        }

        let identity = header.identity();
        let key = identity
            .for_level(table.level)
            .map(str::to_string)
            .ok_or_else(|| {
                reject(
                    None,
                    Some(table.level.identifier_tag()),
                    RowRejection::MissingIdentifier(table.level.simple_name()),
                )
            })?;

        Ok(ExtractedRow {
            row: EntityRow {
                table: table.name.clone(),
                level: table.level,
                key,
                identity,
                fields,
                source: source.to_string(),
            },
            warnings,
        })
    }

    /// Extracts every table active for the header's vendor
    ///
    /// A rejected table never prevents the other tables of the same source
    /// from being extracted.
    pub fn extract_source(&self, header: &HeaderRecord) -> SourceExtraction {
        let vendor = VendorResolver::resolve(header);
        let mut extraction = SourceExtraction {
            source: header.source().to_string(),
            vendor,
            ..Default::default()
        };

        for table in self.schema.active_tables(vendor) {
            match self.extract(header, table, vendor) {
                Ok(extracted) => {
                    extraction.rows.push(extracted.row);
                    extraction.warnings.extend(extracted.warnings);
                }
                Err(e) => {
                    warn!("{}", e);
                    extraction.rejections.push(e);
                }
            }
        }

        debug!(
            "{}: vendor {}, {} rows, {} rejected, {} field warnings",
            extraction.source,
            vendor,
            extraction.rows.len(),
            extraction.rejections.len(),
            extraction.warnings.len()
        );

        extraction
    }
}
