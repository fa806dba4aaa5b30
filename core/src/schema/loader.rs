use super::{FieldSpec, SchemaModel, TableSpec};
use crate::error::SchemaError;
use crate::types::{EntityLevel, ValueType, Vendor};
use dicom_core::Tag;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTable {
    level: String,
    vendor: Option<String>,
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    name: String,
    hex_tag: TagLiteral,
    #[serde(rename = "type")]
    value_type: String,
    length: Option<usize>,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    not_null: bool,
    parent_tag: Option<TagLiteral>,
    vendor: Option<String>,
}

/// Tag as written in definitions: `[0x0010, 0x0010]` or a string form
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagLiteral {
    Pair(Vec<i64>),
    Text(String),
}

impl TagLiteral {
    fn to_tag(&self) -> Option<Tag> {
        match self {
            TagLiteral::Pair(parts) => match parts.as_slice() {
                [group, element] => {
                    let group = u16::try_from(*group).ok()?;
                    let element = u16::try_from(*element).ok()?;
                    Some(Tag(group, element))
                }
                _ => None,
            },
            TagLiteral::Text(text) => parse_tag_literal(text),
        }
    }

    fn literal(&self) -> String {
        match self {
            TagLiteral::Pair(parts) => format!("{:?}", parts),
            TagLiteral::Text(text) => text.clone(),
        }
    }
}

/// Parses `(0010,0010)`, `0010,0010`, `00100010` or `0x00100010`
pub fn parse_tag_literal(text: &str) -> Option<Tag> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = REGEX.get_or_init(|| {
        Regex::new(
            r"^\(?\s*(?:0[xX])?([0-9A-Fa-f]{4})\s*,?\s*(?:0[xX])?([0-9A-Fa-f]{4})\s*\)?$",
        )
        .expect("Failed to compile regex")
    });

    let caps = regex.captures(text.trim())?;
    let group = u16::from_str_radix(&caps[1], 16).ok()?;
    let element = u16::from_str_radix(&caps[2], 16).ok()?;
    Some(Tag(group, element))
}

/// Checks that a field name is PascalCase letters only
pub fn is_pascal_case(s: &str) -> bool {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(r"^[A-Z][a-zA-Z]*$").expect("Failed to compile regex"))
        .is_match(s)
}

/// Converts PascalCase or camelCase to snake_case
///
/// An underscore goes before an uppercase letter that follows a lowercase
/// letter or digit, or that starts a new word inside an acronym
/// (`HTTPServer` becomes `http_server`).
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let after_word = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            if (after_word || next_is_lower) && prev != '_' {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }

    out
}

pub(super) fn load(text: &str) -> Result<SchemaModel, SchemaError> {
    let document: toml::Table =
        toml::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;

    let mut tables = Vec::with_capacity(document.len());
    for (name, value) in document {
        let raw: RawTable = value
            .try_into()
            .map_err(|e: toml::de::Error| SchemaError::Parse(format!("table {}: {}", name, e)))?;
        tables.push(build_table(name, raw)?);
    }

    Ok(SchemaModel::new(tables))
}

fn build_table(name: String, raw: RawTable) -> Result<TableSpec, SchemaError> {
    let level = EntityLevel::from_str(&raw.level).ok_or_else(|| SchemaError::UnknownLevel {
        table: name.clone(),
        value: raw.level.clone(),
    })?;
    let vendor = parse_vendor(&name, raw.vendor.as_deref())?;

    if raw.fields.is_empty() {
        return Err(SchemaError::EmptyTable { table: name });
    }

    let mut fields: Vec<FieldSpec> = Vec::with_capacity(raw.fields.len());
    let mut tags_by_scope: HashMap<(Option<Vendor>, Tag), String> = HashMap::new();

    for raw_field in raw.fields {
        let field = build_field(&name, vendor, raw_field)?;

        if fields.iter().any(|f| f.name == field.name) {
            return Err(SchemaError::DuplicateField {
                table: name,
                field: field.name,
            });
        }
        if let Some(first) = tags_by_scope.get(&(field.vendor, field.tag)) {
            return Err(SchemaError::DuplicateTag {
                table: name,
                tag: field.tag,
                first: first.clone(),
                second: field.name,
            });
        }

        tags_by_scope.insert((field.vendor, field.tag), field.name.clone());
        fields.push(field);
    }

    Ok(TableSpec {
        name,
        level,
        vendor,
        fields,
    })
}

fn build_field(
    table: &str,
    table_vendor: Option<Vendor>,
    raw: RawField,
) -> Result<FieldSpec, SchemaError> {
    if !is_pascal_case(&raw.name) {
        return Err(SchemaError::InvalidFieldName {
            table: table.to_string(),
            field: raw.name,
        });
    }

    let malformed = |literal: &TagLiteral| SchemaError::MalformedTag {
        table: table.to_string(),
        field: raw.name.clone(),
        literal: literal.literal(),
    };
    let tag = raw.hex_tag.to_tag().ok_or_else(|| malformed(&raw.hex_tag))?;
    let parent_tag = match &raw.parent_tag {
        Some(literal) => Some(literal.to_tag().ok_or_else(|| malformed(literal))?),
        None => None,
    };

    let value_type =
        ValueType::from_name(&raw.value_type).ok_or_else(|| SchemaError::UnknownType {
            table: table.to_string(),
            field: raw.name.clone(),
            value: raw.value_type.clone(),
        })?;

    if raw.length.is_some() && value_type != ValueType::String {
        return Err(SchemaError::LengthOnNonString {
            table: table.to_string(),
            field: raw.name,
        });
    }

    let vendor = match parse_vendor(table, raw.vendor.as_deref())? {
        Some(vendor) => Some(vendor),
        None => table_vendor,
    };

    Ok(FieldSpec {
        table: table.to_string(),
        column: to_snake_case(&raw.name),
        name: raw.name,
        tag,
        parent_tag,
        value_type,
        max_length: raw.length,
        unique: raw.unique,
        not_null: raw.not_null,
        vendor,
    })
}

fn parse_vendor(table: &str, value: Option<&str>) -> Result<Option<Vendor>, SchemaError> {
    match value {
        None => Ok(None),
        Some(value) => Vendor::from_scope(value)
            .map(Some)
            .ok_or_else(|| SchemaError::UnknownVendor {
                table: table.to_string(),
                value: value.to_string(),
            }),
    }
}
