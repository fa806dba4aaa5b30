use crate::extraction::tags::{
    is_binary_vr, PATIENT_ID, PIXEL_DATA, SERIES_INSTANCE_UID, SOP_INSTANCE_UID,
    STUDY_INSTANCE_UID,
};
use crate::types::EntityLevel;
use dicom_core::{Tag, VR};
use dicom_object::InMemDicomObject;
use log::debug;
use std::collections::BTreeMap;

/// Raw attribute values of one header source
///
/// Values are kept as text; multi-valued attributes are joined with `\`.
/// Sequence-valued tags keep the elements of their first item in a
/// nested map, which is what the two-level lookup consults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    source: String,
    elements: BTreeMap<Tag, String>,
    sequences: BTreeMap<Tag, BTreeMap<Tag, String>>,
}

impl HeaderRecord {
    /// Creates an empty record for the given source identity (usually a file path)
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Builder: adds a top-level attribute
    pub fn with(mut self, tag: Tag, value: impl Into<String>) -> Self {
        self.insert(tag, value);
        self
    }

    /// Builder: adds an attribute nested under the sequence `parent`
    pub fn with_nested(mut self, parent: Tag, tag: Tag, value: impl Into<String>) -> Self {
        self.insert_nested(parent, tag, value);
        self
    }

    pub fn insert(&mut self, tag: Tag, value: impl Into<String>) {
        self.elements.insert(tag, value.into());
    }

    pub fn insert_nested(&mut self, parent: Tag, tag: Tag, value: impl Into<String>) {
        self.sequences
            .entry(parent)
            .or_default()
            .insert(tag, value.into());
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Top-level value of `tag`
    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.elements.get(&tag).map(|s| s.as_str())
    }

    /// Value of `tag` inside the first item of sequence `parent`
    pub fn nested(&self, parent: Tag, tag: Tag) -> Option<&str> {
        self.sequences
            .get(&parent)
            .and_then(|items| items.get(&tag))
            .map(|s| s.as_str())
    }

    /// Resolves `tag`, falling back to the nested map of `parent`
    ///
    /// The top-level value wins when it is present and not blank. The
    /// fallback is a single level deep: nested sequences are never searched
    /// recursively.
    pub fn lookup(&self, tag: Tag, parent: Option<Tag>) -> Option<&str> {
        match self.get(tag) {
            Some(value) if !value.trim().is_empty() => Some(value),
            top => parent
                .and_then(|parent| self.nested(parent, tag))
                .or(top),
        }
    }

    /// Identifiers linking this source to its patient, study, series and instance
    pub fn identity(&self) -> EntityIdentity {
        let id = |tag| {
            self.get(tag)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        EntityIdentity {
            patient: id(PATIENT_ID),
            study: id(STUDY_INSTANCE_UID),
            series: id(SERIES_INSTANCE_UID),
            instance: id(SOP_INSTANCE_UID),
        }
    }

    /// Number of top-level attributes
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.sequences.is_empty()
    }

    /// Builds a record from a parsed DICOM object
    ///
    /// Pixel data and binary value representations are skipped. For every
    /// sequence only its first item is kept.
    pub fn from_dicom(source: impl Into<String>, dcm: &InMemDicomObject) -> Self {
        let mut record = HeaderRecord::new(source);

        for elem in dcm.iter() {
            let header = elem.header();
            let tag = header.tag;
            if tag == PIXEL_DATA || is_binary_vr(header.vr) {
                continue;
            }

            if header.vr == VR::SQ {
                if let Some(item) = elem.items().and_then(|items| items.first()) {
                    for nested in item.iter() {
                        let nested_header = nested.header();
                        if nested_header.vr == VR::SQ || is_binary_vr(nested_header.vr) {
                            continue;
                        }
                        if let Ok(value) = nested.to_str() {
                            record.insert_nested(tag, nested_header.tag, value.trim());
                        }
                    }
                }
                continue;
            }

            match elem.to_str() {
                Ok(value) => record.insert(tag, value.trim()),
                Err(e) => debug!("{}: skipping {} ({})", record.source, tag, e),
            }
        }

        record
    }
}

/// Identity links carried by every extracted row
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct EntityIdentity {
    pub patient: Option<String>,
    pub study: Option<String>,
    pub series: Option<String>,
    pub instance: Option<String>,
}

impl EntityIdentity {
    /// Identifier that keys rows of the given level
    pub fn for_level(&self, level: EntityLevel) -> Option<&str> {
        match level {
            EntityLevel::Patient => self.patient.as_deref(),
            EntityLevel::Study => self.study.as_deref(),
            EntityLevel::Series => self.series.as_deref(),
            EntityLevel::Image => self.instance.as_deref(),
        }
    }
}
