use crate::extraction::coerce::parse_integer;
use crate::extraction::AggregatedSeriesRecord;
use crate::types::{FieldValue, ImageType, Vendor};
use chrono::NaiveTime;
use std::collections::{BTreeMap, BTreeSet};

// Field names consulted by the classification rules
pub const IMAGE_TYPE: &str = "ImageType";
pub const ACQUISITION_TIME: &str = "AcquisitionTime";
pub const ACQUISITION_CONTRAST: &str = "AcquisitionContrast";
pub const PULSE_SEQUENCE_NAME: &str = "PulseSequenceName";
pub const SEQUENCE_NAME: &str = "SequenceName";
pub const PULSE_SEQUENCE: &str = "PulseSequence";
pub const REPETITION_TIME: &str = "RepetitionTime";
pub const ECHO_TIME: &str = "EchoTime";
pub const DIFFUSION_B_VALUE: &str = "DiffusionBValue";
pub const PHILIPS_B_VALUE: &str = "PhilipsBValue";
pub const SIEMENS_B_VALUE: &str = "SiemensBValue";
pub const GE_B_VALUE: &str = "GeBValue";
pub const SERIES_NUMBER: &str = "SeriesNumber";
pub const SERIES_DESCRIPTION: &str = "SeriesDescription";

/// GE stores the b-value with a large offset in its first component
const GE_B_VALUE_OFFSET: i64 = 1_000_000_000;

/// State of a critical attribute across a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Critical {
    Missing,
    Conflicting,
    Present,
}

/// Per-series view of the attributes the rules look at
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAttributes {
    pub series_uid: String,
    pub study_uid: Option<String>,

    /// Distinct non-null values per field, in first-seen image order
    values: BTreeMap<String, Vec<FieldValue>>,

    /// Most frequent ImageType of the series
    pub image_type: Option<ImageType>,

    /// Sorted distinct acquisition times
    pub acquisition_times: Vec<NaiveTime>,

    /// Sorted distinct diffusion b-values
    pub b_values: Vec<i64>,
}

impl SeriesAttributes {
    /// Builds the attribute view of a series
    ///
    /// Image-level values are used when any image carries the field,
    /// otherwise the series-level value.
    pub fn from_record(record: &AggregatedSeriesRecord, vendor: Vendor) -> Self {
        let mut values: BTreeMap<String, Vec<FieldValue>> = BTreeMap::new();

        for image in &record.images {
            for (name, value) in &image.fields {
                let distinct = values.entry(name.clone()).or_default();
                if !distinct.contains(value) {
                    distinct.push(value.clone());
                }
            }
        }
        for (name, value) in &record.series_fields {
            values
                .entry(name.clone())
                .or_insert_with(|| vec![value.clone()]);
        }

        let image_type = most_frequent_image_type(record);

        let acquisition_times: Vec<NaiveTime> = record
            .image_values(ACQUISITION_TIME)
            .filter_map(FieldValue::as_time)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let b_values: Vec<i64> = record
            .images
            .iter()
            .filter_map(|image| b_value(&image.fields, vendor))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            series_uid: record.series_uid.clone(),
            study_uid: record.study_uid.clone(),
            values,
            image_type,
            acquisition_times,
            b_values,
        }
    }

    /// Distinct values of a field
    pub fn distinct(&self, field: &str) -> &[FieldValue] {
        self.values.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Classifies a critical attribute as missing, conflicting or single-valued
    ///
    /// ImageType is multi-valued by nature: its most frequent value is used
    /// and it is never conflicting.
    pub fn critical(&self, field: &str) -> Critical {
        if field == IMAGE_TYPE {
            return match self.image_type {
                Some(ref image_type) if image_type.is_valid() => Critical::Present,
                _ => Critical::Missing,
            };
        }
        match self.distinct(field) {
            [] => Critical::Missing,
            [_] => Critical::Present,
            _ => Critical::Conflicting,
        }
    }

    /// The single value of a field, `None` when missing or conflicting
    pub fn single(&self, field: &str) -> Option<&FieldValue> {
        match self.distinct(field) {
            [single] => Some(single),
            _ => None,
        }
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.single(field).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        self.single(field).and_then(FieldValue::as_integer)
    }

    pub fn decimal(&self, field: &str) -> Option<f64> {
        self.single(field).and_then(FieldValue::as_decimal)
    }

    pub fn image_type(&self) -> Option<&ImageType> {
        self.image_type.as_ref()
    }

    /// Component `index` of the series ImageType
    pub fn image_type_value(&self, index: usize) -> Option<&str> {
        self.image_type.as_ref().and_then(|it| it.value(index))
    }

    /// Mean gap between consecutive acquisition times, in whole seconds
    ///
    /// `None` with fewer than two distinct times.
    pub fn mean_gap_seconds(&self) -> Option<i64> {
        if self.acquisition_times.len() < 2 {
            return None;
        }
        let gaps: Vec<f64> = self
            .acquisition_times
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 1000.0)
            .collect();
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        Some(mean.floor() as i64)
    }

    pub fn first_acquisition_time(&self) -> Option<NaiveTime> {
        self.acquisition_times.first().copied()
    }
}

/// Most frequent ImageType text, ties broken by the lexicographically smallest
fn most_frequent_image_type(record: &AggregatedSeriesRecord) -> Option<ImageType> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in record.image_values(IMAGE_TYPE).filter_map(FieldValue::as_text) {
        *counts.entry(value).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        // BTreeMap iterates in ascending order, so only a strictly higher count wins
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }

    match best {
        Some((value, _)) => Some(ImageType::parse(value)),
        None => record
            .series_value(IMAGE_TYPE)
            .and_then(FieldValue::as_text)
            .map(ImageType::parse),
    }
}

/// B-value of one image: the standard attribute first, then the vendor's private one
fn b_value(fields: &BTreeMap<String, FieldValue>, vendor: Vendor) -> Option<i64> {
    if let Some(value) = fields.get(DIFFUSION_B_VALUE).and_then(FieldValue::as_decimal) {
        return Some(value.round() as i64);
    }

    match vendor {
        Vendor::Philips => fields
            .get(PHILIPS_B_VALUE)
            .and_then(FieldValue::as_decimal)
            .map(|v| v.round() as i64),
        Vendor::Siemens => fields.get(SIEMENS_B_VALUE).and_then(FieldValue::as_integer),
        Vendor::Ge => fields
            .get(GE_B_VALUE)
            .and_then(FieldValue::as_text)
            .and_then(|raw| raw.split('\\').next())
            .and_then(|first| parse_integer(first).ok())
            .map(|v| v.rem_euclid(GE_B_VALUE_OFFSET)),
        Vendor::Generic => None,
    }
}
