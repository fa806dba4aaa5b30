//! Core type definitions shared by extraction and classification
//!
//! This module provides the fundamental types used throughout the dcmw library:
//! - [`EntityLevel`]: Patient, study, series or image level of a table
//! - [`Vendor`]: Manufacturer family deciding which private fields apply
//! - [`FieldValue`] and [`ValueType`]: Typed, coerced column values
//! - [`ImageType`]: Decomposed DICOM ImageType field
//! - [`ModalityCategory`], [`Subtype`]: MR series categories
//! - [`ModalityClassification`]: Per-series classification result
//! - [`PipelineConfig`]: Thread count and protocol template of a run

mod classification;
mod config;
mod enums;
mod image_type;
mod value;

pub use classification::{
    ClassificationOutcome, DerivedQuantities, DerivedValue, ModalityClassification,
    UnclassifiableReason, DERIVED_B_VALUES, DERIVED_DIXON_TYPE, DERIVED_MIP_TYPE,
    DERIVED_SUBTRACTION, DERIVED_TIMESERIES,
};
pub use config::PipelineConfig;
pub use enums::{DixonType, EntityLevel, ModalityCategory, Subtype, T1Timeseries, Vendor};
pub use image_type::ImageType;
pub use value::{FieldValue, ValueType};
