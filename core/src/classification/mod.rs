//! MR modality classification
//!
//! Each vendor has an ordered list of named rules; the first rule whose
//! predicate holds decides the category of a series. Diffusion series are
//! then refined into DWI, ADC or EADC.

pub mod attributes;
pub mod engine;
pub mod ge;
pub mod generic;
pub mod philips;
pub mod rules;
pub mod siemens;
pub mod subtype;

pub use attributes::{Critical, SeriesAttributes};
pub use engine::ClassificationEngine;
pub use rules::{t1_timeseries, Rule, RuleSet, Verdict};
pub use subtype::{diffusion_subtype, DiffusionSubtype};
