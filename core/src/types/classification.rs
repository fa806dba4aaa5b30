use crate::types::{ModalityCategory, Subtype, Vendor};
use chrono::NaiveTime;
use std::collections::BTreeMap;
use std::fmt;

/// Key of the T1 timing series in derived quantities
pub const DERIVED_TIMESERIES: &str = "timeseries";
/// Key of the subtraction flag in derived quantities
pub const DERIVED_SUBTRACTION: &str = "subtraction";
/// Key of the reconstructed Dixon image in derived quantities
pub const DERIVED_DIXON_TYPE: &str = "dixon_type";
/// Key of the projected contrast in derived quantities
pub const DERIVED_MIP_TYPE: &str = "mip_type";
/// Key of the sorted distinct diffusion b-values in derived quantities
pub const DERIVED_B_VALUES: &str = "b_values";

/// A quantity derived while classifying a series
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[serde(untagged)]
pub enum DerivedValue {
    IntList(Vec<i64>),
    Text(String),
    Flag(bool),
}

impl DerivedValue {
    pub fn text(value: impl Into<String>) -> Self {
        DerivedValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DerivedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            DerivedValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            DerivedValue::IntList(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for DerivedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivedValue::IntList(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            DerivedValue::Text(s) => write!(f, "{}", s),
            DerivedValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// Derived quantities keyed by name, ordered for stable output
pub type DerivedQuantities = BTreeMap<String, DerivedValue>;

/// Why a series could not be classified
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum UnclassifiableReason {
    /// No rule matched and the vendor has no dedicated rule set
    UnsupportedVendor,
    /// Critical attributes absent from every image of the series
    MissingCritical(Vec<String>),
    /// Critical attributes with more than one distinct value
    ConflictingCritical(Vec<String>),
    /// Vendor rules exist but none matched
    NoMatchingRule,
}

impl UnclassifiableReason {
    /// Human readable reason, as recorded next to the classification
    pub fn message(&self) -> &'static str {
        match self {
            UnclassifiableReason::UnsupportedVendor => "No logic for vendor",
            UnclassifiableReason::MissingCritical(_)
            | UnclassifiableReason::ConflictingCritical(_) => {
                "Missing information in critical parameters"
            }
            UnclassifiableReason::NoMatchingRule => "No logic for this specific set of parameters",
        }
    }
}

impl fmt::Display for UnclassifiableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnclassifiableReason::MissingCritical(names) => {
                write!(f, "{} (missing: {})", self.message(), names.join(", "))
            }
            UnclassifiableReason::ConflictingCritical(names) => {
                write!(f, "{} (conflicting: {})", self.message(), names.join(", "))
            }
            _ => write!(f, "{}", self.message()),
        }
    }
}

/// Result of running the rules against one series
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(tag = "status", rename_all = "lowercase"))]
pub enum ClassificationOutcome {
    Classified {
        category: ModalityCategory,
        subtype: Option<Subtype>,
        derived: DerivedQuantities,
        /// Name of the first rule that matched
        rule: &'static str,
    },
    Unclassifiable {
        reason: UnclassifiableReason,
    },
}

impl ClassificationOutcome {
    pub fn classified(category: ModalityCategory, rule: &'static str) -> Self {
        ClassificationOutcome::Classified {
            category,
            subtype: None,
            derived: DerivedQuantities::new(),
            rule,
        }
    }

    pub fn unclassifiable(reason: UnclassifiableReason) -> Self {
        ClassificationOutcome::Unclassifiable { reason }
    }

    /// Sets the subtype; no effect on an unclassifiable outcome
    pub fn with_subtype(mut self, value: Subtype) -> Self {
        if let ClassificationOutcome::Classified { subtype, .. } = &mut self {
            *subtype = Some(value);
        }
        self
    }

    /// Adds a derived quantity; no effect on an unclassifiable outcome
    pub fn with_derived(mut self, key: &str, value: DerivedValue) -> Self {
        if let ClassificationOutcome::Classified { derived, .. } = &mut self {
            derived.insert(key.to_string(), value);
        }
        self
    }
}

/// Final classification of one MR series
///
/// Created once per series and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ModalityClassification {
    pub series_uid: String,
    pub study_uid: String,
    pub vendor: Vendor,
    pub outcome: ClassificationOutcome,

    /// Classified but underdetermined, e.g. DWI without any b-value
    pub ambiguous: bool,

    /// Earliest acquisition time across the series' images
    pub acquisition_time: Option<NaiveTime>,

    pub series_number: Option<i64>,
    pub series_description: Option<String>,
}

impl ModalityClassification {
    pub fn category(&self) -> Option<ModalityCategory> {
        match &self.outcome {
            ClassificationOutcome::Classified { category, .. } => Some(*category),
            ClassificationOutcome::Unclassifiable { .. } => None,
        }
    }

    pub fn subtype(&self) -> Option<Subtype> {
        match &self.outcome {
            ClassificationOutcome::Classified { subtype, .. } => *subtype,
            ClassificationOutcome::Unclassifiable { .. } => None,
        }
    }

    pub fn derived(&self, key: &str) -> Option<&DerivedValue> {
        match &self.outcome {
            ClassificationOutcome::Classified { derived, .. } => derived.get(key),
            ClassificationOutcome::Unclassifiable { .. } => None,
        }
    }

    pub fn rule(&self) -> Option<&'static str> {
        match &self.outcome {
            ClassificationOutcome::Classified { rule, .. } => Some(rule),
            ClassificationOutcome::Unclassifiable { .. } => None,
        }
    }

    pub fn unclassifiable_reason(&self) -> Option<&UnclassifiableReason> {
        match &self.outcome {
            ClassificationOutcome::Unclassifiable { reason } => Some(reason),
            ClassificationOutcome::Classified { .. } => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self.outcome, ClassificationOutcome::Classified { .. })
    }

    /// Timing series of a T1W classification
    pub fn timeseries(&self) -> Option<&str> {
        self.derived(DERIVED_TIMESERIES).and_then(|v| v.as_text())
    }

    pub fn is_subtraction(&self) -> bool {
        self.derived(DERIVED_SUBTRACTION)
            .and_then(|v| v.as_flag())
            .unwrap_or(false)
    }

    /// Short label such as `T1W`, `Diffusion/DWI` or `unclassifiable`
    pub fn label(&self) -> String {
        match (self.category(), self.subtype()) {
            (Some(category), Some(subtype)) => format!("{}/{}", category, subtype),
            (Some(category), None) => category.to_string(),
            _ => "unclassifiable".to_string(),
        }
    }
}
