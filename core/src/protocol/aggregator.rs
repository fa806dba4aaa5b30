use crate::protocol::template::ProtocolTemplate;
use crate::types::{ModalityCategory, ModalityClassification, Subtype, T1Timeseries};
use chrono::NaiveTime;
use std::cmp::Ordering;

/// One series of a study, in acquisition order
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ProtocolEntry {
    pub series_uid: String,
    pub category: Option<ModalityCategory>,
    pub subtype: Option<Subtype>,

    /// `T1W`, `Diffusion/DWI`, `unclassifiable`, ...
    pub label: String,

    /// Position of a T1 series in the contrast series, e.g. `post-contrast_1`
    pub contrast_phase: Option<String>,

    pub acquisition_time: Option<NaiveTime>,
    pub series_number: Option<i64>,
}

/// Summary of the MR protocol acquired in one study
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct StudyProtocolSignature {
    pub study_uid: String,
    pub entries: Vec<ProtocolEntry>,

    /// Every template requirement is met
    pub complete: bool,

    /// Labels of unmet requirements, in template order
    pub missing: Vec<String>,

    /// Some series is unclassifiable or ambiguous
    pub ambiguous: bool,

    /// `Full protocol` or `Not full protocol. Missing: ...`
    pub description: String,
}

impl StudyProtocolSignature {
    pub fn entry(&self, series_uid: &str) -> Option<&ProtocolEntry> {
        self.entries.iter().find(|e| e.series_uid == series_uid)
    }
}

/// Aggregates the classifications of one study into its protocol signature
///
/// The result does not depend on the order of `classifications`.
///
/// # Example
///
/// ```
/// use dcmw_core::protocol::{aggregate, ProtocolTemplate};
///
/// let signature = aggregate("1.2.840.1", &[], &ProtocolTemplate::default());
/// assert!(!signature.complete);
/// assert_eq!(
///     signature.description,
///     "Not full protocol. Missing: T1, T2, DWI, Ultrafast T1"
/// );
/// ```
pub fn aggregate(
    study_uid: &str,
    classifications: &[ModalityClassification],
    template: &ProtocolTemplate,
) -> StudyProtocolSignature {
    let mut ordered: Vec<&ModalityClassification> = classifications.iter().collect();
    ordered.sort_by(|a, b| acquisition_order(a, b));

    let phases = contrast_phases(&ordered);
    let entries: Vec<ProtocolEntry> = ordered
        .iter()
        .zip(phases)
        .map(|(c, contrast_phase)| ProtocolEntry {
            series_uid: c.series_uid.clone(),
            category: c.category(),
            subtype: c.subtype(),
            label: c.label(),
            contrast_phase,
            acquisition_time: c.acquisition_time,
            series_number: c.series_number,
        })
        .collect();

    let missing = template.missing(ordered.iter().copied());
    let complete = missing.is_empty();
    let description = if complete {
        "Full protocol".to_string()
    } else {
        format!("Not full protocol. Missing: {}", missing.join(", "))
    };

    StudyProtocolSignature {
        study_uid: study_uid.to_string(),
        entries,
        complete,
        missing,
        ambiguous: classifications
            .iter()
            .any(|c| !c.is_classified() || c.ambiguous),
        description,
    }
}

/// Acquisition time, then series number, then series UID; missing values last
fn acquisition_order(a: &ModalityClassification, b: &ModalityClassification) -> Ordering {
    missing_last(&a.acquisition_time, &b.acquisition_time)
        .then_with(|| missing_last(&a.series_number, &b.series_number))
        .then_with(|| a.series_uid.cmp(&b.series_uid))
}

fn missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Labels the T1 contrast series in acquisition order
///
/// Subtractions and ultrafast dynamics are not part of the contrast series.
/// The first member is the pre-contrast scan, or a slow series that spans
/// both phases.
fn contrast_phases(ordered: &[&ModalityClassification]) -> Vec<Option<String>> {
    let ultrafast = T1Timeseries::Ultrafast.simple_name();
    let slow = T1Timeseries::Slow.simple_name();
    let mut position = 0;

    ordered
        .iter()
        .map(|c| {
            let in_contrast_series = c.category() == Some(ModalityCategory::T1W)
                && !c.is_subtraction()
                && c.timeseries() != Some(ultrafast);
            if !in_contrast_series {
                return None;
            }

            let phase = match position {
                0 if c.timeseries() == Some(slow) => "pre-contrast_post-contrast".to_string(),
                0 => "pre-contrast".to_string(),
                n => format!("post-contrast_{}", n),
            };
            position += 1;
            Some(phase)
        })
        .collect()
}
