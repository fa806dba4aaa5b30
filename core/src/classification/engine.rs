use crate::classification::attributes::{
    Critical, SeriesAttributes, SERIES_DESCRIPTION, SERIES_NUMBER,
};
use crate::classification::rules::RuleSet;
use crate::classification::subtype::diffusion_subtype;
use crate::extraction::AggregatedSeriesRecord;
use crate::types::{ClassificationOutcome, ModalityClassification, UnclassifiableReason, Vendor};
use log::debug;

/// Classifies aggregated MR series into modality categories
///
/// Classification is a pure function of the series record and the vendor:
/// the same input always yields the same [`ModalityClassification`].
///
/// # Example
///
/// ```
/// use dcmw_core::classification::ClassificationEngine;
/// use dcmw_core::extraction::{AggregatedSeriesRecord, ImageAttributes};
/// use dcmw_core::{FieldValue, ModalityCategory, Vendor};
///
/// let mut record = AggregatedSeriesRecord::new("1.2.3");
/// record.study_uid = Some("1.2".to_string());
/// record.images.push(ImageAttributes {
///     instance_uid: "1.2.3.1".to_string(),
///     fields: [
///         ("PulseSequence", FieldValue::Integer(19)),
///         ("ImageType", FieldValue::Text("ORIGINAL\\PRIMARY\\OTHER".to_string())),
///     ]
///     .into_iter()
///     .map(|(name, value)| (name.to_string(), value))
///     .collect(),
/// });
///
/// let classification = ClassificationEngine::classify(&record, Vendor::Ge);
/// assert_eq!(classification.category(), Some(ModalityCategory::T2W));
/// ```
pub struct ClassificationEngine;

impl ClassificationEngine {
    /// Classifies a series with the built-in rules of its vendor
    pub fn classify(record: &AggregatedSeriesRecord, vendor: Vendor) -> ModalityClassification {
        Self::classify_with(record, &RuleSet::for_vendor(vendor))
    }

    /// Classifies a series with an explicit rule set
    pub fn classify_with(record: &AggregatedSeriesRecord, rules: &RuleSet) -> ModalityClassification {
        let attrs = SeriesAttributes::from_record(record, rules.vendor);
        let (outcome, ambiguous) = Self::outcome(&attrs, rules);

        ModalityClassification {
            series_uid: attrs.series_uid.clone(),
            study_uid: attrs.study_uid.clone().unwrap_or_default(),
            vendor: rules.vendor,
            outcome,
            ambiguous,
            acquisition_time: attrs.first_acquisition_time(),
            series_number: attrs.integer(SERIES_NUMBER),
            series_description: attrs.text(SERIES_DESCRIPTION).map(str::to_string),
        }
    }

    fn outcome(attrs: &SeriesAttributes, rules: &RuleSet) -> (ClassificationOutcome, bool) {
        if let Some(reason) = check_critical(attrs, rules.critical) {
            debug!("Series {}: {}", attrs.series_uid, reason);
            return (ClassificationOutcome::unclassifiable(reason), false);
        }

        let (rule, verdict) = match rules.evaluate(attrs) {
            Some(matched) => matched,
            None => {
                let reason = match rules.vendor {
                    Vendor::Generic => UnclassifiableReason::UnsupportedVendor,
                    _ => UnclassifiableReason::NoMatchingRule,
                };
                debug!("Series {}: {}", attrs.series_uid, reason);
                return (ClassificationOutcome::unclassifiable(reason), false);
            }
        };
        debug!(
            "Series {}: rule {} -> {}",
            attrs.series_uid, rule, verdict.category
        );

        let mut outcome = ClassificationOutcome::Classified {
            category: verdict.category,
            subtype: None,
            derived: verdict.derived,
            rule,
        };
        let mut ambiguous = false;

        if verdict.category.has_subtypes() {
            let refined = diffusion_subtype(attrs);
            ambiguous = refined.ambiguous;
            outcome = outcome.with_subtype(refined.subtype);
            for (key, value) in refined.derived {
                outcome = outcome.with_derived(&key, value);
            }
        }

        (outcome, ambiguous)
    }
}

/// Missing critical attributes take precedence over conflicting ones
fn check_critical(attrs: &SeriesAttributes, critical: &[&str]) -> Option<UnclassifiableReason> {
    let mut missing = Vec::new();
    let mut conflicting = Vec::new();

    for &field in critical {
        match attrs.critical(field) {
            Critical::Missing => missing.push(field.to_string()),
            Critical::Conflicting => conflicting.push(field.to_string()),
            Critical::Present => {}
        }
    }

    if !missing.is_empty() {
        Some(UnclassifiableReason::MissingCritical(missing))
    } else if !conflicting.is_empty() {
        Some(UnclassifiableReason::ConflictingCritical(conflicting))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::attributes::tests::{series, text, time};
    use crate::classification::attributes::{
        ACQUISITION_CONTRAST, ACQUISITION_TIME, DIFFUSION_B_VALUE, IMAGE_TYPE,
        PULSE_SEQUENCE_NAME, SEQUENCE_NAME,
    };
    use crate::types::{
        DerivedValue, FieldValue, ModalityCategory, Subtype, DERIVED_B_VALUES,
    };
    use chrono::NaiveTime;

    fn philips_image(contrast: &str, image_type: &str) -> Vec<(&'static str, FieldValue)> {
        vec![
            (ACQUISITION_CONTRAST, text(contrast)),
            (PULSE_SEQUENCE_NAME, text("T1FFE")),
            (IMAGE_TYPE, text(image_type)),
        ]
    }

    #[test]
    fn test_philips_t1_slow_series() {
        let mut first = philips_image("T1", "ORIGINAL\\PRIMARY\\M_FFE\\M\\FFE");
        first.push((ACQUISITION_TIME, time(8, 0, 0)));
        let mut second = philips_image("T1", "ORIGINAL\\PRIMARY\\M_FFE\\M\\FFE");
        second.push((ACQUISITION_TIME, time(8, 1, 30)));
        let mut record = series(vec![first, second]);
        record
            .series_fields
            .insert(SERIES_NUMBER.to_string(), FieldValue::Integer(501));

        let c = ClassificationEngine::classify(&record, Vendor::Philips);

        assert_eq!(c.category(), Some(ModalityCategory::T1W));
        assert_eq!(c.timeseries(), Some("slow"));
        assert!(!c.is_subtraction());
        assert_eq!(c.rule(), Some("philips_t1"));
        assert_eq!(c.series_number, Some(501));
        assert_eq!(c.study_uid, "1.2");
        assert_eq!(c.acquisition_time, NaiveTime::from_hms_opt(8, 0, 0));
        assert!(!c.ambiguous);
    }

    #[test]
    fn test_missing_critical_attribute() {
        let record = series(vec![vec![
            (ACQUISITION_CONTRAST, text("T1")),
            (IMAGE_TYPE, text("ORIGINAL\\PRIMARY\\M_FFE\\M\\FFE")),
        ]]);

        let c = ClassificationEngine::classify(&record, Vendor::Philips);

        assert_eq!(
            c.unclassifiable_reason(),
            Some(&UnclassifiableReason::MissingCritical(vec![
                PULSE_SEQUENCE_NAME.to_string()
            ]))
        );
        assert_eq!(c.category(), None);
    }

    #[test]
    fn test_conflicting_critical_attribute() {
        let record = series(vec![
            vec![
                (SEQUENCE_NAME, text("*fl3d1")),
                (IMAGE_TYPE, text("ORIGINAL\\PRIMARY\\M\\ND")),
            ],
            vec![
                (SEQUENCE_NAME, text("*tse2d1_17")),
                (IMAGE_TYPE, text("ORIGINAL\\PRIMARY\\M\\ND")),
            ],
        ]);

        let c = ClassificationEngine::classify(&record, Vendor::Siemens);

        assert_eq!(
            c.unclassifiable_reason(),
            Some(&UnclassifiableReason::ConflictingCritical(vec![
                SEQUENCE_NAME.to_string()
            ]))
        );
        assert_eq!(
            c.unclassifiable_reason().map(|r| r.message()),
            Some("Missing information in critical parameters")
        );
    }

    #[test]
    fn test_no_matching_rule_for_known_vendor() {
        let record = series(vec![philips_image("PROTON_DENSITY", "ORIGINAL\\PRIMARY\\M_SE\\M\\SE")]);

        let c = ClassificationEngine::classify(&record, Vendor::Philips);

        assert_eq!(
            c.unclassifiable_reason(),
            Some(&UnclassifiableReason::NoMatchingRule)
        );
    }

    #[test]
    fn test_generic_vendor_without_match_is_unsupported() {
        let record = series(vec![vec![(IMAGE_TYPE, text("ORIGINAL\\PRIMARY\\M"))]]);

        let c = ClassificationEngine::classify(&record, Vendor::Generic);

        assert_eq!(
            c.unclassifiable_reason().map(|r| r.message()),
            Some("No logic for vendor")
        );
    }

    #[test]
    fn test_diffusion_subtype_and_b_values() {
        let images = [0.0, 800.0, 50.0]
            .iter()
            .map(|&b| {
                let mut image = philips_image("DIFFUSION", "ORIGINAL\\PRIMARY\\DIFFUSION\\NONE");
                image.push((DIFFUSION_B_VALUE, FieldValue::Decimal(b)));
                image
            })
            .collect();

        let c = ClassificationEngine::classify(&series(images), Vendor::Philips);

        assert_eq!(c.category(), Some(ModalityCategory::Diffusion));
        assert_eq!(c.subtype(), Some(Subtype::Dwi));
        assert_eq!(c.label(), "Diffusion/DWI");
        assert_eq!(
            c.derived(DERIVED_B_VALUES),
            Some(&DerivedValue::IntList(vec![0, 50, 800]))
        );
        assert!(!c.ambiguous);
    }

    #[test]
    fn test_dwi_without_b_values_is_ambiguous() {
        let record = series(vec![philips_image(
            "DIFFUSION",
            "ORIGINAL\\PRIMARY\\DIFFUSION\\NONE",
        )]);

        let c = ClassificationEngine::classify(&record, Vendor::Philips);

        assert_eq!(c.subtype(), Some(Subtype::Dwi));
        assert!(c.ambiguous);
    }

    #[test]
    fn test_adc_map() {
        let record = series(vec![philips_image("DIFFUSION", "DERIVED\\PRIMARY\\DIFFUSION\\ADC")]);

        let c = ClassificationEngine::classify(&record, Vendor::Philips);

        assert_eq!(c.subtype(), Some(Subtype::Adc));
        assert_eq!(c.derived(DERIVED_B_VALUES), None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let mut images: Vec<Vec<(&str, FieldValue)>> = (0..4)
            .map(|i| {
                vec![
                    (SEQUENCE_NAME, text("*fl3d1")),
                    (IMAGE_TYPE, text("ORIGINAL\\PRIMARY\\M\\ND")),
                    (ACQUISITION_TIME, time(9, 0, i * 7)),
                ]
            })
            .collect();
        let forward = ClassificationEngine::classify(&series(images.clone()), Vendor::Siemens);
        images.reverse();
        let reversed = ClassificationEngine::classify(&series(images), Vendor::Siemens);

        assert_eq!(forward.outcome, reversed.outcome);
        assert_eq!(forward.acquisition_time, reversed.acquisition_time);
        assert_eq!(forward.timeseries(), Some("ultrafast"));
    }
}
