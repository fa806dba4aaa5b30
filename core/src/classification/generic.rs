//! Conservative rules for scanners without a dedicated rule set.
//!
//! Only standard attributes are consulted and mDixon is never guessed.

use crate::classification::attributes::{SeriesAttributes, ECHO_TIME, IMAGE_TYPE, REPETITION_TIME};
use crate::classification::rules::{t1_timeseries, Rule, RuleSet, Verdict};
use crate::types::Vendor;

const CRITICAL: &[&str] = &[IMAGE_TYPE];

const T1_MAX_REPETITION_MS: f64 = 800.0;
const T1_MAX_ECHO_MS: f64 = 15.0;
const T2_MIN_REPETITION_MS: f64 = 2000.0;
const T2_MIN_ECHO_MS: f64 = 80.0;

pub fn rule_set() -> RuleSet {
    RuleSet::new(
        Vendor::Generic,
        CRITICAL,
        vec![
            Rule::new("generic_adc", is_adc, |_| Verdict::diffusion()),
            Rule::new("generic_b_value", has_diffusion_weighting, |_| {
                Verdict::diffusion()
            }),
            Rule::new("generic_mip", is_t1_projection, |_| Verdict::t1w_mip()),
            Rule::new("generic_t2", is_t2_timing, |_| Verdict::t2w()),
            Rule::new("generic_t1", is_t1_timing, |attrs| {
                Verdict::t1w(t1_timeseries(attrs, Vendor::Generic), false)
            }),
        ],
    )
}

fn image_type_has(attrs: &SeriesAttributes, token: &str) -> bool {
    attrs.image_type().is_some_and(|it| it.contains(token))
}

fn is_adc(attrs: &SeriesAttributes) -> bool {
    image_type_has(attrs, "ADC")
}

fn has_diffusion_weighting(attrs: &SeriesAttributes) -> bool {
    attrs.b_values.iter().any(|&b| b > 0)
}

fn is_t1_timing(attrs: &SeriesAttributes) -> bool {
    match (attrs.decimal(REPETITION_TIME), attrs.decimal(ECHO_TIME)) {
        (Some(tr), Some(te)) => tr <= T1_MAX_REPETITION_MS && te <= T1_MAX_ECHO_MS,
        _ => false,
    }
}

fn is_t2_timing(attrs: &SeriesAttributes) -> bool {
    match (attrs.decimal(REPETITION_TIME), attrs.decimal(ECHO_TIME)) {
        (Some(tr), Some(te)) => tr >= T2_MIN_REPETITION_MS && te >= T2_MIN_ECHO_MS,
        _ => false,
    }
}

fn is_t1_projection(attrs: &SeriesAttributes) -> bool {
    (image_type_has(attrs, "MIP") || image_type_has(attrs, "PROJECTION IMAGE"))
        && is_t1_timing(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::attributes::tests::{series, text};
    use crate::classification::attributes::DIFFUSION_B_VALUE;
    use crate::types::{FieldValue, ModalityCategory};
    use rstest::rstest;

    fn attrs(image_type: &str, tr: f64, te: f64) -> SeriesAttributes {
        let record = series(vec![vec![
            (IMAGE_TYPE, text(image_type)),
            (REPETITION_TIME, FieldValue::Decimal(tr)),
            (ECHO_TIME, FieldValue::Decimal(te)),
        ]]);
        SeriesAttributes::from_record(&record, Vendor::Generic)
    }

    #[rstest]
    #[case("DERIVED\\PRIMARY\\DIFFUSION\\ADC", 5000.0, 70.0, "generic_adc")]
    #[case("DERIVED\\PRIMARY\\PROJECTION IMAGE", 4.5, 2.1, "generic_mip")]
    #[case("DERIVED\\PRIMARY\\MIP", 6.0, 3.0, "generic_mip")]
    #[case("ORIGINAL\\PRIMARY\\M", 4000.0, 100.0, "generic_t2")]
    #[case("ORIGINAL\\PRIMARY\\M", 5.0, 2.5, "generic_t1")]
    fn test_rule_selection(
        #[case] image_type: &str,
        #[case] tr: f64,
        #[case] te: f64,
        #[case] rule: &str,
    ) {
        let (name, _) = rule_set().evaluate(&attrs(image_type, tr, te)).unwrap();
        assert_eq!(name, rule);
    }

    #[test]
    fn test_b_value_marks_diffusion() {
        let record = series(vec![
            vec![
                (IMAGE_TYPE, text("ORIGINAL\\PRIMARY\\M")),
                (DIFFUSION_B_VALUE, FieldValue::Decimal(0.0)),
            ],
            vec![
                (IMAGE_TYPE, text("ORIGINAL\\PRIMARY\\M")),
                (DIFFUSION_B_VALUE, FieldValue::Decimal(800.0)),
            ],
        ]);
        let attrs = SeriesAttributes::from_record(&record, Vendor::Generic);
        let (name, verdict) = rule_set().evaluate(&attrs).unwrap();

        assert_eq!(name, "generic_b_value");
        assert_eq!(verdict.category, ModalityCategory::Diffusion);
    }

    #[test]
    fn test_intermediate_timing_has_no_rule() {
        assert!(rule_set()
            .evaluate(&attrs("ORIGINAL\\PRIMARY\\M", 1500.0, 30.0))
            .is_none());
    }

    #[test]
    fn test_projection_with_t2_timing_is_not_mip() {
        let (name, _) = rule_set()
            .evaluate(&attrs("DERIVED\\PRIMARY\\MIP", 4000.0, 100.0))
            .unwrap();
        assert_eq!(name, "generic_t2");
    }
}
