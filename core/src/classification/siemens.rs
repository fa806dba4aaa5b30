//! Siemens rules, keyed on the sequence name (0018,0024).

use crate::classification::attributes::{SeriesAttributes, IMAGE_TYPE, SEQUENCE_NAME};
use crate::classification::rules::{t1_timeseries, Rule, RuleSet, Verdict};
use crate::types::{T1Timeseries, Vendor};

const CRITICAL: &[&str] = &[SEQUENCE_NAME, IMAGE_TYPE];

const T2_SEQUENCES: &[&str] = &[
    "*tse2d1_21",
    "*tir2d1_17",
    "*tse2d1_19",
    "*tse2d1_17",
    "*tse2d1_15",
    "*tse2d1_11",
    "*tse2d1_23",
    "*tir2d1_11",
    "*tseR2d1rs19",
];

const T1_SEQUENCES: &[&str] = &["*fl3d1", "*tse2d1_4", "*fl3d1_ns"];

pub fn rule_set() -> RuleSet {
    RuleSet::new(
        Vendor::Siemens,
        CRITICAL,
        vec![
            Rule::new("siemens_diffusion", is_diffusion, |_| Verdict::diffusion()),
            Rule::new("siemens_t2", is_t2, |_| Verdict::t2w()),
            Rule::new("siemens_mip", is_mip, |_| Verdict::t1w_mip()),
            Rule::new("siemens_subtraction", is_subtraction, |attrs| {
                let timeseries = if attrs.acquisition_times.len() > 1 {
                    T1Timeseries::Slow
                } else {
                    T1Timeseries::Single
                };
                Verdict::t1w(timeseries, true)
            }),
            Rule::new("siemens_t1_normalized", is_normalized, |_| {
                Verdict::t1w(T1Timeseries::Single, false)
            }),
            Rule::new("siemens_t1", is_t1, |attrs| {
                Verdict::t1w(t1_timeseries(attrs, Vendor::Siemens), false)
            }),
        ],
    )
}

fn sequence_in(attrs: &SeriesAttributes, names: &[&str]) -> bool {
    attrs
        .text(SEQUENCE_NAME)
        .is_some_and(|name| names.contains(&name))
}

fn is_diffusion(attrs: &SeriesAttributes) -> bool {
    // Older software versions spell the flavor DIFFUSSION
    matches!(
        attrs.image_type_value(2),
        Some("DIFFUSION") | Some("DIFFUSSION")
    )
}

fn is_t2(attrs: &SeriesAttributes) -> bool {
    sequence_in(attrs, T2_SEQUENCES)
}

fn is_t1(attrs: &SeriesAttributes) -> bool {
    sequence_in(attrs, T1_SEQUENCES)
}

fn is_mip(attrs: &SeriesAttributes) -> bool {
    is_t1(attrs) && attrs.image_type_value(3).is_some_and(|v| v.contains("MIP"))
}

fn last_image_type_is(attrs: &SeriesAttributes, value: &str) -> bool {
    attrs.image_type().and_then(|it| it.last()) == Some(value)
}

fn is_subtraction(attrs: &SeriesAttributes) -> bool {
    is_t1(attrs) && last_image_type_is(attrs, "SUB")
}

fn is_normalized(attrs: &SeriesAttributes) -> bool {
    is_t1(attrs) && last_image_type_is(attrs, "NORM")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::attributes::tests::{series, text, time};
    use crate::classification::attributes::ACQUISITION_TIME;
    use crate::types::{DerivedValue, FieldValue, ModalityCategory, DERIVED_MIP_TYPE};
    use rstest::rstest;

    fn attrs(sequence: &str, image_type: &str, times: &[u32]) -> SeriesAttributes {
        let base = || {
            vec![
                (SEQUENCE_NAME, text(sequence)),
                (IMAGE_TYPE, text(image_type)),
            ]
        };
        let mut images: Vec<Vec<(&str, FieldValue)>> = times
            .iter()
            .map(|&s| {
                let mut image = base();
                image.push((ACQUISITION_TIME, time(9, 0, s)));
                image
            })
            .collect();
        if images.is_empty() {
            images.push(base());
        }
        SeriesAttributes::from_record(&series(images), Vendor::Siemens)
    }

    #[rstest]
    #[case("*ep_b50_800", "ORIGINAL\\PRIMARY\\DIFFUSION\\NONE\\ND", "siemens_diffusion")]
    #[case("*ep_b0_800", "DERIVED\\PRIMARY\\DIFFUSSION\\ADC\\ND", "siemens_diffusion")]
    #[case("*tse2d1_17", "ORIGINAL\\PRIMARY\\M\\ND\\NORM", "siemens_t2")]
    #[case("*tir2d1_11", "ORIGINAL\\PRIMARY\\M\\ND", "siemens_t2")]
    #[case("*fl3d1", "DERIVED\\PRIMARY\\MIP_SAG\\MIP_SAG", "siemens_mip")]
    #[case("*fl3d1_ns", "DERIVED\\PRIMARY\\M\\ND\\SUB", "siemens_subtraction")]
    #[case("*fl3d1", "ORIGINAL\\PRIMARY\\M\\ND\\NORM", "siemens_t1_normalized")]
    #[case("*tse2d1_4", "ORIGINAL\\PRIMARY\\M\\ND", "siemens_t1")]
    fn test_rule_selection(#[case] sequence: &str, #[case] image_type: &str, #[case] rule: &str) {
        let (name, _) = rule_set().evaluate(&attrs(sequence, image_type, &[])).unwrap();
        assert_eq!(name, rule);
    }

    #[test]
    fn test_subtraction_with_several_times_is_slow() {
        let series = attrs("*fl3d1", "DERIVED\\PRIMARY\\M\\ND\\SUB", &[0, 50]);
        let (_, verdict) = rule_set().evaluate(&series).unwrap();

        assert_eq!(verdict, Verdict::t1w(T1Timeseries::Slow, true));
    }

    #[test]
    fn test_t1_dynamic_series_is_ultrafast() {
        let series = attrs("*fl3d1", "ORIGINAL\\PRIMARY\\M\\ND", &[0, 6, 12, 18]);
        let (_, verdict) = rule_set().evaluate(&series).unwrap();

        assert_eq!(verdict, Verdict::t1w(T1Timeseries::Ultrafast, false));
    }

    #[test]
    fn test_mip_is_t1_projection() {
        let series = attrs("*fl3d1", "DERIVED\\PRIMARY\\MIP_TRA\\MIP_TRA", &[]);
        let (_, verdict) = rule_set().evaluate(&series).unwrap();

        assert_eq!(verdict.category, ModalityCategory::Mip);
        assert_eq!(
            verdict.derived.get(DERIVED_MIP_TYPE),
            Some(&DerivedValue::text("t1w"))
        );
    }

    #[test]
    fn test_unknown_sequence_has_no_rule() {
        let series = attrs("*tfl3d1_16ns", "ORIGINAL\\PRIMARY\\M\\ND", &[]);
        assert!(rule_set().evaluate(&series).is_none());
    }
}
