//! GE rules, keyed on the private pulse sequence number (0019,109F).

use crate::classification::attributes::{SeriesAttributes, IMAGE_TYPE, PULSE_SEQUENCE};
use crate::classification::rules::{t1_timeseries, Rule, RuleSet, Verdict};
use crate::types::{DixonType, T1Timeseries, Vendor};

const CRITICAL: &[&str] = &[PULSE_SEQUENCE, IMAGE_TYPE];

const DIFFUSION_SEQUENCE: i64 = 0;
const T2_SEQUENCES: &[i64] = &[19, 56];
const T1_SEQUENCES: &[i64] = &[1, 3, 20, 22, 66, 85, 104];

pub fn rule_set() -> RuleSet {
    RuleSet::new(
        Vendor::Ge,
        CRITICAL,
        vec![
            Rule::new("ge_diffusion", is_diffusion, |_| Verdict::diffusion()),
            Rule::new("ge_t2", is_t2, |_| Verdict::t2w()),
            Rule::new("ge_dixon_water", is_dixon_water, |_| {
                Verdict::dixon(DixonType::Water)
            }),
            Rule::new("ge_dixon", is_dixon, |_| Verdict::dixon(DixonType::Unknown)),
            Rule::new("ge_subtraction", is_subtraction, |_| {
                Verdict::t1w(T1Timeseries::Single, true)
            }),
            Rule::new("ge_mip", is_mip, |_| Verdict::t1w_mip()),
            Rule::new("ge_t1_processed", is_processed, |_| {
                Verdict::t1w(T1Timeseries::Single, false)
            }),
            Rule::new("ge_t1", is_t1, |attrs| {
                Verdict::t1w(t1_timeseries(attrs, Vendor::Ge), false)
            }),
        ],
    )
}

fn pulse_sequence(attrs: &SeriesAttributes) -> Option<i64> {
    attrs.integer(PULSE_SEQUENCE)
}

fn is_diffusion(attrs: &SeriesAttributes) -> bool {
    pulse_sequence(attrs) == Some(DIFFUSION_SEQUENCE)
}

fn is_t2(attrs: &SeriesAttributes) -> bool {
    pulse_sequence(attrs).is_some_and(|seq| T2_SEQUENCES.contains(&seq))
}

fn is_t1(attrs: &SeriesAttributes) -> bool {
    pulse_sequence(attrs).is_some_and(|seq| T1_SEQUENCES.contains(&seq))
}

/// T1 sequence whose ImageType starts with DERIVED
fn is_derived_t1(attrs: &SeriesAttributes) -> bool {
    is_t1(attrs) && attrs.image_type_value(0) == Some("DERIVED")
}

/// T1 sequence whose ImageType starts with DERIVED\PRIMARY
fn is_derived_primary_t1(attrs: &SeriesAttributes) -> bool {
    is_derived_t1(attrs) && attrs.image_type_value(1) == Some("PRIMARY")
}

fn is_dixon(attrs: &SeriesAttributes) -> bool {
    is_derived_primary_t1(attrs) && attrs.image_type_value(2) == Some("DIXON")
}

fn is_dixon_water(attrs: &SeriesAttributes) -> bool {
    is_dixon(attrs) && attrs.image_type_value(3) == Some("WATER")
}

fn last_image_type_is(attrs: &SeriesAttributes, value: &str) -> bool {
    attrs.image_type().and_then(|it| it.last()) == Some(value)
}

fn is_subtraction(attrs: &SeriesAttributes) -> bool {
    is_derived_primary_t1(attrs) && last_image_type_is(attrs, "SUBTRACT")
}

fn is_mip(attrs: &SeriesAttributes) -> bool {
    is_derived_t1(attrs) && last_image_type_is(attrs, "MIP")
}

fn is_processed(attrs: &SeriesAttributes) -> bool {
    is_derived_t1(attrs) && last_image_type_is(attrs, "PROCESSED")
}
