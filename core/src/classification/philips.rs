//! Philips rules, keyed on the acquisition contrast of the MR sequence
//! and the vendor-specific third ImageType component.

use crate::classification::attributes::{
    SeriesAttributes, ACQUISITION_CONTRAST, IMAGE_TYPE, PULSE_SEQUENCE_NAME,
};
use crate::classification::rules::{t1_timeseries, Rule, RuleSet, Verdict};
use crate::types::{DixonType, T1Timeseries, Vendor};

const CRITICAL: &[&str] = &[ACQUISITION_CONTRAST, PULSE_SEQUENCE_NAME, IMAGE_TYPE];

const T1_FFE: &[&str] = &["ORIGINAL", "PRIMARY", "M_FFE", "M", "FFE"];
const T1_SE: &[&str] = &["ORIGINAL", "PRIMARY", "M_SE", "M", "SE"];

pub fn rule_set() -> RuleSet {
    RuleSet::new(
        Vendor::Philips,
        CRITICAL,
        vec![
            Rule::new("philips_diffusion", is_diffusion, |_| Verdict::diffusion()),
            Rule::new("philips_t2", is_t2, |_| Verdict::t2w()),
            Rule::new("philips_dixon_all_variants", is_dixon_all_variants, |_| {
                Verdict::dixon(DixonType::AllVariants)
            }),
            Rule::new("philips_dixon_in_phase", is_dixon_in_phase, |_| {
                Verdict::dixon(DixonType::InPhase)
            }),
            Rule::new("philips_dixon_out_phase", is_dixon_out_phase, |_| {
                Verdict::dixon(DixonType::OutPhase)
            }),
            Rule::new("philips_dixon_fat", is_dixon_fat, |_| {
                Verdict::dixon(DixonType::Fat)
            }),
            Rule::new("philips_water_ultrafast", is_ultrafast_water, |_| {
                Verdict::t1w(T1Timeseries::Ultrafast, false)
            }),
            Rule::new("philips_dixon_water", is_dixon_water, |_| {
                Verdict::dixon(DixonType::Water)
            }),
            Rule::new("philips_t1", is_t1_magnitude, |attrs| {
                Verdict::t1w(t1_timeseries(attrs, Vendor::Philips), false)
            }),
            Rule::new("philips_mip", is_projection, |_| Verdict::t1w_mip()),
        ],
    )
}

fn contrast_is(attrs: &SeriesAttributes, contrast: &str) -> bool {
    attrs.text(ACQUISITION_CONTRAST) == Some(contrast)
}

/// T1 contrast with the given third ImageType component
fn t1_flavor_is(attrs: &SeriesAttributes, flavor: &str) -> bool {
    contrast_is(attrs, "T1") && attrs.image_type_value(2) == Some(flavor)
}

fn is_diffusion(attrs: &SeriesAttributes) -> bool {
    contrast_is(attrs, "DIFFUSION")
}

fn is_t2(attrs: &SeriesAttributes) -> bool {
    contrast_is(attrs, "T2")
}

fn is_dixon_all_variants(attrs: &SeriesAttributes) -> bool {
    contrast_is(attrs, "T1") && attrs.image_type().is_some_and(|it| it.len() == 4)
}

fn is_dixon_in_phase(attrs: &SeriesAttributes) -> bool {
    t1_flavor_is(attrs, "IP")
}

fn is_dixon_out_phase(attrs: &SeriesAttributes) -> bool {
    t1_flavor_is(attrs, "OP")
}

fn is_dixon_fat(attrs: &SeriesAttributes) -> bool {
    t1_flavor_is(attrs, "F")
}

/// Water images acquired as a dynamic series
///
/// Two times exactly 1s apart belong to a single scan and stay mDixon.
fn is_ultrafast_water(attrs: &SeriesAttributes) -> bool {
    t1_flavor_is(attrs, "W") && attrs.mean_gap_seconds().is_some_and(|gap| gap != 1)
}

fn is_dixon_water(attrs: &SeriesAttributes) -> bool {
    t1_flavor_is(attrs, "W")
}

fn is_t1_magnitude(attrs: &SeriesAttributes) -> bool {
    contrast_is(attrs, "T1")
        && attrs
            .image_type()
            .is_some_and(|it| it.matches(T1_FFE) || it.matches(T1_SE))
}

fn is_projection(attrs: &SeriesAttributes) -> bool {
    contrast_is(attrs, "T1")
        && matches!(
            attrs.image_type_value(2),
            Some("PROJECTION IMAGE") | Some("PROJECTION IMAG")
        )
}
