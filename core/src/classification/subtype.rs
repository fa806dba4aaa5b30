use crate::classification::attributes::SeriesAttributes;
use crate::types::{DerivedQuantities, DerivedValue, Subtype, DERIVED_B_VALUES};

/// Subtype of a diffusion series
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionSubtype {
    pub subtype: Subtype,
    pub derived: DerivedQuantities,
    /// DWI without any b-value
    pub ambiguous: bool,
}

/// Refines a diffusion series into DWI, ADC or EADC
///
/// Parametric maps are recognised by their ImageType tokens, or by derived
/// pixels without any b-value. Everything else is a DWI carrying its sorted
/// distinct b-values.
pub fn diffusion_subtype(attrs: &SeriesAttributes) -> DiffusionSubtype {
    let image_type = attrs.image_type();
    let has_token = |token: &str| image_type.is_some_and(|it| it.contains(token));

    if has_token("EADC") {
        return parametric(Subtype::Eadc);
    }
    if has_token("ADC") {
        return parametric(Subtype::Adc);
    }
    if image_type.is_some_and(|it| it.is_derived()) && attrs.b_values.is_empty() {
        return parametric(Subtype::Adc);
    }

    let mut derived = DerivedQuantities::new();
    derived.insert(
        DERIVED_B_VALUES.to_string(),
        DerivedValue::IntList(attrs.b_values.clone()),
    );
    DiffusionSubtype {
        subtype: Subtype::Dwi,
        derived,
        ambiguous: attrs.b_values.is_empty(),
    }
}

fn parametric(subtype: Subtype) -> DiffusionSubtype {
    DiffusionSubtype {
        subtype,
        derived: DerivedQuantities::new(),
        ambiguous: false,
    }
}
