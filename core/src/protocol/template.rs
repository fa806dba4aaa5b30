use crate::types::{
    DerivedValue, ModalityCategory, ModalityClassification, Subtype, DERIVED_SUBTRACTION,
    DERIVED_TIMESERIES,
};
use std::collections::BTreeMap;

/// One kind of series a complete study must contain
///
/// A classification satisfies the requirement when its category matches,
/// its subtype matches (if one is required), every `derived` entry is
/// present with the same value and no `excluded` entry matches.
///
/// # Example
///
/// ```
/// use dcmw_core::protocol::ProtocolRequirement;
/// use dcmw_core::{DerivedValue, ModalityCategory};
///
/// let requirement = ProtocolRequirement::new("T1", ModalityCategory::T1W)
///     .with_derived("subtraction", DerivedValue::Flag(false))
///     .with_min_count(2);
///
/// assert_eq!(requirement.min_count, 2);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[serde(deny_unknown_fields)]
pub struct ProtocolRequirement {
    /// Name reported when the requirement is not met
    pub label: String,

    pub category: ModalityCategory,

    #[serde(default)]
    pub subtype: Option<Subtype>,

    /// Derived quantities that must be present with these values
    #[serde(default)]
    pub derived: BTreeMap<String, DerivedValue>,

    /// Derived quantities that disqualify a series
    #[serde(default)]
    pub excluded: BTreeMap<String, DerivedValue>,

    #[serde(default = "default_min_count")]
    pub min_count: usize,
}

fn default_min_count() -> usize {
    1
}

impl ProtocolRequirement {
    pub fn new(label: impl Into<String>, category: ModalityCategory) -> Self {
        Self {
            label: label.into(),
            category,
            subtype: None,
            derived: BTreeMap::new(),
            excluded: BTreeMap::new(),
            min_count: default_min_count(),
        }
    }

    /// Builder: require a subtype
    pub fn with_subtype(mut self, subtype: Subtype) -> Self {
        self.subtype = Some(subtype);
        self
    }

    /// Builder: require a derived value
    pub fn with_derived(mut self, key: &str, value: DerivedValue) -> Self {
        self.derived.insert(key.to_string(), value);
        self
    }

    /// Builder: reject series carrying a derived value
    pub fn excluding(mut self, key: &str, value: DerivedValue) -> Self {
        self.excluded.insert(key.to_string(), value);
        self
    }

    /// Builder: minimum number of matching series
    pub fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count;
        self
    }

    /// Checks whether a classification counts towards this requirement
    pub fn is_satisfied_by(&self, classification: &ModalityClassification) -> bool {
        if classification.category() != Some(self.category) {
            return false;
        }
        if self.subtype.is_some() && classification.subtype() != self.subtype {
            return false;
        }
        let holds = |key: &String, expected: &DerivedValue| match classification.derived(key) {
            Some(actual) => actual == expected,
            // An absent flag reads as false
            None => *expected == DerivedValue::Flag(false),
        };
        self.derived.iter().all(|(key, value)| holds(key, value))
            && !self.excluded.iter().any(|(key, value)| holds(key, value))
    }
}

/// Ordered set of requirements deciding whether a study is complete
///
/// The default template is the breast MRI protocol: at least two T1
/// contrast series, a T2, a diffusion series and an ultrafast T1.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[serde(deny_unknown_fields)]
pub struct ProtocolTemplate {
    #[serde(default)]
    pub requirements: Vec<ProtocolRequirement>,
}

impl Default for ProtocolTemplate {
    fn default() -> Self {
        let not_subtracted = DerivedValue::Flag(false);
        Self {
            requirements: vec![
                ProtocolRequirement::new("T1", ModalityCategory::T1W)
                    .with_derived(DERIVED_SUBTRACTION, not_subtracted.clone())
                    .excluding(DERIVED_TIMESERIES, DerivedValue::text("ultrafast"))
                    .with_min_count(2),
                ProtocolRequirement::new("T2", ModalityCategory::T2W),
                ProtocolRequirement::new("DWI", ModalityCategory::Diffusion),
                ProtocolRequirement::new("Ultrafast T1", ModalityCategory::T1W)
                    .with_derived(DERIVED_SUBTRACTION, not_subtracted)
                    .with_derived(DERIVED_TIMESERIES, DerivedValue::text("ultrafast")),
            ],
        }
    }
}

impl ProtocolTemplate {
    pub fn new(requirements: Vec<ProtocolRequirement>) -> Self {
        Self { requirements }
    }

    /// Builder: append a requirement
    pub fn with_requirement(mut self, requirement: ProtocolRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Labels of the requirements not met by `classifications`, in template order
    pub fn missing<'c>(
        &self,
        classifications: impl IntoIterator<Item = &'c ModalityClassification> + Clone,
    ) -> Vec<String> {
        self.requirements
            .iter()
            .filter(|requirement| {
                let count = classifications
                    .clone()
                    .into_iter()
                    .filter(|c| requirement.is_satisfied_by(c))
                    .count();
                count < requirement.min_count
            })
            .map(|requirement| requirement.label.clone())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{ClassificationOutcome, T1Timeseries, Vendor};

    pub(crate) fn classified(
        series_uid: &str,
        outcome: ClassificationOutcome,
    ) -> ModalityClassification {
        ModalityClassification {
            series_uid: series_uid.to_string(),
            study_uid: "1.2".to_string(),
            vendor: Vendor::Philips,
            outcome,
            ambiguous: false,
            acquisition_time: None,
            series_number: None,
            series_description: None,
        }
    }

    pub(crate) fn t1(series_uid: &str, timeseries: T1Timeseries, subtraction: bool) -> ModalityClassification {
        classified(
            series_uid,
            ClassificationOutcome::classified(ModalityCategory::T1W, "t1")
                .with_derived(DERIVED_TIMESERIES, DerivedValue::text(timeseries.simple_name()))
                .with_derived(DERIVED_SUBTRACTION, DerivedValue::Flag(subtraction)),
        )
    }

    pub(crate) fn of(series_uid: &str, category: ModalityCategory) -> ModalityClassification {
        classified(series_uid, ClassificationOutcome::classified(category, "rule"))
    }

    #[test]
    fn test_t1_requirement_excludes_subtraction_and_ultrafast() {
        let template = ProtocolTemplate::default();
        let t1_requirement = &template.requirements[0];

        assert!(t1_requirement.is_satisfied_by(&t1("a", T1Timeseries::Slow, false)));
        assert!(t1_requirement.is_satisfied_by(&t1("b", T1Timeseries::Single, false)));
        assert!(!t1_requirement.is_satisfied_by(&t1("c", T1Timeseries::Single, true)));
        assert!(!t1_requirement.is_satisfied_by(&t1("d", T1Timeseries::Ultrafast, false)));
        assert!(!t1_requirement.is_satisfied_by(&of("e", ModalityCategory::T2W)));
    }

    #[test]
    fn test_subtype_requirement() {
        let requirement =
            ProtocolRequirement::new("ADC", ModalityCategory::Diffusion).with_subtype(Subtype::Adc);
        let dwi = classified(
            "a",
            ClassificationOutcome::classified(ModalityCategory::Diffusion, "dwi")
                .with_subtype(Subtype::Dwi),
        );
        let adc = classified(
            "b",
            ClassificationOutcome::classified(ModalityCategory::Diffusion, "dwi")
                .with_subtype(Subtype::Adc),
        );

        assert!(!requirement.is_satisfied_by(&dwi));
        assert!(requirement.is_satisfied_by(&adc));
    }

    #[test]
    fn test_missing_labels_in_template_order() {
        let template = ProtocolTemplate::default();
        let series = vec![
            t1("a", T1Timeseries::Single, false),
            of("b", ModalityCategory::Diffusion),
        ];

        assert_eq!(template.missing(&series), vec!["T1", "T2", "Ultrafast T1"]);
    }

    #[test]
    fn test_template_from_toml() {
        let toml_str = r#"
            [[requirements]]
            label = "T2"
            category = "T2W"

            [[requirements]]
            label = "ADC"
            category = "Diffusion"
            subtype = "ADC"

            [[requirements]]
            label = "Dynamic"
            category = "T1W"
            min_count = 3
            derived = { timeseries = "ultrafast", subtraction = false }
        "#;
        let template: ProtocolTemplate = toml::from_str(toml_str).unwrap();

        assert_eq!(template.requirements.len(), 3);
        assert_eq!(template.requirements[0].min_count, 1);
        assert_eq!(template.requirements[1].subtype, Some(Subtype::Adc));
        assert_eq!(
            template.requirements[2].derived.get("subtraction"),
            Some(&DerivedValue::Flag(false))
        );
    }

    #[test]
    fn test_unknown_requirement_key_is_rejected() {
        let toml_str = r#"
            [[requirements]]
            label = "T2"
            category = "T2W"
            minimum = 2
        "#;
        assert!(toml::from_str::<ProtocolTemplate>(toml_str).is_err());
    }
}
