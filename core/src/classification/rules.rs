use crate::classification::attributes::SeriesAttributes;
use crate::classification::{ge, generic, philips, siemens};
use crate::types::{
    DerivedQuantities, DerivedValue, DixonType, ModalityCategory, T1Timeseries, Vendor,
    DERIVED_DIXON_TYPE, DERIVED_MIP_TYPE, DERIVED_SUBTRACTION, DERIVED_TIMESERIES,
};

/// Category and derived quantities produced by a matching rule
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub category: ModalityCategory,
    pub derived: DerivedQuantities,
}

impl Verdict {
    pub fn new(category: ModalityCategory) -> Self {
        Self {
            category,
            derived: DerivedQuantities::new(),
        }
    }

    pub fn with(mut self, key: &str, value: DerivedValue) -> Self {
        self.derived.insert(key.to_string(), value);
        self
    }

    pub fn diffusion() -> Self {
        Self::new(ModalityCategory::Diffusion)
    }

    pub fn t2w() -> Self {
        Self::new(ModalityCategory::T2W)
    }

    pub fn t1w(timeseries: T1Timeseries, subtraction: bool) -> Self {
        Self::new(ModalityCategory::T1W)
            .with(DERIVED_TIMESERIES, DerivedValue::text(timeseries.simple_name()))
            .with(DERIVED_SUBTRACTION, DerivedValue::Flag(subtraction))
    }

    pub fn dixon(dixon_type: DixonType) -> Self {
        Self::new(ModalityCategory::MDixon)
            .with(DERIVED_DIXON_TYPE, DerivedValue::text(dixon_type.simple_name()))
    }

    /// Maximum intensity projection of a T1-weighted acquisition
    pub fn t1w_mip() -> Self {
        Self::new(ModalityCategory::Mip).with(DERIVED_MIP_TYPE, DerivedValue::text("t1w"))
    }
}

pub type Predicate = fn(&SeriesAttributes) -> bool;
pub type Outcome = fn(&SeriesAttributes) -> Verdict;

/// One named decision: when `predicate` holds, `outcome` classifies the series
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub predicate: Predicate,
    pub outcome: Outcome,
}

impl Rule {
    pub const fn new(name: &'static str, predicate: Predicate, outcome: Outcome) -> Self {
        Self {
            name,
            predicate,
            outcome,
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Ordered rules of one vendor plus the attributes they cannot do without
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub vendor: Vendor,
    pub critical: &'static [&'static str],
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(vendor: Vendor, critical: &'static [&'static str], rules: Vec<Rule>) -> Self {
        Self {
            vendor,
            critical,
            rules,
        }
    }

    /// Built-in rules for a vendor
    pub fn for_vendor(vendor: Vendor) -> Self {
        match vendor {
            Vendor::Philips => philips::rule_set(),
            Vendor::Siemens => siemens::rule_set(),
            Vendor::Ge => ge::rule_set(),
            Vendor::Generic => generic::rule_set(),
        }
    }

    /// Applies the rules in order; the first match wins
    pub fn evaluate(&self, attrs: &SeriesAttributes) -> Option<(&'static str, Verdict)> {
        self.rules
            .iter()
            .find(|rule| (rule.predicate)(attrs))
            .map(|rule| (rule.name, (rule.outcome)(attrs)))
    }
}

/// Timing series of a T1-weighted acquisition
///
/// One acquisition time is a single acquisition and a mean gap above 30s a
/// slow pre/post-contrast series. Exactly 1s apart is a single scan that
/// received two timestamps; GE only trusts that with exactly two times.
/// Anything else is an ultrafast dynamic series.
pub fn t1_timeseries(attrs: &SeriesAttributes, vendor: Vendor) -> T1Timeseries {
    let gap = match attrs.mean_gap_seconds() {
        Some(gap) => gap,
        None => return T1Timeseries::Single,
    };

    if gap > 30 {
        return T1Timeseries::Slow;
    }
    if gap == 1 && (vendor != Vendor::Ge || attrs.acquisition_times.len() == 2) {
        return T1Timeseries::Single;
    }
    T1Timeseries::Ultrafast
}
