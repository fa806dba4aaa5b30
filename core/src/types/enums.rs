use dicom_core::Tag;
use std::fmt;

/// Entity level a table's rows describe
///
/// The level decides which identifier keys a row: rows of the same
/// table sharing that identifier are merged into one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum EntityLevel {
    Patient,
    Study,
    Series,
    Image,
}

impl EntityLevel {
    /// Tag carrying the identifier of this level
    pub fn identifier_tag(&self) -> Tag {
        match self {
            EntityLevel::Patient => Tag(0x0010, 0x0020),
            EntityLevel::Study => Tag(0x0020, 0x000D),
            EntityLevel::Series => Tag(0x0020, 0x000E),
            EntityLevel::Image => Tag(0x0008, 0x0018),
        }
    }

    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            EntityLevel::Patient => "patient",
            EntityLevel::Study => "study",
            EntityLevel::Series => "series",
            EntityLevel::Image => "image",
        }
    }

    /// Parses an entity level from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Some(EntityLevel::Patient),
            "study" => Some(EntityLevel::Study),
            "series" => Some(EntityLevel::Series),
            "image" | "instance" => Some(EntityLevel::Image),
            _ => None,
        }
    }
}

impl fmt::Display for EntityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Manufacturer classification governing which private tags apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum Vendor {
    /// Unknown or unsupported manufacturer, vendor-neutral fields only
    #[default]
    Generic,
    Philips,
    Siemens,
    Ge,
}

impl Vendor {
    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            Vendor::Generic => "generic",
            Vendor::Philips => "philips",
            Vendor::Siemens => "siemens",
            Vendor::Ge => "ge",
        }
    }

    /// Parses a vendor scope as written in table definitions
    ///
    /// `Generic` is not a valid scope: a field without a vendor is
    /// already vendor-neutral.
    pub fn from_scope(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "philips" => Some(Vendor::Philips),
            "siemens" => Some(Vendor::Siemens),
            "ge" => Some(Vendor::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Top-level clinical classification of an MR series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum ModalityCategory {
    T1W,
    T2W,
    Diffusion,
    MDixon,
    #[serde(rename = "MIP")]
    Mip,
}

impl ModalityCategory {
    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            ModalityCategory::T1W => "T1W",
            ModalityCategory::T2W => "T2W",
            ModalityCategory::Diffusion => "Diffusion",
            ModalityCategory::MDixon => "MDixon",
            ModalityCategory::Mip => "MIP",
        }
    }

    /// Returns whether this category is refined by a subtype pass
    pub fn has_subtypes(&self) -> bool {
        matches!(self, ModalityCategory::Diffusion)
    }
}

impl fmt::Display for ModalityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Subtype within the diffusion category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[serde(rename_all = "UPPERCASE")]
pub enum Subtype {
    /// Diffusion weighted acquisition, carries its b-values
    Dwi,
    /// Apparent diffusion coefficient map
    Adc,
    /// Exponential ADC map
    Eadc,
}

impl Subtype {
    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            Subtype::Dwi => "DWI",
            Subtype::Adc => "ADC",
            Subtype::Eadc => "EADC",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Temporal structure of a T1-weighted series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum T1Timeseries {
    Single,
    Slow,
    Ultrafast,
}

impl T1Timeseries {
    pub fn simple_name(&self) -> &'static str {
        match self {
            T1Timeseries::Single => "single",
            T1Timeseries::Slow => "slow",
            T1Timeseries::Ultrafast => "ultrafast",
        }
    }
}

impl fmt::Display for T1Timeseries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Reconstructed image of an mDixon acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DixonType {
    InPhase,
    OutPhase,
    Water,
    Fat,
    AllVariants,
    Unknown,
}

impl DixonType {
    pub fn simple_name(&self) -> &'static str {
        match self {
            DixonType::InPhase => "InPhase",
            DixonType::OutPhase => "OutPhase",
            DixonType::Water => "Water",
            DixonType::Fat => "Fat",
            DixonType::AllVariants => "All 4 variants",
            DixonType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DixonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}
