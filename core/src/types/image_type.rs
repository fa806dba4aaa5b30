use std::fmt;

/// DICOM ImageType field decomposed into its components
///
/// The ImageType field contains information about:
/// - `pixels`: First element (e.g., "ORIGINAL", "DERIVED")
/// - `exam`: Second element (e.g., "PRIMARY", "SECONDARY")
/// - `flavor`: Third element, vendor specific (e.g., "M_FFE", "DIFFUSION", "DIXON")
/// - `extras`: Additional elements beyond the first three
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ImageType {
    pub pixels: String,
    pub exam: String,
    pub flavor: Option<String>,
    pub extras: Option<Vec<String>>,
}

impl ImageType {
    /// Creates a new ImageType
    pub fn new(
        pixels: String,
        exam: String,
        flavor: Option<String>,
        extras: Option<Vec<String>>,
    ) -> Self {
        Self {
            pixels,
            exam,
            flavor,
            extras,
        }
    }

    /// Parses the backslash-separated multi-value form, e.g. `ORIGINAL\PRIMARY\M_FFE\M\FFE`
    pub fn parse(raw: &str) -> Self {
        let values: Vec<String> = raw.split('\\').map(|part| part.trim().to_string()).collect();
        Self::from_values(&values)
    }

    /// Builds an ImageType from its ordered components
    pub fn from_values<S: AsRef<str>>(values: &[S]) -> Self {
        let pixels = values
            .first()
            .map(|s| s.as_ref().to_string())
            .unwrap_or_default();
        let exam = values
            .get(1)
            .map(|s| s.as_ref().to_string())
            .unwrap_or_default();
        let flavor = values.get(2).map(|s| s.as_ref().to_string());
        let extras = if values.len() > 3 {
            Some(values[3..].iter().map(|s| s.as_ref().to_string()).collect())
        } else {
            None
        };

        ImageType::new(pixels, exam, flavor, extras)
    }

    /// Returns all components in order
    pub fn values(&self) -> Vec<&str> {
        let mut values = vec![self.pixels.as_str(), self.exam.as_str()];
        if let Some(ref flavor) = self.flavor {
            values.push(flavor);
        }
        if let Some(ref extras) = self.extras {
            values.extend(extras.iter().map(|s| s.as_str()));
        }
        values
    }

    /// Returns the component at `index`, counting from zero
    pub fn value(&self, index: usize) -> Option<&str> {
        self.values().get(index).copied()
    }

    /// Returns the last component
    pub fn last(&self) -> Option<&str> {
        self.values().last().copied()
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty() && self.exam.is_empty() && self.flavor.is_none()
    }

    /// Checks whether the components equal `expected` exactly
    pub fn matches(&self, expected: &[&str]) -> bool {
        self.values() == expected
    }

    /// Returns a simple string representation
    ///
    /// Format: "pixels|exam|flavor|extra1|extra2|..."
    /// Empty flavor is represented as ''
    /// Numeric-only extras are skipped
    pub fn simple_repr(&self) -> String {
        let mut parts = vec![self.pixels.clone(), self.exam.clone()];

        if let Some(ref flavor) = self.flavor {
            parts.push(if flavor.is_empty() {
                "''".to_string()
            } else {
                flavor.clone()
            });
        }

        if let Some(ref extras) = self.extras {
            for extra in extras {
                if !extra.is_empty() && !extra.chars().all(|c| c.is_numeric()) {
                    parts.push(extra.clone());
                }
            }
        }

        parts.join("|")
    }

    /// Checks if the image type contains a specific value
    pub fn contains(&self, val: &str) -> bool {
        self.pixels == val
            || self.exam == val
            || self.flavor.as_ref().is_some_and(|f| f == val)
            || self
                .extras
                .as_ref()
                .is_some_and(|e| e.iter().any(|x| x == val))
    }

    /// Returns true if the pixel data is derived from other images
    pub fn is_derived(&self) -> bool {
        self.pixels.eq_ignore_ascii_case("DERIVED")
    }

    /// Returns true if both pixels and exam are non-empty
    pub fn is_valid(&self) -> bool {
        !self.pixels.is_empty() && !self.exam.is_empty()
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_repr())
    }
}
