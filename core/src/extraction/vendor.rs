use crate::extraction::header::HeaderRecord;
use crate::extraction::tags::MANUFACTURER;
use crate::schema::{FieldSpec, TableSpec};
use crate::types::Vendor;

/// Decides which vendor-specific field set applies to a header source
pub struct VendorResolver;

impl VendorResolver {
    /// Resolves the vendor from the Manufacturer attribute
    ///
    /// A missing or unrecognised manufacturer yields [`Vendor::Generic`].
    pub fn resolve(header: &HeaderRecord) -> Vendor {
        header
            .get(MANUFACTURER)
            .map(Self::from_manufacturer)
            .unwrap_or_default()
    }

    /// Matches a free-text manufacturer name, case-insensitively
    ///
    /// GE is matched on whole words only, so names that merely contain the
    /// letters "ge" (e.g. "Imaging Gear") stay generic.
    pub fn from_manufacturer(manufacturer: &str) -> Vendor {
        let lower = manufacturer.to_lowercase();

        if lower.contains("philips") {
            return Vendor::Philips;
        }
        if lower.contains("siemens") {
            return Vendor::Siemens;
        }
        if lower.contains("general electric") {
            return Vendor::Ge;
        }

        let is_ge = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == "ge" || word == "gehc");
        if is_ge {
            Vendor::Ge
        } else {
            Vendor::Generic
        }
    }

    /// Fields of `table` extracted for sources of `vendor`
    ///
    /// Vendor-neutral fields plus those scoped to `vendor`; empty when the
    /// table itself belongs to another vendor.
    pub fn field_set_for(vendor: Vendor, table: &TableSpec) -> Vec<&FieldSpec> {
        if !table.is_active_for(vendor) {
            return Vec::new();
        }
        table.fields.iter().filter(|f| f.applies_to(vendor)).collect()
    }
}
