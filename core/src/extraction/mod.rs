pub mod coerce;
pub mod extractor;
pub mod header;
pub mod store;
pub mod tags;
pub mod vendor;

pub use extractor::{AttributeExtractor, EntityRow, ExtractedRow, SourceExtraction};
pub use header::{EntityIdentity, HeaderRecord};
pub use store::{
    AggregatedSeriesRecord, EntityRecord, EntitySnapshot, EntityStore, ImageAttributes,
    MergeOutcome,
};
pub use vendor::VendorResolver;
