//! Study-level protocol aggregation
//!
//! Orders the classified series of a study, labels the T1 contrast series
//! and checks the study against a [`ProtocolTemplate`].

mod aggregator;
mod template;

pub use aggregator::{aggregate, ProtocolEntry, StudyProtocolSignature};
pub use template::{ProtocolRequirement, ProtocolTemplate};
