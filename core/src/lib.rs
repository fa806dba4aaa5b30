pub mod api;
pub mod classification;
pub mod cli;
pub mod error;
pub mod extraction;
pub mod protocol;
pub mod schema;
pub mod types;

pub use api::{read_header, Pipeline, PipelineOutput, RunReport};
pub use cli::report::TextReport;
pub use error::{DcmwError, Result};
pub use types::*;
