//! Remote-write request handling and status mapping
//!
//! Runs one request through the pure core stages and the publisher, and
//! classifies the result for the HTTP layer.

pub mod error;
pub mod outcome;
pub mod pipeline;

pub use error::IngestError;
pub use outcome::{report_outcome, PublishOutcome};
pub use pipeline::{process_remote_write, IngestPipeline};
