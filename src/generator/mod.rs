//! Grid Generator
//!
//! Requests one rendered image per gaze coordinate from the hosted model,
//! resizes and encodes it, and records it in the index.

pub mod source;
pub mod http_retry;
pub mod replicate;
pub mod encode;
pub mod runner;

pub use source::SourceImage;
pub use http_retry::{send_with_retry, RetryPolicy};
pub use replicate::{GazeRenderer, ReplicateClient, ReplicateSettings};
pub use encode::OutputFormat;
pub use runner::{FailedCoordinate, GenerationOptions, GenerationReport, GridGenerator, PlannedAsset};
