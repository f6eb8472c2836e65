//! Shared utilities for the HEIC exporter
//!
//! - Quality search: bisection toward a target file size over an expensive encoder
//! - Size-limited production: trial artifacts, promotion of the winner, cleanup
//! - Type-safe quality range / size target / file size wrappers
//! - Export option validation
//! - Common logging

pub mod app_error;
pub mod logging;
pub mod option_validator;
pub mod quality_search;
pub mod size_limited;
pub mod types;

pub use app_error::ProduceError;
pub use option_validator::{validate_config, ExportConfig, ExportMode, OptionError, OptionErrors};
pub use quality_search::{search_quality, try_search_quality, SearchOutcome, SearchStop, Trial};
pub use size_limited::{
    encoder_fn, OutputSource, ProduceReport, QualityEncoder, SizeLimitedProducer,
};
pub use types::{FileSize, QualityRange, TargetSpec};
