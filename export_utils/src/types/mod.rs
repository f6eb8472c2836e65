//! Type-Safe Wrappers Module
//!
//! - `quality`: quality range and size target, validated on construction
//! - `file_size`: byte counts with human readable display

pub mod file_size;
pub mod quality;

pub use file_size::FileSize;
pub use quality::{QualityError, QualityRange, TargetSpec, QUALITY_MAX, QUALITY_MIN};

// ============================================================================
// Property-Based Tests
// ============================================================================
