//! Option validator - export configuration checks
//!
//! The command line is parsed into a plain [`ExportConfig`], which is then
//! checked here by ordinary function calls before any encoding starts.
//! Every option kind has its own [`OptionValidator`] implementation; all
//! failures are collected and reported together.
//!
//! ## Valid combinations
//! 1. `--quality Q`: one encode at `Q`
//! 2. `--size-limit N [--min-quality A] [--max-quality B] [--size-accuracy R]`:
//!    size-limited search in `[A, B]`
//!
//! ## Invalid (reported loudly)
//! - neither or both of `--quality` / `--size-limit`
//! - any quality or accuracy outside `0.0...1.0`
//! - `--min-quality` above `--max-quality`

use crate::types::{QualityError, QualityRange, TargetSpec};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use thiserror::Error;

/// Parsed, not yet validated, export options.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub input_file: Option<PathBuf>,
    pub output_file: PathBuf,
    pub quality: Option<f64>,
    pub size_limit: Option<u64>,
    pub min_quality: f64,
    pub max_quality: f64,
    pub size_accuracy: f64,
    pub temp_dir: Option<PathBuf>,
    pub force_10bit: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            input_file: None,
            output_file: PathBuf::new(),
            quality: None,
            size_limit: None,
            min_quality: 0.0,
            max_quality: 1.0,
            size_accuracy: TargetSpec::DEFAULT_ACCURACY,
            temp_dir: None,
            force_10bit: false,
        }
    }
}

/// What a valid configuration asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportMode {
    FixedQuality(f64),
    SizeLimited {
        target: TargetSpec,
        range: QualityRange,
    },
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::FixedQuality(q) => write!(f, "--quality {}", q),
            ExportMode::SizeLimited { target, range } => write!(
                f,
                "--size-limit {} (accuracy {}, quality {})",
                target.max_size(),
                target.accuracy(),
                range
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionError {
    #[error("Missing required argument: `--{label}`")]
    MissingArgument { label: &'static str },

    #[error("`--{label}` {actual} needed to be in {allowed}")]
    ArgumentNotAllowed {
        label: &'static str,
        allowed: String,
        actual: String,
    },

    #[error("Exactly one of `--{first}` and `--{second}` is required")]
    ExactlyOneOf {
        first: &'static str,
        second: &'static str,
    },

    #[error("`--{lower}` ({lower_value}) must not exceed `--{upper}` ({upper_value})")]
    Inverted {
        lower: &'static str,
        upper: &'static str,
        lower_value: f64,
        upper_value: f64,
    },

    #[error("`--{label}`: {source}")]
    InvalidValue {
        label: &'static str,
        #[source]
        source: QualityError,
    },
}

/// All failures of one validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionErrors(pub Vec<OptionError>);

impl fmt::Display for OptionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "Encountered these errors: {}", joined)
    }
}

impl std::error::Error for OptionErrors {}

// ═══════════════════════════════════════════════════════════════
// Validators
// ═══════════════════════════════════════════════════════════════

pub trait OptionValidator {
    fn validate(&self, config: &ExportConfig) -> Result<(), OptionError>;
}

/// The option must be present.
pub struct Required {
    pub label: &'static str,
    pub present: fn(&ExportConfig) -> bool,
}

impl OptionValidator for Required {
    fn validate(&self, config: &ExportConfig) -> Result<(), OptionError> {
        if (self.present)(config) {
            Ok(())
        } else {
            Err(OptionError::MissingArgument { label: self.label })
        }
    }
}

/// A numeric option, when present, must lie in `allowed`.
pub struct WithinRange {
    pub label: &'static str,
    pub allowed: RangeInclusive<f64>,
    pub value: fn(&ExportConfig) -> Option<f64>,
}

impl OptionValidator for WithinRange {
    fn validate(&self, config: &ExportConfig) -> Result<(), OptionError> {
        match (self.value)(config) {
            Some(v) if !self.allowed.contains(&v) => Err(OptionError::ArgumentNotAllowed {
                label: self.label,
                allowed: format!("{:?}", self.allowed),
                actual: v.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// An integer option, when present, must be at least `min`.
pub struct AtLeast {
    pub label: &'static str,
    pub min: u64,
    pub value: fn(&ExportConfig) -> Option<u64>,
}

impl OptionValidator for AtLeast {
    fn validate(&self, config: &ExportConfig) -> Result<(), OptionError> {
        match (self.value)(config) {
            Some(v) if v < self.min => Err(OptionError::ArgumentNotAllowed {
                label: self.label,
                allowed: format!("{}..", self.min),
                actual: v.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Exactly one of two options must be present.
pub struct ExactlyOne {
    pub first: &'static str,
    pub second: &'static str,
    pub present: fn(&ExportConfig) -> (bool, bool),
}

impl OptionValidator for ExactlyOne {
    fn validate(&self, config: &ExportConfig) -> Result<(), OptionError> {
        match (self.present)(config) {
            (true, false) | (false, true) => Ok(()),
            _ => Err(OptionError::ExactlyOneOf {
                first: self.first,
                second: self.second,
            }),
        }
    }
}

/// `lower <= upper`.
pub struct Ordered {
    pub lower: &'static str,
    pub upper: &'static str,
    pub values: fn(&ExportConfig) -> (f64, f64),
}

impl OptionValidator for Ordered {
    fn validate(&self, config: &ExportConfig) -> Result<(), OptionError> {
        let (lower_value, upper_value) = (self.values)(config);
        if lower_value <= upper_value {
            Ok(())
        } else {
            Err(OptionError::Inverted {
                lower: self.lower,
                upper: self.upper,
                lower_value,
                upper_value,
            })
        }
    }
}

/// The checks every export runs, in reporting order.
pub fn export_validators() -> Vec<Box<dyn OptionValidator>> {
    vec![
        Box::new(Required {
            label: "input-file",
            present: |c| c.input_file.is_some(),
        }),
        Box::new(Required {
            label: "output-file",
            present: |c| !c.output_file.as_os_str().is_empty(),
        }),
        Box::new(ExactlyOne {
            first: "quality",
            second: "size-limit",
            present: |c| (c.quality.is_some(), c.size_limit.is_some()),
        }),
        Box::new(WithinRange {
            label: "quality",
            allowed: 0.0..=1.0,
            value: |c| c.quality,
        }),
        Box::new(AtLeast {
            label: "size-limit",
            min: 1,
            value: |c| c.size_limit,
        }),
        Box::new(WithinRange {
            label: "min-quality",
            allowed: 0.0..=1.0,
            value: |c| Some(c.min_quality),
        }),
        Box::new(WithinRange {
            label: "max-quality",
            allowed: 0.0..=1.0,
            value: |c| Some(c.max_quality),
        }),
        Box::new(Ordered {
            lower: "min-quality",
            upper: "max-quality",
            values: |c| (c.min_quality, c.max_quality),
        }),
        Box::new(WithinRange {
            label: "size-accuracy",
            allowed: 0.0..=1.0,
            value: |c| Some(c.size_accuracy),
        }),
    ]
}

/// Runs every validator and resolves the export mode.
///
/// # Example
/// ```
/// use export_utils::option_validator::{validate_config, ExportConfig, ExportMode};
///
/// let config = ExportConfig {
///     input_file: Some("in.png".into()),
///     output_file: "out.heic".into(),
///     quality: Some(0.7),
///     ..Default::default()
/// };
/// assert_eq!(validate_config(&config).unwrap(), ExportMode::FixedQuality(0.7));
/// ```
pub fn validate_config(config: &ExportConfig) -> Result<ExportMode, OptionErrors> {
    let errors: Vec<OptionError> = export_validators()
        .iter()
        .filter_map(|v| v.validate(config).err())
        .collect();
    if !errors.is_empty() {
        return Err(OptionErrors(errors));
    }

    resolve_mode(config).map_err(|e| OptionErrors(vec![e]))
}

/// Builds the mode from the option values. Only fails for values the
/// validators would have rejected.
fn resolve_mode(config: &ExportConfig) -> Result<ExportMode, OptionError> {
    if let Some(quality) = config.quality {
        return Ok(ExportMode::FixedQuality(quality));
    }

    let size_limit = config.size_limit.unwrap_or_default();
    let target = TargetSpec::new(size_limit, config.size_accuracy).map_err(|source| {
        let label = match source {
            QualityError::ZeroSizeLimit => "size-limit",
            _ => "size-accuracy",
        };
        OptionError::InvalidValue { label, source }
    })?;
    let range = QualityRange::new(config.min_quality, config.max_quality).map_err(|source| {
        let min_ok = QualityRange::fixed(config.min_quality).is_ok();
        let label = if min_ok { "max-quality" } else { "min-quality" };
        OptionError::InvalidValue { label, source }
    })?;

    Ok(ExportMode::SizeLimited { target, range })
}
