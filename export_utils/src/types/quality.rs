//! Quality range / size target wrappers
//!
//! Validating constructors for the inputs of the quality search. The search
//! itself only asserts; these types are the recoverable path used by callers
//! that take values from the command line.

use serde::Serialize;
use std::fmt;

/// Lowest encoder quality
pub const QUALITY_MIN: f64 = 0.0;

/// Highest encoder quality
pub const QUALITY_MAX: f64 = 1.0;

// ============================================================================
// QualityError
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum QualityError {
    /// A bound is outside [0.0, 1.0]
    OutOfRange { value: f64 },
    /// lo > hi
    Inverted { lo: f64, hi: f64 },
    /// NaN or Inf
    InvalidFloat,
    /// Size limit of zero bytes
    ZeroSizeLimit,
    /// Accuracy outside [0.0, 1.0]
    InvalidAccuracy { value: f64 },
}

impl fmt::Display for QualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityError::OutOfRange { value } => {
                write!(f, "quality {} out of range [0.0, 1.0]", value)
            }
            QualityError::Inverted { lo, hi } => {
                write!(f, "quality range is inverted: {} > {}", lo, hi)
            }
            QualityError::InvalidFloat => write!(f, "invalid quality: NaN or Infinity"),
            QualityError::ZeroSizeLimit => write!(f, "size limit must be at least 1 byte"),
            QualityError::InvalidAccuracy { value } => {
                write!(f, "size accuracy {} out of range [0.0, 1.0]", value)
            }
        }
    }
}

impl std::error::Error for QualityError {}

fn check_unit(value: f64) -> Result<f64, QualityError> {
    if !value.is_finite() {
        return Err(QualityError::InvalidFloat);
    }
    if !(QUALITY_MIN..=QUALITY_MAX).contains(&value) {
        return Err(QualityError::OutOfRange { value });
    }
    Ok(value)
}

// ============================================================================
// QualityRange
// ============================================================================

/// Closed quality interval `[lo, hi]` inside `[0.0, 1.0]`.
///
/// # Examples
/// ```
/// use export_utils::types::QualityRange;
///
/// let range = QualityRange::new(0.2, 0.9).unwrap();
/// assert_eq!(range.lo(), 0.2);
/// assert!(!range.is_degenerate());
///
/// assert!(QualityRange::new(0.9, 0.2).is_err());
/// assert!(QualityRange::new(-0.1, 0.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityRange {
    lo: f64,
    hi: f64,
}

impl QualityRange {
    /// The whole quality scale.
    pub const FULL: QualityRange = QualityRange {
        lo: QUALITY_MIN,
        hi: QUALITY_MAX,
    };

    pub fn new(lo: f64, hi: f64) -> Result<Self, QualityError> {
        let lo = check_unit(lo)?;
        let hi = check_unit(hi)?;
        if lo > hi {
            return Err(QualityError::Inverted { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    /// A range holding exactly one quality.
    pub fn fixed(quality: f64) -> Result<Self, QualityError> {
        Self::new(quality, quality)
    }

    #[inline]
    pub fn lo(&self) -> f64 {
        self.lo
    }

    #[inline]
    pub fn hi(&self) -> f64 {
        self.hi
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.lo == self.hi
    }
}

impl Default for QualityRange {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for QualityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

// ============================================================================
// TargetSpec
// ============================================================================

/// Size target: the corridor `[floor(max_size * accuracy), max_size]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetSpec {
    max_size: u64,
    accuracy: f64,
}

impl TargetSpec {
    /// Accuracy used by the exporter when none is given.
    pub const DEFAULT_ACCURACY: f64 = 0.8;

    pub fn new(max_size: u64, accuracy: f64) -> Result<Self, QualityError> {
        if max_size == 0 {
            return Err(QualityError::ZeroSizeLimit);
        }
        if !accuracy.is_finite() || !(0.0..=1.0).contains(&accuracy) {
            return Err(QualityError::InvalidAccuracy { value: accuracy });
        }
        Ok(Self { max_size, accuracy })
    }

    pub fn with_default_accuracy(max_size: u64) -> Result<Self, QualityError> {
        Self::new(max_size, Self::DEFAULT_ACCURACY)
    }

    #[inline]
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    #[inline]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Lower corridor bound, truncated.
    #[inline]
    pub fn min_size(&self) -> u64 {
        (self.max_size as f64 * self.accuracy) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        let range = QualityRange::new(0.1, 0.9).unwrap();
        assert_eq!(range.lo(), 0.1);
        assert_eq!(range.hi(), 0.9);
        assert_eq!(range.to_string(), "[0.1, 0.9]");
    }

    #[test]
    fn test_range_rejects_bad_values() {
        assert_eq!(
            QualityRange::new(1.5, 1.5),
            Err(QualityError::OutOfRange { value: 1.5 })
        );
        assert_eq!(
            QualityRange::new(0.6, 0.4),
            Err(QualityError::Inverted { lo: 0.6, hi: 0.4 })
        );
        assert_eq!(QualityRange::new(f64::NAN, 0.4), Err(QualityError::InvalidFloat));
    }

    #[test]
    fn test_fixed_range_is_degenerate() {
        let range = QualityRange::fixed(0.5).unwrap();
        assert!(range.is_degenerate());
        assert_eq!((range.lo(), range.hi()), (0.5, 0.5));
    }

    #[test]
    fn test_default_range_is_full() {
        assert_eq!(QualityRange::default(), QualityRange::FULL);
        assert!(!QualityRange::FULL.is_degenerate());
    }

    #[test]
    fn test_target_min_size_truncates() {
        let target = TargetSpec::new(3100, 0.8).unwrap();
        assert_eq!(target.min_size(), 2480);

        let target = TargetSpec::new(7, 0.5).unwrap();
        assert_eq!(target.min_size(), 3);
    }

    #[test]
    fn test_target_rejects_bad_values() {
        assert_eq!(TargetSpec::new(0, 0.8), Err(QualityError::ZeroSizeLimit));
        assert!(TargetSpec::new(100, 1.2).is_err());
        assert!(TargetSpec::new(100, -0.1).is_err());
        assert_eq!(
            TargetSpec::with_default_accuracy(100).unwrap().accuracy(),
            TargetSpec::DEFAULT_ACCURACY
        );
    }
}
