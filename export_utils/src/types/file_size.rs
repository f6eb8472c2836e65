//! FileSize Type-Safe Wrapper
//!
//! Byte counts of trial artifacts and of the final output, with the human
//! readable formatting used in log lines and the CLI summary.

use serde::Serialize;
use std::fmt;
use std::path::Path;

// ============================================================================
// FileSize Newtype
// ============================================================================

/// File size in bytes.
///
/// # Examples
/// ```
/// use export_utils::types::FileSize;
///
/// let size = FileSize::new(1024 * 1024);
/// assert_eq!(size.bytes(), 1048576);
/// assert_eq!(size.display(), "1.00 MB");
///
/// let limit = FileSize::new(2 * FileSize::MB);
/// assert!(size.fits_within(limit));
/// assert_eq!(size.percent_of(limit), Some(50.0));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FileSize(u64);

impl FileSize {
    pub const ZERO: FileSize = FileSize(0);

    pub const KB: u64 = 1024;
    pub const MB: u64 = 1024 * 1024;
    pub const GB: u64 = 1024 * 1024 * 1024;

    #[inline]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Size of the file at `path`.
    pub fn of_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self(std::fs::metadata(path)?.len()))
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn fits_within(&self, limit: FileSize) -> bool {
        self.0 <= limit.0
    }

    /// self / limit * 100, None for a zero limit.
    pub fn percent_of(&self, limit: FileSize) -> Option<f64> {
        if limit.0 == 0 {
            None
        } else {
            Some(self.0 as f64 / limit.0 as f64 * 100.0)
        }
    }

    /// Picks the unit automatically.
    pub fn display(&self) -> String {
        if self.0 >= Self::GB {
            format!("{:.2} GB", self.0 as f64 / Self::GB as f64)
        } else if self.0 >= Self::MB {
            format!("{:.2} MB", self.0 as f64 / Self::MB as f64)
        } else if self.0 >= Self::KB {
            format!("{:.2} KB", self.0 as f64 / Self::KB as f64)
        } else {
            format!("{} B", self.0)
        }
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSize({} = {})", self.0, self.display())
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl Default for FileSize {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<u64> for FileSize {
    fn from(bytes: u64) -> Self {
        Self::new(bytes)
    }
}

impl From<FileSize> for u64 {
    fn from(size: FileSize) -> Self {
        size.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_size_creation() {
        assert_eq!(FileSize::new(1024).bytes(), 1024);
        assert_eq!(FileSize::from(2048u64).bytes(), 2048);
        assert_eq!(u64::from(FileSize::new(7)), 7);
    }

    #[test]
    fn test_display() {
        assert_eq!(FileSize::new(500).display(), "500 B");
        assert_eq!(FileSize::new(1024).display(), "1.00 KB");
        assert_eq!(FileSize::new(1024 * 1024).display(), "1.00 MB");
        assert_eq!(FileSize::new(1024 * 1024 * 1024).display(), "1.00 GB");
    }

    #[test]
    fn test_percent_of() {
        let limit = FileSize::new(1000);
        assert_eq!(FileSize::new(800).percent_of(limit), Some(80.0));
        assert_eq!(FileSize::new(800).percent_of(FileSize::ZERO), None);
    }

    #[test]
    fn test_fits_within_is_inclusive() {
        let limit = FileSize::new(100);
        assert!(FileSize::new(100).fits_within(limit));
        assert!(!FileSize::new(101).fits_within(limit));
    }

    #[test]
    fn test_of_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 42]).unwrap();
        file.flush().unwrap();
        assert_eq!(FileSize::of_file(file.path()).unwrap().bytes(), 42);
    }
}
