//! Size-limited artifact production
//!
//! Drives [`try_search_quality`] with an evaluator that really encodes: every
//! trial writes a fresh temp file, its size is measured from disk, and the
//! file is kept until the search picks a winner. The winner is moved to the
//! destination; every other trial file is removed on the way out, whether
//! the search succeeded or an encode failed.
//!
//! ```no_run
//! use export_utils::size_limited::{encoder_fn, SizeLimitedProducer};
//! use export_utils::types::{QualityRange, TargetSpec};
//! use std::path::Path;
//!
//! let mut encoder = encoder_fn(|quality: f64, out: &Path| {
//!     std::fs::write(out, vec![0u8; (quality * 1000.0) as usize])
//! });
//! let report = SizeLimitedProducer::default()
//!     .produce(
//!         &mut encoder,
//!         Path::new("out.heic"),
//!         TargetSpec::with_default_accuracy(600).unwrap(),
//!         QualityRange::FULL,
//!     )
//!     .unwrap();
//! assert!(report.size.bytes() <= 600);
//! ```

use crate::app_error::ProduceError;
use crate::quality_search::{try_search_quality, SearchStop, Trial};
use crate::types::{FileSize, QualityRange, TargetSpec};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Random characters in every trial file name.
const TRIAL_RAND_BYTES: usize = 10;

// ═══════════════════════════════════════════════════════════════
// Encoder seam
// ═══════════════════════════════════════════════════════════════

/// One real encode at `quality`, written to `output`.
pub trait QualityEncoder {
    type Error: std::error::Error + 'static;

    fn encode_to(&mut self, quality: f64, output: &Path) -> Result<(), Self::Error>;
}

/// Adapts a closure to [`QualityEncoder`].
pub struct FnEncoder<F>(F);

pub fn encoder_fn<F, E>(f: F) -> FnEncoder<F>
where
    F: FnMut(f64, &Path) -> Result<(), E>,
    E: std::error::Error + 'static,
{
    FnEncoder(f)
}

impl<F, E> QualityEncoder for FnEncoder<F>
where
    F: FnMut(f64, &Path) -> Result<(), E>,
    E: std::error::Error + 'static,
{
    type Error = E;

    fn encode_to(&mut self, quality: f64, output: &Path) -> Result<(), E> {
        (self.0)(quality, output)
    }
}

// ═══════════════════════════════════════════════════════════════
// Trial artifacts
// ═══════════════════════════════════════════════════════════════

/// A trial's temp file; removed on drop unless promoted.
struct TrialArtifact {
    path: Option<TempPath>,
}

impl TrialArtifact {
    fn create(dir: &Path, stem: &str, suffix: &str, quality: f64) -> std::io::Result<Self> {
        let prefix = format!("{}-q{:.4}-", stem, quality);
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(suffix)
            .rand_bytes(TRIAL_RAND_BYTES)
            .tempfile_in(dir)?;
        let path = file.into_temp_path();
        debug!(path = ?path.to_path_buf(), quality, "Created trial artifact");
        Ok(Self { path: Some(path) })
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Moves the file to `destination`, replacing what is there. Falls back
    /// to copy when a rename is impossible (e.g. temp dir on another device).
    fn promote(mut self, destination: &Path) -> std::io::Result<()> {
        let Some(path) = self.path.take() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "trial artifact already released",
            ));
        };
        match path.persist(destination) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(error = %err.error, "Rename failed, copying trial artifact instead");
                let path = err.path;
                let copied = std::fs::copy(&path, destination).map(|_| ());
                if let Err(e) = &copied {
                    discard_partial_output(destination, e);
                }
                // the temp file is released by this guard's drop
                self.path = Some(path);
                copied
            }
        }
    }
}

/// Removes whatever a failed copy left at `destination`.
fn discard_partial_output(destination: &Path, cause: &std::io::Error) {
    match std::fs::remove_file(destination) {
        Ok(()) => warn!(destination = ?destination, error = %cause, "Copy failed, removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            destination = ?destination,
            error = %cause,
            remove_error = %e,
            "Copy failed, partial output could not be removed"
        ),
    }
}

impl Drop for TrialArtifact {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let trial_path = path.to_path_buf();
            match path.close() {
                Ok(()) => debug!(path = ?trial_path, "Removed trial artifact"),
                Err(e) => warn!(path = ?trial_path, error = %e, "Failed to remove trial artifact"),
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Producer
// ═══════════════════════════════════════════════════════════════

/// Where the destination file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSource {
    /// A search trial's artifact was moved into place
    PromotedTrial,
    /// The search evaluated nothing; one encode at the fixed quality
    DirectEncode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProduceReport {
    pub destination: PathBuf,
    pub quality: f64,
    pub size: FileSize,
    pub limit: FileSize,
    pub evaluations: usize,
    pub stop: SearchStop,
    pub source: OutputSource,
    pub trials: Vec<Trial>,
}

impl ProduceReport {
    pub fn within_limit(&self) -> bool {
        self.size.fits_within(self.limit)
    }
}

#[derive(Debug, Clone)]
pub struct SizeLimitedProducer {
    temp_dir: PathBuf,
}

impl Default for SizeLimitedProducer {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl SizeLimitedProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory for trial artifacts (default: system temp dir).
    pub fn with_temp_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.temp_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn produce<C>(
        &self,
        encoder: &mut C,
        destination: &Path,
        target: TargetSpec,
        range: QualityRange,
    ) -> Result<ProduceReport, ProduceError<C::Error>>
    where
        C: QualityEncoder,
    {
        self.produce_observed(encoder, destination, target, range, |_, _| {})
    }

    /// Like [`produce`](Self::produce), calling `on_trial(index, trial)` after
    /// every measured trial.
    pub fn produce_observed<C, O>(
        &self,
        encoder: &mut C,
        destination: &Path,
        target: TargetSpec,
        range: QualityRange,
        mut on_trial: O,
    ) -> Result<ProduceReport, ProduceError<C::Error>>
    where
        C: QualityEncoder,
        O: FnMut(usize, &Trial),
    {
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let suffix = destination
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        info!(
            destination = ?destination,
            max_size = target.max_size(),
            min_size = target.min_size(),
            range = %range,
            "Starting size-limited export"
        );

        // Index i holds the artifact of trial i.
        let mut artifacts: Vec<TrialArtifact> = Vec::new();

        let outcome = try_search_quality(
            target.max_size(),
            target.accuracy(),
            range.lo()..=range.hi(),
            |quality| {
                let artifact = TrialArtifact::create(&self.temp_dir, &stem, &suffix, quality)
                    .map_err(|e| ProduceError::io("create trial artifact in", &self.temp_dir, e))?;
                encoder
                    .encode_to(quality, artifact.path())
                    .map_err(|source| ProduceError::Encode { quality, source })?;
                let size = FileSize::of_file(artifact.path())
                    .map_err(|e| ProduceError::io("measure trial artifact", artifact.path(), e))?;

                let trial = Trial {
                    quality,
                    size: size.bytes(),
                };
                on_trial(artifacts.len(), &trial);
                artifacts.push(artifact);
                Ok(size.bytes())
            },
        )?;

        let (artifact, source) = match outcome.trial {
            Some(idx) => (artifacts.swap_remove(idx), OutputSource::PromotedTrial),
            None => {
                // Nothing was evaluated; encode once at the fixed quality.
                let quality = outcome.quality;
                let artifact = TrialArtifact::create(&self.temp_dir, &stem, &suffix, quality)
                    .map_err(|e| ProduceError::io("create output artifact in", &self.temp_dir, e))?;
                encoder
                    .encode_to(quality, artifact.path())
                    .map_err(|source| ProduceError::Encode { quality, source })?;
                (artifact, OutputSource::DirectEncode)
            }
        };

        // Losing trials are released before the winner moves into place.
        drop(artifacts);

        artifact
            .promote(destination)
            .map_err(|e| ProduceError::io("write output", destination, e))?;
        let size = FileSize::of_file(destination)
            .map_err(|e| ProduceError::io("measure output", destination, e))?;

        info!(
            destination = ?destination,
            quality = outcome.quality,
            size = size.bytes(),
            evaluations = outcome.evaluations(),
            source = ?source,
            "Size-limited export finished"
        );

        Ok(ProduceReport {
            destination: destination.to_path_buf(),
            quality: outcome.quality,
            size,
            limit: FileSize::new(target.max_size()),
            evaluations: outcome.evaluations(),
            stop: outcome.stop,
            source,
            trials: outcome.trials,
        })
    }
}
