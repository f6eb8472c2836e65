//! Image to HEIC exporter
//!
//! Fixed-quality export, or size-limited export driven by
//! [`export_utils::size_limited::SizeLimitedProducer`].

pub mod export;
pub mod heif_writer;

pub use export::{run_export, ExportReport};
pub use heif_writer::{HeifWriter, SourceImage};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeifWriteError {
    #[error("Failed to read image {}: {source}", path.display())]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("libheif error: {0}")]
    Heif(#[from] libheif_rs::HeifError),

    #[error("HEIF image has no interleaved plane")]
    MissingPlane,

    #[error("Output path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
}

pub type Result<T> = std::result::Result<T, HeifWriteError>;
