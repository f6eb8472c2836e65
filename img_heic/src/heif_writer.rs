//! HEIC writer
//!
//! Decodes the input raster once with `image`, packs it into an interleaved
//! libheif image (8-bit, or 10-bit for inputs deeper than 8 bits per channel)
//! and encodes that image with the HEVC encoder at any requested quality.

use crate::{HeifWriteError, Result};
use export_utils::size_limited::QualityEncoder;
use image::DynamicImage;
use libheif_rs::{
    Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif, RgbChroma,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Decoded input image.
pub struct SourceImage {
    path: PathBuf,
    pixels: DynamicImage,
}

impl SourceImage {
    pub fn open(path: &Path) -> Result<Self> {
        let pixels = image::open(path).map_err(|source| HeifWriteError::ImageRead {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_pixels(path, pixels);
        info!(
            input = ?path,
            width = source.width(),
            height = source.height(),
            bit_depth = source.bit_depth(),
            has_alpha = source.has_alpha(),
            "Decoded input image"
        );
        Ok(source)
    }

    pub fn from_pixels(path: &Path, pixels: DynamicImage) -> Self {
        Self {
            path: path.to_path_buf(),
            pixels,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Bits per channel of the decoded samples.
    pub fn bit_depth(&self) -> u16 {
        let color = self.pixels.color();
        color.bits_per_pixel() / u16::from(color.channel_count())
    }

    pub fn has_alpha(&self) -> bool {
        self.pixels.color().has_alpha()
    }

    /// HEIF 10 for anything deeper than 8 bits per channel.
    pub fn wants_10bit(&self) -> bool {
        self.bit_depth() > 8
    }
}

// ═══════════════════════════════════════════════════════════════
// Sample packing
// ═══════════════════════════════════════════════════════════════

/// Interleaved samples ready to copy into a libheif plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedSamples {
    pub data: Vec<u8>,
    /// Bytes per row, without padding
    pub row_len: usize,
    pub bit_depth: u8,
    pub has_alpha: bool,
}

impl PackedSamples {
    pub fn chroma(&self) -> RgbChroma {
        match (self.bit_depth > 8, self.has_alpha) {
            (false, false) => RgbChroma::Rgb,
            (false, true) => RgbChroma::Rgba,
            (true, false) => RgbChroma::HdrRgbLe,
            (true, true) => RgbChroma::HdrRgbaLe,
        }
    }
}

/// 8-bit RGB(A), or 10-bit little-endian RGB(A) scaled down from 16 bits.
pub fn pack_samples(pixels: &DynamicImage, ten_bit: bool) -> PackedSamples {
    let has_alpha = pixels.color().has_alpha();
    let channels = if has_alpha { 4 } else { 3 };
    let width = pixels.width() as usize;

    if !ten_bit {
        let data = if has_alpha {
            pixels.to_rgba8().into_raw()
        } else {
            pixels.to_rgb8().into_raw()
        };
        return PackedSamples {
            data,
            row_len: width * channels,
            bit_depth: 8,
            has_alpha,
        };
    }

    let wide = if has_alpha {
        pixels.to_rgba16().into_raw()
    } else {
        pixels.to_rgb16().into_raw()
    };
    let data = wide
        .iter()
        .flat_map(|&sample| (sample >> 6).to_le_bytes())
        .collect();
    PackedSamples {
        data,
        row_len: width * channels * 2,
        bit_depth: 10,
        has_alpha,
    }
}

/// libheif quality percentage for a 0.0 - 1.0 quality.
pub fn quality_percent(quality: f64) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round() as u8
}

// ═══════════════════════════════════════════════════════════════
// HeifWriter
// ═══════════════════════════════════════════════════════════════

pub struct HeifWriter {
    lib_heif: LibHeif,
    image: Image,
    ten_bit: bool,
}

impl HeifWriter {
    pub fn new(source: &SourceImage, ten_bit: bool) -> Result<Self> {
        let packed = pack_samples(&source.pixels, ten_bit);
        let (width, height) = (source.width(), source.height());

        let mut image = Image::new(width, height, ColorSpace::Rgb(packed.chroma()))?;
        image.create_plane(Channel::Interleaved, width, height, packed.bit_depth)?;

        let planes = image.planes_mut();
        let plane = planes.interleaved.ok_or(HeifWriteError::MissingPlane)?;
        let stride = plane.stride;
        let data: &mut [u8] = plane.data;
        for (y, row) in packed.data.chunks_exact(packed.row_len).enumerate() {
            let start = y * stride;
            data[start..start + packed.row_len].copy_from_slice(row);
        }

        debug!(
            width,
            height,
            bit_depth = packed.bit_depth,
            has_alpha = packed.has_alpha,
            "Prepared HEIF image"
        );

        Ok(Self {
            lib_heif: LibHeif::new(),
            image,
            ten_bit,
        })
    }

    pub fn is_10bit(&self) -> bool {
        self.ten_bit
    }

    /// One HEVC encode at `quality`, written to `output`.
    pub fn write(&self, quality: f64, output: &Path) -> Result<()> {
        let output_str = output
            .to_str()
            .ok_or_else(|| HeifWriteError::NonUtf8Path(output.to_path_buf()))?;
        let percent = quality_percent(quality);

        let mut encoder = self.lib_heif.encoder_for_format(CompressionFormat::Hevc)?;
        encoder.set_quality(EncoderQuality::Lossy(percent))?;

        let mut context = HeifContext::new()?;
        context.encode_image(&self.image, &mut encoder, None)?;
        context.write_to_file(output_str)?;

        debug!(
            output = ?output,
            quality,
            libheif_quality = percent,
            bit_depth = if self.ten_bit { 10 } else { 8 },
            "Wrote HEIF"
        );
        Ok(())
    }
}

impl QualityEncoder for HeifWriter {
    type Error = HeifWriteError;

    fn encode_to(&mut self, quality: f64, output: &Path) -> Result<()> {
        self.write(quality, output)
    }
}
