//! Decode and encode of single images.
//!
//! The batch pipeline only talks to [`ImageCodec`]; the pixel work itself belongs to
//! the `image` crate, and to libheif for HEIC sources when the `heif` feature is on.

use crate::constants::{MAX_IMAGE_DIMENSION, THUMBNAIL_DATA_URL_PREFIX};
use crate::error::{ConvertError, Result};
use crate::formats::SourceFormat;
use crate::quality::Quality;
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::{BufRead, Cursor, Read, Seek};

pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], format: SourceFormat) -> Result<DynamicImage>;

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>>;
}

/// Decodes through `image`/libheif and encodes baseline JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn decode(&self, bytes: &[u8], format: SourceFormat) -> Result<DynamicImage> {
        let img = match format {
            SourceFormat::Heic => decode_heif(bytes)?,
            other => guessed_reader(Cursor::new(bytes), other)?.decode()?,
        };
        validate_dimensions(img.width(), img.height())?;
        Ok(img)
    }

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>> {
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.get());
            encoder
                .encode_image(&rgb)
                .map_err(|e| ConvertError::Encode(e.to_string()))?;
        }
        Ok(buffer)
    }
}

/// Reads width and height from the image header without decoding pixels
pub fn read_dimensions<R: BufRead + Seek>(
    mut reader: R,
    format: SourceFormat,
) -> Result<(u32, u32)> {
    let (width, height) = match format {
        SourceFormat::Heic => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            heif_dimensions(&bytes)?
        }
        other => guessed_reader(reader, other)?.into_dimensions()?,
    };
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidDimensions(
            width,
            height,
            MAX_IMAGE_DIMENSION,
        ));
    }
    validate_dimensions(width, height)?;
    Ok((width, height))
}

/// Downscaled PNG preview encoded as a data URL
pub fn thumbnail_data_url(image: &DynamicImage, max_size: u32) -> Result<String> {
    let preview = if image.width() > max_size || image.height() > max_size {
        image.thumbnail(max_size, max_size)
    } else {
        image.clone()
    };

    let mut buffer = Vec::new();
    preview.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;

    Ok(format!(
        "{}{}",
        THUMBNAIL_DATA_URL_PREFIX,
        general_purpose::STANDARD.encode(&buffer)
    ))
}

fn guessed_reader<R: BufRead + Seek>(reader: R, format: SourceFormat) -> Result<ImageReader<R>> {
    let mut reader = ImageReader::new(reader).with_guessed_format()?;
    if reader.format().is_none() {
        if let Some(fallback) = format.to_image_format() {
            reader.set_format(fallback);
        }
    }
    Ok(reader)
}

fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(ConvertError::InvalidDimensions(
            width,
            height,
            MAX_IMAGE_DIMENSION,
        ));
    }
    Ok(())
}

#[cfg(feature = "heif")]
fn heif_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    use libheif_rs::HeifContext;

    let ctx =
        HeifContext::read_from_bytes(bytes).map_err(|e| ConvertError::Decode(e.to_string()))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| ConvertError::Decode(e.to_string()))?;
    Ok((handle.width(), handle.height()))
}

#[cfg(feature = "heif")]
fn decode_heif(bytes: &[u8]) -> Result<DynamicImage> {
    use libheif_rs::{ColorSpace, HeifContext, RgbChroma};

    let ctx =
        HeifContext::read_from_bytes(bytes).map_err(|e| ConvertError::Decode(e.to_string()))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| ConvertError::Decode(e.to_string()))?;
    let decoded = handle
        .decode(ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| ConvertError::Decode(e.to_string()))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| ConvertError::Decode("no interleaved RGB plane".to_string()))?;

    let (width, height) = (plane.width, plane.height);
    let row_bytes = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_bytes]);
    }

    image::RgbImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| ConvertError::Decode("HEIC plane smaller than its dimensions".to_string()))
}

#[cfg(not(feature = "heif"))]
fn heif_dimensions(_bytes: &[u8]) -> Result<(u32, u32)> {
    Err(heif_unsupported())
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_bytes: &[u8]) -> Result<DynamicImage> {
    Err(heif_unsupported())
}

/// Error for a recognised format this build cannot decode
pub fn undecodable(format: SourceFormat) -> ConvertError {
    match format {
        SourceFormat::Heic => heif_unsupported(),
        other => ConvertError::UnsupportedFormat(other.to_string()),
    }
}

fn heif_unsupported() -> ConvertError {
    ConvertError::UnsupportedFormat(
        "HEIC support is not enabled in this build (rebuild with --features heif)".to_string(),
    )
}
