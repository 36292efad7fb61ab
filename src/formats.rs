//! Source image formats recognised by extension
//!
//! Every candidate is classified here before any bytes are read. The format also
//! carries the per-format factor the size estimator applies on top of its pixel model.

use crate::constants::SUPPORTED_ARCHIVE_EXTENSIONS;
use crate::error::ConvertError;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported input image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// HEIC/HEIF, decoded through libheif when the `heif` feature is on
    Heic,
    Jpeg,
    Png,
    WebP,
    Bmp,
    Tiff,
    Gif,
}

impl SourceFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "heic" | "heif" => Some(SourceFormat::Heic),
            "jpg" | "jpeg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            "webp" => Some(SourceFormat::WebP),
            "bmp" => Some(SourceFormat::Bmp),
            "tif" | "tiff" => Some(SourceFormat::Tiff),
            "gif" => Some(SourceFormat::Gif),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// The `image` crate format used to decode this source, if it handles it at all
    pub fn to_image_format(&self) -> Option<ImageFormat> {
        match self {
            SourceFormat::Heic => None,
            SourceFormat::Jpeg => Some(ImageFormat::Jpeg),
            SourceFormat::Png => Some(ImageFormat::Png),
            SourceFormat::WebP => Some(ImageFormat::WebP),
            SourceFormat::Bmp => Some(ImageFormat::Bmp),
            SourceFormat::Tiff => Some(ImageFormat::Tiff),
            SourceFormat::Gif => Some(ImageFormat::Gif),
        }
    }

    /// Whether this build can decode the format
    pub fn is_decodable(&self) -> bool {
        match self {
            SourceFormat::Heic => cfg!(feature = "heif"),
            _ => true,
        }
    }

    /// Multiplier on the predicted JPEG size for content coming from this format.
    ///
    /// Lossy sources have already had their high-frequency detail smoothed away and
    /// re-encode smaller; lossless and palette sources keep noise and hard edges.
    pub fn estimate_factor(&self) -> f64 {
        match self {
            SourceFormat::Heic => 0.9,
            SourceFormat::Jpeg => 0.95,
            SourceFormat::WebP => 0.9,
            SourceFormat::Png => 1.15,
            SourceFormat::Bmp | SourceFormat::Tiff => 1.1,
            SourceFormat::Gif => 1.25,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Heic => "HEIC",
            SourceFormat::Jpeg => "JPEG",
            SourceFormat::Png => "PNG",
            SourceFormat::WebP => "WebP",
            SourceFormat::Bmp => "BMP",
            SourceFormat::Tiff => "TIFF",
            SourceFormat::Gif => "GIF",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SourceFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| ConvertError::UnsupportedFormat(s.to_string()))
    }
}

/// A file with a source-image extension, judged by extension only.
///
/// Formats this build cannot decode still count, so the probe reports them instead
/// of them disappearing from the inventory.
pub fn is_convertible_file(path: &Path) -> bool {
    SourceFormat::from_path(path).is_some()
}

pub fn is_archive_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| SUPPORTED_ARCHIVE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_format_from_str() {
        assert_eq!(SourceFormat::from_str("jpeg").unwrap(), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::from_str("JPG").unwrap(), SourceFormat::Jpeg);
        assert_eq!(SourceFormat::from_str("heif").unwrap(), SourceFormat::Heic);
        assert_eq!(SourceFormat::from_str("tif").unwrap(), SourceFormat::Tiff);
        assert!(SourceFormat::from_str("txt").is_err());
    }

    #[test]
    fn test_is_convertible_file() {
        assert!(is_convertible_file(Path::new("photo.PNG")));
        assert!(is_convertible_file(Path::new("a/b/photo.jpeg")));
        assert!(!is_convertible_file(Path::new("notes.txt")));
        assert!(!is_convertible_file(Path::new("noext")));
        assert!(is_convertible_file(Path::new("IMG_0001.HEIC")));
    }

    #[test]
    fn test_is_archive_file() {
        assert!(is_archive_file(Path::new("photos.zip")));
        assert!(is_archive_file(Path::new("photos.ZIP")));
        assert!(!is_archive_file(Path::new("photos.tar")));
    }

    #[test]
    fn test_estimate_factor_positive() {
        for format in [
            SourceFormat::Heic,
            SourceFormat::Jpeg,
            SourceFormat::Png,
            SourceFormat::WebP,
            SourceFormat::Bmp,
            SourceFormat::Tiff,
            SourceFormat::Gif,
        ] {
            assert!(format.estimate_factor() > 0.0);
        }
    }
}
