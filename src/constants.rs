pub const DEFAULT_QUALITY: u8 = 85;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// Maximum source file size in bytes (200MB)
pub const MAX_FILE_SIZE: u64 = 200 * 1024 * 1024;
pub const MAX_IMAGE_DIMENSION: u32 = 20_000;

pub const THUMBNAIL_MAX_SIZE: u32 = 120;
pub const THUMBNAIL_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Upper bound on worker threads for any batch, keeps open file handles bounded
pub const MAX_WORKERS: usize = 16;
/// Memory kept free when sizing the conversion pool
pub const MIN_AVAILABLE_MEMORY_MIB: u64 = 512;

pub const TARGET_EXTENSION: &str = "jpg";
pub const EXPORT_NAME_PREFIX: &str = "converted";
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const STAGING_DIR_PREFIX: &str = ".img-convert-";

pub const SUPPORTED_ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

// Size estimation model, calibrated against the `image` JPEG encoder
pub const ESTIMATE_BASE_BYTES_PER_PIXEL: f64 = 0.15;
pub const ESTIMATE_REFERENCE_QUALITY: f64 = 85.0;
pub const ESTIMATE_QUALITY_EXPONENT: f64 = 1.5;
pub const ESTIMATE_HIGH_QUALITY_KNEE: f64 = 90.0;
pub const ESTIMATE_HIGH_QUALITY_BYTES_PER_PIXEL: f64 = 0.35;
pub const ESTIMATE_JPEG_HEADER_BYTES: u64 = 2048;
