use crate::codec::{read_dimensions, thumbnail_data_url, undecodable, ImageCodec, JpegCodec};
use crate::constants::{MAX_FILE_SIZE, THUMBNAIL_MAX_SIZE};
use crate::error::{ConvertError, ProbeFailure, Result};
use crate::formats::SourceFormat;
use crate::source::{SourceEntry, SourceLocation};
use crate::utils::{build_worker_pool, worker_count};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, Cursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Produce preview thumbnails while probing
    pub thumbnails: bool,
    /// Longest edge of a thumbnail in pixels
    pub thumbnail_size: u32,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            thumbnails: true,
            thumbnail_size: THUMBNAIL_MAX_SIZE,
        }
    }
}

/// Builds a [`SourceEntry`] from the image header.
///
/// Pixels are never decoded for the metadata itself. A thumbnail is attempted
/// afterwards and simply left out if it cannot be produced. Archive members are
/// extracted once and the same bytes serve the header and the thumbnail.
pub fn probe(
    location: &SourceLocation,
    options: &ProbeOptions,
) -> std::result::Result<SourceEntry, ProbeFailure> {
    let failure = |reason: String| ProbeFailure {
        location: location.clone(),
        reason,
    };

    let format = location
        .format()
        .ok_or_else(|| failure("unsupported image format".to_string()))?;
    if !format.is_decodable() {
        return Err(failure(undecodable(format).to_string()));
    }

    let source = ProbeSource::open(location).map_err(|e| failure(e.to_string()))?;
    let size_bytes = source.size_bytes;
    if size_bytes > MAX_FILE_SIZE {
        return Err(failure(
            ConvertError::FileTooLarge(size_bytes, MAX_FILE_SIZE).to_string(),
        ));
    }

    let (width, height) = source
        .read_header(format)
        .map_err(|e| failure(e.to_string()))?;

    let thumbnail = if options.thumbnails {
        match source.thumbnail(format, options.thumbnail_size) {
            Ok(thumbnail) => Some(thumbnail),
            Err(e) => {
                log::debug!("No thumbnail for {}: {}", location, e);
                None
            }
        }
    } else {
        None
    };

    Ok(SourceEntry {
        location: location.clone(),
        name: location.display_name(),
        format,
        width,
        height,
        size_bytes,
        thumbnail,
    })
}

/// Probes every candidate on a bounded pool, keeping candidate order.
pub fn probe_all(
    candidates: &[SourceLocation],
    options: &ProbeOptions,
    threads: Option<usize>,
) -> Result<(Vec<SourceEntry>, Vec<ProbeFailure>)> {
    let pool = build_worker_pool(worker_count(threads, candidates.len()))?;
    let outcomes: Vec<std::result::Result<SourceEntry, ProbeFailure>> = pool.install(|| {
        candidates
            .par_iter()
            .map(|candidate| probe(candidate, options))
            .collect()
    });

    let mut entries = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(entry) => entries.push(entry),
            Err(failure) => {
                log::warn!("{}", failure);
                failures.push(failure);
            }
        }
    }

    Ok((entries, failures))
}

/// Fills in a missing thumbnail. Returns whether the entry now has one.
pub fn backfill_thumbnail(entry: &mut SourceEntry, max_size: u32) -> bool {
    if entry.thumbnail.is_none() {
        entry.thumbnail = generate_thumbnail(&entry.location, entry.format, max_size).ok();
    }
    entry.thumbnail.is_some()
}

/// A candidate opened for probing: a file on disk, or an archive member in memory.
struct ProbeSource<'a> {
    location: &'a SourceLocation,
    size_bytes: u64,
    member_bytes: Option<Vec<u8>>,
}

impl<'a> ProbeSource<'a> {
    fn open(location: &'a SourceLocation) -> Result<Self> {
        match location {
            SourceLocation::File { .. } => Ok(Self {
                location,
                size_bytes: location.size_bytes()?,
                member_bytes: None,
            }),
            SourceLocation::ArchiveMember { .. } => {
                let bytes = location.read_bytes()?;
                Ok(Self {
                    location,
                    size_bytes: bytes.len() as u64,
                    member_bytes: Some(bytes),
                })
            }
        }
    }

    fn read_header(&self, format: SourceFormat) -> Result<(u32, u32)> {
        match (&self.member_bytes, self.location) {
            (Some(bytes), _) => read_dimensions(Cursor::new(bytes.as_slice()), format),
            (None, SourceLocation::File { path }) => {
                read_dimensions(BufReader::new(File::open(path)?), format)
            }
            (None, SourceLocation::ArchiveMember { .. }) => {
                read_dimensions(Cursor::new(self.location.read_bytes()?), format)
            }
        }
    }

    fn thumbnail(self, format: SourceFormat, max_size: u32) -> Result<String> {
        let bytes = match self.member_bytes {
            Some(bytes) => bytes,
            None => self.location.read_bytes()?,
        };
        thumbnail_from_bytes(&bytes, format, max_size)
    }
}

fn generate_thumbnail(
    location: &SourceLocation,
    format: SourceFormat,
    max_size: u32,
) -> Result<String> {
    thumbnail_from_bytes(&location.read_bytes()?, format, max_size)
}

fn thumbnail_from_bytes(bytes: &[u8], format: SourceFormat, max_size: u32) -> Result<String> {
    let image = JpegCodec.decode(bytes, format)?;
    thumbnail_data_url(&image, max_size)
}
