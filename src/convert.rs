use crate::codec::{ImageCodec, JpegCodec};
use crate::constants::{
    EXPORT_NAME_PREFIX, EXPORT_TIMESTAMP_FORMAT, MIN_AVAILABLE_MEMORY_MIB, STAGING_DIR_PREFIX,
    TARGET_EXTENSION,
};
use crate::error::{ItemFailure, ItemStage, SystemicFailure};
use crate::quality::Quality;
use crate::source::SourceEntry;
use crate::utils::{build_worker_pool, worker_count};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use tempfile::{NamedTempFile, TempDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// How converted files are handed to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageLayout {
    /// A single `converted_<timestamp>.zip`
    #[default]
    Zip,
    /// A `converted_<timestamp>` directory of JPEGs
    Directory,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    pub layout: PackageLayout,
    /// Worker threads; `None` uses one per CPU
    pub max_workers: Option<usize>,
}

/// Entries and quality frozen at the moment a conversion is requested.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub entries: Vec<SourceEntry>,
    pub quality: Quality,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    /// False only when the batch hit a systemic failure
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub message: String,
    pub converted: usize,
    pub failed: usize,
    pub output_bytes: u64,
    pub failures: Vec<ItemFailure>,
}

impl ConversionResult {
    fn completed(
        output_path: Option<PathBuf>,
        items: &[ConvertedItem],
        failures: Vec<ItemFailure>,
    ) -> Self {
        let converted = items.len();
        let failed = failures.len();
        let message = if failed == 0 {
            format!("Successfully converted {} files", converted)
        } else {
            format!("{} converted, {} failed", converted, failed)
        };

        Self {
            success: true,
            output_path,
            message,
            converted,
            failed,
            output_bytes: items.iter().map(|item| item.size_bytes).sum(),
            failures,
        }
    }

    fn systemic(failure: &SystemicFailure) -> Self {
        Self {
            success: false,
            output_path: None,
            message: failure.to_string(),
            converted: 0,
            failed: 0,
            output_bytes: 0,
            failures: Vec::new(),
        }
    }
}

/// One entry written to the staging area.
#[derive(Debug, Clone)]
struct ConvertedItem {
    name: String,
    path: PathBuf,
    size_bytes: u64,
}

type ItemOutcome = std::result::Result<ConvertedItem, ItemFailure>;

/// Runs decode → encode → write for a whole job and packages the results.
///
/// Only one run may be in flight per converter. A second call while busy returns a
/// failed [`ConversionResult`] immediately instead of waiting.
pub struct BatchConverter<C: ImageCodec = JpegCodec> {
    codec: C,
    options: ExportOptions,
    busy: AtomicBool,
}

impl BatchConverter<JpegCodec> {
    pub fn new(options: ExportOptions) -> Self {
        Self::with_codec(JpegCodec, options)
    }
}

impl Default for BatchConverter<JpegCodec> {
    fn default() -> Self {
        Self::new(ExportOptions::default())
    }
}

impl<C: ImageCodec> BatchConverter<C> {
    pub fn with_codec(codec: C, options: ExportOptions) -> Self {
        Self {
            codec,
            options,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn convert_and_export(
        &self,
        entries: &[SourceEntry],
        quality: Quality,
        destination: &Path,
    ) -> ConversionResult {
        let job = ConversionJob {
            entries: entries.to_vec(),
            quality,
        };
        self.run_job(&job, destination)
    }

    pub fn run_job(&self, job: &ConversionJob, destination: &Path) -> ConversionResult {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            log::warn!("Rejected conversion request: a run is already in progress");
            return ConversionResult::systemic(&SystemicFailure::Busy);
        };

        let start_time = Instant::now();
        match self.execute(job, destination) {
            Ok(result) => {
                log::info!("{} in {:?}", result.message, start_time.elapsed());
                result
            }
            Err(failure) => {
                log::error!("Conversion aborted: {}", failure);
                ConversionResult::systemic(&failure)
            }
        }
    }

    fn execute(
        &self,
        job: &ConversionJob,
        destination: &Path,
    ) -> std::result::Result<ConversionResult, SystemicFailure> {
        if job.entries.is_empty() {
            return Err(SystemicFailure::NoEntries);
        }

        fs::create_dir_all(destination).map_err(|e| io_failure(destination, e))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(destination)
            .map_err(|e| io_failure(destination, e))?;

        let names = assign_output_names(&job.entries);
        let threads = self.parallelism(&job.entries);
        log::info!(
            "Converting {} files at quality {} with {} workers",
            job.entries.len(),
            job.quality,
            threads
        );

        let pool =
            build_worker_pool(threads).map_err(|e| SystemicFailure::Workers(e.to_string()))?;
        let outcomes: Vec<ItemOutcome> = pool.install(|| {
            job.entries
                .par_iter()
                .zip(names.par_iter())
                .map(|(entry, name)| {
                    self.convert_entry(entry, name, job.quality, staging.path(), destination)
                })
                .collect::<std::result::Result<Vec<_>, SystemicFailure>>()
        })?;

        let mut converted = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(item) => converted.push(item),
                Err(failure) => {
                    log::warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }

        if converted.is_empty() {
            return Ok(ConversionResult::completed(None, &converted, failures));
        }

        let output_path = match self.options.layout {
            PackageLayout::Zip => package_zip(&converted, destination)?,
            PackageLayout::Directory => package_directory(staging, destination)?,
        };
        Ok(ConversionResult::completed(
            Some(output_path),
            &converted,
            failures,
        ))
    }

    fn convert_entry(
        &self,
        entry: &SourceEntry,
        output_name: &str,
        quality: Quality,
        staging: &Path,
        destination: &Path,
    ) -> std::result::Result<ItemOutcome, SystemicFailure> {
        let bytes = match entry.location.read_bytes() {
            Ok(bytes) => bytes,
            Err(e) => return Ok(Err(item_failure(entry, ItemStage::Read, e))),
        };
        let image = match self.codec.decode(&bytes, entry.format) {
            Ok(image) => image,
            Err(e) => return Ok(Err(item_failure(entry, ItemStage::Decode, e))),
        };
        drop(bytes);
        let encoded = match self.codec.encode(&image, quality) {
            Ok(encoded) => encoded,
            Err(e) => return Ok(Err(item_failure(entry, ItemStage::Encode, e))),
        };

        let path = staging.join(output_name);
        match write_staged(&path, &encoded) {
            Ok(()) => Ok(Ok(ConvertedItem {
                name: output_name.to_string(),
                path,
                size_bytes: encoded.len() as u64,
            })),
            Err(e) if e.kind() == ErrorKind::StorageFull => Err(SystemicFailure::DiskFull {
                path: destination.to_path_buf(),
            }),
            Err(e) => Ok(Err(item_failure(entry, ItemStage::Write, e))),
        }
    }

    /// Worker count bounded by CPUs, the configured maximum and free memory.
    ///
    /// Each worker may hold one fully decoded RGBA frame of the largest entry.
    fn parallelism(&self, entries: &[SourceEntry]) -> usize {
        let requested = worker_count(self.options.max_workers, entries.len());

        let largest_mib = entries
            .iter()
            .map(|entry| entry.pixel_count() * 4 / (1024 * 1024))
            .max()
            .unwrap_or(0)
            .max(1);

        // sysinfo 0.30+ reports bytes
        let mut sys =
            System::new_with_specifics(RefreshKind::new().with_memory(MemoryRefreshKind::new()));
        sys.refresh_memory();
        let available_mib = sys.available_memory() / (1024 * 1024);
        let memory_cap = (available_mib.saturating_sub(MIN_AVAILABLE_MEMORY_MIB) / largest_mib)
            .max(1) as usize;

        log::debug!(
            "Pool sizing: requested {}, memory allows {} ({} MiB free, {} MiB per frame)",
            requested,
            memory_cap,
            available_mib,
            largest_mib
        );
        requested.min(memory_cap)
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Output file name per entry, in entry order.
///
/// Names are the display-name stem plus `.jpg`. Names that collide case-insensitively
/// get ` (1)`, ` (2)`… appended to the stem, first come first served.
pub fn assign_output_names(entries: &[SourceEntry]) -> Vec<String> {
    let mut taken = HashSet::new();

    entries
        .iter()
        .map(|entry| {
            let base = entry.output_name();
            let stem = base
                .strip_suffix(&format!(".{}", TARGET_EXTENSION))
                .unwrap_or(&base)
                .to_string();

            let mut candidate = base.clone();
            let mut counter = 1;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = format!("{} ({}).{}", stem, counter, TARGET_EXTENSION);
                counter += 1;
            }
            candidate
        })
        .collect()
}

fn item_failure(entry: &SourceEntry, stage: ItemStage, reason: impl ToString) -> ItemFailure {
    ItemFailure {
        name: entry.name.clone(),
        location: entry.location.clone(),
        stage,
        reason: reason.to_string(),
    }
}

fn io_failure(destination: &Path, error: io::Error) -> SystemicFailure {
    if error.kind() == ErrorKind::StorageFull {
        SystemicFailure::DiskFull {
            path: destination.to_path_buf(),
        }
    } else {
        SystemicFailure::DestinationUnwritable {
            path: destination.to_path_buf(),
            source: error,
        }
    }
}

fn zip_failure(destination: &Path, error: zip::result::ZipError) -> SystemicFailure {
    match error {
        zip::result::ZipError::Io(e) => io_failure(destination, e),
        other => SystemicFailure::Package {
            path: destination.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn export_base_name() -> String {
    format!(
        "{}_{}",
        EXPORT_NAME_PREFIX,
        chrono::Local::now().format(EXPORT_TIMESTAMP_FORMAT)
    )
}

/// `base.ext` for `n == 0`, else `base_n.ext`
fn export_path(destination: &Path, base: &str, extension: Option<&str>, n: u32) -> PathBuf {
    let extension = extension.map(|ext| format!(".{}", ext)).unwrap_or_default();
    if n == 0 {
        destination.join(format!("{}{}", base, extension))
    } else {
        destination.join(format!("{}_{}{}", base, n, extension))
    }
}

/// Writes staged files into a temporary zip and renames it into place.
fn package_zip(
    items: &[ConvertedItem],
    destination: &Path,
) -> std::result::Result<PathBuf, SystemicFailure> {
    let staged = NamedTempFile::new_in(destination).map_err(|e| io_failure(destination, e))?;
    let mut writer = ZipWriter::new(staged);
    // JPEG data does not deflate
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .unix_permissions(0o644);

    for item in items {
        writer
            .start_file(item.name.as_str(), options)
            .map_err(|e| zip_failure(destination, e))?;
        let mut staged_item = File::open(&item.path).map_err(|e| io_failure(destination, e))?;
        io::copy(&mut staged_item, &mut writer).map_err(|e| io_failure(destination, e))?;
    }

    let mut staged = writer.finish().map_err(|e| zip_failure(destination, e))?;
    set_export_permissions(staged.path(), 0o644).map_err(|e| io_failure(destination, e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| io_failure(destination, e))?;

    let base = export_base_name();
    let mut n = 0;
    loop {
        let target = export_path(destination, &base, Some("zip"), n);
        match staged.persist_noclobber(&target) {
            Ok(_) => {
                log::info!("Exported {} files to {}", items.len(), target.display());
                return Ok(target);
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                staged = e.file;
                n += 1;
            }
            Err(e) => return Err(io_failure(destination, e.error)),
        }
    }
}

/// Moves the staging directory into place as the export directory.
fn package_directory(
    staging: TempDir,
    destination: &Path,
) -> std::result::Result<PathBuf, SystemicFailure> {
    let base = export_base_name();
    let target = (0..)
        .map(|n| export_path(destination, &base, None, n))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| SystemicFailure::Package {
            path: destination.to_path_buf(),
            reason: "no free export name".to_string(),
        })?;

    set_export_permissions(staging.path(), 0o755).map_err(|e| io_failure(destination, e))?;
    fs::rename(staging.path(), &target).map_err(|e| SystemicFailure::Package {
        path: target.clone(),
        reason: e.to_string(),
    })?;
    log::info!("Exported directory {}", target.display());
    Ok(target)
}

/// Writes one converted file; a failed write leaves nothing behind.
fn write_staged(path: &Path, data: &[u8]) -> io::Result<()> {
    let result = fs::write(path, data);
    if result.is_err() {
        let _ = fs::remove_file(path);
    }
    result
}

/// Temp files and dirs are created owner-only; exports get the usual modes.
#[cfg(unix)]
fn set_export_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_export_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
