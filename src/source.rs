use crate::constants::{MAX_FILE_SIZE, TARGET_EXTENSION};
use crate::error::{ConvertError, Result};
use crate::formats::SourceFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Canonical identity of a candidate image.
///
/// `path` and `archive` are canonicalized by the expander, so two locations compare
/// equal exactly when they name the same bytes on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLocation {
    File { path: PathBuf },
    ArchiveMember { archive: PathBuf, member: String },
}

impl SourceLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SourceLocation::File { path: path.into() }
    }

    pub fn archive_member(archive: impl Into<PathBuf>, member: impl Into<String>) -> Self {
        SourceLocation::ArchiveMember {
            archive: archive.into(),
            member: member.into(),
        }
    }

    /// Path of the image itself, or the archive-relative member path
    fn inner_path(&self) -> &Path {
        match self {
            SourceLocation::File { path } => path,
            SourceLocation::ArchiveMember { member, .. } => Path::new(member),
        }
    }

    pub fn display_name(&self) -> String {
        self.inner_path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.to_string())
    }

    pub fn format(&self) -> Option<SourceFormat> {
        SourceFormat::from_path(self.inner_path())
    }

    /// Size of the stored image in bytes, without reading its contents
    pub fn size_bytes(&self) -> Result<u64> {
        match self {
            SourceLocation::File { path } => Ok(fs::metadata(path)?.len()),
            SourceLocation::ArchiveMember { archive, member } => {
                let mut zip = open_archive(archive)?;
                let entry = zip.by_name(member)?;
                Ok(entry.size())
            }
        }
    }

    /// Reads the whole image. Archive members are extracted into memory on demand.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        match self {
            SourceLocation::File { path } => {
                if !path.exists() {
                    return Err(ConvertError::FileNotFound(path.clone()));
                }
                check_file_size(fs::metadata(path)?.len())?;
                Ok(fs::read(path)?)
            }
            SourceLocation::ArchiveMember { archive, member } => {
                let mut zip = open_archive(archive)?;
                let mut entry = zip.by_name(member)?;
                let size = entry.size();
                check_file_size(size)?;
                let mut buffer = Vec::with_capacity(size as usize);
                entry.read_to_end(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

fn check_file_size(size: u64) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(ConvertError::FileTooLarge(size, MAX_FILE_SIZE));
    }
    Ok(())
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::File { path } => write!(f, "{}", path.display()),
            SourceLocation::ArchiveMember { archive, member } => {
                write!(f, "{}!/{}", archive.display(), member)
            }
        }
    }
}

pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// A probed image staged for conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub location: SourceLocation,
    pub name: String,
    pub format: SourceFormat,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    /// PNG data URL; absent when the preview could not be produced
    pub thumbnail: Option<String>,
}

impl SourceEntry {
    pub fn identity(&self) -> &SourceLocation {
        &self.location
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Display name with its extension replaced by the target's
    pub fn output_name(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "image".to_string());
        format!("{}.{}", stem, TARGET_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn entry_named(name: &str) -> SourceEntry {
        SourceEntry {
            location: SourceLocation::file(format!("/photos/{}", name)),
            name: name.to_string(),
            format: SourceFormat::Png,
            width: 10,
            height: 10,
            size_bytes: 100,
            thumbnail: None,
        }
    }

    #[test]
    fn test_display_name() {
        let file = SourceLocation::file("/photos/IMG_1.png");
        assert_eq!(file.display_name(), "IMG_1.png");

        let member = SourceLocation::archive_member("/photos/all.zip", "trip/IMG_2.jpg");
        assert_eq!(member.display_name(), "IMG_2.jpg");
        assert_eq!(member.format(), Some(SourceFormat::Jpeg));
    }

    #[test]
    fn test_location_display() {
        let member = SourceLocation::archive_member("/photos/all.zip", "trip/IMG_2.jpg");
        assert_eq!(member.to_string(), "/photos/all.zip!/trip/IMG_2.jpg");
    }

    #[test]
    fn test_output_name() {
        assert_eq!(entry_named("IMG_0001.HEIC").output_name(), "IMG_0001.jpg");
        assert_eq!(entry_named("scan.final.png").output_name(), "scan.final.jpg");
        assert_eq!(entry_named(".png").output_name(), ".png.jpg");
    }

    #[test]
    fn test_read_bytes_from_file_and_archive() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a.png");
        std::fs::write(&file_path, b"file bytes").unwrap();

        let zip_path = temp_dir.path().join("b.zip");
        let mut writer = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        writer
            .start_file("inner/c.png", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"member bytes").unwrap();
        writer.finish().unwrap();

        let file = SourceLocation::file(&file_path);
        assert_eq!(file.read_bytes().unwrap(), b"file bytes");
        assert_eq!(file.size_bytes().unwrap(), 10);

        let member = SourceLocation::archive_member(&zip_path, "inner/c.png");
        assert_eq!(member.read_bytes().unwrap(), b"member bytes");
        assert_eq!(member.size_bytes().unwrap(), 12);
    }

    #[test]
    fn test_read_bytes_missing_member() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("empty.zip");
        let writer = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        writer.finish().unwrap();

        let member = SourceLocation::archive_member(&zip_path, "missing.png");
        assert!(matches!(member.read_bytes(), Err(ConvertError::Archive(_))));
    }
}
