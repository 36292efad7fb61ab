use crate::convert::ConversionJob;
use crate::error::Result;
use crate::estimate::{EstimateTracker, SizeEstimate};
use crate::probe::backfill_thumbnail;
use crate::quality::Quality;
use crate::scan::{expand_and_probe, ScanOptions, ScanReport};
use crate::source::{SourceEntry, SourceLocation};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

/// The working set, the current quality and the estimate derived from both.
///
/// Entries keep insertion order and are unique by [`SourceLocation`]. Every change to
/// the set or the quality republishes the estimate before returning, so
/// [`Workspace::estimate`] never shows a value for an older state.
#[derive(Debug, Default)]
pub struct Workspace {
    entries: Vec<SourceEntry>,
    index: HashSet<SourceLocation>,
    quality: Quality,
    estimates: Arc<EstimateTracker>,
}

impl Workspace {
    pub fn new(quality: Quality) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    /// Expands and probes `paths`, adding every new image to the working set.
    ///
    /// Images already in the set are skipped before probing. The report lists only the
    /// entries this call added.
    pub fn submit(&mut self, paths: &[PathBuf], options: &ScanOptions) -> Result<ScanReport> {
        let mut report = expand_and_probe(paths, &self.index, options)?;
        report.entries.retain(|entry| self.index.insert(entry.location.clone()));
        self.entries.extend(report.entries.iter().cloned());
        self.refresh_estimate();
        Ok(report)
    }

    /// Adds one entry. Returns `false`, changing nothing, if its location is present.
    pub fn insert(&mut self, entry: SourceEntry) -> bool {
        if !self.index.insert(entry.location.clone()) {
            return false;
        }
        self.entries.push(entry);
        self.refresh_estimate();
        true
    }

    pub fn remove(&mut self, location: &SourceLocation) -> Option<SourceEntry> {
        if !self.index.remove(location) {
            return None;
        }
        let position = self
            .entries
            .iter()
            .position(|entry| &entry.location == location)?;
        let removed = self.entries.remove(position);
        self.refresh_estimate();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.refresh_estimate();
    }

    pub fn set_quality(&mut self, quality: Quality) {
        if self.quality != quality {
            self.quality = quality;
            self.refresh_estimate();
        }
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, location: &SourceLocation) -> bool {
        self.index.contains(location)
    }

    /// Estimate for the current entries and quality; `None` while the set is empty.
    pub fn estimate(&self) -> Option<SizeEstimate> {
        self.estimates.current()
    }

    /// Shared handle for readers on other threads.
    pub fn estimates(&self) -> Arc<EstimateTracker> {
        Arc::clone(&self.estimates)
    }

    /// Recomputes the estimate on a background thread.
    ///
    /// The result is published only if no newer request, synchronous or not, has been
    /// issued by the time it finishes.
    pub fn request_estimate(&self) -> JoinHandle<bool> {
        self.estimates
            .spawn_recompute(self.entries.clone(), self.quality)
    }

    /// Retries thumbnails that could not be produced at probe time.
    ///
    /// Returns how many entries gained a thumbnail.
    pub fn backfill_thumbnails(&mut self, max_size: u32) -> usize {
        self.entries
            .iter_mut()
            .filter(|entry| entry.thumbnail.is_none())
            .map(|entry| backfill_thumbnail(entry, max_size))
            .filter(|&filled| filled)
            .count()
    }

    /// Freezes the entries and quality for one conversion run.
    pub fn snapshot(&self) -> ConversionJob {
        ConversionJob {
            entries: self.entries.clone(),
            quality: self.quality,
        }
    }

    fn refresh_estimate(&self) {
        self.estimates.recompute(&self.entries, self.quality);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::SourceFormat;
    use image::{DynamicImage, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn entry(name: &str, size_bytes: u64) -> SourceEntry {
        SourceEntry {
            location: SourceLocation::file(format!("/photos/{}", name)),
            name: name.to_string(),
            format: SourceFormat::Jpeg,
            width: 640,
            height: 480,
            size_bytes,
            thumbnail: None,
        }
    }

    fn write_png(path: &Path) {
        DynamicImage::ImageRgb8(RgbImage::new(16, 16))
            .save(path)
            .unwrap();
    }

    fn q(value: u8) -> Quality {
        Quality::new(value).unwrap()
    }

    #[test]
    fn test_insert_is_noop_on_duplicate() {
        let mut workspace = Workspace::default();
        assert!(workspace.insert(entry("a.jpg", 100)));
        assert!(!workspace.insert(entry("a.jpg", 999)));

        assert_eq!(workspace.len(), 1);
        assert_eq!(workspace.entries()[0].size_bytes, 100);
    }

    #[test]
    fn test_estimate_follows_mutations() {
        let mut workspace = Workspace::new(q(85));
        assert!(workspace.estimate().is_none());

        workspace.insert(entry("a.jpg", 10_000_000));
        workspace.insert(entry("b.jpg", 2_000_000));
        let estimate = workspace.estimate().unwrap();
        assert_eq!(estimate.original_total, 12_000_000);
        assert_eq!(estimate.entry_count, 2);

        workspace.set_quality(q(40));
        let lower = workspace.estimate().unwrap();
        assert_eq!(lower.quality, q(40));
        assert!(lower.estimated_total <= estimate.estimated_total);

        workspace.remove(&SourceLocation::file("/photos/a.jpg"));
        assert_eq!(workspace.estimate().unwrap().original_total, 2_000_000);
    }

    #[test]
    fn test_emptying_drops_estimate() {
        let mut workspace = Workspace::default();
        workspace.insert(entry("a.jpg", 100));
        workspace.insert(entry("b.jpg", 100));
        assert!(workspace.estimate().is_some());

        workspace.remove(&SourceLocation::file("/photos/a.jpg"));
        workspace.remove(&SourceLocation::file("/photos/b.jpg"));
        assert!(workspace.is_empty());
        assert!(workspace.estimate().is_none());

        workspace.insert(entry("c.jpg", 100));
        workspace.clear();
        assert!(workspace.estimate().is_none());
    }

    #[test]
    fn test_remove_unknown_location() {
        let mut workspace = Workspace::default();
        workspace.insert(entry("a.jpg", 100));
        assert!(workspace
            .remove(&SourceLocation::file("/photos/other.jpg"))
            .is_none());
        assert_eq!(workspace.len(), 1);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_changes() {
        let mut workspace = Workspace::new(q(70));
        workspace.insert(entry("a.jpg", 100));

        let job = workspace.snapshot();
        workspace.set_quality(q(95));
        workspace.insert(entry("b.jpg", 100));

        assert_eq!(job.quality, q(70));
        assert_eq!(job.entries.len(), 1);
    }

    #[test]
    fn test_background_estimate_superseded_by_mutation() {
        let mut workspace = Workspace::new(q(50));
        workspace.insert(entry("a.jpg", 100));

        let pending = workspace.request_estimate();
        workspace.set_quality(q(90));
        pending.join().unwrap();

        assert_eq!(workspace.estimate().unwrap().quality, q(90));
    }

    #[test]
    fn test_submit_twice_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        write_png(&temp_dir.path().join("a.png"));
        write_png(&temp_dir.path().join("b.png"));
        let paths = vec![temp_dir.path().to_path_buf()];
        let options = ScanOptions::default();

        let mut workspace = Workspace::default();
        let first = workspace.submit(&paths, &options).unwrap();
        assert_eq!(first.found(), 2);

        let second = workspace.submit(&paths, &options).unwrap();
        assert_eq!(second.found(), 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(workspace.len(), 2);
    }

    #[test]
    fn test_same_file_via_directory_and_direct_path() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.png");
        write_png(&file);

        let mut workspace = Workspace::default();
        workspace
            .submit(&[file.clone(), temp_dir.path().to_path_buf()], &ScanOptions::default())
            .unwrap();
        workspace
            .submit(&[file], &ScanOptions::default())
            .unwrap();

        assert_eq!(workspace.len(), 1);
    }

    #[test]
    fn test_backfill_thumbnails() {
        let temp_dir = TempDir::new().unwrap();
        write_png(&temp_dir.path().join("a.png"));
        let mut options = ScanOptions::default();
        options.probe.thumbnails = false;

        let mut workspace = Workspace::default();
        workspace
            .submit(&[temp_dir.path().to_path_buf()], &options)
            .unwrap();
        assert!(workspace.entries()[0].thumbnail.is_none());

        assert_eq!(workspace.backfill_thumbnails(64), 1);
        assert!(workspace.entries()[0].thumbnail.is_some());
        assert_eq!(workspace.backfill_thumbnails(64), 0);
    }
}
