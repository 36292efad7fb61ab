use crate::error::{ExpansionFailure, Result};
use crate::formats::{is_archive_file, is_convertible_file};
use crate::source::{open_archive, SourceLocation};
use crate::utils::{build_worker_pool, worker_count};
use glob::glob;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Anything whose contents can be enumerated for candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl Container {
    pub fn path(&self) -> &Path {
        match self {
            Container::Directory(path) | Container::Archive(path) => path,
        }
    }

    /// Convertible images inside the container, sorted by location.
    pub fn candidates(&self) -> Result<Vec<SourceLocation>> {
        let mut found = match self {
            Container::Directory(dir) => walk_directory(dir)?,
            Container::Archive(archive) => list_archive(archive)?,
        };
        found.sort();
        Ok(found)
    }
}

/// Result of expanding one submission of user paths.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub candidates: Vec<SourceLocation>,
    pub failures: Vec<ExpansionFailure>,
    /// Candidates dropped because they were already known or repeated in the batch
    pub duplicates: usize,
}

/// Turns user-supplied paths into a flat list of candidates.
///
/// Inputs are expanded in parallel on a bounded pool. Each input either contributes
/// all of its candidates or, if it cannot be read, none of them plus one failure;
/// the rest of the batch is unaffected. Candidates already in `existing`, or seen
/// earlier in this batch, are dropped. Input order is preserved.
pub fn expand_paths(
    paths: &[PathBuf],
    existing: &HashSet<SourceLocation>,
    threads: Option<usize>,
) -> Result<Expansion> {
    let pool = build_worker_pool(worker_count(threads, paths.len()))?;
    let per_input: Vec<std::result::Result<Vec<SourceLocation>, ExpansionFailure>> =
        pool.install(|| paths.par_iter().map(|path| expand_input(path)).collect());

    let mut expansion = Expansion::default();
    let mut seen = HashSet::new();

    for outcome in per_input {
        match outcome {
            Ok(candidates) => {
                for candidate in candidates {
                    if existing.contains(&candidate) || !seen.insert(candidate.clone()) {
                        expansion.duplicates += 1;
                    } else {
                        expansion.candidates.push(candidate);
                    }
                }
            }
            Err(failure) => {
                log::warn!("{}", failure);
                expansion.failures.push(failure);
            }
        }
    }

    log::debug!(
        "Expanded {} inputs into {} candidates ({} duplicates, {} failed inputs)",
        paths.len(),
        expansion.candidates.len(),
        expansion.duplicates,
        expansion.failures.len()
    );

    Ok(expansion)
}

enum Input {
    Single(SourceLocation),
    Container(Container),
    Skipped,
}

fn expand_input(path: &Path) -> std::result::Result<Vec<SourceLocation>, ExpansionFailure> {
    if !path.exists() {
        let pattern = path.to_string_lossy();
        if is_glob_pattern(&pattern) {
            return expand_glob(&pattern).map_err(|e| ExpansionFailure::new(path, e));
        }
        return Err(ExpansionFailure::new(path, "no such file or directory"));
    }

    match classify(path)? {
        Input::Single(location) => Ok(vec![location]),
        Input::Container(container) => container
            .candidates()
            .map_err(|e| ExpansionFailure::new(container.path(), e)),
        Input::Skipped => Ok(Vec::new()),
    }
}

fn classify(path: &Path) -> std::result::Result<Input, ExpansionFailure> {
    let canonical = path
        .canonicalize()
        .map_err(|e| ExpansionFailure::new(path, e))?;
    let metadata = fs::metadata(&canonical).map_err(|e| ExpansionFailure::new(path, e))?;

    if metadata.is_dir() {
        Ok(Input::Container(Container::Directory(canonical)))
    } else if is_archive_file(&canonical) {
        Ok(Input::Container(Container::Archive(canonical)))
    } else if is_convertible_file(&canonical) {
        Ok(Input::Single(SourceLocation::file(canonical)))
    } else {
        Ok(Input::Skipped)
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

fn expand_glob(pattern: &str) -> Result<Vec<SourceLocation>> {
    let mut found = Vec::new();
    for entry in glob(pattern)?.flatten() {
        match expand_input(&entry) {
            Ok(candidates) => found.extend(candidates),
            Err(failure) => log::warn!("{}", failure),
        }
    }
    Ok(found)
}

fn walk_directory(dir: &Path) -> Result<Vec<SourceLocation>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // the folder itself is unreadable: the whole input fails
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_convertible_file(entry.path()) {
            found.push(SourceLocation::file(entry.path().canonicalize()?));
        }
    }

    Ok(found)
}

fn list_archive(archive_path: &Path) -> Result<Vec<SourceLocation>> {
    let archive = open_archive(archive_path)?;
    let members: Vec<String> = archive
        .file_names()
        .filter(|name| !name.ends_with('/') && is_safe_member(name))
        .filter(|name| is_convertible_file(Path::new(name)))
        .map(str::to_owned)
        .collect();

    Ok(members
        .into_iter()
        .map(|member| SourceLocation::archive_member(archive_path, member))
        .collect())
}

/// Rejects members that escape the archive root, hidden files and macOS resource forks
fn is_safe_member(name: &str) -> bool {
    Path::new(name).components().all(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            !part.starts_with('.') && part != "__MACOSX"
        }
        _ => false,
    })
}
