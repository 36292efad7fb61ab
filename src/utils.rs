//! Helpers shared by the scan, estimate and convert stages

use crate::constants::MAX_WORKERS;
use crate::error::{ConvertError, Result};
use rayon::ThreadPool;

/// Format file size in human-readable format
///
/// # Arguments
/// * `bytes` - Size in bytes
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 B")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Savings as a percentage of the original size.
///
/// Positive means the output is smaller, negative means it grew. Zero when there
/// is no original size to compare against.
pub fn calculate_savings_percent(original_size: u64, output_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (original_size as f64 - output_size as f64) / original_size as f64 * 100.0
}

/// Number of workers for a batch of `items`, bounded by `MAX_WORKERS`
pub fn worker_count(requested: Option<usize>, items: usize) -> usize {
    requested
        .unwrap_or_else(num_cpus::get)
        .clamp(1, MAX_WORKERS)
        .min(items.max(1))
}

/// Build a scoped Rayon pool so a batch never fans out past `threads`
pub fn build_worker_pool(threads: usize) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|index| format!("img-convert-{}", index))
        .build()
        .map_err(|e| ConvertError::ThreadPool(e.to_string()))
}
