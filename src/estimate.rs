use crate::constants::{
    ESTIMATE_BASE_BYTES_PER_PIXEL, ESTIMATE_HIGH_QUALITY_BYTES_PER_PIXEL,
    ESTIMATE_HIGH_QUALITY_KNEE, ESTIMATE_JPEG_HEADER_BYTES, ESTIMATE_QUALITY_EXPONENT,
    ESTIMATE_REFERENCE_QUALITY, MAX_QUALITY,
};
use crate::quality::Quality;
use crate::source::SourceEntry;
use crate::utils::calculate_savings_percent;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Predicted output size of the working set at one quality setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub original_total: u64,
    pub estimated_total: u64,
    /// `(original - estimated) / original * 100`; negative when the output grows
    pub savings_percent: f64,
    pub entry_count: usize,
    pub quality: Quality,
}

/// Predicts the aggregate output size without encoding anything.
///
/// Returns `None` for an empty working set: there is nothing to estimate, which is
/// different from an estimate of zero bytes.
pub fn estimate(entries: &[SourceEntry], quality: Quality) -> Option<SizeEstimate> {
    if entries.is_empty() {
        return None;
    }

    let original_total: u64 = entries.iter().map(|entry| entry.size_bytes).sum();
    let estimated_total: u64 = entries
        .iter()
        .map(|entry| estimate_entry_size(entry, quality))
        .sum();

    Some(SizeEstimate {
        original_total,
        estimated_total,
        savings_percent: calculate_savings_percent(original_total, estimated_total),
        entry_count: entries.len(),
        quality,
    })
}

/// Predicted JPEG size of one entry.
///
/// With known dimensions the prediction is `pixels * bytes_per_pixel(q)`, scaled by
/// the resolution class and the source format, plus fixed header overhead. Entries
/// without dimensions fall back to a ratio of their stored size. Non-decreasing in
/// `quality` in both cases.
pub fn estimate_entry_size(entry: &SourceEntry, quality: Quality) -> u64 {
    let pixels = entry.pixel_count();
    if pixels == 0 {
        return (entry.size_bytes as f64 * fallback_ratio(quality)) as u64;
    }

    let bytes_per_pixel =
        bytes_per_pixel(quality) * resolution_factor(pixels) * entry.format.estimate_factor();
    (pixels as f64 * bytes_per_pixel) as u64 + ESTIMATE_JPEG_HEADER_BYTES
}

fn bytes_per_pixel(quality: Quality) -> f64 {
    let q = quality.get() as f64;
    let mut bpp = ESTIMATE_BASE_BYTES_PER_PIXEL
        * (q / ESTIMATE_REFERENCE_QUALITY).powf(ESTIMATE_QUALITY_EXPONENT);

    // quantization tables flatten out near 100 and size climbs steeply
    if q > ESTIMATE_HIGH_QUALITY_KNEE {
        let t = (q - ESTIMATE_HIGH_QUALITY_KNEE) / (MAX_QUALITY as f64 - ESTIMATE_HIGH_QUALITY_KNEE);
        bpp += ESTIMATE_HIGH_QUALITY_BYTES_PER_PIXEL * t * t;
    }
    bpp
}

/// Large images carry more smooth area per pixel and compress better
fn resolution_factor(pixels: u64) -> f64 {
    match pixels {
        0..=1_000_000 => 1.3,
        1_000_001..=4_000_000 => 1.1,
        4_000_001..=16_000_000 => 1.0,
        _ => 0.9,
    }
}

fn fallback_ratio(quality: Quality) -> f64 {
    match quality.get() {
        0..=30 => 0.3,
        31..=50 => 0.5,
        51..=70 => 0.8,
        71..=85 => 1.2,
        86..=95 => 1.8,
        _ => 2.5,
    }
}

/// Identifies one estimate request; higher is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EstimateTicket(u64);

#[derive(Debug, Default)]
struct Published {
    sequence: u64,
    estimate: Option<SizeEstimate>,
}

/// Publishes estimates so that only the newest request is ever visible.
///
/// Every request takes a ticket from a monotonic counter. A result is applied only if
/// its ticket is still the latest one issued, so a slow computation finishing after a
/// newer one is discarded instead of overwriting it.
#[derive(Debug, Default)]
pub struct EstimateTracker {
    issued: AtomicU64,
    published: Mutex<Published>,
}

impl EstimateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> EstimateTicket {
        EstimateTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_latest(&self, ticket: EstimateTicket) -> bool {
        ticket.0 == self.issued.load(Ordering::SeqCst)
    }

    /// Applies `estimate` if `ticket` is the newest request. Returns whether it was applied.
    pub fn complete(&self, ticket: EstimateTicket, estimate: Option<SizeEstimate>) -> bool {
        let mut published = self
            .published
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !self.is_latest(ticket) || ticket.0 <= published.sequence {
            log::debug!("Dropping superseded estimate #{}", ticket.0);
            return false;
        }

        published.sequence = ticket.0;
        published.estimate = estimate;
        true
    }

    pub fn current(&self) -> Option<SizeEstimate> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .estimate
            .clone()
    }

    /// Recomputes on the calling thread and publishes the result.
    pub fn recompute(&self, entries: &[SourceEntry], quality: Quality) -> bool {
        let ticket = self.begin();
        self.complete(ticket, estimate(entries, quality))
    }

    /// Recomputes on a background thread. The ticket is taken before spawning, so the
    /// request order is the call order regardless of which thread finishes first.
    pub fn spawn_recompute(
        self: &Arc<Self>,
        entries: Vec<SourceEntry>,
        quality: Quality,
    ) -> JoinHandle<bool> {
        let ticket = self.begin();
        let tracker = Arc::clone(self);
        thread::spawn(move || tracker.complete(ticket, estimate(&entries, quality)))
    }
}
