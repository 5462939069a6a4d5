use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::clustering::domain::embedding_batch::SkipReason;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples the use case from specific output mechanisms (stdout,
/// log crate, test capture) so callers can observe skip diagnostics
/// and progress without changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Report per-image progress.
    fn progress(&mut self, current: usize, total: usize);

    /// Record one skipped image with its reason. Emitted exactly once
    /// per failed image.
    fn skipped(&mut self, path: &Path, reason: &SkipReason);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events. Used by tests where logger
/// output is irrelevant.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn skipped(&mut self, _path: &Path, _reason: &SkipReason) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI-oriented logger: one warning line per skipped image, throttled
/// progress, and a summary report at run completion.
pub struct StdoutPipelineLogger {
    throttle_images: usize,
    start_time: Instant,
    total_images: usize,
    skips: Vec<(PathBuf, SkipReason)>,
    messages: Vec<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_images: usize) -> Self {
        Self {
            throttle_images: throttle_images.max(1),
            start_time: Instant::now(),
            total_images: 0,
            skips: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was
    /// processed.
    pub fn summary_string(&self) -> Option<String> {
        if self.total_images == 0 && self.skips.is_empty() {
            return None;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let no_face = self
            .skips
            .iter()
            .filter(|(_, r)| matches!(r, SkipReason::NoFace))
            .count();
        let errors = self.skips.len() - no_face;
        let embedded = self.total_images.saturating_sub(self.skips.len());

        let mut lines = vec![format!(
            "Run summary ({} images, {elapsed:.1}s):",
            self.total_images
        )];
        lines.push(format!("  embedded: {embedded}"));
        lines.push(format!("  skipped (no face): {no_face}"));
        lines.push(format!("  skipped (error): {errors}"));
        if self.total_images > 0 && elapsed > 0.0 {
            lines.push(format!(
                "  throughput: {:.1} images/s",
                self.total_images as f64 / elapsed
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn skipped_count(&self) -> usize {
        self.skips.len()
    }

    pub fn skips(&self) -> &[(PathBuf, SkipReason)] {
        &self.skips
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.total_images = total;
        if total > 0 && (current % self.throttle_images == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} images ({pct:.1}%)");
        }
    }

    fn skipped(&mut self, path: &Path, reason: &SkipReason) {
        log::warn!("Skipping {}: {reason}", path.display());
        self.skips.push((path.to_path_buf(), reason.clone()));
    }

    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
