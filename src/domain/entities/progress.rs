//! Bulk preload progress snapshots.

use serde::Serialize;

/// Which pass of a preload run is executing. Ordered by execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadPhase {
    /// Preview tier for every reference.
    Preview,
    /// Full-resolution batches.
    Full,
}

impl std::fmt::Display for PreloadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preview => write!(f, "preview"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Progress snapshot broadcast to listeners. Has no identity of its own.
///
/// `loaded` restarts when the full phase begins, so successive snapshots of
/// one run are non-decreasing by [`PreloadProgress::position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreloadProgress {
    /// References processed in the current phase, failures included.
    pub loaded: usize,
    /// References in scope.
    pub total: usize,
    /// `loaded` as a whole percentage of `total`.
    pub percentage: u8,
    /// Current phase.
    pub phase: PreloadPhase,
    /// 1-based index of the batch being processed, 0 outside the full phase.
    pub current_batch: usize,
    /// Number of full-resolution batches, 0 outside the full phase.
    pub total_batches: usize,
}

impl PreloadProgress {
    /// Builds a snapshot, computing the percentage.
    #[must_use]
    pub fn new(
        phase: PreloadPhase,
        loaded: usize,
        total: usize,
        current_batch: usize,
        total_batches: usize,
    ) -> Self {
        Self {
            loaded,
            total,
            percentage: percentage(loaded, total),
            phase,
            current_batch,
            total_batches,
        }
    }

    /// `(phase, loaded)`, the key progress never moves backwards on.
    #[must_use]
    pub const fn position(&self) -> (PreloadPhase, usize) {
        (self.phase, self.loaded)
    }
}

impl std::fmt::Display for PreloadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}/{} ({}%)",
            self.phase, self.loaded, self.total, self.percentage
        )?;
        if self.total_batches > 0 {
            write!(f, " batch {}/{}", self.current_batch, self.total_batches)?;
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn percentage(loaded: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((loaded.min(total) * 100) / total) as u8
}
