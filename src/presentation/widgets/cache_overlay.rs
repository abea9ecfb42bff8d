//! Developer overlay showing advisory cache counters.

use crate::infrastructure::image::DiagnosticsSnapshot;

const MIB: f64 = 1024.0 * 1024.0;

/// Renders a [`DiagnosticsSnapshot`] as plain text lines.
#[derive(Debug, Clone)]
pub struct CacheOverlay {
    title: String,
    max_rows: usize,
}

impl CacheOverlay {
    /// Creates an overlay listing at most 10 bound references.
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: "Image cache".to_string(),
            max_rows: 10,
        }
    }

    /// Sets the heading.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets how many bound references are listed.
    #[must_use]
    pub const fn max_rows(mut self, rows: usize) -> Self {
        self.max_rows = rows;
        self
    }

    /// Formats the snapshot, largest bindings first.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn lines(&self, snapshot: &DiagnosticsSnapshot) -> Vec<String> {
        let mut lines = vec![
            format!("── {} ──", self.title),
            format!("{}", snapshot.stats),
            format!(
                "Bound: {:.2} MiB across {} images",
                snapshot.bytes_used as f64 / MIB,
                snapshot.bound.len()
            ),
        ];

        let mut bound = snapshot.bound.clone();
        bound.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        for (reference, size) in bound.iter().take(self.max_rows) {
            lines.push(format!("  {size:>9} B  {reference}"));
        }
        if bound.len() > self.max_rows {
            lines.push(format!("  … {} more", bound.len() - self.max_rows));
        }
        lines
    }

    /// Formats the snapshot as a single block of text.
    #[must_use]
    pub fn render(&self, snapshot: &DiagnosticsSnapshot) -> String {
        self.lines(snapshot).join("\n")
    }
}

impl Default for CacheOverlay {
    fn default() -> Self {
        Self::new()
    }
}
