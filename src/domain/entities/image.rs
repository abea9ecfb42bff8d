//! Domain types for tiered image handling.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a source image as it appears in the catalog.
///
/// May be an absolute URL, a site-relative path (`/assets/logo.png`) or a
/// storage-path fragment (`products/mug.jpg`). Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    /// Creates a new reference from any string-like input.
    #[must_use]
    pub fn new(reference: impl AsRef<str>) -> Self {
        Self(reference.as_ref().trim().to_string())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `http://` and `https://` references.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with("https://") || self.0.starts_with("http://")
    }

    /// Returns true for bundled assets addressed relative to the site root.
    #[must_use]
    pub fn is_site_relative(&self) -> bool {
        self.0.starts_with('/')
    }

    /// Returns true if the reference is empty after trimming.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageReference {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageReference {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// One rung of the image fidelity ladder, ordered by ascending size.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Tiny, heavily compressed placeholder shown blurred.
    Preview,
    /// Grid-sized thumbnail.
    Thumbnail,
    /// Default display size.
    #[default]
    Medium,
    /// Enlarged or modal display size.
    High,
    /// The untransformed source image.
    Original,
}

impl QualityTier {
    /// All tiers, lowest first.
    pub const ALL: [Self; 5] = [
        Self::Preview,
        Self::Thumbnail,
        Self::Medium,
        Self::High,
        Self::Original,
    ];

    /// Returns the next tier up, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Preview => Some(Self::Thumbnail),
            Self::Thumbnail => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High => Some(Self::Original),
            Self::Original => None,
        }
    }

    /// Tiers to walk after `shown` (exclusive) up to `target` (inclusive).
    ///
    /// With nothing shown yet the walk starts at `Preview`.
    #[must_use]
    pub fn ladder(shown: Option<Self>, target: Self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|tier| shown.is_none_or(|s| *tier > s) && *tier <= target)
            .collect()
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preview => write!(f, "preview"),
            Self::Thumbnail => write!(f, "thumbnail"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Original => write!(f, "original"),
        }
    }
}

impl std::str::FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(Self::Preview),
            "thumbnail" => Ok(Self::Thumbnail),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "original" => Ok(Self::Original),
            other => Err(format!("unknown quality tier: {other}")),
        }
    }
}

/// Decoded pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageDimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageDimensions {
    /// Creates dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Approximate decoded size at 4 bytes per pixel.
    #[must_use]
    pub const fn rgba_bytes(self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }
}

/// Shared handle to retrieved image bytes.
///
/// Cloning is cheap. The bytes are released once the last handle is dropped,
/// which is how a surface revokes what it had bound.
#[derive(Clone)]
pub struct ImageHandle {
    bytes: Bytes,
    dimensions: ImageDimensions,
}

impl ImageHandle {
    /// Wraps retrieved bytes and their decoded dimensions.
    #[must_use]
    pub const fn new(bytes: Bytes, dimensions: ImageDimensions) -> Self {
        Self { bytes, dimensions }
    }

    /// Raw encoded bytes.
    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Decoded dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> ImageDimensions {
        self.dimensions
    }
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("len", &self.bytes.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// A retrieved tier, stored once and never mutated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Source reference.
    pub reference: ImageReference,
    /// Tier this entry was fetched at.
    pub tier: QualityTier,
    /// Encoded size in bytes.
    pub byte_size: u64,
    /// Decoded dimensions.
    pub dimensions: ImageDimensions,
    /// When the bytes were retrieved.
    pub retrieved_at: DateTime<Utc>,
    /// Handle to the bytes.
    pub handle: ImageHandle,
}

impl CacheEntry {
    /// Builds an entry from freshly retrieved bytes.
    #[must_use]
    pub fn new(
        reference: ImageReference,
        tier: QualityTier,
        bytes: Bytes,
        dimensions: ImageDimensions,
    ) -> Self {
        let handle = ImageHandle::new(bytes, dimensions);
        Self {
            reference,
            tier,
            byte_size: handle.byte_size(),
            dimensions,
            retrieved_at: Utc::now(),
            handle,
        }
    }
}

/// Marker that a reference was retrieved at full resolution by the preloader.
#[derive(Debug, Clone, Copy)]
pub struct FullEntry {
    /// Encoded size in bytes.
    pub byte_size: u64,
    /// Decoded dimensions.
    pub dimensions: ImageDimensions,
    /// When the bytes were retrieved.
    pub retrieved_at: DateTime<Utc>,
}

impl From<&CacheEntry> for FullEntry {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            byte_size: entry.byte_size,
            dimensions: entry.dimensions,
            retrieved_at: entry.retrieved_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_tiers_are_ordered() {
        assert!(QualityTier::Preview < QualityTier::Thumbnail);
        assert!(QualityTier::Thumbnail < QualityTier::Medium);
        assert!(QualityTier::Medium < QualityTier::High);
        assert!(QualityTier::High < QualityTier::Original);
        assert_eq!(QualityTier::Original.next(), None);
    }

    #[test_case(None, QualityTier::Medium, &[QualityTier::Preview, QualityTier::Thumbnail, QualityTier::Medium] ; "fresh_to_medium")]
    #[test_case(None, QualityTier::High, &[QualityTier::Preview, QualityTier::Thumbnail, QualityTier::Medium, QualityTier::High] ; "fresh_to_high")]
    #[test_case(Some(QualityTier::Thumbnail), QualityTier::High, &[QualityTier::Medium, QualityTier::High] ; "resume_after_thumbnail")]
    #[test_case(Some(QualityTier::High), QualityTier::Medium, &[] ; "already_above_target")]
    fn test_ladder(shown: Option<QualityTier>, target: QualityTier, expected: &[QualityTier]) {
        assert_eq!(QualityTier::ladder(shown, target), expected);
    }

    #[test]
    fn test_reference_classification() {
        assert!(ImageReference::new("https://example.com/a.png").is_absolute());
        assert!(ImageReference::new("/assets/logo.png").is_site_relative());
        let fragment = ImageReference::new("products/mug.jpg");
        assert!(!fragment.is_absolute());
        assert!(!fragment.is_site_relative());
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("HIGH".parse::<QualityTier>(), Ok(QualityTier::High));
        assert!("ultra".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_rgba_estimate() {
        assert_eq!(ImageDimensions::new(10, 20).rgba_bytes(), 800);
    }
}
