//! Object-storage URL resolution for quality tiers.
//!
//! Public objects live under `/storage/v1/object/public/{bucket}/{path}`. The
//! store's image renderer serves resized variants of the same object under
//! `/storage/v1/render/image/public/{bucket}/{path}` with width and quality
//! query parameters.

use crate::domain::entities::{ImageReference, QualityTier};

const OBJECT_SEGMENT: &str = "/storage/v1/object/public/";
const RENDER_SEGMENT: &str = "/storage/v1/render/image/public/";

/// Resize mode passed to the renderer.
pub const FIT_MODE: &str = "contain";

/// Query parameters owned by the resolver; anything else is preserved.
const OWNED_PARAMS: [&str; 5] = ["width", "height", "quality", "resize", "format"];

/// Renderer parameters for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTransform {
    /// Target width in pixels.
    pub width: u32,
    /// Compression quality percentage.
    pub quality: u8,
}

impl TierTransform {
    /// Transform for `tier`, `None` for the untransformed original.
    #[must_use]
    pub const fn for_tier(tier: QualityTier) -> Option<Self> {
        match tier {
            QualityTier::Preview => Some(Self {
                width: 64,
                quality: 30,
            }),
            QualityTier::Thumbnail => Some(Self {
                width: 200,
                quality: 70,
            }),
            QualityTier::Medium => Some(Self {
                width: 800,
                quality: 85,
            }),
            QualityTier::High => Some(Self {
                width: 1200,
                quality: 90,
            }),
            QualityTier::Original => None,
        }
    }
}

/// Every tier URL for one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierUrls {
    /// `(tier, url)` pairs, lowest tier first.
    pub urls: Vec<(QualityTier, String)>,
    /// Whether the store can transform this reference.
    pub transformable: bool,
}

/// Derives fetchable URLs per tier from image references.
#[derive(Debug, Clone, Default)]
pub struct StorageUrlResolver {
    base_url: Option<String>,
    bucket: String,
}

impl StorageUrlResolver {
    /// Creates a resolver for the store at `base_url`.
    ///
    /// Storage-path fragments are expanded against `bucket`. Without a base
    /// URL only absolute store URLs can be transformed.
    #[must_use]
    pub fn new(base_url: Option<&str>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            bucket: bucket.into().trim_matches('/').to_string(),
        }
    }

    /// Returns the URL to fetch for `reference` at `tier`.
    ///
    /// Never fails: references the store cannot transform come back as-is
    /// for every tier.
    #[must_use]
    pub fn resolve(&self, reference: &ImageReference, tier: QualityTier) -> String {
        let Some(object_url) = self.object_url(reference) else {
            return reference.as_str().to_string();
        };

        match TierTransform::for_tier(tier) {
            Some(transform) => render_url(&object_url, transform),
            None => object_url,
        }
    }

    /// Returns the untransformed URL used for raw fallback rendering.
    #[must_use]
    pub fn original(&self, reference: &ImageReference) -> String {
        self.resolve(reference, QualityTier::Original)
    }

    /// Resolves every tier at once.
    #[must_use]
    pub fn tier_urls(&self, reference: &ImageReference) -> TierUrls {
        TierUrls {
            urls: QualityTier::ALL
                .into_iter()
                .map(|tier| (tier, self.resolve(reference, tier)))
                .collect(),
            transformable: self.is_transformable(reference),
        }
    }

    /// Checks if the reference belongs to the recognised store.
    #[must_use]
    pub fn is_transformable(&self, reference: &ImageReference) -> bool {
        self.object_url(reference).is_some()
    }

    /// Public object URL for store references, `None` for anything else.
    fn object_url(&self, reference: &ImageReference) -> Option<String> {
        if reference.is_empty() || reference.is_site_relative() {
            return None;
        }

        if reference.is_absolute() {
            return is_storage_object_url(reference.as_str())
                .then(|| reference.as_str().to_string());
        }

        let base = self.base_url.as_deref()?;
        let path = reference.as_str().trim_start_matches('/');
        let path = path
            .strip_prefix(&format!("{}/", self.bucket))
            .unwrap_or(path);
        Some(format!("{base}{OBJECT_SEGMENT}{}/{path}", self.bucket))
    }
}

/// Checks if a URL points at a public storage object.
#[must_use]
pub fn is_storage_object_url(url: &str) -> bool {
    url.contains(OBJECT_SEGMENT)
}

fn render_url(object_url: &str, transform: TierTransform) -> String {
    let (base_url, existing_params) = match object_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (object_url, None),
    };

    let base_url = base_url.replacen(OBJECT_SEGMENT, RENDER_SEGMENT, 1);

    let mut params = vec![
        format!("width={}", transform.width),
        format!("quality={}", transform.quality),
        format!("resize={FIT_MODE}"),
    ];

    if let Some(existing) = existing_params {
        for param in existing.split('&').filter(|p| !p.is_empty()) {
            let key = param.split('=').next().unwrap_or("");
            if !OWNED_PARAMS.contains(&key) {
                params.push(param.to_string());
            }
        }
    }

    format!("{}?{}", base_url, params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const BASE: &str = "https://shop.supabase.co";

    fn resolver() -> StorageUrlResolver {
        StorageUrlResolver::new(Some(BASE), "products")
    }

    #[test_case(QualityTier::Preview, "width=64&quality=30" ; "preview")]
    #[test_case(QualityTier::Thumbnail, "width=200&quality=70" ; "thumbnail")]
    #[test_case(QualityTier::Medium, "width=800&quality=85" ; "medium")]
    #[test_case(QualityTier::High, "width=1200&quality=90" ; "high")]
    fn test_tier_parameters(tier: QualityTier, expected: &str) {
        let reference =
            ImageReference::new(format!("{BASE}/storage/v1/object/public/products/mug.jpg"));
        let url = resolver().resolve(&reference, tier);

        assert!(url.starts_with(&format!(
            "{BASE}/storage/v1/render/image/public/products/mug.jpg?"
        )));
        assert!(url.contains(expected));
        assert!(url.contains("resize=contain"));
    }

    #[test]
    fn test_original_is_untransformed() {
        let raw = format!("{BASE}/storage/v1/object/public/products/mug.jpg");
        let reference = ImageReference::new(&raw);
        assert_eq!(resolver().resolve(&reference, QualityTier::Original), raw);
    }

    #[test]
    fn test_fragment_expands_against_bucket() {
        let reference = ImageReference::new("mugs/enamel.png");
        assert_eq!(
            resolver().original(&reference),
            format!("{BASE}/storage/v1/object/public/products/mugs/enamel.png")
        );

        let prefixed = ImageReference::new("products/mugs/enamel.png");
        assert_eq!(resolver().original(&prefixed), resolver().original(&reference));
    }

    #[test]
    fn test_existing_params_preserved() {
        let reference = ImageReference::new(format!(
            "{BASE}/storage/v1/object/public/products/mug.jpg?v=3&width=10"
        ));
        let url = resolver().resolve(&reference, QualityTier::Medium);

        assert!(url.contains("v=3"));
        assert!(url.contains("width=800"));
        assert!(!url.contains("width=10&"));
        assert!(!url.ends_with("width=10"));
    }

    #[test_case("/assets/hero.webp" ; "bundled_asset")]
    #[test_case("https://example.com/image.png" ; "foreign_url")]
    fn test_untransformable_unchanged(raw: &str) {
        let reference = ImageReference::new(raw);
        let urls = resolver().tier_urls(&reference);

        assert!(!urls.transformable);
        assert_eq!(urls.urls.len(), QualityTier::ALL.len());
        assert!(urls.urls.iter().all(|(_, url)| url == raw));
    }

    #[test]
    fn test_fragment_without_base_unchanged() {
        let resolver = StorageUrlResolver::new(None, "products");
        let reference = ImageReference::new("mugs/enamel.png");

        assert_eq!(resolver.resolve(&reference, QualityTier::High), "mugs/enamel.png");
    }

    #[test]
    fn test_is_storage_object_url() {
        assert!(is_storage_object_url(
            "https://x.supabase.co/storage/v1/object/public/b/a.png"
        ));
        assert!(!is_storage_object_url("https://example.com/a.png"));
    }
}
