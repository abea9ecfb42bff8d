//! Product catalog as seen by the image preloader.
//!
//! The structure is supplied by the storefront's data source; this crate only
//! walks it to enumerate image references.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::image::ImageReference;

/// Nested catalog: categories, their subtypes, and the items in each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Top-level product categories.
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// A product category (e.g. "mugs").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Subtypes listed under this category.
    #[serde(default)]
    pub subtypes: Vec<Subtype>,
}

/// A page of items within a category (e.g. "enamel mugs").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtype {
    /// Stable identifier, unique within its category.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Items shown on the page.
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

/// A single product with its gallery images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Gallery images, first one is the cover.
    #[serde(default)]
    pub images: Vec<ImageReference>,
}

/// Which part of the catalog a preload run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadScope {
    /// Every reference in the catalog.
    Entire,
    /// One category, all of its subtypes.
    Category(String),
    /// One subtype page of one category.
    Page {
        /// Category identifier.
        category: String,
        /// Subtype identifier.
        subtype: String,
    },
}

impl PreloadScope {
    /// Full-resolution batches only run for catalog-wide scope.
    #[must_use]
    pub const fn includes_full_phase(&self) -> bool {
        matches!(self, Self::Entire)
    }
}

impl std::fmt::Display for PreloadScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entire => write!(f, "catalog"),
            Self::Category(id) => write!(f, "category:{id}"),
            Self::Page { category, subtype } => write!(f, "page:{category}/{subtype}"),
        }
    }
}

impl Catalog {
    /// Enumerates references within `scope`, first occurrence order, without
    /// duplicates or empty references.
    #[must_use]
    pub fn references(&self, scope: &PreloadScope) -> Vec<ImageReference> {
        let subtypes = self
            .categories
            .iter()
            .filter(|category| match scope {
                PreloadScope::Entire => true,
                PreloadScope::Category(id) | PreloadScope::Page { category: id, .. } => {
                    category.id == *id
                }
            })
            .flat_map(|category| category.subtypes.iter())
            .filter(|subtype| match scope {
                PreloadScope::Page { subtype: id, .. } => subtype.id == *id,
                _ => true,
            });

        let mut seen = HashSet::new();
        subtypes
            .flat_map(|subtype| subtype.items.iter())
            .flat_map(|item| item.images.iter())
            .filter(|reference| !reference.is_empty() && seen.insert(*reference))
            .cloned()
            .collect()
    }

    /// Total number of items across all categories.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.categories
            .iter()
            .flat_map(|category| category.subtypes.iter())
            .map(|subtype| subtype.items.len())
            .sum()
    }
}
