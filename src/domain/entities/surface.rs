//! Display surface lifecycle states.

use super::image::QualityTier;

/// State of one on-screen image instance.
///
/// `shown` carries the tier currently bound to the surface, if any, so a
/// surface that is fetching or has failed can still render what it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    /// Mounted, not visible, nothing requested.
    #[default]
    Idle,
    /// Visible, walk about to start.
    Intersecting,
    /// Fetching `tier`.
    Loading {
        /// Tier being fetched.
        tier: QualityTier,
        /// Tier currently displayed.
        shown: Option<QualityTier>,
    },
    /// `tier` is displayed and a higher tier may follow.
    Displayed {
        /// Tier displayed.
        tier: QualityTier,
    },
    /// Final tier reached; no more fetches.
    Settled {
        /// Tier displayed.
        tier: QualityTier,
    },
    /// Target tier and raw fallback both failed.
    Failed {
        /// Tier still displayed, if any lower tier had succeeded.
        shown: Option<QualityTier>,
    },
}

impl SurfaceState {
    /// Tier currently displayed.
    #[must_use]
    pub const fn shown(&self) -> Option<QualityTier> {
        match *self {
            Self::Idle | Self::Intersecting => None,
            Self::Loading { shown, .. } | Self::Failed { shown } => shown,
            Self::Displayed { tier } | Self::Settled { tier } => Some(tier),
        }
    }

    /// Returns true while a walk is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(
            self,
            Self::Intersecting | Self::Loading { .. } | Self::Displayed { .. }
        )
    }

    /// Returns true once no further transition will happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled { .. } | Self::Failed { .. })
    }

    /// Returns true if the surface has given up.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns true if nothing has been requested yet.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Intersecting => write!(f, "intersecting"),
            Self::Loading { tier, .. } => write!(f, "loading({tier})"),
            Self::Displayed { tier } => write!(f, "displayed({tier})"),
            Self::Settled { tier } => write!(f, "settled({tier})"),
            Self::Failed { shown: Some(tier) } => write!(f, "failed(showing {tier})"),
            Self::Failed { shown: None } => write!(f, "failed"),
        }
    }
}
