//! Update resolver
//!
//! Decides which episodes of a freshly fetched show are new relative to the
//! last episode that was successfully handled.

use crate::quality::Quality;
use crate::show::{Episode, SeasonNumber, Show};
use serde::{Deserialize, Serialize};

/// Stored position of a tracked show.
///
/// `season` and `episode` both `None` means the show was never checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackedShowProgress {
    /// Season of the last handled episode
    pub season: Option<SeasonNumber>,
    /// Number of the last handled episode
    pub episode: Option<u32>,
    /// Quality to download new episodes in
    pub quality: Quality,
    /// Catalog id of the show
    pub cat: u32,
}

impl TrackedShowProgress {
    pub fn new(cat: u32, quality: Quality) -> Self {
        Self {
            season: None,
            episode: None,
            quality,
            cat,
        }
    }

    pub fn never_checked(&self) -> bool {
        self.season.is_none() && self.episode.is_none()
    }

    /// Position on the same key as [`Episode::chrono_key`].
    ///
    /// A missing half counts as zero.
    fn position(&self) -> Option<((u32, u32), u32)> {
        if self.never_checked() {
            return None;
        }
        let season = self
            .season
            .and_then(|season| season.chrono_key())
            .unwrap_or((0, 0));
        Some((season, self.episode.unwrap_or(0)))
    }

    /// Moves the position to `episode`.
    pub fn advance_to(&mut self, episode: &Episode) {
        self.season = Some(episode.season);
        self.episode = Some(episode.number);
    }

    /// Short position label: `S03E07`, `S03` or nothing.
    pub fn info(&self) -> Option<String> {
        let season = self.season.and_then(|season| season.major());
        match (season, self.episode) {
            (Some(season), Some(episode)) => Some(format!("S{:02}E{:02}", season, episode)),
            (Some(season), None) => Some(format!("S{:02}", season)),
            _ => None,
        }
    }
}

/// Computes the episodes released after `progress`, oldest first.
///
/// A show that was never checked yields only its latest regular episode.
/// Episodes of special seasons are never returned.
///
/// # Examples
///
/// ```
/// use lostfilm_monitor::{Quality, Season, SeasonNumber, Show, TrackedShowProgress};
/// use lostfilm_monitor::resolve_new_episodes;
///
/// let show = Show::new("Lost", None, "Lost", 1, "www.lostfilm.tv")
///     .with_seasons([
///         Season::with_episodes(SeasonNumber::Regular(1), [1, 2, 3]).unwrap(),
///         Season::with_episodes(SeasonNumber::Regular(2), [1, 2]).unwrap(),
///     ])
///     .unwrap();
///
/// let mut progress = TrackedShowProgress::new(1, Quality::SD);
/// progress.season = Some(SeasonNumber::Regular(1));
/// progress.episode = Some(2);
///
/// let pending: Vec<_> = resolve_new_episodes(&show, &progress)
///     .iter()
///     .map(|e| (e.season, e.number))
///     .collect();
/// assert_eq!(pending, vec![
///     (SeasonNumber::Regular(1), 3),
///     (SeasonNumber::Regular(2), 1),
///     (SeasonNumber::Regular(2), 2),
/// ]);
/// ```
pub fn resolve_new_episodes(show: &Show, progress: &TrackedShowProgress) -> Vec<Episode> {
    let Some(position) = progress.position() else {
        return show
            .last_season()
            .and_then(|season| season.last_episode())
            .copied()
            .into_iter()
            .collect();
    };

    let mut pending: Vec<Episode> = show
        .iter_ascending()
        .filter(|season| !season.is_special_season())
        .flat_map(|season| season.iter_ascending())
        .filter(|episode| episode.chrono_key().is_some_and(|key| key > position))
        .copied()
        .collect();
    pending.sort_by_key(|episode| episode.chrono_key());
    pending
}
