//! Show, season and episode model.
//!
//! A [`Show`] is a snapshot of everything the catalog lists for one series at the
//! time it was fetched. It is rebuilt on every check and never patched in place.
//! Seasons and episodes are keyed collections: inserting a number twice is a
//! [`DuplicateKeyError`], which always points at a bug in whatever built the show.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Seasons that cannot be placed on the regular season axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialSeason {
    /// The caption could not be parsed
    Unknown,
    /// Bonus content ("Дополнительные материалы")
    Additional,
}

/// Season number as printed in a season caption.
///
/// `Paired` comes from captions that also carry an episode number, e.g.
/// "5 сезон 10 серия".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonNumber {
    Regular(u32),
    Paired(u32, u32),
    Special(SpecialSeason),
}

impl SeasonNumber {
    pub fn is_special(&self) -> bool {
        matches!(self, SeasonNumber::Special(_))
    }

    /// The key used for every chronological comparison.
    ///
    /// Special seasons have no place in the chronology and return `None`.
    /// Both "last season" and "new episode" logic go through this function.
    pub fn chrono_key(&self) -> Option<(u32, u32)> {
        match *self {
            SeasonNumber::Regular(season) => Some((season, 0)),
            SeasonNumber::Paired(season, part) => Some((season, part)),
            SeasonNumber::Special(_) => None,
        }
    }

    /// The season component used in catalog lookup URLs.
    pub fn major(&self) -> Option<u32> {
        self.chrono_key().map(|(season, _)| season)
    }

    /// Total order for display: numeric seasons ascending, then `Additional`,
    /// then `Unknown` on top.
    fn sort_key(&self) -> (u8, u32, u32, u8) {
        match *self {
            SeasonNumber::Regular(season) => (0, season, 0, 0),
            SeasonNumber::Paired(season, part) => (0, season, part, 1),
            SeasonNumber::Special(SpecialSeason::Additional) => (1, 0, 0, 0),
            SeasonNumber::Special(SpecialSeason::Unknown) => (1, 1, 0, 0),
        }
    }
}

impl Ord for SeasonNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for SeasonNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SeasonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonNumber::Regular(season) => write!(f, "{}", season),
            SeasonNumber::Paired(season, part) => write!(f, "{}.{}", season, part),
            SeasonNumber::Special(SpecialSeason::Additional) => write!(f, "additional"),
            SeasonNumber::Special(SpecialSeason::Unknown) => write!(f, "unknown"),
        }
    }
}

/// Raised when a season or episode number is inserted twice.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DuplicateKeyError {
    #[error("Season {0} already added to show")]
    Season(SeasonNumber),

    #[error("Episode {episode} already exists in season {season}")]
    Episode { season: SeasonNumber, episode: u32 },
}

/// A single released episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Episode {
    pub season: SeasonNumber,
    pub number: u32,
}

impl Episode {
    pub fn new(season: SeasonNumber, number: u32) -> Self {
        Self { season, number }
    }

    pub fn is_special_season(&self) -> bool {
        self.season.is_special()
    }

    /// Lexicographic position of this episode, `None` for special seasons.
    pub fn chrono_key(&self) -> Option<((u32, u32), u32)> {
        self.season.chrono_key().map(|season| (season, self.number))
    }
}

/// One season block with its released episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Season {
    number: SeasonNumber,
    episodes: BTreeMap<u32, Episode>,
}

impl Season {
    pub fn new(number: SeasonNumber) -> Self {
        Self {
            number,
            episodes: BTreeMap::new(),
        }
    }

    /// Builds a season from a list of episode numbers.
    pub fn with_episodes<I>(number: SeasonNumber, episodes: I) -> Result<Self, DuplicateKeyError>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut season = Self::new(number);
        for episode in episodes {
            season.add_episode(episode)?;
        }
        Ok(season)
    }

    pub(crate) fn add_episode(&mut self, number: u32) -> Result<(), DuplicateKeyError> {
        if self.episodes.contains_key(&number) {
            return Err(DuplicateKeyError::Episode {
                season: self.number,
                episode: number,
            });
        }
        self.episodes.insert(number, Episode::new(self.number, number));
        Ok(())
    }

    pub fn number(&self) -> SeasonNumber {
        self.number
    }

    pub fn is_special_season(&self) -> bool {
        self.number.is_special()
    }

    /// The highest-numbered episode
    pub fn last_episode(&self) -> Option<&Episode> {
        self.episodes.values().next_back()
    }

    pub fn get(&self, number: u32) -> Option<&Episode> {
        self.episodes.get(&number)
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Episodes, highest number first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Episode> + '_ {
        self.episodes.values().rev()
    }

    /// Episodes, lowest number first.
    pub fn iter_ascending(&self) -> impl DoubleEndedIterator<Item = &Episode> + '_ {
        self.episodes.values()
    }
}

/// Identity of a show and a snapshot of its seasons.
#[derive(Debug, Clone, PartialEq)]
pub struct Show {
    /// English title
    pub original_name: String,
    /// Russian title, if the page has one
    pub localized_name: Option<String>,
    /// The slug between `/series/` and the next slash
    pub url_name: String,
    /// Catalog id used in download lookups
    pub cat: u32,
    /// Site domain the snapshot was fetched from
    pub domain: String,
    seasons: BTreeMap<SeasonNumber, Season>,
}

impl Show {
    pub fn new(
        original_name: impl Into<String>,
        localized_name: Option<String>,
        url_name: impl Into<String>,
        cat: u32,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            localized_name,
            url_name: url_name.into(),
            cat,
            domain: domain.into(),
            seasons: BTreeMap::new(),
        }
    }

    /// Adds all given seasons, failing on the first duplicate.
    pub fn with_seasons<I>(mut self, seasons: I) -> Result<Self, DuplicateKeyError>
    where
        I: IntoIterator<Item = Season>,
    {
        for season in seasons {
            self.add_season(season)?;
        }
        Ok(self)
    }

    pub(crate) fn add_season(&mut self, season: Season) -> Result<(), DuplicateKeyError> {
        if self.seasons.contains_key(&season.number) {
            return Err(DuplicateKeyError::Season(season.number));
        }
        self.seasons.insert(season.number, season);
        Ok(())
    }

    /// The highest non-special season.
    pub fn last_season(&self) -> Option<&Season> {
        self.iter().find(|season| !season.is_special_season())
    }

    pub fn get(&self, number: SeasonNumber) -> Option<&Season> {
        self.seasons.get(&number)
    }

    pub fn len(&self) -> usize {
        self.seasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }

    /// Seasons in display order: special seasons first, then numeric seasons
    /// from highest to lowest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Season> + '_ {
        self.seasons.values().rev()
    }

    /// Seasons from lowest to highest, special seasons last.
    pub fn iter_ascending(&self) -> impl DoubleEndedIterator<Item = &Season> + '_ {
        self.seasons.values()
    }

    pub fn seasons_url(&self) -> String {
        format!("https://{}/series/{}/seasons", self.domain, self.url_name)
    }

    /// "Localized / Original", or just the original title.
    pub fn display_name(&self) -> String {
        match self.localized_name.as_deref() {
            Some(localized) if !localized.is_empty() => {
                format!("{} / {}", localized, self.original_name)
            }
            _ => self.original_name.clone(),
        }
    }

    pub fn thumbnail_url(&self) -> String {
        thumbnail_url(self.cat)
    }
}

pub fn thumbnail_url(cat: u32) -> String {
    format!("https://static.lostfilm.top/Images/{}/Posters/icon.jpg", cat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show() -> Show {
        Show::new("Lost", Some("Остаться в живых".to_string()), "Lost", 42, "www.lostfilm.tv")
    }

    #[test]
    fn test_season_orders_episodes_descending() {
        let season = Season::with_episodes(SeasonNumber::Regular(1), [2, 3, 1]).unwrap();

        let numbers: Vec<u32> = season.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);

        let ascending: Vec<u32> = season.iter_ascending().map(|e| e.number).collect();
        assert_eq!(ascending, vec![1, 2, 3]);

        assert_eq!(season.last_episode().map(|e| e.number), Some(3));
        assert_eq!(season.get(2), Some(&Episode::new(SeasonNumber::Regular(1), 2)));
    }

    #[test]
    fn test_duplicate_episode_is_rejected() {
        let result = Season::with_episodes(SeasonNumber::Regular(2), [1, 2, 2]);
        assert_eq!(
            result,
            Err(DuplicateKeyError::Episode {
                season: SeasonNumber::Regular(2),
                episode: 2
            })
        );
    }

    #[test]
    fn test_duplicate_season_is_rejected() {
        let result = show().with_seasons([
            Season::new(SeasonNumber::Regular(1)),
            Season::new(SeasonNumber::Regular(1)),
        ]);
        assert_eq!(
            result.unwrap_err(),
            DuplicateKeyError::Season(SeasonNumber::Regular(1))
        );
    }

    #[test]
    fn test_special_seasons_sort_first_but_are_never_last_season() {
        let show = show()
            .with_seasons([
                Season::with_episodes(SeasonNumber::Regular(1), [1]).unwrap(),
                Season::with_episodes(SeasonNumber::Special(SpecialSeason::Additional), [1])
                    .unwrap(),
                Season::with_episodes(SeasonNumber::Regular(3), [1]).unwrap(),
                Season::with_episodes(SeasonNumber::Special(SpecialSeason::Unknown), [1])
                    .unwrap(),
            ])
            .unwrap();

        let order: Vec<SeasonNumber> = show.iter().map(Season::number).collect();
        assert_eq!(
            order,
            vec![
                SeasonNumber::Special(SpecialSeason::Unknown),
                SeasonNumber::Special(SpecialSeason::Additional),
                SeasonNumber::Regular(3),
                SeasonNumber::Regular(1),
            ]
        );
        assert_eq!(
            show.last_season().map(Season::number),
            Some(SeasonNumber::Regular(3))
        );
    }

    #[test]
    fn test_only_special_seasons_have_no_last_season() {
        let show = show()
            .with_seasons([Season::with_episodes(
                SeasonNumber::Special(SpecialSeason::Additional),
                [1, 2],
            )
            .unwrap()])
            .unwrap();
        assert!(show.last_season().is_none());
    }

    #[test]
    fn test_paired_season_orders_between_regular_seasons() {
        assert!(SeasonNumber::Regular(5) < SeasonNumber::Paired(5, 10));
        assert!(SeasonNumber::Paired(5, 10) < SeasonNumber::Regular(6));
        assert_eq!(SeasonNumber::Paired(5, 10).chrono_key(), Some((5, 10)));
        assert_eq!(SeasonNumber::Regular(5).chrono_key(), Some((5, 0)));
        assert_eq!(
            SeasonNumber::Special(SpecialSeason::Unknown).chrono_key(),
            None
        );
    }

    #[test]
    fn test_display_name_and_urls() {
        let show = show();
        assert_eq!(show.display_name(), "Остаться в живых / Lost");
        assert_eq!(show.seasons_url(), "https://www.lostfilm.tv/series/Lost/seasons");
        assert_eq!(
            show.thumbnail_url(),
            "https://static.lostfilm.top/Images/42/Posters/icon.jpg"
        );

        let untranslated = Show::new("Lost", Some(String::new()), "Lost", 42, "www.lostfilm.tv");
        assert_eq!(untranslated.display_name(), "Lost");
    }
}
