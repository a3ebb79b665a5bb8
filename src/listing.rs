//! Listing parser adapter
//!
//! Maps the structured fields of a show's seasons page into a [`Show`].
//! Walking the markup is the site client's job; this module owns the
//! interpretation of what it found: season captions, special seasons,
//! episode action strings and series URLs.

use crate::show::{DuplicateKeyError, Season, SeasonNumber, Show, SpecialSeason};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use url::Url;

/// Domain stored URLs are normalized to.
pub const DEFAULT_DOMAIN: &str = "www.lostfilm.tv";

/// Caption the site uses for bonus content.
const ADDITIONAL_MATERIALS: &str = "Дополнительные материалы";

static SEASON_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<season>[0-9]+)(\.(?P<season_fraction>[0-9]+))?\s+сезон(\s+(([0-9]+)-)?(?P<episode>[0-9]+)\s+серия)?$",
    )
    .expect("season title pattern is valid")
});

static FOLLOW_SHOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^FollowSerial\((?P<cat>[0-9]+)(\s*,\s*(true|false))?\)$")
        .expect("follow show pattern is valid")
});

static PLAY_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^PlayEpisode\('(?P<cat>[0-9]{1,3})\s*(?P<season>[0-9]{3})\s*(?P<episode>[0-9]{3})'\)$",
    )
    .expect("play episode pattern is valid")
});

static SERIES_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/]*lostfilm.+/series/(?P<name>[^/]+)(.*)$")
        .expect("series url pattern is valid")
});

/// Errors raised while mapping a listing page to a show.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The follow button did not carry a catalog id
    #[error("Unexpected follow action: {0:?}")]
    FollowAction(String),

    /// An episode row did not carry a play action
    #[error("Unexpected episode action {action:?} in season {season_title:?}")]
    EpisodeAction {
        season_title: String,
        action: String,
    },

    /// Seasons or episodes repeat, the page was mapped incorrectly
    #[error(transparent)]
    DuplicateKey(#[from] DuplicateKeyError),
}

/// Field values extracted from a show's seasons page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// English title
    pub original_name: String,
    /// Russian title
    pub localized_name: Option<String>,
    /// `onclick` of the follow button, e.g. `FollowSerial(245)`
    pub follow_action: String,
    /// Season blocks in page order
    pub season_blocks: Vec<SeasonBlock>,
}

/// One season block of a listing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonBlock {
    /// Block caption, e.g. "3 сезон"
    pub title: String,
    /// `onclick` of each episode row, e.g. `PlayEpisode('245003012')`
    pub episode_actions: Vec<String>,
}

/// Fields encoded in an episode's play action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeAction {
    pub cat: u32,
    pub season: u32,
    pub episode: u32,
}

/// Builds a show from a listing page.
///
/// With `parse_series` unset only the show identity is filled in, which is
/// all the add-show flow needs. Season blocks without episodes are announced
/// but unreleased seasons and are left out.
pub fn parse_listing(
    page: &ListingPage,
    url_name: &str,
    domain: &str,
    parse_series: bool,
) -> Result<Show, ListingError> {
    let cat = parse_follow_action(&page.follow_action)?;

    let mut show = Show::new(
        page.original_name.trim(),
        page.localized_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        url_name,
        cat,
        domain,
    );

    if !parse_series {
        return Ok(show);
    }

    for block in &page.season_blocks {
        if block.episode_actions.is_empty() {
            log::debug!("Skipping unreleased season {:?}", block.title);
            continue;
        }

        let number = parse_season_title(&block.title);
        let mut season = Season::new(number);
        for action in &block.episode_actions {
            let play = parse_episode_action(action).ok_or_else(|| ListingError::EpisodeAction {
                season_title: block.title.clone(),
                action: action.clone(),
            })?;
            season.add_episode(play.episode)?;
        }
        show.add_season(season)?;
    }

    Ok(show)
}

/// Classifies a season caption.
pub fn parse_season_title(title: &str) -> SeasonNumber {
    let title = title.trim();
    if title == ADDITIONAL_MATERIALS {
        return SeasonNumber::Special(SpecialSeason::Additional);
    }

    let Some(captures) = SEASON_TITLE.captures(title) else {
        return SeasonNumber::Special(SpecialSeason::Unknown);
    };
    let Some(season) = captures
        .name("season")
        .and_then(|m| m.as_str().parse::<u32>().ok())
    else {
        return SeasonNumber::Special(SpecialSeason::Unknown);
    };

    match captures
        .name("episode")
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        Some(episode) => SeasonNumber::Paired(season, episode),
        None => SeasonNumber::Regular(season),
    }
}

/// Parses `PlayEpisode('<cat><season:3><episode:3>')`.
pub fn parse_episode_action(action: &str) -> Option<EpisodeAction> {
    let captures = PLAY_EPISODE.captures(action.trim())?;
    let field = |name: &str| captures.name(name)?.as_str().parse::<u32>().ok();
    Some(EpisodeAction {
        cat: field("cat")?,
        season: field("season")?,
        episode: field("episode")?,
    })
}

fn parse_follow_action(action: &str) -> Result<u32, ListingError> {
    FOLLOW_SHOW
        .captures(action.trim())
        .and_then(|captures| captures.name("cat")?.as_str().parse::<u32>().ok())
        .ok_or_else(|| ListingError::FollowAction(action.to_string()))
}

/// Extracts the series slug from a show URL and builds its seasons URL on
/// `domain`.
///
/// Returns `None` for URLs that do not point at a series.
pub fn seasons_url_info(url: &str, domain: &str) -> Option<(String, String)> {
    let captures = SERIES_URL.captures(url)?;
    let name = captures.name("name")?.as_str().to_string();
    let seasons_url = format!("https://{}/series/{}/seasons", domain, name);
    Some((name, seasons_url))
}

pub fn can_parse_url(url: &str, domain: &str) -> bool {
    seasons_url_info(&replace_domain(url, domain), domain).is_some()
}

/// Points a URL at the given mirror.
///
/// Unparseable URLs are returned unchanged.
pub fn replace_domain(url: &str, domain: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.set_host(Some(domain)).is_err() {
                return url.to_string();
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Points a URL back at the default domain, for storage.
pub fn restore_domain(url: &str) -> String {
    replace_domain(url, DEFAULT_DOMAIN)
}
