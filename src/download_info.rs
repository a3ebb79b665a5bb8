//! Download-info resolver
//!
//! Looks up the downloads the catalog offers for one episode and picks the
//! one in the requested quality.

use crate::quality::Quality;
use crate::session::SessionState;
use crate::show::{Episode, Show};
use crate::site::{FetchError, SiteClient};

/// A download offered for an episode, as printed on the download page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadCandidate {
    /// Free-text quality label, e.g. "1080p"
    pub label: String,
    pub url: String,
}

/// Field values extracted from a download page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPage {
    pub candidates: Vec<DownloadCandidate>,
    /// Absolute link to follow when the page lists no candidates
    pub follow_link: Option<String>,
}

/// A resolved download in a known quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReference {
    pub quality: Quality,
    pub download_url: String,
}

impl From<&DownloadCandidate> for DownloadReference {
    fn from(candidate: &DownloadCandidate) -> Self {
        Self {
            quality: Quality::parse(Some(&candidate.label)),
            download_url: candidate.url.clone(),
        }
    }
}

/// What a download lookup needs to know about a show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowIdentity {
    pub cat: u32,
    pub domain: String,
}

impl From<&Show> for ShowIdentity {
    fn from(show: &Show) -> Self {
        Self {
            cat: show.cat,
            domain: show.domain.clone(),
        }
    }
}

/// Builds the lookup URL for an episode.
///
/// Special-season episodes have no lookup URL.
pub fn download_lookup_url(identity: &ShowIdentity, episode: &Episode) -> Option<String> {
    let season = episode.season.major()?;
    Some(format!(
        "https://{}/v_search.php?a={}{:03}{:03}",
        identity.domain, identity.cat, season, episode.number
    ))
}

/// Resolves the download for `episode` in `desired` quality.
///
/// A download page that lists nothing may point to a second page; that link
/// is followed exactly once. Returns `Ok(None)` when no candidate has the
/// desired quality, which the caller treats as a missing quality rather than
/// a transport failure.
pub fn resolve_download<C>(
    client: &C,
    session: &SessionState,
    identity: &ShowIdentity,
    episode: &Episode,
    desired: Quality,
) -> Result<Option<DownloadReference>, FetchError>
where
    C: SiteClient + ?Sized,
{
    let Some(url) = download_lookup_url(identity, episode) else {
        return Ok(None);
    };

    let mut page = client.fetch_download_page(session, &url)?;
    if page.candidates.is_empty() {
        if let Some(next) = page.follow_link.take() {
            log::debug!("No downloads listed at {}, following {}", url, next);
            page = client.fetch_download_page(session, &next)?;
        }
    }

    Ok(select_quality(&page.candidates, desired))
}

/// Picks the first candidate whose label resolves to `desired`.
pub fn select_quality(
    candidates: &[DownloadCandidate],
    desired: Quality,
) -> Option<DownloadReference> {
    candidates
        .iter()
        .map(DownloadReference::from)
        .find(|reference| reference.quality == desired)
}
