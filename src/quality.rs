//! Video quality tiers offered by the catalog.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Quality tier of a download.
///
/// Serialized as its canonical label, so configuration files and the show
/// store can use the same strings the site prints ("SD", "720p", "1080p").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Quality {
    Unknown,
    #[default]
    SD,
    HD,
    FullHD,
}

impl Quality {
    /// Maps a free-text quality label to a quality tier.
    ///
    /// Matching is case-insensitive. A missing or empty label means SD.
    ///
    /// # Examples
    ///
    /// ```
    /// use lostfilm_monitor::Quality;
    ///
    /// assert_eq!(Quality::parse(Some("720p")), Quality::HD);
    /// assert_eq!(Quality::parse(None), Quality::SD);
    /// assert_eq!(Quality::parse(Some("2160p")), Quality::Unknown);
    /// ```
    pub fn parse(label: Option<&str>) -> Self {
        let label = label.map(str::to_lowercase).unwrap_or_default();
        match label.as_str() {
            "" | "sd" => Quality::SD,
            "mp4" | "hd" | "720p" | "720" => Quality::HD,
            "1080p" | "1080" => Quality::FullHD,
            _ => Quality::Unknown,
        }
    }

    /// Canonical label, accepted back by [`Quality::parse`].
    pub fn label(self) -> &'static str {
        match self {
            Quality::Unknown => "Unknown",
            Quality::SD => "SD",
            Quality::HD => "720p",
            Quality::FullHD => "1080p",
        }
    }
}

impl FromStr for Quality {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Quality::parse(Some(s)))
    }
}

impl From<String> for Quality {
    fn from(label: String) -> Self {
        Quality::parse(Some(&label))
    }
}

impl From<Quality> for String {
    fn from(quality: Quality) -> Self {
        quality.label().to_string()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
