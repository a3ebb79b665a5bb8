//! Artifact sinks
//!
//! A sink receives every artifact the run downloads. The directory sink
//! writes them as files named after the show and episode.

use crate::show::Episode;
use crate::site::Artifact;
use crate::temp::write_atomically;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default file name template for downloaded artifacts.
pub const DEFAULT_FILENAME_FORMAT: &str = "{show} - S{season:02}E{episode:02}.torrent";

const FILE_PLACEHOLDER: &str = "{file}";

/// Errors that can occur while handing an artifact to a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error writing {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Downloaded artifact is empty")]
    EmptyArtifact,
}

/// Receiver of downloaded artifacts.
pub trait ArtifactSink {
    /// Takes ownership of the artifact's content.
    ///
    /// Returns a description of where it went, for reporting.
    fn accept(
        &self,
        show_name: &str,
        episode: &Episode,
        artifact: &Artifact,
    ) -> Result<String, SinkError>;
}

/// Writes artifacts into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    output_dir: PathBuf,
    format: String,
}

impl DirectorySink {
    pub fn new(output_dir: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: format.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Destination path for an episode's artifact.
    ///
    /// `served_name` is the file name the site sent along with the artifact.
    /// It fills the `{file}` placeholder. Without one, `{file}` falls back to
    /// the default template.
    pub fn destination(
        &self,
        show_name: &str,
        episode: &Episode,
        served_name: Option<&str>,
    ) -> PathBuf {
        let season = episode.season.major().unwrap_or(0) as usize;
        let number = episode.number as usize;

        let format = if self.format.contains(FILE_PLACEHOLDER) {
            let file = served_name
                .map(sanitize_filename)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| {
                    format_filename(DEFAULT_FILENAME_FORMAT, show_name, season, number)
                });
            self.format.replace(FILE_PLACEHOLDER, &file)
        } else {
            self.format.clone()
        };

        self.output_dir.join(format_filename(&format, show_name, season, number))
    }
}

impl ArtifactSink for DirectorySink {
    fn accept(
        &self,
        show_name: &str,
        episode: &Episode,
        artifact: &Artifact,
    ) -> Result<String, SinkError> {
        if artifact.content.is_empty() {
            return Err(SinkError::EmptyArtifact);
        }

        let destination = self.destination(show_name, episode, artifact.file_name.as_deref());
        let parent = destination.parent().unwrap_or(self.output_dir.as_path());
        fs::create_dir_all(parent).map_err(|e| SinkError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
        write_atomically(&destination, &artifact.content).map_err(|e| SinkError::Io {
            path: destination.clone(),
            source: e,
        })?;

        log::info!("Saved {}", destination.display());
        Ok(destination.display().to_string())
    }
}

/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across platforms:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Control characters
/// - Trim leading/trailing whitespace and dots
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    sanitized
        .trim_matches(|c: char| c.is_whitespace() || c == '.')
        .to_string()
}

/// Formats a filename based on a format string and episode information
///
/// Supported placeholders:
/// - `{show}` - Show display name (sanitized)
/// - `{season}` or `{season:NN}` - Season number with optional zero-padding
/// - `{episode}` or `{episode:NN}` - Episode number with optional zero-padding
///
/// [`DirectorySink`] additionally understands `{file}`, the file name the
/// site served the artifact under.
///
/// # Examples
///
/// ```
/// use lostfilm_monitor::format_filename;
///
/// let result = format_filename("{show} - S{season:02}E{episode:02}.torrent", "Lost", 1, 2);
/// assert_eq!(result, "Lost - S01E02.torrent");
/// ```
pub fn format_filename(format: &str, show_name: &str, season: usize, episode: usize) -> String {
    let mut result = format.replace("{show}", &sanitize_filename(show_name));
    result = replace_with_padding(&result, "season", season);
    replace_with_padding(&result, "episode", episode)
}

/// Helper function to replace placeholders with optional zero-padding
///
/// Handles both `{name}` and `{name:NN}` where NN is the padding width
fn replace_with_padding(text: &str, name: &str, value: usize) -> String {
    let mut result = text.to_string();

    let pattern_start = format!("{{{name}:");
    let mut search_from = 0;
    while let Some(offset) = result[search_from..].find(&pattern_start) {
        let start = search_from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let full_pattern = result[start..start + end + 1].to_string();
        let padding_str = &full_pattern[pattern_start.len()..full_pattern.len() - 1];

        match padding_str.parse::<usize>() {
            Ok(width) => {
                let formatted = format!("{:0width$}", value, width = width);
                result = result.replacen(&full_pattern, &formatted, 1);
                search_from = start + formatted.len();
            }
            // Leave malformed placeholders alone
            Err(_) => search_from = start + full_pattern.len(),
        }
    }

    result.replace(&format!("{{{name}}}"), &value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::show::SeasonNumber;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Normal Title"), "Normal Title");
        assert_eq!(sanitize_filename("Title: With Colon"), "Title- With Colon");
        assert_eq!(sanitize_filename("Остаться в живых / Lost"), "Остаться в живых - Lost");
        assert_eq!(sanitize_filename("  Spaces  "), "Spaces");
        assert_eq!(sanitize_filename("...dots..."), "dots");
    }

    #[test]
    fn test_format_filename() {
        assert_eq!(
            format_filename(DEFAULT_FILENAME_FORMAT, "Lost", 1, 2),
            "Lost - S01E02.torrent"
        );
        assert_eq!(
            format_filename("{show} S{season}E{episode}.torrent", "Fringe", 3, 19),
            "Fringe S3E19.torrent"
        );
        assert_eq!(
            format_filename("{show} {season:x}.torrent", "Fringe", 3, 19),
            "Fringe {season:x}.torrent"
        );
    }

    #[test]
    fn test_replace_with_padding() {
        assert_eq!(
            replace_with_padding("S{season:02}E{episode:02}", "season", 1),
            "S01E{episode:02}"
        );
        assert_eq!(replace_with_padding("S01E{episode:03}", "episode", 2), "S01E002");
        assert_eq!(replace_with_padding("Season {season}", "season", 5), "Season 5");
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("torrents"), DEFAULT_FILENAME_FORMAT);
        let episode = Episode::new(SeasonNumber::Regular(4), 7);
        let artifact = Artifact {
            file_name: Some("Lost.S04E07.torrent".to_string()),
            content: b"d8:announce0:e".to_vec(),
        };

        sink.accept("Lost", &episode, &artifact).unwrap();

        let written = fs::read(dir.path().join("torrents").join("Lost - S04E07.torrent")).unwrap();
        assert_eq!(written, artifact.content);
    }

    #[test]
    fn test_directory_sink_rejects_empty_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path(), DEFAULT_FILENAME_FORMAT);
        let artifact = Artifact {
            file_name: None,
            content: Vec::new(),
        };
        let result = sink.accept("Lost", &Episode::new(SeasonNumber::Regular(1), 1), &artifact);
        assert!(matches!(result, Err(SinkError::EmptyArtifact)));
    }

    #[test]
    fn test_file_placeholder_uses_served_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path(), "{show}/{file}");
        let episode = Episode::new(SeasonNumber::Regular(4), 7);
        let artifact = Artifact {
            file_name: Some("Lost.S04E07.1080p.rus.LostFilm.TV.torrent".to_string()),
            content: b"d8:announce0:e".to_vec(),
        };

        let destination = sink.accept("Lost", &episode, &artifact).unwrap();

        let expected = dir
            .path()
            .join("Lost")
            .join("Lost.S04E07.1080p.rus.LostFilm.TV.torrent");
        assert_eq!(destination, expected.display().to_string());
        assert_eq!(fs::read(expected).unwrap(), artifact.content);
    }

    #[test]
    fn test_file_placeholder_without_served_name() {
        let sink = DirectorySink::new("/downloads", "{file}");
        let episode = Episode::new(SeasonNumber::Regular(1), 2);

        assert_eq!(
            sink.destination("Lost", &episode, None),
            PathBuf::from("/downloads/Lost - S01E02.torrent")
        );
        // A served name that sanitizes to nothing is no better than none
        assert_eq!(
            sink.destination("Lost", &episode, Some("..")),
            PathBuf::from("/downloads/Lost - S01E02.torrent")
        );
        // Templates without `{file}` ignore the served name
        let plain = DirectorySink::new("/downloads", DEFAULT_FILENAME_FORMAT);
        assert_eq!(
            plain.destination("Lost", &episode, Some("other.torrent")),
            PathBuf::from("/downloads/Lost - S01E02.torrent")
        );
    }
}
