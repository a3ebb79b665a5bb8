//! Persistent show and session storage
//!
//! Tracked shows and the site session are kept as JSON files in the system's
//! standard data directory. Each file is rewritten as a whole through an
//! atomic rename, so a crash leaves either the old or the new state behind.

use crate::config::project_dirs;
use crate::session::{SessionState, SessionStore};
use crate::show::SeasonNumber;
use crate::temp::write_atomically;
use crate::updates::TrackedShowProgress;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SHOWS_FILE: &str = "shows.json";
const SESSION_FILE: &str = "session.json";

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to determine data directory location
    #[error("Failed to determine data directory location")]
    DataDirectoryNotFound,

    /// Failed to create the data directory
    #[error("Failed to create data directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a store file
    #[error("Failed to read store file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a store file
    #[error("Failed to write store file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize a store file
    #[error("Failed to deserialize store file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize data for storing
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// No tracked show has the given id
    #[error("No tracked show with id {0}")]
    UnknownShow(u64),
}

/// Result of the last check of a tracked show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Ok,
    /// The show page is gone or hidden behind a login
    NotFound,
    /// The last check failed
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::NotFound => write!(f, "not found"),
            Status::Error => write!(f, "error"),
        }
    }
}

/// A show the user follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedShow {
    pub id: u64,
    pub display_name: String,
    /// Seasons page URL on the default domain
    pub url: String,
    #[serde(default)]
    pub status: Status,
    /// When the last episode was handled
    pub last_update: Option<DateTime<Utc>>,
    pub progress: TrackedShowProgress,
}

/// A show about to be tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct NewShow {
    pub display_name: String,
    pub url: String,
    pub progress: TrackedShowProgress,
}

/// Persistence for tracked shows and their progress.
///
/// Each call is expected to be atomic on its own.
pub trait ProgressStore {
    fn list_shows(&self) -> Result<Vec<TrackedShow>, StoreError>;

    fn get_progress(&self, id: u64) -> Result<TrackedShowProgress, StoreError>;

    /// Records `(season, episode)` as the last handled episode.
    fn put_progress(
        &self,
        id: u64,
        season: SeasonNumber,
        episode: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn put_status(&self, id: u64, status: Status) -> Result<(), StoreError>;

    fn add_show(&self, show: NewShow) -> Result<TrackedShow, StoreError>;

    /// Returns whether a show was removed.
    fn remove_show(&self, id: u64) -> Result<bool, StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ShowsFile {
    next_id: u64,
    shows: Vec<TrackedShow>,
}

/// JSON file store for shows and the session.
pub struct JsonStore {
    /// The directory where store files are kept
    data_dir: PathBuf,
}

impl JsonStore {
    /// Opens the store in the system's standard data directory
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let store = JsonStore::open()?;
    /// for show in store.list_shows()? {
    ///     println!("{}", show.display_name);
    /// }
    /// ```
    pub fn open() -> Result<Self, StoreError> {
        let proj_dirs = project_dirs().ok_or(StoreError::DataDirectoryNotFound)?;
        Self::at(proj_dirs.data_dir())
    }

    /// Opens the store in the given directory, creating it if needed
    pub fn at(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            data_dir: dir.to_path_buf(),
        })
    }

    /// Returns the path to the data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let file_path = self.data_dir.join(name);

        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&file_path).map_err(|e| StoreError::ReadFailed {
            path: file_path.clone(),
            source: e,
        })?;

        let data =
            serde_json::from_str(&content).map_err(|e| StoreError::DeserializationFailed {
                path: file_path,
                source: e,
            })?;

        Ok(Some(data))
    }

    fn store<T: Serialize>(&self, name: &str, data: &T) -> Result<(), StoreError> {
        let file_path = self.data_dir.join(name);
        let content = serde_json::to_string_pretty(data)?;

        write_atomically(&file_path, content.as_bytes()).map_err(|e| StoreError::WriteFailed {
            path: file_path,
            source: e,
        })
    }

    fn load_shows(&self) -> Result<ShowsFile, StoreError> {
        Ok(self.load(SHOWS_FILE)?.unwrap_or_default())
    }

    /// Loads the shows file, applies `change` to one show and writes it back.
    fn update_show<F>(&self, id: u64, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut TrackedShow),
    {
        let mut file = self.load_shows()?;
        let show = file
            .shows
            .iter_mut()
            .find(|show| show.id == id)
            .ok_or(StoreError::UnknownShow(id))?;
        change(show);
        self.store(SHOWS_FILE, &file)
    }
}

impl ProgressStore for JsonStore {
    fn list_shows(&self) -> Result<Vec<TrackedShow>, StoreError> {
        Ok(self.load_shows()?.shows)
    }

    fn get_progress(&self, id: u64) -> Result<TrackedShowProgress, StoreError> {
        self.load_shows()?
            .shows
            .into_iter()
            .find(|show| show.id == id)
            .map(|show| show.progress)
            .ok_or(StoreError::UnknownShow(id))
    }

    fn put_progress(
        &self,
        id: u64,
        season: SeasonNumber,
        episode: u32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update_show(id, |show| {
            show.progress.season = Some(season);
            show.progress.episode = Some(episode);
            show.last_update = Some(at);
        })
    }

    fn put_status(&self, id: u64, status: Status) -> Result<(), StoreError> {
        self.update_show(id, |show| show.status = status)
    }

    fn add_show(&self, show: NewShow) -> Result<TrackedShow, StoreError> {
        let mut file = self.load_shows()?;
        file.next_id += 1;
        let tracked = TrackedShow {
            id: file.next_id,
            display_name: show.display_name,
            url: show.url,
            status: Status::Ok,
            last_update: None,
            progress: show.progress,
        };
        file.shows.push(tracked.clone());
        self.store(SHOWS_FILE, &file)?;
        Ok(tracked)
    }

    fn remove_show(&self, id: u64) -> Result<bool, StoreError> {
        let mut file = self.load_shows()?;
        let before = file.shows.len();
        file.shows.retain(|show| show.id != id);
        if file.shows.len() == before {
            return Ok(false);
        }
        self.store(SHOWS_FILE, &file)?;
        Ok(true)
    }
}

impl SessionStore for JsonStore {
    fn load_session(&self) -> Result<Option<SessionState>, StoreError> {
        self.load(SESSION_FILE)
    }

    fn store_session(&self, session: &SessionState) -> Result<(), StoreError> {
        self.store(SESSION_FILE, session)
    }
}
