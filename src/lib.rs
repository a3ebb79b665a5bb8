//! lostfilm-monitor - Follow shows on lostfilm.tv and fetch new episodes
//!
//! This library provides the core functionality for tracking shows: mapping
//! the catalog's seasons pages to a show model, deciding which episodes are
//! new, resolving their downloads in the desired quality, and driving one
//! check run over every tracked show.

mod config;
mod download_info;
mod listing;
mod quality;
mod session;
mod show;
mod sink;
mod site;
mod store;
mod temp;
mod updates;

use chrono::Utc;
use std::fmt;
use thiserror::Error;

// Re-export error types
pub use config::ConfigError;
pub use listing::ListingError;
pub use session::LoginError;
pub use show::DuplicateKeyError;
pub use sink::SinkError;
pub use site::FetchError;
pub use store::StoreError;

// Re-export the model and the resolvers
pub use download_info::{
    DownloadCandidate, DownloadPage, DownloadReference, ShowIdentity, download_lookup_url,
    resolve_download, select_quality,
};
pub use listing::{
    DEFAULT_DOMAIN, EpisodeAction, ListingPage, SeasonBlock, can_parse_url, parse_episode_action,
    parse_listing, parse_season_title, replace_domain, restore_domain, seasons_url_info,
};
pub use quality::Quality;
pub use show::{Episode, Season, SeasonNumber, Show, SpecialSeason, thumbnail_url};
pub use updates::{TrackedShowProgress, resolve_new_episodes};

// Re-export collaborators
pub use config::{AccountConfig, AppConfig};
pub use session::{
    Credentials, SESSION_COOKIE, SessionOrigin, SessionState, SessionStore, establish_session,
    login,
};
pub use sink::{
    ArtifactSink, DEFAULT_FILENAME_FORMAT, DirectorySink, format_filename, sanitize_filename,
};
pub use site::{Artifact, ListingFetch, LostFilmClient, SiteClient};
pub use store::{JsonStore, NewShow, ProgressStore, Status, TrackedShow};

/// Progress event emitted during a check run
///
/// These events allow library users to report what a run did, for example on
/// the console or in a notification.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A usable session was obtained
    SessionReady { origin: SessionOrigin },

    /// Run started
    RunStarted { show_count: usize },

    /// Checking a specific show
    ShowStarted {
        index: usize,
        total: usize,
        display_name: String,
    },

    /// The stored status of a show changed
    StatusChanged {
        display_name: String,
        old: Status,
        new: Status,
    },

    /// Something worth mentioning that is not a failure
    Info { display_name: String, message: String },

    /// A show or one of its episodes could not be handled
    Failed { display_name: String, message: String },

    /// An episode was downloaded and handed to the sink
    Downloaded {
        display_name: String,
        episode: Episode,
        destination: String,
        size: usize,
    },

    /// Run complete
    RunFinished { summary: RunSummary },
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub checked: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// Why a single show could not be handled.
///
/// These never abort a run: each one becomes the show's status and a
/// [`RunEvent::Failed`] message.
#[derive(Debug, Error)]
pub enum ShowRunError {
    /// The page did not map to a show
    #[error("Failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    /// The site redirected to its front page
    #[error("Show page {0} not found")]
    NotFound(String),

    #[error("Failed to get quality \"{quality}\" for {episode}")]
    QualityUnavailable { quality: Quality, episode: EpisodeLabel },

    /// A request failed or the site answered with an error status
    #[error(transparent)]
    Transport(#[from] FetchError),

    /// The parsed page repeated a season or episode
    #[error(transparent)]
    DuplicateKey(DuplicateKeyError),

    /// The downloaded artifact could not be stored
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ShowRunError {
    /// Status a show is left in after this error.
    pub fn status(&self) -> Status {
        match self {
            ShowRunError::NotFound(_) => Status::NotFound,
            _ => Status::Error,
        }
    }

    fn from_listing(url: &str, error: ListingError) -> Self {
        match error {
            ListingError::DuplicateKey(e) => ShowRunError::DuplicateKey(e),
            other => ShowRunError::Parse {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// `S03E07` style label for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeLabel(pub Episode);

impl fmt::Display for EpisodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Episode { season, number } = self.0;
        match season.major() {
            Some(major) => write!(f, "S{:02}E{:02}", major, number),
            None => write!(f, "{} season, episode {}", season, number),
        }
    }
}

/// Top-level error type for lostfilm-monitor operations
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Error while mapping a listing page
    #[error("Listing error: {0}")]
    Listing(#[from] ListingError),

    /// Error while talking to the site
    #[error("Site error: {0}")]
    Fetch(#[from] FetchError),

    /// No usable session could be established
    #[error("Login error: {0}")]
    Login(#[from] LoginError),

    /// Error in the persistent store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error while writing an artifact
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Error while loading the configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be created
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The URL does not point at a show on the site
    #[error("Not a lostfilm show URL: {0}")]
    UnsupportedUrl(String),

    /// The site has no show at the URL
    #[error("Show not found at {0}")]
    ShowNotFound(String),
}

/// Drives check runs over the tracked shows.
///
/// All collaborators are borrowed; the monitor holds no state between runs.
pub struct Monitor<'a, C, P, K>
where
    C: SiteClient + ?Sized,
    P: ProgressStore + ?Sized,
    K: ArtifactSink + ?Sized,
{
    client: &'a C,
    store: &'a P,
    sink: &'a K,
}

impl<'a, C, P, K> Monitor<'a, C, P, K>
where
    C: SiteClient + ?Sized,
    P: ProgressStore + ?Sized,
    K: ArtifactSink + ?Sized,
{
    pub fn new(client: &'a C, store: &'a P, sink: &'a K) -> Self {
        Self {
            client,
            store,
            sink,
        }
    }

    /// Establishes a session and checks every tracked show.
    ///
    /// If no valid session can be obtained the run stops before any show is
    /// touched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lostfilm_monitor::{AppConfig, DirectorySink, JsonStore, LostFilmClient, Monitor, RunEvent};
    ///
    /// let config = AppConfig::default();
    /// let client = LostFilmClient::new().unwrap();
    /// let store = JsonStore::open().unwrap();
    /// let sink = DirectorySink::new(&config.output_dir, config.filename_format.clone());
    ///
    /// let monitor = Monitor::new(&client, &store, &sink);
    /// let summary = monitor
    ///     .execute_with_login(
    ///         &store,
    ///         &config.session_settings(),
    ///         config.credentials().as_ref(),
    ///         |event| {
    ///             if let RunEvent::Downloaded { display_name, episode, .. } = event {
    ///                 println!("{}: {:?}", display_name, episode);
    ///             }
    ///         },
    ///     )
    ///     .unwrap();
    /// println!("{} downloaded", summary.downloaded);
    /// ```
    pub fn execute_with_login<S, F>(
        &self,
        sessions: &S,
        settings: &SessionState,
        credentials: Option<&Credentials>,
        mut on_event: F,
    ) -> Result<RunSummary, MonitorError>
    where
        S: SessionStore + ?Sized,
        F: FnMut(RunEvent),
    {
        let (session, origin) = establish_session(self.client, sessions, settings, credentials)?;
        on_event(RunEvent::SessionReady { origin });
        self.execute(&session, on_event)
    }

    /// Checks every tracked show with an established session.
    ///
    /// Per-show failures are recorded as status and reported through
    /// `on_event`. Only store failures end the run early.
    pub fn execute<F>(
        &self,
        session: &SessionState,
        mut on_event: F,
    ) -> Result<RunSummary, MonitorError>
    where
        F: FnMut(RunEvent),
    {
        let shows = self.store.list_shows()?;
        on_event(RunEvent::RunStarted {
            show_count: shows.len(),
        });

        let mut summary = RunSummary::default();
        for (index, show) in shows.iter().enumerate() {
            on_event(RunEvent::ShowStarted {
                index,
                total: shows.len(),
                display_name: show.display_name.clone(),
            });
            self.process_show(session, show, &mut summary, &mut on_event)?;
            summary.checked += 1;
        }

        log::info!(
            "Checked {} shows, {} episodes downloaded, {} failures",
            summary.checked,
            summary.downloaded,
            summary.failed
        );
        on_event(RunEvent::RunFinished { summary });
        Ok(summary)
    }

    /// Fetches a show's seasons page and computes its new episodes.
    fn check_show(
        &self,
        session: &SessionState,
        show: &TrackedShow,
    ) -> Result<(Show, Vec<Episode>), ShowRunError> {
        let parse_error = |reason: &str| ShowRunError::Parse {
            url: show.url.clone(),
            reason: reason.to_string(),
        };

        let url = replace_domain(&show.url, &session.domain);
        let (url_name, seasons_url) = seasons_url_info(&url, &session.domain)
            .ok_or_else(|| parse_error("not a series URL"))?;

        let page = match self.client.fetch_listing(session, &seasons_url)? {
            ListingFetch::Page(page) => page,
            ListingFetch::NotFound => return Err(ShowRunError::NotFound(seasons_url)),
            ListingFetch::Unexpected { status } => {
                return Err(FetchError::Status {
                    url: seasons_url,
                    status,
                }
                .into());
            }
        };

        let snapshot = parse_listing(&page, &url_name, &session.domain, true)
            .map_err(|e| ShowRunError::from_listing(&seasons_url, e))?;
        let episodes = resolve_new_episodes(&snapshot, &show.progress);
        Ok((snapshot, episodes))
    }

    /// Resolves, downloads and stores a single episode.
    fn download_episode(
        &self,
        session: &SessionState,
        snapshot: &Show,
        show: &TrackedShow,
        episode: &Episode,
    ) -> Result<(String, usize), ShowRunError> {
        let quality = show.progress.quality;
        let reference = resolve_download(
            self.client,
            session,
            &ShowIdentity::from(snapshot),
            episode,
            quality,
        )?
        .ok_or(ShowRunError::QualityUnavailable {
            quality,
            episode: EpisodeLabel(*episode),
        })?;

        let artifact = self.client.fetch_artifact(session, &reference.download_url)?;
        let destination = self.sink.accept(&show.display_name, episode, &artifact)?;
        Ok((destination, artifact.content.len()))
    }

    /// Persists `new` if it differs from `current`.
    fn update_status<F>(
        &self,
        show: &TrackedShow,
        current: &mut Status,
        new: Status,
        on_event: &mut F,
    ) -> Result<(), StoreError>
    where
        F: FnMut(RunEvent),
    {
        if *current == new {
            return Ok(());
        }
        self.store.put_status(show.id, new)?;
        on_event(RunEvent::StatusChanged {
            display_name: show.display_name.clone(),
            old: *current,
            new,
        });
        *current = new;
        Ok(())
    }

    fn report_failure<F>(
        show: &TrackedShow,
        error: &ShowRunError,
        summary: &mut RunSummary,
        on_event: &mut F,
    ) where
        F: FnMut(RunEvent),
    {
        match error {
            ShowRunError::DuplicateKey(e) => {
                log::error!(
                    "Listing of {} repeats a key, this is a parser bug: {}",
                    show.display_name,
                    e
                )
            }
            ShowRunError::NotFound(_) => log::warn!("{}: {}", show.display_name, error),
            _ => log::error!("{}: {}", show.display_name, error),
        }

        // Not found is reported through the status change alone
        if !matches!(error, ShowRunError::NotFound(_)) {
            summary.failed += 1;
            on_event(RunEvent::Failed {
                display_name: show.display_name.clone(),
                message: error.to_string(),
            });
        }
    }

    fn process_show<F>(
        &self,
        session: &SessionState,
        show: &TrackedShow,
        summary: &mut RunSummary,
        on_event: &mut F,
    ) -> Result<(), StoreError>
    where
        F: FnMut(RunEvent),
    {
        let mut status = show.status;

        let (snapshot, episodes) = match self.check_show(session, show) {
            Ok(checked) => checked,
            Err(e) => {
                Self::report_failure(show, &e, summary, on_event);
                return self.update_status(show, &mut status, e.status(), on_event);
            }
        };
        if episodes.is_empty() {
            self.update_status(show, &mut status, Status::Ok, on_event)?;
            log::debug!("No new episodes for {}", show.display_name);
            on_event(RunEvent::Info {
                display_name: show.display_name.clone(),
                message: format!("{} not changed", show.display_name),
            });
            return Ok(());
        }

        log::info!("{} new episodes for {}", episodes.len(), show.display_name);
        for episode in &episodes {
            match self.download_episode(session, &snapshot, show, episode) {
                Ok((destination, size)) => {
                    // Progress never runs ahead of what was actually stored
                    self.store
                        .put_progress(show.id, episode.season, episode.number, Utc::now())?;
                    self.update_status(show, &mut status, Status::Ok, on_event)?;
                    summary.downloaded += 1;
                    on_event(RunEvent::Downloaded {
                        display_name: show.display_name.clone(),
                        episode: *episode,
                        destination,
                        size,
                    });
                }
                Err(e) => {
                    // Later episodes are not attempted so no gap is skipped
                    Self::report_failure(show, &e, summary, on_event);
                    self.update_status(show, &mut status, Status::Error, on_event)?;
                    break;
                }
            }
        }

        Ok(())
    }

    /// Resolves a show URL into a new tracked show.
    ///
    /// Only the show's identity is parsed. The stored URL always points at
    /// the default domain so a later mirror change does not invalidate it.
    pub fn prepare_show(
        &self,
        session: &SessionState,
        url: &str,
        quality: Quality,
    ) -> Result<NewShow, MonitorError> {
        let url = replace_domain(url, &session.domain);
        let (url_name, seasons_url) = seasons_url_info(&url, &session.domain)
            .ok_or_else(|| MonitorError::UnsupportedUrl(url.clone()))?;

        let page = match self.client.fetch_listing(session, &seasons_url)? {
            ListingFetch::Page(page) => page,
            ListingFetch::NotFound => return Err(MonitorError::ShowNotFound(seasons_url)),
            ListingFetch::Unexpected { status } => {
                return Err(FetchError::Status {
                    url: seasons_url,
                    status,
                }
                .into());
            }
        };

        let show = parse_listing(&page, &url_name, &session.domain, false)?;
        Ok(NewShow {
            display_name: show.display_name(),
            url: restore_domain(&show.seasons_url()),
            progress: TrackedShowProgress::new(show.cat, quality),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const DOMAIN: &str = "www.lostfilmtv.site";

    /// Serves canned pages and artifacts.
    #[derive(Default)]
    struct FakeSite {
        listings: HashMap<String, ListingFetch>,
        downloads: HashMap<String, DownloadPage>,
        artifacts: HashMap<String, Vec<u8>>,
        logged_in: bool,
        fetched: RefCell<Vec<String>>,
    }

    impl FakeSite {
        fn with_listing(mut self, slug: &str, cat: u32, seasons: &[(&str, &[u32])]) -> Self {
            let page = ListingPage {
                original_name: slug.to_string(),
                localized_name: None,
                follow_action: format!("FollowSerial({}, false)", cat),
                season_blocks: seasons
                    .iter()
                    .map(|(title, episodes)| SeasonBlock {
                        title: title.to_string(),
                        episode_actions: episodes
                            .iter()
                            .map(|e| format!("PlayEpisode('{}{:03}{:03}')", cat, 1, e))
                            .collect(),
                    })
                    .collect(),
            };
            self.listings.insert(
                format!("https://{}/series/{}/seasons", DOMAIN, slug),
                ListingFetch::Page(page),
            );
            self
        }

        fn with_download(mut self, cat: u32, season: u32, episode: u32, label: &str) -> Self {
            let lookup = format!(
                "https://{}/v_search.php?a={}{:03}{:03}",
                DOMAIN, cat, season, episode
            );
            let artifact = format!(
                "https://tracker.example/{}-{}-{}.torrent",
                cat, season, episode
            );
            self.downloads.insert(
                lookup,
                DownloadPage {
                    candidates: vec![DownloadCandidate {
                        label: label.to_string(),
                        url: artifact.clone(),
                    }],
                    follow_link: None,
                },
            );
            self.artifacts.insert(artifact, b"d8:announce0:e".to_vec());
            self
        }
    }

    impl SiteClient for FakeSite {
        fn fetch_listing(&self, _: &SessionState, url: &str) -> Result<ListingFetch, FetchError> {
            self.fetched.borrow_mut().push(url.to_string());
            self.listings.get(url).cloned().ok_or(FetchError::Request {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        }

        fn fetch_download_page(
            &self,
            _: &SessionState,
            url: &str,
        ) -> Result<DownloadPage, FetchError> {
            Ok(self.downloads.get(url).cloned().unwrap_or_default())
        }

        fn fetch_artifact(&self, _: &SessionState, url: &str) -> Result<Artifact, FetchError> {
            self.artifacts
                .get(url)
                .map(|content| Artifact {
                    file_name: None,
                    content: content.clone(),
                })
                .ok_or(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }

        fn login(
            &self,
            _: &Credentials,
            session: SessionState,
        ) -> Result<SessionState, LoginError> {
            if self.logged_in {
                Ok(SessionState {
                    session_token: Some("token".to_string()),
                    ..session
                })
            } else {
                Err(LoginError::IncorrectLoginPassword)
            }
        }

        fn verify(&self, _: &SessionState) -> Result<bool, FetchError> {
            Ok(false)
        }
    }

    /// Records every artifact it accepts.
    #[derive(Default)]
    struct RecordingSink {
        accepted: RefCell<Vec<Episode>>,
    }

    impl ArtifactSink for RecordingSink {
        fn accept(&self, _: &str, episode: &Episode, _: &Artifact) -> Result<String, SinkError> {
            self.accepted.borrow_mut().push(*episode);
            Ok(format!("{}", EpisodeLabel(*episode)))
        }
    }

    fn session() -> SessionState {
        SessionState {
            session_token: Some("token".to_string()),
            domain: DOMAIN.to_string(),
            ..SessionState::default()
        }
    }

    fn track(store: &JsonStore, slug: &str, cat: u32, progress: Option<(u32, u32)>) -> TrackedShow {
        let tracked = store
            .add_show(NewShow {
                display_name: slug.to_string(),
                url: format!("https://www.lostfilm.tv/series/{}/seasons", slug),
                progress: TrackedShowProgress::new(cat, Quality::HD),
            })
            .unwrap();
        if let Some((season, episode)) = progress {
            store
                .put_progress(tracked.id, SeasonNumber::Regular(season), episode, Utc::now())
                .unwrap();
        }
        tracked
    }

    fn run(
        site: &FakeSite,
        store: &JsonStore,
        sink: &RecordingSink,
    ) -> (RunSummary, Vec<RunEvent>) {
        let mut events = Vec::new();
        let summary = Monitor::new(site, store, sink)
            .execute(&session(), |event| events.push(event))
            .unwrap();
        (summary, events)
    }

    #[test]
    fn test_downloads_new_episodes_and_advances_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        let show = track(&store, "Lost", 245, Some((1, 1)));
        let site = FakeSite::default()
            .with_listing("Lost", 245, &[("1 сезон", &[3, 2, 1])])
            .with_download(245, 1, 2, "720p")
            .with_download(245, 1, 3, "720p");
        let sink = RecordingSink::default();

        let (summary, _) = run(&site, &store, &sink);

        assert_eq!(summary.downloaded, 2);
        assert_eq!(
            *sink.accepted.borrow(),
            vec![
                Episode::new(SeasonNumber::Regular(1), 2),
                Episode::new(SeasonNumber::Regular(1), 3)
            ]
        );
        let progress = store.get_progress(show.id).unwrap();
        assert_eq!(progress.season, Some(SeasonNumber::Regular(1)));
        assert_eq!(progress.episode, Some(3));
        // Listing is fetched from the configured mirror
        assert_eq!(
            site.fetched.borrow()[0],
            format!("https://{}/series/Lost/seasons", DOMAIN)
        );
    }

    #[test]
    fn test_missing_quality_stops_show_and_keeps_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        let show = track(&store, "Lost", 245, Some((1, 1)));
        let site = FakeSite::default()
            .with_listing("Lost", 245, &[("1 сезон", &[4, 3, 2, 1])])
            .with_download(245, 1, 2, "720p")
            .with_download(245, 1, 3, "SD")
            .with_download(245, 1, 4, "720p");
        let sink = RecordingSink::default();

        let (summary, events) = run(&site, &store, &sink);

        // Episode 4 is not attempted after episode 3 failed
        assert_eq!(sink.accepted.borrow().len(), 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.get_progress(show.id).unwrap().episode, Some(2));
        assert_eq!(store.list_shows().unwrap()[0].status, Status::Error);
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::StatusChanged { old: Status::Ok, new: Status::Error, .. }
        )));
    }

    #[test]
    fn test_repeated_failure_keeps_error_status_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        let show = track(&store, "Lost", 245, Some((1, 1)));
        store.put_status(show.id, Status::Error).unwrap();
        let site = FakeSite::default()
            .with_listing("Lost", 245, &[("1 сезон", &[2, 1])])
            .with_download(245, 1, 2, "SD");
        let sink = RecordingSink::default();

        let (summary, events) = run(&site, &store, &sink);

        // A show that is still failing never passes through Ok
        assert!(!events.iter().any(|e| matches!(e, RunEvent::StatusChanged { .. })));
        assert_eq!(summary.failed, 1);
        assert_eq!(store.list_shows().unwrap()[0].status, Status::Error);
    }

    #[test]
    fn test_error_status_clears_after_successful_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        let show = track(&store, "Lost", 245, Some((1, 1)));
        store.put_status(show.id, Status::Error).unwrap();
        let site = FakeSite::default()
            .with_listing("Lost", 245, &[("1 сезон", &[2, 1])])
            .with_download(245, 1, 2, "720p");
        let sink = RecordingSink::default();

        let (_, events) = run(&site, &store, &sink);

        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::StatusChanged { old: Status::Error, new: Status::Ok, .. }
        )));
        assert_eq!(store.list_shows().unwrap()[0].status, Status::Ok);
    }

    #[test]
    fn test_failed_download_stops_show_and_keeps_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        let show = track(&store, "Lost", 245, Some((1, 1)));
        let mut site = FakeSite::default()
            .with_listing("Lost", 245, &[("1 сезон", &[3, 2, 1])])
            .with_download(245, 1, 2, "720p")
            .with_download(245, 1, 3, "720p");
        site.artifacts.remove("https://tracker.example/245-1-2.torrent");
        let sink = RecordingSink::default();

        let (summary, events) = run(&site, &store, &sink);

        // Episode 3 is not attempted after episode 2 could not be fetched
        assert!(sink.accepted.borrow().is_empty());
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.get_progress(show.id).unwrap().episode, Some(1));
        assert_eq!(store.list_shows().unwrap()[0].status, Status::Error);
        assert!(events.iter().any(|e| matches!(e, RunEvent::Failed { .. })));
    }

    #[test]
    fn test_not_found_is_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        track(&store, "Gone", 7, None);
        let mut site = FakeSite::default();
        site.listings.insert(
            format!("https://{}/series/Gone/seasons", DOMAIN),
            ListingFetch::NotFound,
        );
        let sink = RecordingSink::default();

        let (_, first) = run(&site, &store, &sink);
        let (summary, second) = run(&site, &store, &sink);

        let changes = |events: &[RunEvent]| {
            events
                .iter()
                .filter(|e| matches!(e, RunEvent::StatusChanged { .. }))
                .count()
        };
        assert_eq!(changes(&first), 1);
        assert_eq!(changes(&second), 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(store.list_shows().unwrap()[0].status, Status::NotFound);
    }

    #[test]
    fn test_failing_show_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        track(&store, "Broken", 1, None);
        track(&store, "Lost", 245, None);
        // "Broken" has no listing at all: the fetch fails
        let site = FakeSite::default()
            .with_listing("Lost", 245, &[("1 сезон", &[2, 1])])
            .with_download(245, 1, 2, "720p");
        let sink = RecordingSink::default();

        let (summary, _) = run(&site, &store, &sink);

        assert_eq!(summary.checked, 2);
        assert_eq!(summary.failed, 1);
        // Never-checked shows start with the latest episode only
        assert_eq!(
            *sink.accepted.borrow(),
            vec![Episode::new(SeasonNumber::Regular(1), 2)]
        );
        let statuses: Vec<_> = store.list_shows().unwrap().iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![Status::Error, Status::Ok]);
    }

    #[test]
    fn test_duplicate_episode_marks_show_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        track(&store, "Lost", 245, None);
        let site = FakeSite::default().with_listing("Lost", 245, &[("1 сезон", &[2, 2])]);
        let sink = RecordingSink::default();

        let (_, events) = run(&site, &store, &sink);

        assert!(events.iter().any(|e| matches!(e, RunEvent::Failed { .. })));
        assert_eq!(store.list_shows().unwrap()[0].status, Status::Error);
    }

    #[test]
    fn test_unchanged_show_reports_info() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        track(&store, "Lost", 245, Some((1, 2)));
        let site = FakeSite::default().with_listing("Lost", 245, &[("1 сезон", &[2, 1])]);
        let sink = RecordingSink::default();

        let (summary, events) = run(&site, &store, &sink);

        assert_eq!(summary.downloaded, 0);
        assert!(events.iter().any(|e| matches!(e, RunEvent::Info { .. })));
    }

    #[test]
    fn test_failed_login_touches_no_show() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        track(&store, "Lost", 245, None);
        let site = FakeSite::default().with_listing("Lost", 245, &[("1 сезон", &[1])]);
        let sink = RecordingSink::default();
        let credentials = Credentials::new(Some("user".into()), Some("wrong".into()));

        let result = Monitor::new(&site, &store, &sink).execute_with_login(
            &store,
            &SessionState::default(),
            credentials.as_ref(),
            |_| {},
        );

        assert!(matches!(
            result,
            Err(MonitorError::Login(LoginError::IncorrectLoginPassword))
        ));
        assert!(site.fetched.borrow().is_empty());
    }

    #[test]
    fn test_prepare_show_restores_default_domain() {
        let site = FakeSite::default().with_listing("Lost", 245, &[]);
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        let sink = RecordingSink::default();

        let new_show = Monitor::new(&site, &store, &sink)
            .prepare_show(
                &session(),
                "https://www.lostfilm.tv/series/Lost/season_1",
                Quality::FullHD,
            )
            .unwrap();

        assert_eq!(new_show.url, "https://www.lostfilm.tv/series/Lost/seasons");
        assert_eq!(new_show.display_name, "Lost");
        assert_eq!(new_show.progress.cat, 245);
        assert_eq!(new_show.progress.quality, Quality::FullHD);
        assert!(new_show.progress.never_checked());
    }

    #[test]
    fn test_prepare_show_rejects_foreign_url() {
        let site = FakeSite::default();
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::at(dir.path()).unwrap();
        let sink = RecordingSink::default();

        let result = Monitor::new(&site, &store, &sink).prepare_show(
            &session(),
            "https://example.com/shows/lost",
            Quality::SD,
        );
        assert!(matches!(result, Err(MonitorError::UnsupportedUrl(_))));
    }
}
