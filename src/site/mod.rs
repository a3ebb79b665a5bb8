//! Site access.
//!
//! The [`SiteClient`] trait is the seam between the tracking logic and the
//! catalog site. Implementors do the network and markup work and hand back
//! plain field values; everything they return is interpreted elsewhere.
mod lostfilm;
mod markup;

pub use lostfilm::LostFilmClient;

use crate::download_info::DownloadPage;
use crate::listing::ListingPage;
use crate::session::{Credentials, LoginError, SessionState};
use thiserror::Error;

/// Errors that can occur while talking to the site.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or its body not read
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The site answered with an unexpected status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The page did not have the expected structure
    #[error("Unexpected page structure at {url}: {reason}")]
    Markup { url: String, reason: String },
}

/// Outcome of fetching a show's seasons page.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingFetch {
    /// The page was served and its fields extracted
    Page(ListingPage),
    /// The site sent us to its front page: the show is gone or hidden
    NotFound,
    /// Any other non-success answer
    Unexpected { status: u16 },
}

/// A downloaded artifact, handed to the sink untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name suggested by the server, if any
    pub file_name: Option<String>,
    pub content: Vec<u8>,
}

/// Trait for clients of the catalog site.
///
/// Every call takes the session explicitly; clients hold no login state.
pub trait SiteClient {
    /// Fetches a seasons page without following redirects.
    fn fetch_listing(&self, session: &SessionState, url: &str)
    -> Result<ListingFetch, FetchError>;

    /// Fetches a download page, following any meta refresh the lookup
    /// endpoint answers with.
    fn fetch_download_page(
        &self,
        session: &SessionState,
        url: &str,
    ) -> Result<DownloadPage, FetchError>;

    /// Fetches a download artifact. Non-success statuses are errors.
    fn fetch_artifact(&self, session: &SessionState, url: &str) -> Result<Artifact, FetchError>;

    /// Logs in and returns the session extended with the new session token.
    fn login(
        &self,
        credentials: &Credentials,
        session: SessionState,
    ) -> Result<SessionState, LoginError>;

    /// Checks whether the session is still logged in.
    fn verify(&self, session: &SessionState) -> Result<bool, FetchError>;
}
