//! Session state and the login gate.
//!
//! The site session is an explicit value: it is loaded from a
//! [`SessionStore`], passed into every network call, and written back
//! whenever a login replaces it.

use crate::listing::DEFAULT_DOMAIN;
use crate::site::SiteClient;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "lf_session";

/// Login error code the site uses for a wrong email or password.
const INCORRECT_LOGIN_CODE: i64 = 3;

/// Errors that can occur while establishing a session.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("No username or password configured")]
    CredentialsNotSpecified,

    #[error("Incorrect login or password")]
    IncorrectLoginPassword,

    #[error("The site requested a captcha, log in through a browser first")]
    CaptchaRequested,

    /// The site refused the login with an unrecognised code
    #[error("Login rejected by the site: {0}")]
    Rejected(String),

    /// The login succeeded but no session cookie came back
    #[error("Login response did not set a session cookie")]
    MissingSessionCookie,

    #[error("Login request failed: {0}")]
    Request(String),

    #[error("Failed to persist session: {0}")]
    Store(#[from] StoreError),
}

impl LoginError {
    /// Classifies the `error` field of a login response.
    pub fn from_code(code: &serde_json::Value) -> Self {
        let numeric = code
            .as_i64()
            .or_else(|| code.as_str().and_then(|s| s.trim().parse().ok()));
        if numeric == Some(INCORRECT_LOGIN_CODE) {
            LoginError::IncorrectLoginPassword
        } else {
            LoginError::Rejected(code.to_string())
        }
    }
}

/// Account credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Returns credentials only when both parts are non-empty.
    pub fn new(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self { username, password })
            }
            _ => None,
        }
    }
}

/// Everything a request to the site needs to look logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Value of the session cookie, if logged in
    pub session_token: Option<String>,
    /// Extra cookies, e.g. a Cloudflare clearance cookie
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    /// Extra headers, e.g. the browser's User-Agent
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Site mirror to talk to
    pub domain: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_token: None,
            cookies: BTreeMap::new(),
            headers: BTreeMap::new(),
            domain: DEFAULT_DOMAIN.to_string(),
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.session_token.is_some()
    }

    /// Cookies to send, including the session cookie.
    pub fn all_cookies(&self) -> BTreeMap<String, String> {
        let mut cookies = self.cookies.clone();
        if let Some(token) = &self.session_token {
            cookies.insert(SESSION_COOKIE.to_string(), token.clone());
        }
        cookies
    }

    /// Value for a `Cookie` header, `None` when there is nothing to send.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self.all_cookies();
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Applies user settings on top of a stored session.
    ///
    /// The configured domain always wins; configured headers and cookies
    /// override stored ones of the same name.
    pub fn with_overrides(mut self, settings: &SessionState) -> Self {
        self.domain = settings.domain.clone();
        self.headers.extend(settings.headers.clone());
        self.cookies.extend(settings.cookies.clone());
        self
    }
}

/// Persistence for the site session.
pub trait SessionStore {
    fn load_session(&self) -> Result<Option<SessionState>, StoreError>;
    fn store_session(&self, session: &SessionState) -> Result<(), StoreError>;
}

/// How a usable session was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOrigin {
    /// The stored session was still valid
    Restored,
    /// A fresh login was required
    LoggedIn,
}

/// Produces a logged-in session, logging in at most once.
///
/// The stored session is tried first. If it is missing or no longer valid the
/// credentials are used to log in, and the new session is stored before it
/// is returned.
pub fn establish_session<C, S>(
    client: &C,
    store: &S,
    settings: &SessionState,
    credentials: Option<&Credentials>,
) -> Result<(SessionState, SessionOrigin), LoginError>
where
    C: SiteClient + ?Sized,
    S: SessionStore + ?Sized,
{
    let session = store
        .load_session()?
        .map(|stored| stored.with_overrides(settings))
        .unwrap_or_else(|| settings.clone());

    if session.is_authenticated() {
        match client.verify(&session) {
            Ok(true) => {
                log::debug!("Stored session for {} is valid", session.domain);
                return Ok((session, SessionOrigin::Restored));
            }
            Ok(false) => log::info!("Stored session expired, logging in again"),
            Err(e) => log::warn!("Could not verify stored session: {}", e),
        }
    }

    let credentials = credentials.ok_or(LoginError::CredentialsNotSpecified)?;
    let session = login(client, store, credentials, session)?;
    Ok((session, SessionOrigin::LoggedIn))
}

/// Logs in unconditionally and stores the resulting session.
pub fn login<C, S>(
    client: &C,
    store: &S,
    credentials: &Credentials,
    session: SessionState,
) -> Result<SessionState, LoginError>
where
    C: SiteClient + ?Sized,
    S: SessionStore + ?Sized,
{
    let anonymous = SessionState {
        session_token: None,
        ..session
    };
    let session = client.login(credentials, anonymous)?;
    store.store_session(&session)?;
    log::info!("Logged in to {} as {}", session.domain, credentials.username);
    Ok(session)
}
