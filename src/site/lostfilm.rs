//! HTTP client for lostfilm.tv and its mirrors.
use super::markup;
use super::{Artifact, FetchError, ListingFetch, SiteClient};
use crate::download_info::DownloadPage;
use crate::session::{Credentials, LoginError, SESSION_COOKIE, SessionState};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_DISPOSITION, COOKIE, LOCATION, SET_COOKIE};
use reqwest::redirect::Policy;
use url::Url;

/// Site client backed by blocking reqwest.
///
/// Seasons pages and the settings page are fetched without following
/// redirects, because a redirect to the front page is how the site reports a
/// missing show or an expired session.
pub struct LostFilmClient {
    client: Client,
    no_redirect_client: Client,
}

impl LostFilmClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::new(),
            no_redirect_client: Client::builder().redirect(Policy::none()).build()?,
        })
    }

    /// Adds the session's headers and cookies to a request.
    fn prepare(request: RequestBuilder, session: &SessionState) -> RequestBuilder {
        let mut request = session
            .headers
            .iter()
            .fold(request, |request, (name, value)| request.header(name, value));
        if let Some(cookies) = session.cookie_header() {
            request = request.header(COOKIE, cookies);
        }
        request
    }

    fn send(request: RequestBuilder, url: &str) -> Result<Response, FetchError> {
        request.send().map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn text(response: Response, url: &str) -> Result<String, FetchError> {
        response.text().map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn parse_url(url: &str) -> Result<Url, FetchError> {
        Url::parse(url).map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GETs a page and returns its body, failing on non-success statuses.
    fn get_page(&self, session: &SessionState, url: &str) -> Result<String, FetchError> {
        let response = Self::send(Self::prepare(self.client.get(url), session), url)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Self::text(response, url)
    }
}

/// Extracts a cookie value from `Set-Cookie` headers.
fn cookie_value<'a>(set_cookies: impl Iterator<Item = &'a str>, name: &str) -> Option<String> {
    set_cookies
        .filter_map(|header| header.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != "deleted")
}

/// File name from a `Content-Disposition` header value.
fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, name)| name.trim().trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

impl SiteClient for LostFilmClient {
    fn fetch_listing(
        &self,
        session: &SessionState,
        url: &str,
    ) -> Result<ListingFetch, FetchError> {
        log::debug!("Fetching seasons page {}", url);
        let response = Self::send(
            Self::prepare(self.no_redirect_client.get(url), session),
            url,
        )?;
        let status = response.status();

        if status == StatusCode::FOUND {
            let to_root = response
                .headers()
                .get(LOCATION)
                .and_then(|location| location.to_str().ok())
                .is_some_and(|location| location == "/");
            return Ok(if to_root {
                ListingFetch::NotFound
            } else {
                ListingFetch::Unexpected {
                    status: status.as_u16(),
                }
            });
        }

        if status != StatusCode::OK {
            return Ok(ListingFetch::Unexpected {
                status: status.as_u16(),
            });
        }

        let body = Self::text(response, url)?;
        if markup::is_refresh_to_root(&body) {
            return Ok(ListingFetch::NotFound);
        }

        markup::listing_page(&body)
            .map(ListingFetch::Page)
            .map_err(|reason| FetchError::Markup {
                url: url.to_string(),
                reason,
            })
    }

    fn fetch_download_page(
        &self,
        session: &SessionState,
        url: &str,
    ) -> Result<DownloadPage, FetchError> {
        let page_url = Self::parse_url(url)?;
        let body = self.get_page(session, url)?;

        // The lookup endpoint answers with a meta refresh to the real page
        match markup::meta_refresh_target(&body, &page_url) {
            Some(target) => {
                log::debug!("Following refresh from {} to {}", url, target);
                let body = self.get_page(session, target.as_str())?;
                Ok(markup::download_page(&body, &target))
            }
            None => Ok(markup::download_page(&body, &page_url)),
        }
    }

    fn fetch_artifact(&self, session: &SessionState, url: &str) -> Result<Artifact, FetchError> {
        log::debug!("Downloading {}", url);
        let response = Self::send(Self::prepare(self.client.get(url), session), url)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename);
        let content = response.bytes().map_err(|e| FetchError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Artifact {
            file_name,
            content: content.to_vec(),
        })
    }

    fn login(
        &self,
        credentials: &Credentials,
        session: SessionState,
    ) -> Result<SessionState, LoginError> {
        let url = format!("https://{}/ajaxik.users.php", session.domain);
        let form = [
            ("act", "users"),
            ("type", "login"),
            ("mail", credentials.username.as_str()),
            ("pass", credentials.password.as_str()),
            ("rem", "1"),
            ("need_captcha", ""),
            ("captcha", ""),
        ];

        log::debug!("Logging in at {}", url);
        let response = Self::prepare(self.client.post(&url), &session)
            .form(&form)
            .send()
            .map_err(|e| LoginError::Request(e.to_string()))?;

        let token = cookie_value(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
            SESSION_COOKIE,
        );

        let result: serde_json::Value = response
            .json()
            .map_err(|e| LoginError::Request(e.to_string()))?;
        if let Some(code) = result.get("error") {
            return Err(LoginError::from_code(code));
        }
        if result.get("need_captcha").is_some() {
            return Err(LoginError::CaptchaRequested);
        }

        let token = token.ok_or(LoginError::MissingSessionCookie)?;
        Ok(SessionState {
            session_token: Some(token),
            ..session
        })
    }

    fn verify(&self, session: &SessionState) -> Result<bool, FetchError> {
        if session.all_cookies().is_empty() {
            return Ok(false);
        }

        let url = format!("https://{}/my_settings", session.domain);
        let response = Self::send(
            Self::prepare(self.no_redirect_client.get(&url), session),
            &url,
        )?;
        if response.status() != StatusCode::OK {
            log::debug!("Settings page answered {}", response.status());
            return Ok(false);
        }

        let body = Self::text(response, &url)?;
        Ok(!markup::is_refresh_to_root(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value() {
        let headers = [
            "PHPSESSID=abc; path=/",
            "lf_session=1a2b3c.4d5e; expires=Fri, 01-Jan-2027 00:00:00 GMT; path=/; domain=.lostfilm.tv",
        ];
        assert_eq!(
            cookie_value(headers.iter().copied(), SESSION_COOKIE),
            Some("1a2b3c.4d5e".to_string())
        );
        assert_eq!(cookie_value(headers.iter().copied(), "missing"), None);
        assert_eq!(
            cookie_value(["lf_session=deleted; path=/"].into_iter(), SESSION_COOKIE),
            None
        );
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="The.Expanse.S03E01.1080p.torrent""#),
            Some("The.Expanse.S03E01.1080p.torrent".to_string())
        );
        assert_eq!(disposition_filename("attachment"), None);
    }
}
