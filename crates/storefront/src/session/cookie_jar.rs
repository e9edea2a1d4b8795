//! Cookie jar holding the durable refresh credential.
//!
//! The refresh cookie is HTTP-only: this crate never reads its value, it only
//! hands it back to the server. When the jar has a file, every `Set-Cookie`
//! from the server (login, refresh rotation, logout) is written through to
//! it, so the next process can restore the session. Session cookies without
//! an expiry are kept too: a restart plays the part of a page reload, not of
//! closing the browser.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cookie_store::RawCookie;
use reqwest::header::HeaderValue;
use tracing::{debug, warn};
use url::Url;

/// File name of the persisted cookie jar inside the state directory.
pub const COOKIE_JAR_FILE: &str = "cookies.json";

/// Cookie storage shared by every request of one storefront.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<cookie_store::CookieStore>,
    path: Option<PathBuf>,
}

impl CookieJar {
    /// A jar that lives only as long as the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the jar persisted at `path`.
    ///
    /// A missing file is an empty jar. An unreadable or corrupt file is
    /// logged and also treated as empty; it is overwritten on the next
    /// `Set-Cookie`.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cookies = match File::open(&path) {
            Ok(file) => cookie_store::serde::json::load(BufReader::new(file)).unwrap_or_else(|e| {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable cookie jar");
                cookie_store::CookieStore::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => cookie_store::CookieStore::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to open cookie jar");
                cookie_store::CookieStore::default()
            }
        };

        Self {
            cookies: RwLock::new(cookies),
            path: Some(path),
        }
    }

    /// File backing this jar, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether a cookie named `name` would be sent to `url`.
    #[must_use]
    pub fn contains(&self, url: &Url, name: &str) -> bool {
        self.read().get_request_values(url).any(|(n, _)| n == name)
    }

    fn read(&self) -> RwLockReadGuard<'_, cookie_store::CookieStore> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, cookie_store::CookieStore> {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, cookies: &cookie_store::CookieStore) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(dir) = path.parent()
            && let Err(e) = std::fs::create_dir_all(dir)
        {
            warn!(error = %e, path = %dir.display(), "Failed to create state directory");
            return;
        }

        let result = File::create(path).map_err(cookie_store::Error::from).and_then(|file| {
            cookie_store::serde::json::save_incl_expired_and_nonpersistent(
                cookies,
                &mut BufWriter::new(file),
            )
        });
        match result {
            Ok(()) => debug!(path = %path.display(), "Cookie jar saved"),
            Err(e) => warn!(error = %e, path = %path.display(), "Failed to save cookie jar"),
        }
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let parsed: Vec<RawCookie<'static>> = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| RawCookie::parse(raw.to_owned()).ok())
            .collect();
        if parsed.is_empty() {
            return;
        }

        let mut cookies = self.write();
        cookies.store_response_cookies(parsed.into_iter(), url);
        self.persist(&cookies);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .read()
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::cookie::CookieStore;

    use super::*;

    fn api() -> Url {
        Url::parse("http://127.0.0.1:8000/api/v1/refresh").unwrap()
    }

    fn set(jar: &CookieJar, header: &'static str) {
        let value = HeaderValue::from_static(header);
        jar.set_cookies(&mut std::iter::once(&value), &api());
    }

    #[test]
    fn test_refresh_cookie_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(COOKIE_JAR_FILE);

        let jar = CookieJar::load(&path);
        set(&jar, "jwt=refresh-1; Path=/; HttpOnly");
        drop(jar);

        let reopened = CookieJar::load(&path);
        assert!(reopened.contains(&api(), "jwt"));
        assert_eq!(
            reopened.cookies(&api()).unwrap().to_str().unwrap(),
            "jwt=refresh-1"
        );
    }

    #[test]
    fn test_cleared_cookie_stays_cleared_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COOKIE_JAR_FILE);

        let jar = CookieJar::load(&path);
        set(&jar, "jwt=refresh-1; Path=/; HttpOnly");
        set(&jar, "jwt=; Path=/; Max-Age=0");
        assert!(!jar.contains(&api(), "jwt"));

        assert!(!CookieJar::load(&path).contains(&api(), "jwt"));
    }

    #[test]
    fn test_corrupt_file_is_an_empty_jar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COOKIE_JAR_FILE);
        std::fs::write(&path, "not json").unwrap();

        let jar = CookieJar::load(&path);
        assert!(jar.cookies(&api()).is_none());

        set(&jar, "jwt=refresh-2; Path=/");
        assert!(CookieJar::load(&path).contains(&api(), "jwt"));
    }

    #[test]
    fn test_in_memory_jar_writes_nothing() {
        let jar = CookieJar::in_memory();
        set(&jar, "jwt=refresh-1; Path=/");
        assert!(jar.path().is_none());
        assert!(jar.contains(&api(), "jwt"));
    }
}
