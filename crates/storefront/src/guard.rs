//! Route Guard.
//!
//! Decides, on every navigation, whether a destination may be shown. Protected
//! destinations require a session; without one the guard redirects to the
//! login page and carries the original path and query in `redirect` so the
//! login flow can send the user back.

use url::Url;

use crate::models::Session;
use crate::session::SessionStore;

/// Login entry point.
pub const LOGIN_PATH: &str = "/login";

/// Query parameter carrying the return target.
pub const REDIRECT_PARAM: &str = "redirect";

/// Path prefixes that require a session.
pub const PROTECTED_PREFIXES: &[&str] = &["/cart", "/checkout", "/myProfile"];

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Show the destination.
    Allow,
    /// Go to this location instead.
    Redirect(String),
}

/// Whether `destination` (path, optionally with query) needs a session.
#[must_use]
pub fn is_protected(destination: &str) -> bool {
    let path = destination
        .split(['?', '#'])
        .next()
        .unwrap_or(destination);
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Login URL that returns to `destination` after success.
#[must_use]
pub fn login_redirect(destination: &str) -> String {
    format!(
        "{LOGIN_PATH}?{REDIRECT_PARAM}={}",
        urlencoding::encode(destination)
    )
}

/// Recover the return target from a login location built by [`login_redirect`].
///
/// Only same-site paths are returned; anything that could leave the site
/// (absolute URLs, `//host`) is ignored.
#[must_use]
pub fn return_target(login_location: &str) -> Option<String> {
    let base = Url::parse("http://storefront.local").ok()?;
    let url = base.join(login_location).ok()?;
    let target = url
        .query_pairs()
        .find(|(key, _)| key == REDIRECT_PARAM)
        .map(|(_, value)| value.into_owned())?;
    (target.starts_with('/') && !target.starts_with("//")).then_some(target)
}

/// Pure guard decision for `destination` given the current session.
#[must_use]
pub fn check(session: Option<&Session>, destination: &str) -> Navigation {
    if session.is_none() && is_protected(destination) {
        Navigation::Redirect(login_redirect(destination))
    } else {
        Navigation::Allow
    }
}

/// Guard bound to a Session Store. Reads the store on every check.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    store: SessionStore,
}

impl RouteGuard {
    /// Create a guard over `store`.
    #[must_use]
    pub const fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Check a navigation attempt.
    #[must_use]
    pub fn check(&self, destination: &str) -> Navigation {
        let session = self.store.get();
        check(session.as_deref(), destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::tests::sample_session;

    #[test]
    fn test_protected_prefixes_match_on_segment_boundary() {
        assert!(is_protected("/cart"));
        assert!(is_protected("/checkout?step=2"));
        assert!(is_protected("/myProfile/wishlist"));
        assert!(!is_protected("/cartoons"));
        assert!(!is_protected("/products?search=cart"));
        assert!(!is_protected("/"));
    }

    #[test]
    fn test_absent_session_redirects_with_return_target() {
        let nav = check(None, "/myProfile/wishlist?tab=2");
        let Navigation::Redirect(location) = nav else {
            panic!("expected redirect");
        };
        assert_eq!(location, "/login?redirect=%2FmyProfile%2Fwishlist%3Ftab%3D2");
        assert_eq!(
            return_target(&location).as_deref(),
            Some("/myProfile/wishlist?tab=2")
        );
    }

    #[test]
    fn test_public_routes_always_allowed() {
        assert_eq!(check(None, "/products/p1"), Navigation::Allow);
    }

    #[test]
    fn test_guard_reevaluates_on_every_check() {
        let store = SessionStore::new();
        let guard = RouteGuard::new(store.clone());
        assert!(matches!(guard.check("/cart"), Navigation::Redirect(_)));

        store.replace(sample_session());
        assert_eq!(guard.check("/cart"), Navigation::Allow);

        store.clear();
        assert!(matches!(guard.check("/cart"), Navigation::Redirect(_)));
    }

    #[test]
    fn test_return_target_rejects_offsite() {
        assert!(return_target("/login?redirect=https%3A%2F%2Fevil.example").is_none());
        assert!(return_target("/login?redirect=%2F%2Fevil.example").is_none());
        assert!(return_target("/login").is_none());
    }
}
