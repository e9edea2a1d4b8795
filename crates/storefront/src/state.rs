//! The storefront context: one instance per page lifetime.
//!
//! Everything here shares one HTTP client, one cookie jar and one
//! [`SessionStore`], so a refresh triggered by any component is seen by all
//! of them.

use std::sync::Arc;

use crate::account::AccountClient;
use crate::api::ApiClient;
use crate::auth::{AuthService, AuthorizedClient, CredentialRefresher};
use crate::bootstrap::SessionBootstrap;
use crate::catalog::{CatalogClient, ProductSearch};
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::guard::RouteGuard;
use crate::session::{CookieJar, FileLoginFlag, LoginFlag, SessionStore};

/// Shared storefront context.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    jar: Arc<CookieJar>,
    api: ApiClient,
    store: SessionStore,
    login_flag: Arc<dyn LoginFlag>,
    refresher: CredentialRefresher,
    authorized: AuthorizedClient,
    auth: AuthService,
    catalog: CatalogClient,
    search: ProductSearch,
    account: AccountClient,
    bootstrap: SessionBootstrap,
    guard: RouteGuard,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api_base_url", &self.inner.config.api_base_url.as_str())
            .field("authenticated", &self.inner.store.state().is_authenticated())
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Build a context whose cookie jar and login flag live in
    /// [`StorefrontConfig::state_dir`], so a new process picks up where the
    /// last one left off.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        StorefrontBuilder::new(config).build()
    }

    /// Start building a context with custom parts.
    #[must_use]
    pub fn builder(config: StorefrontConfig) -> StorefrontBuilder {
        StorefrontBuilder::new(config)
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Cookie jar holding the durable credential.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.inner.jar
    }

    /// Unauthenticated API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.store
    }

    /// Persistent login flag.
    #[must_use]
    pub fn login_flag(&self) -> &dyn LoginFlag {
        self.inner.login_flag.as_ref()
    }

    /// Credential refresher.
    #[must_use]
    pub fn refresher(&self) -> &CredentialRefresher {
        &self.inner.refresher
    }

    /// Authenticated request pipeline.
    #[must_use]
    pub fn authorized(&self) -> &AuthorizedClient {
        &self.inner.authorized
    }

    /// Login, registration, logout and password flows.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Public catalog.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Latest-wins product listing search.
    #[must_use]
    pub fn search(&self) -> &ProductSearch {
        &self.inner.search
    }

    /// Account operations.
    #[must_use]
    pub fn account(&self) -> &AccountClient {
        &self.inner.account
    }

    /// Start-up session restore.
    #[must_use]
    pub fn bootstrap(&self) -> &SessionBootstrap {
        &self.inner.bootstrap
    }

    /// Route guard.
    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.inner.guard
    }
}

/// Builder for [`Storefront`].
#[derive(Debug)]
pub struct StorefrontBuilder {
    config: StorefrontConfig,
    jar: Option<Arc<CookieJar>>,
    login_flag: Option<Arc<dyn LoginFlag>>,
}

impl StorefrontBuilder {
    /// Start from `config` with default parts.
    #[must_use]
    pub const fn new(config: StorefrontConfig) -> Self {
        Self {
            config,
            jar: None,
            login_flag: None,
        }
    }

    /// Use an existing cookie jar instead of the file at
    /// [`StorefrontConfig::cookie_jar_path`].
    #[must_use]
    pub fn cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.jar = Some(jar);
        self
    }

    /// Use a custom login flag instead of the file at
    /// [`StorefrontConfig::login_flag_path`].
    #[must_use]
    pub fn login_flag(mut self, flag: Arc<dyn LoginFlag>) -> Self {
        self.login_flag = Some(flag);
        self
    }

    /// Wire all components together.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<Storefront> {
        let Self {
            config,
            jar,
            login_flag,
        } = self;

        let jar = jar.unwrap_or_else(|| Arc::new(CookieJar::load(config.cookie_jar_path())));
        let login_flag = login_flag
            .unwrap_or_else(|| Arc::new(FileLoginFlag::new(config.login_flag_path())));

        let api = ApiClient::new(&config, Arc::clone(&jar))?;
        let store = SessionStore::new();
        let refresher = CredentialRefresher::new(api.clone(), store.clone(), Arc::clone(&login_flag));
        let authorized = AuthorizedClient::new(
            api.clone(),
            store.clone(),
            refresher.clone(),
            Arc::clone(&login_flag),
        );
        let auth = AuthService::new(
            api.clone(),
            authorized.clone(),
            store.clone(),
            Arc::clone(&login_flag),
        );
        let catalog = CatalogClient::new(api.clone(), config.catalog_cache_ttl);
        let search = ProductSearch::new(catalog.clone());
        let account = AccountClient::new(authorized.clone(), store.clone(), catalog.clone());
        let bootstrap = SessionBootstrap::new(store.clone(), Arc::clone(&login_flag), refresher.clone());
        let guard = RouteGuard::new(store.clone());

        Ok(Storefront {
            inner: Arc::new(StorefrontInner {
                config,
                jar,
                api,
                store,
                login_flag,
                refresher,
                authorized,
                auth,
                catalog,
                search,
                account,
                bootstrap,
                guard,
            }),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::guard::Navigation;
    use crate::models::session::tests::sample_session;
    use crate::session::MemoryLoginFlag;

    fn storefront() -> Storefront {
        let config = StorefrontConfig::new("http://127.0.0.1:9/api/v1".parse().unwrap());
        Storefront::builder(config)
            .cookie_jar(Arc::new(CookieJar::in_memory()))
            .login_flag(Arc::new(MemoryLoginFlag::default()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_parts_live_in_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorefrontConfig::new("http://127.0.0.1:9/api/v1".parse().unwrap());
        config.state_dir = dir.path().to_path_buf();

        let storefront = Storefront::new(config.clone()).unwrap();

        assert_eq!(storefront.cookie_jar().path(), Some(config.cookie_jar_path().as_path()));
        assert!(!storefront.login_flag().get());
    }

    #[test]
    fn test_components_share_one_store() {
        let storefront = storefront();
        assert_eq!(
            storefront.guard().check("/cart"),
            Navigation::Redirect("/login?redirect=%2Fcart".to_string())
        );

        storefront.session().replace(sample_session());
        assert_eq!(storefront.guard().check("/cart"), Navigation::Allow);
        assert!(storefront.authorized().store().state().is_authenticated());
    }

    #[test]
    fn test_clones_share_state() {
        let storefront = storefront();
        let other = storefront.clone();
        other.session().replace(sample_session());
        assert!(storefront.session().get().is_some());
        assert!(!storefront.login_flag().get());
    }
}
