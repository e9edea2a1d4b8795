//! "Latest wins" product search.
//!
//! Each new search sends an explicit cancellation signal to the one still in
//! flight, so a slow stale response can never overwrite a newer one.

use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::models::ProductPage;

use super::{CatalogClient, ProductFilter};

/// Product listing search where only the latest query may complete.
#[derive(Debug)]
pub struct ProductSearch {
    catalog: CatalogClient,
    in_flight: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProductSearch {
    /// Create a search over `catalog`.
    #[must_use]
    pub fn new(catalog: CatalogClient) -> Self {
        Self {
            catalog,
            in_flight: Mutex::new(None),
        }
    }

    /// Run a search, cancelling the previous one if it is still running.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Cancelled` if a newer search started before this
    /// one finished, or the request error.
    pub async fn search(&self, filter: &ProductFilter) -> Result<ProductPage> {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        if let Some(previous) = self.in_flight.lock().await.replace(cancel_tx) {
            // Err means the previous search already finished.
            if previous.send(()).is_ok() {
                debug!("Cancelled previous search");
            }
        }

        tokio::select! {
            biased;
            _ = cancel_rx => Err(ApiError::Cancelled),
            result = self.catalog.filtered_products(filter) => result,
        }
    }

    /// Cancel the in-flight search, if any.
    pub async fn cancel(&self) {
        if let Some(previous) = self.in_flight.lock().await.take() {
            let _ = previous.send(());
        }
    }
}
