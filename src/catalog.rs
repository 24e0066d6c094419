//! Remote catalog client: list a folder, then hydrate every entry.
//!
//! Listing is one call. Hydration is one metadata call per entry, run on a
//! dedicated rayon pool whose thread count is the concurrency cap, so at most
//! `max_concurrent` metadata requests are ever in flight. Each worker sleeps
//! for `pacing` after every request before releasing its result, which caps
//! the sustained request rate at roughly `max_concurrent / pacing`.
//!
//! ## Failure policy
//!
//! - Listing fails → [`CatalogError::RemoteList`], nothing else is attempted.
//! - A hydration fails → retried once for the same id with the same pacing.
//! - The retry fails too → [`CatalogError::RemoteFetch`] and the whole call
//!   fails. A partial catalog is never returned.
//! - The [`CancelToken`] is set → no further metadata request or retry is
//!   issued and the call fails with [`CatalogError::Cancelled`]. Requests
//!   already in flight finish, so at most `max_concurrent` complete late.

use crate::remote::{RemoteError, RemoteStore};
use crate::types::{LiteEntry, RemotePhoto};
use crate::worker::CancelToken;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to list folder {folder_id}: {source}")]
    RemoteList {
        folder_id: String,
        #[source]
        source: RemoteError,
    },
    #[error("failed to fetch metadata for {id}: {source}")]
    RemoteFetch {
        id: String,
        #[source]
        source: RemoteError,
    },
    #[error("catalog refresh cancelled")]
    Cancelled,
    #[error("could not start hydration pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Throttling parameters for the catalog client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogLimits {
    /// Maximum metadata requests in flight.
    pub max_concurrent: usize,
    /// Delay after each metadata request before its result is released.
    pub pacing: Duration,
    /// Page size for the single listing call.
    pub page_size: u32,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            pacing: Duration::from_millis(1000),
            page_size: 1000,
        }
    }
}

pub struct RemoteCatalogClient {
    store: Arc<dyn RemoteStore>,
    limits: CatalogLimits,
    pool: rayon::ThreadPool,
}

impl RemoteCatalogClient {
    pub fn new(store: Arc<dyn RemoteStore>, limits: CatalogLimits) -> Result<Self, CatalogError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(limits.max_concurrent.max(1))
            .thread_name(|i| format!("hydrate-{i}"))
            .build()?;
        Ok(Self {
            store,
            limits,
            pool,
        })
    }

    pub fn limits(&self) -> CatalogLimits {
        self.limits
    }

    /// List `folder_id` and hydrate every entry, preserving listing order.
    pub fn list_catalog(&self, folder_id: &str) -> Result<Vec<RemotePhoto>, CatalogError> {
        self.list_catalog_until(folder_id, &CancelToken::new())
    }

    /// [`list_catalog`](Self::list_catalog), abandoned once `cancel` is set.
    pub fn list_catalog_until(
        &self,
        folder_id: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<RemotePhoto>, CatalogError> {
        let entries = self
            .store
            .list(folder_id, self.limits.page_size)
            .map_err(|source| CatalogError::RemoteList {
                folder_id: folder_id.to_string(),
                source,
            })?;

        log::info!(
            "Listed {} entries in folder {}, hydrating with {} workers",
            entries.len(),
            folder_id,
            self.limits.max_concurrent
        );

        self.pool.install(|| {
            entries
                .par_iter()
                .map(|entry| self.hydrate(entry, cancel))
                .collect::<Result<Vec<_>, _>>()
        })
    }

    fn hydrate(&self, entry: &LiteEntry, cancel: &CancelToken) -> Result<RemotePhoto, CatalogError> {
        if cancel.is_cancelled() {
            return Err(CatalogError::Cancelled);
        }
        match self.fetch_paced(&entry.id) {
            Ok(photo) => Ok(photo),
            Err(_) if cancel.is_cancelled() => Err(CatalogError::Cancelled),
            Err(first) => {
                log::warn!("Hydrating {} failed, retrying once: {}", entry.id, first);
                self.fetch_paced(&entry.id)
                    .map_err(|source| CatalogError::RemoteFetch {
                        id: entry.id.clone(),
                        source,
                    })
            }
        }
    }

    fn fetch_paced(&self, id: &str) -> Result<RemotePhoto, RemoteError> {
        let result = self.store.get_metadata(id);
        if !self.limits.pacing.is_zero() {
            std::thread::sleep(self.limits.pacing);
        }
        result
    }
}
