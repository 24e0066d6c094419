//! Remote object store abstraction.
//!
//! Everything that talks to the photo store goes through [`RemoteStore`]:
//! the catalog client lists and hydrates through it, and the image pipeline
//! downloads originals and re-checks orientation through it. The store is
//! injected as `Arc<dyn RemoteStore>` so tests can substitute an in-memory
//! fake and the binary can wire in [`DriveStore`].

mod drive;

pub use drive::{AccessToken, DriveStore, EnvToken, StaticToken};

use crate::types::{LiteEntry, RemotePhoto};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// The three calls the pipeline needs from the remote store.
pub trait RemoteStore: Send + Sync {
    /// List the entries of a folder in one page of at most `page_size` items.
    fn list(&self, folder_id: &str, page_size: u32) -> Result<Vec<LiteEntry>, RemoteError>;

    /// Fetch full metadata for one file.
    fn get_metadata(&self, id: &str) -> Result<RemotePhoto, RemoteError>;

    /// Download the original bytes of one file.
    fn fetch_bytes(&self, id: &str) -> Result<Vec<u8>, RemoteError>;
}
