//! Google Drive (v2 REST) implementation of [`RemoteStore`].
//!
//! | Call | Endpoint |
//! |---|---|
//! | list | `GET {api_base}/files/{folder}/children?maxResults=N` |
//! | get_metadata | `GET {api_base}/files/{id}` |
//! | fetch_bytes | `GET {api_base}/files/{id}?alt=media` |
//!
//! Credentials are not acquired here. The store asks an injected
//! [`AccessToken`] for a bearer token on every call; whoever owns the OAuth
//! flow keeps that token fresh.

use super::{RemoteError, RemoteStore};
use crate::types::{LiteEntry, RemotePhoto, Rotation};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Source of bearer tokens for the authenticated transport.
pub trait AccessToken: Send + Sync {
    fn bearer(&self) -> Result<String, RemoteError>;
}

/// A fixed token, e.g. handed over by an external credential helper.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AccessToken for StaticToken {
    fn bearer(&self) -> Result<String, RemoteError> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every call, so an
/// external refresher can rotate it without restarting the process.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl AccessToken for EnvToken {
    fn bearer(&self) -> Result<String, RemoteError> {
        std::env::var(&self.var)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RemoteError::Auth(format!("environment variable {} is not set", self.var)))
    }
}

pub struct DriveStore {
    http: Client,
    api_base: String,
    token: Arc<dyn AccessToken>,
}

impl DriveStore {
    pub fn new(
        api_base: &str,
        timeout: Duration,
        token: Arc<dyn AccessToken>,
    ) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, RemoteError> {
        Ok(request.bearer_auth(self.token.bearer()?))
    }
}

impl RemoteStore for DriveStore {
    fn list(&self, folder_id: &str, page_size: u32) -> Result<Vec<LiteEntry>, RemoteError> {
        let url = format!("{}/files/{}/children", self.api_base, folder_id);
        let request = self
            .http
            .get(&url)
            .query(&[("maxResults", page_size.to_string())]);
        let list: ChildList = self
            .authorized(request)?
            .send()?
            .error_for_status()?
            .json()?;
        Ok(list.items)
    }

    fn get_metadata(&self, id: &str) -> Result<RemotePhoto, RemoteError> {
        let url = format!("{}/files/{}", self.api_base, id);
        let file: DriveFile = self
            .authorized(self.http.get(&url))?
            .send()?
            .error_for_status()?
            .json()?;
        file.into_remote_photo()
    }

    fn fetch_bytes(&self, id: &str) -> Result<Vec<u8>, RemoteError> {
        let url = format!("{}/files/{}", self.api_base, id);
        let request = self.http.get(&url).query(&[("alt", "media")]);
        let bytes = self
            .authorized(request)?
            .send()?
            .error_for_status()?
            .bytes()?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct ChildList {
    #[serde(default)]
    items: Vec<LiteEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    title: String,
    description: Option<String>,
    created_date: Option<String>,
    #[serde(default)]
    explicitly_trashed: bool,
    #[serde(default)]
    labels: Labels,
    image_media_metadata: Option<ImageMediaMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Labels {
    #[serde(default)]
    trashed: bool,
}

#[derive(Debug, Deserialize)]
struct ImageMediaMetadata {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    rotation: u32,
    date: Option<String>,
}

impl DriveFile {
    fn into_remote_photo(self) -> Result<RemotePhoto, RemoteError> {
        if self.id.is_empty() {
            return Err(RemoteError::Malformed("file without id".into()));
        }
        let (width, height, rotation, media_captured) = match self.image_media_metadata {
            Some(m) => (m.width, m.height, Rotation::from_quarter_turns(m.rotation), m.date),
            None => (0, 0, Rotation::NONE, None),
        };
        Ok(RemotePhoto {
            id: self.id,
            mime_type: self.mime_type,
            title: self.title,
            description: self.description,
            width,
            height,
            rotation,
            trashed: self.explicitly_trashed || self.labels.trashed,
            created: self.created_date,
            media_captured,
        })
    }
}
