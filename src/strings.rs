//! Display strings from a public spreadsheet feed.
//!
//! The gallery's title, subtitle and supporting text are edited in a
//! spreadsheet rather than in config. The sheet is published as a JSON cell
//! feed; each string is the `content.$t` of one cell entry:
//!
//! ```json
//! { "feed": { "entry": [ { "content": { "$t": "Title" } }, ... ] } }
//! ```
//!
//! Which entries hold which string is configurable (defaults 1, 3 and 5:
//! the value column next to each label).

use crate::remote::RemoteError;
use crate::types::DisplayStrings;
use reqwest::blocking::Client;
use std::time::Duration;

/// Feed entry indices for title, subtitle and supporting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryIndices {
    pub title: usize,
    pub subtitle: usize,
    pub supporting_text: usize,
}

impl Default for EntryIndices {
    fn default() -> Self {
        Self {
            title: 1,
            subtitle: 3,
            supporting_text: 5,
        }
    }
}

/// Anything that can produce a fresh set of display strings.
pub trait StringsSource: Send + Sync {
    fn fetch(&self) -> Result<DisplayStrings, RemoteError>;
}

/// Fetches strings from a published spreadsheet JSON feed.
pub struct SheetStrings {
    http: Client,
    url: String,
    entries: EntryIndices,
}

impl SheetStrings {
    pub fn new(url: &str, entries: EntryIndices, timeout: Duration) -> Result<Self, RemoteError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            entries,
        })
    }
}

impl StringsSource for SheetStrings {
    fn fetch(&self) -> Result<DisplayStrings, RemoteError> {
        let feed: serde_json::Value = self
            .http
            .get(&self.url)
            .send()?
            .error_for_status()?
            .json()?;
        parse_sheet_feed(&feed, self.entries)
    }
}

/// Pull the three strings out of a cell feed document.
///
/// All three must be present; a partial set is rejected so the gallery
/// never shows a mix of old and new strings.
pub fn parse_sheet_feed(
    feed: &serde_json::Value,
    entries: EntryIndices,
) -> Result<DisplayStrings, RemoteError> {
    let cell = |index: usize| {
        feed.pointer(&format!("/feed/entry/{index}/content/$t"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Malformed(format!("sheet feed has no text at entry {index}")))
    };
    Ok(DisplayStrings {
        title: cell(entries.title)?,
        subtitle: cell(entries.subtitle)?,
        supporting_text: cell(entries.supporting_text)?,
    })
}
