//! # Gallery Cache
//!
//! The photo pipeline behind a personal gallery whose originals live in a
//! remote object store. It keeps a local disk cache of every size the
//! gallery shows, and a published catalog of what to show, both refreshed
//! in the background without ever blocking a reader.
//!
//! # Architecture
//!
//! ```text
//!             ┌────────────── RefreshSupervisor (control thread) ─────────────┐
//!             │  schedule · cancel · publish Arc<Published>                   │
//!             └──────▲──────────────────────────────┬─────────────────────────┘
//!                    │ RunMessage (progress, done)  │ spawn + CancelToken
//!             ┌──────┴──────────── run thread ──────▼─────────────────────────┐
//!             │ PrewarmJob: strings → list_catalog → normalize → pre-warm     │
//!             └──────┬───────────────────┬──────────────────────┬─────────────┘
//!                    │                   │                      │
//!          SheetStrings       RemoteCatalogClient         PhotoCacheStore ◀── serving reads
//!                               (rayon, paced)            tier 1 / 2 / 3
//!                                    │                      │        │
//!                                    └──── RemoteStore ─────┘   ImageBackend
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`remote`] | `RemoteStore` trait and the authenticated Drive implementation |
//! | [`catalog`] | List a folder, hydrate entries under a concurrency cap with pacing and one retry |
//! | [`normalize`] | Captions, capture dates, orientation, filtering and ordering into a `CatalogSnapshot` |
//! | [`imaging`] | Rotate and cover-crop JPEGs with the `image` crate |
//! | [`cache`] | Three-tier disk cache: exact hit, derive from full size, fetch from remote |
//! | [`strings`] | Display strings from a public spreadsheet feed |
//! | [`worker`] | Refresh run body and the run ↔ supervisor message protocol |
//! | [`supervisor`] | Single-flight refresh scheduling, cancellation and atomic publish |
//! | [`health`] | Activity log, health report, single-use trigger tokens |
//! | [`config`] | `gallery.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//! | [`types`] | Shared data model |
//!
//! # Design Decisions
//!
//! ## Synchronous Core
//!
//! Everything runs on plain threads: a rayon pool for hydration, one OS
//! thread per refresh run, one control thread for the supervisor. The remote
//! store is slow and rate-limited, so the bottleneck is never thread count,
//! and blocking code keeps every stage a straight line of `?` calls.
//!
//! ## Cache Entries Are Idempotent
//!
//! An entry is fully determined by `(id, width, height)` and the backend is
//! deterministic, so the same key always holds the same bytes. That is what
//! lets a cancelled run leave partial work behind, and lets two concurrent
//! misses for one key both write without coordination.
//!
//! ## Stale Beats Unavailable
//!
//! A refresh that cannot list or hydrate the catalog publishes nothing. The
//! previous snapshot stays live until a later run succeeds.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod health;
pub mod imaging;
pub mod normalize;
pub mod output;
pub mod remote;
pub mod strings;
pub mod supervisor;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_helpers;
