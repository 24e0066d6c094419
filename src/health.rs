//! Health surface for the refresh supervisor.
//!
//! - [`ActivityLog`]: bounded ring of recent operational events, oldest
//!   evicted first, read back newest first.
//! - [`HealthReport`]: point-in-time view handed to whatever renders status.
//! - [`TriggerTokens`]: single-use tokens gating the manual refresh trigger,
//!   so a resubmitted form cannot queue a second refresh.

use chrono::{DateTime, Utc};
use log::Level;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_LOG_CAPACITY: usize = 100;

const TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub at: DateTime<Utc>,
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
    capacity: usize,
    records: VecDeque<LogRecord>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(LogRecord {
            at: Utc::now(),
            level,
            message: message.into(),
        });
    }

    /// Records, newest first.
    pub fn recent(&self) -> Vec<LogRecord> {
        self.records.iter().rev().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Start of the running refresh, if one is active.
    pub active_since: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub photo_count: usize,
    /// Newest first.
    pub logs: Vec<LogRecord>,
}

impl HealthReport {
    pub fn is_active(&self) -> bool {
        self.active_since.is_some()
    }

    pub fn is_scheduled(&self) -> bool {
        self.next_run_at.is_some()
    }
}

/// Single-use tokens for the manual trigger.
///
/// Only the most recently issued token is valid, and only once.
#[derive(Debug, Default)]
pub struct TriggerTokens {
    current: Mutex<Option<String>>,
}

impl TriggerTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh token, invalidating any earlier one.
    pub fn issue(&self) -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        *self.lock() = Some(token.clone());
        token
    }

    /// Consume `token`. True exactly once per issued token.
    pub fn redeem(&self, token: &str) -> bool {
        let mut current = self.lock();
        if current.as_deref() == Some(token) {
            *current = None;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned token slot holds a plain String; the data is still usable.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
