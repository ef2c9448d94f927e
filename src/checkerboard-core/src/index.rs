//! Immutable bidirectional mapping snapshots.
//!
//! A [`MappingIndex`] is built in one pass by an [`IndexBuilder`] and never
//! mutated afterwards. The mapper publishes whole indexes and readers keep
//! whichever one they loaded, so no reader ever sees a mix of two cycles.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{github_key, normalize_github};

/// One confirmed Slack <-> GitHub association.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// Slack user ID (not the display name).
    pub slack_id: String,
    /// GitHub username as declared in the profile, trimmed.
    pub github_username: String,
}

impl Entry {
    pub fn new(slack_id: impl Into<String>, github_username: impl Into<String>) -> Self {
        Self {
            slack_id: slack_id.into(),
            github_username: github_username.into(),
        }
    }
}

/// Reverse index value: who claimed a lowercased username, and how they
/// spelled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseEntry {
    pub slack_id: String,
    pub github_username: String,
}

/// Result of a reverse lookup.
///
/// `github_username` is the caller's query string, not the stored
/// spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GithubMatch {
    pub slack_id: String,
    pub github_username: String,
}

/// Immutable snapshot of the full bidirectional mapping.
#[derive(Debug, Clone)]
pub struct MappingIndex {
    forward: HashMap<String, String>,
    reverse: HashMap<String, ReverseEntry>,
    generation: u64,
    built_at: DateTime<Utc>,
}

impl Default for MappingIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl MappingIndex {
    /// The index published before anything has been loaded.
    pub fn empty() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            generation: 0,
            built_at: Utc::now(),
        }
    }

    /// Build an index from already-normalized entries, in order.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        let iter = entries.into_iter();
        let mut builder = IndexBuilder::with_capacity(iter.size_hint().0);
        for entry in iter {
            builder.push(entry.slack_id, Some(entry.github_username));
        }
        builder.build()
    }

    /// GitHub username for a Slack ID.
    pub fn github_for(&self, slack_id: &str) -> Option<&str> {
        self.forward.get(slack_id).map(String::as_str)
    }

    /// Reverse entry for a GitHub username, compared case-insensitively.
    pub fn slack_for(&self, github_username: &str) -> Option<&ReverseEntry> {
        self.reverse.get(&github_key(github_username))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Publish sequence number (0 for empty or warm-loaded indexes).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this index finished building.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Iterate `(slack_id, github_username)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(s, g)| (s.as_str(), g.as_str()))
    }

    /// All entries, sorted by Slack ID.
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.iter().map(|(s, g)| Entry::new(s, g)).collect();
        entries.sort();
        entries
    }

    /// Copy of this index stamped with a new generation.
    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Check that forward and reverse agree in both directions.
    pub fn is_consistent(&self) -> bool {
        self.forward.len() == self.reverse.len()
            && self.forward.iter().all(|(slack_id, github)| {
                self.reverse
                    .get(&github_key(github))
                    .is_some_and(|r| &r.slack_id == slack_id && &r.github_username == github)
            })
    }
}

/// Single-pass accumulator for a [`MappingIndex`].
///
/// Later pairs win: a repeated Slack ID replaces its earlier mapping, and a
/// username claimed again (case-insensitively) moves to the later claimant.
/// The earlier claimant is dropped from the forward map so the two
/// directions keep agreeing.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    forward: HashMap<String, String>,
    reverse: HashMap<String, ReverseEntry>,
    superseded: usize,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            forward: HashMap::with_capacity(capacity),
            reverse: HashMap::with_capacity(capacity),
            superseded: 0,
        }
    }

    /// Add a raw profile value, normalizing it first.
    ///
    /// Returns `true` if an entry was recorded.
    pub fn push_raw(&mut self, slack_id: impl Into<String>, raw: Option<&str>) -> bool {
        self.push(slack_id, normalize_github(raw))
    }

    /// Add an already-normalized pair. `None` clears any earlier mapping for
    /// the same Slack ID.
    ///
    /// Returns `true` if an entry was recorded.
    pub fn push(&mut self, slack_id: impl Into<String>, github_username: Option<String>) -> bool {
        let slack_id = slack_id.into();
        if slack_id.is_empty() {
            return false;
        }

        if let Some(previous) = self.forward.remove(&slack_id) {
            let key = github_key(&previous);
            if self
                .reverse
                .get(&key)
                .is_some_and(|r| r.slack_id == slack_id)
            {
                self.reverse.remove(&key);
            }
        }

        let Some(github_username) = github_username.filter(|g| !g.is_empty()) else {
            return false;
        };

        let key = github_key(&github_username);
        if let Some(displaced) = self.reverse.remove(&key) {
            self.forward.remove(&displaced.slack_id);
            self.superseded += 1;
            tracing::debug!(
                github = %github_username,
                previous = %displaced.slack_id,
                current = %slack_id,
                "GitHub username claimed by more than one Slack user; keeping the later one"
            );
        }

        self.forward.insert(slack_id.clone(), github_username.clone());
        self.reverse.insert(
            key,
            ReverseEntry {
                slack_id,
                github_username,
            },
        );
        true
    }

    /// Entries accumulated so far.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of earlier claims displaced by a later duplicate username.
    pub fn superseded(&self) -> usize {
        self.superseded
    }

    /// Freeze into an immutable index.
    pub fn build(self) -> MappingIndex {
        MappingIndex {
            forward: self.forward,
            reverse: self.reverse,
            generation: 0,
            built_at: Utc::now(),
        }
    }
}

impl<S: Into<String>> Extend<(S, Option<String>)> for IndexBuilder {
    fn extend<T: IntoIterator<Item = (S, Option<String>)>>(&mut self, iter: T) {
        for (slack_id, github) in iter {
            self.push(slack_id, github);
        }
    }
}
