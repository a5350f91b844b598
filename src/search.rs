//! Live search and suggestions.
//!
//! Each collection gets one engine. The engine exclusively owns a mirror of
//! the store snapshot; the store subscription callback is the only writer,
//! and every notification replaces the mirror wholesale before the current
//! query is re-evaluated in place.
//!
//! The machine has three states. **Idle**: the query is empty, nothing to
//! show. **Suggesting**: the query matches zero, two-or-more distinct field
//! values, or a single value it does not yet spell out exactly; the
//! suggestion list is visible and the result list suppressed. **Resolved**:
//! exactly one distinct value matches and equals the query
//! case-insensitively; every record carrying that value renders.

use std::collections::HashSet;

use crate::model::Entry;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    Idle,
    Suggesting { suggestions: Vec<String> },
    Resolved { value: String },
}

/// What a renderer should show for the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendering<E> {
    /// No query yet; nothing to show.
    Blank,
    /// Suggestion list visible, result list suppressed.
    Suggestions(Vec<String>),
    /// Exact match: render these records.
    Entries(Vec<E>),
    /// Exact match, but nothing in the collection carries it ("no data
    /// found", distinct from Blank).
    NoData,
}

pub struct SearchEngine<E: Entry> {
    entries: Vec<E>,
    field: E::Field,
    query: String,
    state: SearchState,
    identity_override: bool,
}

impl<E: Entry> SearchEngine<E> {
    pub fn new(field: E::Field, identity_override: bool) -> Self {
        Self {
            entries: Vec::new(),
            field,
            query: String::new(),
            state: SearchState::Idle,
            identity_override,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// The mirrored collection (exclusively owned by this engine).
    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    /// Store subscription target: the snapshot fully replaces the mirror and
    /// the current query is re-evaluated in place. A live update never
    /// silently reverts the machine to Idle.
    pub fn apply_snapshot(&mut self, entries: Vec<E>) {
        self.entries = entries;
        self.evaluate();
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.evaluate();
    }

    /// Changing the search field resets the machine and clears the query.
    pub fn set_field(&mut self, field: E::Field) {
        self.field = field;
        self.query.clear();
        self.state = SearchState::Idle;
    }

    /// A suggestion pick is authoritative: the machine resolves to the
    /// picked value even when typing alone would have kept it suggesting.
    pub fn pick_suggestion(&mut self, value: &str) {
        self.query = value.to_string();
        self.state = SearchState::Resolved {
            value: value.to_string(),
        };
    }

    /// Records to render for the current state.
    pub fn rendering(&self) -> Rendering<E> {
        match &self.state {
            SearchState::Idle => Rendering::Blank,
            SearchState::Suggesting { suggestions } => {
                Rendering::Suggestions(suggestions.clone())
            }
            SearchState::Resolved { value } => {
                let matches = self.resolved_matches(value);
                if matches.is_empty() {
                    Rendering::NoData
                } else {
                    Rendering::Entries(matches)
                }
            }
        }
    }

    fn evaluate(&mut self) {
        let needle = self.query.trim().to_lowercase();
        if needle.is_empty() {
            self.state = SearchState::Idle;
            return;
        }

        let suggestions = self.distinct_matches(&needle);
        if suggestions.len() == 1 && suggestions[0].to_lowercase() == needle {
            self.state = SearchState::Resolved {
                value: suggestions[0].clone(),
            };
        } else {
            self.state = SearchState::Suggesting { suggestions };
        }
    }

    /// Distinct field values containing the needle, case-insensitively.
    /// Distinctness is case-sensitive and original casing is preserved for
    /// display; first-seen order wins.
    fn distinct_matches(&self, needle: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for entry in &self.entries {
            let value = entry.field(self.field);
            if value.is_empty() {
                continue;
            }
            if value.to_lowercase().contains(needle) && seen.insert(value.to_string()) {
                suggestions.push(value.to_string());
            }
        }
        suggestions
    }

    fn resolved_matches(&self, value: &str) -> Vec<E> {
        let needle = value.to_lowercase();
        let pinned = self.identity_override && E::is_identity(self.field);
        self.entries
            .iter()
            .filter(|entry| {
                let candidate = if pinned {
                    entry.identity_value(self.field)
                } else {
                    entry.field(self.field)
                };
                candidate.to_lowercase() == needle
            })
            .cloned()
            .collect()
    }
}
