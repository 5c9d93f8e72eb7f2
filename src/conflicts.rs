//! Conflict resolution for quote sync.
//!
//! This module handles:
//! - Listing pending conflicts
//! - Counting them by what disagrees (text, category or both)
//! - Resolving them by keeping the local or the server side

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{QuoteError, QuoteResult};
use crate::merge::diff_preview;
use crate::models::{Conflict, Quote};
use crate::store::QuoteStore;

/// What the two sides of a conflict disagree on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictType {
    Text,
    Category,
    TextAndCategory,
}

impl ConflictType {
    pub fn of(conflict: &Conflict) -> Self {
        match (conflict.text_differs(), conflict.category_differs()) {
            (true, true) => ConflictType::TextAndCategory,
            (true, false) => ConflictType::Text,
            // A conflict is only recorded when something differs
            _ => ConflictType::Category,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::Text => "text",
            ConflictType::Category => "category",
            ConflictType::TextAndCategory => "text_and_category",
        }
    }
}

/// How to resolve a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionChoice {
    KeepLocal,
    KeepServer,
}

impl ResolutionChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionChoice::KeepLocal => "keep_local",
            ResolutionChoice::KeepServer => "keep_server",
        }
    }
}

impl FromStr for ResolutionChoice {
    type Err = QuoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keep_local" | "local" => Ok(ResolutionChoice::KeepLocal),
            "keep_server" | "server" | "keep_remote" | "remote" => Ok(ResolutionChoice::KeepServer),
            other => Err(QuoteError::validation(
                "choice",
                format!("unknown resolution '{}', expected local or server", other),
            )),
        }
    }
}

/// Conflict manager
pub struct ConflictManager<'a> {
    store: &'a mut QuoteStore,
}

impl<'a> ConflictManager<'a> {
    pub fn new(store: &'a mut QuoteStore) -> Self {
        Self { store }
    }

    /// Pending conflicts, oldest first
    pub fn pending(&self) -> &[Conflict] {
        self.store.conflicts()
    }

    /// Get count of pending conflicts by type, plus "total"
    pub fn unresolved_count(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for kind in [
            ConflictType::Text,
            ConflictType::Category,
            ConflictType::TextAndCategory,
        ] {
            counts.insert(kind.as_str().to_string(), 0);
        }

        for conflict in self.store.conflicts() {
            *counts
                .entry(ConflictType::of(conflict).as_str().to_string())
                .or_insert(0) += 1;
        }

        counts.insert("total".to_string(), self.store.conflicts().len());
        counts
    }

    /// Lookup key and diff preview for every pending conflict
    pub fn previews(&self) -> Vec<(String, String)> {
        self.store
            .conflicts()
            .iter()
            .map(|c| (c.lookup_key.clone(), diff_preview(c)))
            .collect()
    }

    /// Resolve the conflict with exactly this lookup key
    pub fn resolve(&mut self, lookup_key: &str, choice: ResolutionChoice) -> QuoteResult<Quote> {
        self.store.resolve_conflict(lookup_key, choice)
    }

    /// Find a conflict by lookup key prefix and resolve it.
    ///
    /// Fails with NotFound if nothing matches and with a validation error if
    /// the prefix matches more than one key.
    pub fn find_and_resolve(
        &mut self,
        key_prefix: &str,
        choice: ResolutionChoice,
    ) -> QuoteResult<Quote> {
        let mut matches: Vec<String> = self
            .store
            .conflicts()
            .iter()
            .filter(|c| c.lookup_key.starts_with(key_prefix))
            .map(|c| c.lookup_key.clone())
            .collect();
        matches.sort();
        matches.dedup();

        match matches.as_slice() {
            [] => Err(QuoteError::NotFound(format!(
                "Conflict with key starting with '{}' not found",
                key_prefix
            ))),
            [key] => {
                let key = key.clone();
                self.resolve(&key, choice)
            }
            _ => Err(QuoteError::validation(
                "key_prefix",
                format!("'{}' matches {} conflicts", key_prefix, matches.len()),
            )),
        }
    }

    /// Resolve every pending conflict the same way. Returns how many were resolved.
    pub fn resolve_all(&mut self, choice: ResolutionChoice) -> QuoteResult<usize> {
        let keys: Vec<String> = self
            .store
            .conflicts()
            .iter()
            .map(|c| c.lookup_key.clone())
            .collect();

        let mut resolved = 0;
        for key in keys {
            // Several conflicts can share a key; the first resolution may
            // already have consumed one of them.
            if self.store.conflicts().iter().any(|c| c.lookup_key == key) {
                self.resolve(&key, choice)?;
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::kv::{KeyValueStore, MemoryStore, QUOTES_KEY};

    fn store_with_conflicts() -> QuoteStore {
        let kv = Arc::new(MemoryStore::new());
        kv.set(QUOTES_KEY, "[]").unwrap();
        let mut store = QuoteStore::load(kv, Arc::new(MemoryStore::new())).unwrap();

        store.add("Hi", "Motivation").unwrap();
        store.add("Keep going", "Life").unwrap();
        store
            .merge_remote(&[
                Quote::from_server(1, "Hi", "Wisdom"),
                Quote::from_server(2, "keep going", "Life"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_resolution_choice_parsing() {
        assert_eq!(
            "local".parse::<ResolutionChoice>().unwrap(),
            ResolutionChoice::KeepLocal
        );
        assert_eq!(
            "KEEP_SERVER".parse::<ResolutionChoice>().unwrap(),
            ResolutionChoice::KeepServer
        );
        assert_eq!(
            "remote".parse::<ResolutionChoice>().unwrap(),
            ResolutionChoice::KeepServer
        );
        assert!("merge".parse::<ResolutionChoice>().is_err());
    }

    #[test]
    fn test_unresolved_count() {
        let mut store = store_with_conflicts();
        let manager = ConflictManager::new(&mut store);
        let counts = manager.unresolved_count();

        assert_eq!(counts["total"], 2);
        assert_eq!(counts["category"], 1);
        assert_eq!(counts["text"], 1);
        assert_eq!(counts["text_and_category"], 0);
    }

    #[test]
    fn test_previews() {
        let mut store = store_with_conflicts();
        let manager = ConflictManager::new(&mut store);
        let previews = manager.previews();

        assert_eq!(previews.len(), 2);
        assert!(previews[0].1.contains("category: Motivation -> Wisdom"));
        assert!(previews[1].1.contains("-Keep going"));
        assert!(previews[1].1.contains("+keep going"));
    }

    #[test]
    fn test_find_and_resolve_by_prefix() {
        let mut store = store_with_conflicts();
        let key = store.lookup_key("Hi");

        let mut manager = ConflictManager::new(&mut store);
        let resolved = manager
            .find_and_resolve(&key[..6], ResolutionChoice::KeepLocal)
            .unwrap();

        assert_eq!(resolved.category, "Motivation");
        assert_eq!(manager.pending().len(), 1);
    }

    #[test]
    fn test_find_and_resolve_not_found() {
        let mut store = store_with_conflicts();
        let mut manager = ConflictManager::new(&mut store);

        let err = manager
            .find_and_resolve("zzzz-no-such-key", ResolutionChoice::KeepServer)
            .unwrap_err();
        assert!(matches!(err, QuoteError::NotFound(_)));
    }

    #[test]
    fn test_find_and_resolve_ambiguous_prefix() {
        let mut store = store_with_conflicts();
        let mut manager = ConflictManager::new(&mut store);

        // Empty prefix matches every key
        let err = manager
            .find_and_resolve("", ResolutionChoice::KeepServer)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(manager.pending().len(), 2);
    }

    #[test]
    fn test_resolve_all() {
        let mut store = store_with_conflicts();
        {
            let mut manager = ConflictManager::new(&mut store);
            assert_eq!(manager.resolve_all(ResolutionChoice::KeepLocal).unwrap(), 2);
            assert!(manager.pending().is_empty());
        }

        let texts: Vec<&str> = store.quotes().iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["Hi", "Keep going"]);
        assert_eq!(store.quotes()[0].category, "Motivation");
    }
}
