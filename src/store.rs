//! The quote store.
//!
//! `QuoteStore` owns the in-memory quote sequence and the pending conflict
//! list, and mirrors both to a durable key-value store after every mutation.
//! The most recently shown quote lives in a separate session store.
//!
//! Construction is explicit (`QuoteStore::load`): a missing quote list seeds
//! the store, a corrupted one falls back to the seed and is only logged.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;

use crate::config::Config;
use crate::conflicts::ResolutionChoice;
use crate::error::{QuoteError, QuoteResult};
use crate::kv::{
    KeyValueStore, MemoryStore, SqliteStore, CONFLICTS_KEY, LAST_VIEWED_QUOTE_KEY, QUOTES_KEY,
    SELECTED_CATEGORY_KEY,
};
use crate::lookup_key::{LookupKeyDeriver, Sha256KeyDeriver};
use crate::merge::{merge_remote, MergeOutcome};
use crate::models::{generate_local_id, seed_quotes, Conflict, Quote, QuoteSource, ALL_CATEGORIES};
use crate::validation::{parse_import_payload, validate_category, validate_quote_text};

/// Message shown when a category filter matches nothing
pub const NO_QUOTES_MESSAGE: &str = "No quotes found in this category.";

/// Result of picking a random quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Picked(Quote),
    /// The filter matched nothing. A display result, not an error.
    Empty,
}

impl PickOutcome {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            PickOutcome::Picked(quote) => Some(quote),
            PickOutcome::Empty => None,
        }
    }

    /// Text to display for this outcome
    pub fn message(&self) -> String {
        match self {
            PickOutcome::Picked(quote) => quote.to_string(),
            PickOutcome::Empty => NO_QUOTES_MESSAGE.to_string(),
        }
    }
}

/// In-memory quote sequence backed by a key-value store.
pub struct QuoteStore {
    quotes: Vec<Quote>,
    conflicts: Vec<Conflict>,
    kv: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    deriver: Arc<dyn LookupKeyDeriver>,
}

impl QuoteStore {
    /// Load the store using the default lookup key deriver
    pub fn load(
        kv: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> QuoteResult<Self> {
        Self::load_with_deriver(kv, session, Arc::new(Sha256KeyDeriver))
    }

    /// Load the store with a custom lookup key deriver
    pub fn load_with_deriver(
        kv: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        deriver: Arc<dyn LookupKeyDeriver>,
    ) -> QuoteResult<Self> {
        let (quotes, seeded) = match kv.get(QUOTES_KEY)? {
            None => {
                tracing::info!("No stored quotes, seeding defaults");
                (seed_quotes(), true)
            }
            Some(raw) => match decode_quotes(&raw) {
                Ok(quotes) => (quotes, false),
                Err(e) => {
                    tracing::warn!("{}; falling back to default quotes", e);
                    (seed_quotes(), false)
                }
            },
        };

        let conflicts: Vec<Conflict> = match kv.get(CONFLICTS_KEY)? {
            None => Vec::new(),
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Stored conflict list is corrupted ({}), starting empty", e);
                Vec::new()
            }),
        };

        let store = Self {
            quotes,
            conflicts,
            kv,
            session,
            deriver,
        };

        if seeded {
            store.save_quotes()?;
        }

        tracing::debug!(
            "Loaded {} quotes, {} pending conflicts",
            store.quotes.len(),
            store.conflicts.len()
        );
        Ok(store)
    }

    /// Open the SQLite-backed store named by the config, with a fresh session
    pub fn open(config: &Config) -> QuoteResult<Self> {
        let kv = Arc::new(SqliteStore::new(config.database_file())?);
        Self::load(kv, Arc::new(MemoryStore::new()))
    }

    /// Create a store backed by fresh in-memory key-value stores
    pub fn in_memory() -> QuoteResult<Self> {
        Self::load(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Pending conflicts, oldest first
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Derive the lookup key for a piece of quote text
    pub fn lookup_key(&self, text: &str) -> String {
        self.deriver.derive(text)
    }

    /// First quote whose text maps to `key`
    pub fn find_by_lookup_key(&self, key: &str) -> Option<&Quote> {
        self.quotes
            .iter()
            .find(|q| self.deriver.derive(&q.text) == key)
    }

    /// Add a new local quote.
    ///
    /// Both fields are trimmed and must be non-blank. On any error the store
    /// is left unchanged.
    pub fn add(&mut self, text: &str, category: &str) -> QuoteResult<Quote> {
        validate_quote_text(text)?;
        validate_category(category)?;

        let quote = Quote::new_local(text.trim(), category.trim());
        self.quotes.push(quote.clone());

        if let Err(e) = self.save_quotes() {
            self.quotes.pop();
            return Err(e);
        }

        tracing::debug!("Added quote {} in {}", quote.id, quote.category);
        Ok(quote)
    }

    /// Pick a random quote matching `category_filter` (or any, for "all").
    ///
    /// The picked quote is remembered as the last shown quote for the
    /// session.
    pub fn pick_random<R: Rng + ?Sized>(&self, category_filter: &str, rng: &mut R) -> PickOutcome {
        let candidates: Vec<&Quote> = if category_filter == ALL_CATEGORIES {
            self.quotes.iter().collect()
        } else {
            self.quotes
                .iter()
                .filter(|q| q.category == category_filter)
                .collect()
        };

        if candidates.is_empty() {
            return PickOutcome::Empty;
        }

        let picked = candidates[rng.gen_range(0..candidates.len())].clone();
        self.remember_last_shown(&picked);
        PickOutcome::Picked(picked)
    }

    /// Pick a random quote using the thread-local RNG
    pub fn show_random(&self, category_filter: &str) -> PickOutcome {
        self.pick_random(category_filter, &mut rand::thread_rng())
    }

    /// Distinct categories present in the store, sorted
    pub fn categories(&self) -> Vec<String> {
        self.quotes
            .iter()
            .map(|q| q.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The last category filter the user chose ("all" if none)
    pub fn selected_category(&self) -> String {
        match self.kv.get(SELECTED_CATEGORY_KEY) {
            Ok(Some(category)) if !category.is_empty() => category,
            Ok(_) => ALL_CATEGORIES.to_string(),
            Err(e) => {
                tracing::warn!("Failed to read selected category: {}", e);
                ALL_CATEGORIES.to_string()
            }
        }
    }

    pub fn set_selected_category(&self, category: &str) -> QuoteResult<()> {
        self.kv.set(SELECTED_CATEGORY_KEY, category)
    }

    /// Remember `category` as the current filter and pick a quote from it
    pub fn filter_quotes<R: Rng + ?Sized>(
        &self,
        category: &str,
        rng: &mut R,
    ) -> QuoteResult<PickOutcome> {
        self.set_selected_category(category)?;
        Ok(self.pick_random(category, rng))
    }

    /// The quote shown most recently in this session
    pub fn last_shown(&self) -> Option<Quote> {
        let raw = match self.session.get(LAST_VIEWED_QUOTE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read last shown quote: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(quote) => Some(quote),
            Err(e) => {
                tracing::warn!("Discarding unreadable last shown quote: {}", e);
                None
            }
        }
    }

    /// Merge remote quotes into the store.
    ///
    /// See [`merge_remote`] for the rules. New conflicts are appended to the
    /// pending list unless an identical one is already pending. The returned
    /// outcome lists only the conflicts actually recorded.
    pub fn merge_remote(&mut self, remote: &[Quote]) -> QuoteResult<MergeOutcome> {
        let previous_quotes = self.quotes.clone();
        let previous_conflicts = self.conflicts.clone();

        let mut outcome = merge_remote(&mut self.quotes, remote, self.deriver.as_ref());

        let mut recorded = Vec::with_capacity(outcome.conflicts.len());
        for conflict in outcome.conflicts.drain(..) {
            let already_pending = self.conflicts.iter().any(|c| {
                c.lookup_key == conflict.lookup_key && c.server.same_content(&conflict.server)
            });
            if !already_pending {
                self.conflicts.push(conflict.clone());
                recorded.push(conflict);
            }
        }
        outcome.conflicts = recorded;

        if outcome.changed() || !outcome.conflicts.is_empty() {
            self.save_or_restore(previous_quotes, previous_conflicts)?;
        }

        tracing::info!(
            "Merged {} remote quotes: {} added, {} updated, {} conflicts",
            remote.len(),
            outcome.added,
            outcome.updated,
            outcome.conflicts.len()
        );
        Ok(outcome)
    }

    /// Resolve the pending conflict for `lookup_key` by keeping one side.
    ///
    /// The store entry for that key takes the chosen side's text, category
    /// and source. If the entry no longer exists the chosen side is appended.
    /// Returns the resulting store entry.
    pub fn resolve_conflict(
        &mut self,
        lookup_key: &str,
        choice: ResolutionChoice,
    ) -> QuoteResult<Quote> {
        let pos = self
            .conflicts
            .iter()
            .position(|c| c.lookup_key == lookup_key)
            .ok_or_else(|| QuoteError::NotFound(format!("No conflict for key {}", lookup_key)))?;

        let previous_quotes = self.quotes.clone();
        let previous_conflicts = self.conflicts.clone();

        let conflict = self.conflicts.remove(pos);
        let chosen = match choice {
            ResolutionChoice::KeepLocal => &conflict.local,
            ResolutionChoice::KeepServer => &conflict.server,
        };

        let deriver = Arc::clone(&self.deriver);
        let resolved = match self
            .quotes
            .iter_mut()
            .find(|q| deriver.derive(&q.text) == lookup_key)
        {
            Some(entry) => {
                entry.text = chosen.text.clone();
                entry.category = chosen.category.clone();
                entry.source = chosen.source;
                entry.last_modified = Utc::now();
                entry.clone()
            }
            None => {
                let mut entry = chosen.clone();
                entry.last_modified = Utc::now();
                self.quotes.push(entry.clone());
                entry
            }
        };

        self.save_or_restore(previous_quotes, previous_conflicts)?;

        tracing::info!(
            "Resolved conflict {} with {}",
            lookup_key,
            choice.as_str()
        );
        Ok(resolved)
    }

    /// Serialize the full sequence for export
    pub fn export(&self) -> QuoteResult<String> {
        Ok(serde_json::to_string_pretty(&self.quotes)?)
    }

    /// Write the export payload to `path`
    pub fn export_to_file(&self, path: &Path) -> QuoteResult<()> {
        fs::write(path, self.export()?)?;
        Ok(())
    }

    /// Append the quotes in an export payload.
    ///
    /// The payload must be a JSON array of quotes. Nothing is deduplicated,
    /// so importing quotes that already exist creates duplicate lookup keys.
    /// Ids already present in the store (or earlier in the payload) are
    /// replaced with fresh local ids.
    /// A rejected payload leaves the store unchanged. Returns the number of
    /// quotes appended.
    pub fn import(&mut self, payload: &str) -> QuoteResult<usize> {
        let mut imported = parse_import_payload(payload)?;
        let count = imported.len();
        let previous_len = self.quotes.len();

        let mut taken: HashSet<String> = self.quotes.iter().map(|q| q.id.clone()).collect();
        for quote in &mut imported {
            if !taken.insert(quote.id.clone()) {
                let fresh = generate_local_id();
                tracing::debug!("Imported id {} already in use, assigned {}", quote.id, fresh);
                quote.id = fresh;
                taken.insert(quote.id.clone());
            }
        }

        self.quotes.extend(imported);
        if let Err(e) = self.save_quotes() {
            self.quotes.truncate(previous_len);
            return Err(e);
        }

        tracing::info!("Imported {} quotes", count);
        Ok(count)
    }

    /// Read an export payload from `path` and import it
    pub fn import_from_file(&mut self, path: &Path) -> QuoteResult<usize> {
        let payload = fs::read_to_string(path)?;
        self.import(&payload)
    }

    /// Replace everything with the seed quotes and drop pending conflicts
    pub fn reset_to_seed(&mut self) -> QuoteResult<()> {
        self.quotes = seed_quotes();
        self.conflicts.clear();
        self.save_quotes()?;
        self.save_conflicts()?;
        tracing::info!("Store reset to default quotes");
        Ok(())
    }

    /// Local quotes, for pushing to the remote source
    pub fn local_quotes(&self) -> Vec<Quote> {
        self.quotes
            .iter()
            .filter(|q| q.source == QuoteSource::Local)
            .cloned()
            .collect()
    }

    fn remember_last_shown(&self, quote: &Quote) {
        let result = serde_json::to_string(quote)
            .map_err(QuoteError::from)
            .and_then(|json| self.session.set(LAST_VIEWED_QUOTE_KEY, &json));
        if let Err(e) = result {
            tracing::warn!("Failed to remember last shown quote: {}", e);
        }
    }

    /// Persist quotes and conflicts. On failure, put back the given state
    /// and try to write it again so memory and storage agree.
    fn save_or_restore(
        &mut self,
        previous_quotes: Vec<Quote>,
        previous_conflicts: Vec<Conflict>,
    ) -> QuoteResult<()> {
        let result = self.save_quotes().and_then(|_| self.save_conflicts());
        if let Err(e) = result {
            self.quotes = previous_quotes;
            self.conflicts = previous_conflicts;
            if let Err(restore_err) = self.save_quotes().and_then(|_| self.save_conflicts()) {
                tracing::warn!("Failed to rewrite restored state: {}", restore_err);
            }
            return Err(e);
        }
        Ok(())
    }

    fn save_quotes(&self) -> QuoteResult<()> {
        let json = serde_json::to_string(&self.quotes)?;
        self.kv.set(QUOTES_KEY, &json)
    }

    fn save_conflicts(&self) -> QuoteResult<()> {
        let json = serde_json::to_string(&self.conflicts)?;
        self.kv.set(CONFLICTS_KEY, &json)
    }
}

fn decode_quotes(raw: &str) -> QuoteResult<Vec<Quote>> {
    serde_json::from_str(raw)
        .map_err(|e| QuoteError::storage_parse(format!("stored quote list: {}", e)))
}
