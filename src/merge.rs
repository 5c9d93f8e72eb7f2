//! Merge of remote quotes into the local sequence.
//!
//! Records are matched by lookup key (normalized text only). The merge is
//! last-writer-wins: a remote record that disagrees with its local match
//! replaces it, and the disagreement is logged as a conflict on the side.
//! The conflict log never blocks the overwrite.

use std::collections::HashMap;

use similar::{ChangeTag, TextDiff};

use crate::lookup_key::LookupKeyDeriver;
use crate::models::{Conflict, Quote};

/// Result of a merge pass.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Remote records with no local match, appended
    pub added: usize,
    /// Local records overwritten by a differing remote record
    pub updated: usize,
    /// One conflict per overwritten record
    pub conflicts: Vec<Conflict>,
}

impl MergeOutcome {
    /// True if the merge changed the local sequence
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Merge `remote` into `local`.
///
/// For each remote record:
/// - no local record shares its lookup key: append it (added)
/// - a local record shares the key but differs in text or category: log a
///   conflict holding both versions, then overwrite the local slot (updated)
/// - a local record shares the key and matches exactly: nothing
///
/// Only the first local record per key is considered. Remote records sharing
/// a key collapse to the last one in the batch. Merging the same remote set
/// twice is a no-op the second time.
pub fn merge_remote(
    local: &mut Vec<Quote>,
    remote: &[Quote],
    deriver: &dyn LookupKeyDeriver,
) -> MergeOutcome {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, quote) in local.iter().enumerate() {
        index.entry(deriver.derive(&quote.text)).or_insert(i);
    }

    let mut outcome = MergeOutcome::default();

    for (key, incoming) in collapse_by_key(remote, deriver) {
        match index.get(&key) {
            Some(&i) => {
                if local[i].same_content(incoming) {
                    continue;
                }
                tracing::debug!(
                    "Conflict on {}: local category {:?}, server category {:?}",
                    key,
                    local[i].category,
                    incoming.category
                );
                outcome
                    .conflicts
                    .push(Conflict::new(key, local[i].clone(), incoming.clone()));
                local[i] = incoming.clone();
                outcome.updated += 1;
            }
            None => {
                local.push(incoming.clone());
                index.insert(key, local.len() - 1);
                outcome.added += 1;
            }
        }
    }

    outcome
}

/// One record per lookup key, in first-seen order, holding the last record
/// seen for that key
fn collapse_by_key<'a>(
    remote: &'a [Quote],
    deriver: &dyn LookupKeyDeriver,
) -> Vec<(String, &'a Quote)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut batch: Vec<(String, &Quote)> = Vec::with_capacity(remote.len());

    for quote in remote {
        let key = deriver.derive(&quote.text);
        match positions.get(&key) {
            Some(&pos) => batch[pos].1 = quote,
            None => {
                positions.insert(key.clone(), batch.len());
                batch.push((key, quote));
            }
        }
    }

    if batch.len() < remote.len() {
        tracing::debug!(
            "Collapsed {} remote quotes sharing lookup keys",
            remote.len() - batch.len()
        );
    }
    batch
}

/// Get a human-readable diff between the two sides of a conflict.
pub fn diff_preview(conflict: &Conflict) -> String {
    let local_text = with_trailing_newline(&conflict.local.text);
    let server_text = with_trailing_newline(&conflict.server.text);
    let diff = TextDiff::from_lines(&local_text, &server_text);

    let mut output = String::new();
    output.push_str("--- Local\n");
    output.push_str("+++ Server\n");

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push_str(sign);
        output.push_str(change.value());
    }

    if conflict.category_differs() {
        output.push_str(&format!(
            "category: {} -> {}\n",
            conflict.local.category, conflict.server.category
        ));
    }

    output
}

fn with_trailing_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup_key::Sha256KeyDeriver;

    #[test]
    fn test_category_disagreement_updates_and_logs() {
        let mut local = vec![Quote::new_local("Hi", "Motivation")];
        let remote = vec![Quote::from_server(1, "Hi", "Wisdom")];

        let outcome = merge_remote(&mut local, &remote, &Sha256KeyDeriver);

        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].category, "Wisdom");
        assert!(local[0].is_from_server());

        let conflict = &outcome.conflicts[0];
        assert_eq!(conflict.local.category, "Motivation");
        assert_eq!(conflict.server.category, "Wisdom");
        assert_eq!(conflict.lookup_key, Sha256KeyDeriver.derive("Hi"));
    }

    #[test]
    fn test_new_remote_quote_is_appended() {
        let mut local = vec![Quote::new_local("Hi", "Motivation")];
        let remote = vec![Quote::from_server(2, "Something else", "Server")];

        let outcome = merge_remote(&mut local, &remote, &Sha256KeyDeriver);

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.updated, 0);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(local.len(), 2);
        assert_eq!(local[1].id, "server-2");
    }

    #[test]
    fn test_exact_match_is_ignored() {
        let mut local = vec![Quote::new_local("Hi", "Wisdom")];
        let original_id = local[0].id.clone();
        let remote = vec![Quote::from_server(3, "Hi", "Wisdom")];

        let outcome = merge_remote(&mut local, &remote, &Sha256KeyDeriver);

        assert!(!outcome.changed());
        assert!(outcome.conflicts.is_empty());
        assert_eq!(local[0].id, original_id);
    }

    #[test]
    fn test_match_ignores_case_and_whitespace() {
        let mut local = vec![Quote::new_local("Hi there", "Wisdom")];
        let remote = vec![Quote::from_server(4, "  hi THERE ", "Wisdom")];

        let outcome = merge_remote(&mut local, &remote, &Sha256KeyDeriver);

        // Same key, different text: overwritten and logged
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.updated, 1);
        assert_eq!(local[0].text, "  hi THERE ");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut local = vec![
            Quote::new_local("Hi", "Motivation"),
            Quote::new_local("Keep going", "Life"),
        ];
        let remote = vec![
            Quote::from_server(1, "Hi", "Wisdom"),
            Quote::from_server(2, "Brand new", "Server"),
        ];

        let first = merge_remote(&mut local, &remote, &Sha256KeyDeriver);
        assert_eq!((first.added, first.updated), (1, 1));

        let second = merge_remote(&mut local, &remote, &Sha256KeyDeriver);
        assert_eq!((second.added, second.updated), (0, 0));
        assert!(second.conflicts.is_empty());
        assert_eq!(local.len(), 3);
    }

    #[test]
    fn test_duplicate_remote_keys_collapse_to_last() {
        let mut local = Vec::new();
        let remote = vec![
            Quote::from_server(1, "Hi", "A"),
            Quote::from_server(2, "Hi", "B"),
        ];

        let first = merge_remote(&mut local, &remote, &Sha256KeyDeriver);
        assert_eq!((first.added, first.updated), (1, 0));
        assert!(first.conflicts.is_empty());
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].category, "B");
        assert_eq!(local[0].id, "server-2");

        for _ in 0..2 {
            let again = merge_remote(&mut local, &remote, &Sha256KeyDeriver);
            assert_eq!((again.added, again.updated), (0, 0));
            assert!(again.conflicts.is_empty());
        }
        assert_eq!(local[0].category, "B");
    }

    #[test]
    fn test_duplicate_local_keys_use_first() {
        let mut local = vec![
            Quote::new_local("Hi", "A"),
            Quote::new_local("Hi", "B"),
        ];
        let remote = vec![Quote::from_server(1, "Hi", "C")];

        merge_remote(&mut local, &remote, &Sha256KeyDeriver);

        assert_eq!(local[0].category, "C");
        assert_eq!(local[1].category, "B");
    }

    #[test]
    fn test_diff_preview() {
        let conflict = Conflict::new(
            "k",
            Quote::new_local("line 1\nline 2", "Motivation"),
            Quote::from_server(1, "line 1\nline 2 modified", "Wisdom"),
        );

        let preview = diff_preview(&conflict);
        assert!(preview.contains("--- Local"));
        assert!(preview.contains("+++ Server"));
        assert!(preview.contains("-line 2\n"));
        assert!(preview.contains("+line 2 modified\n"));
        assert!(preview.contains("category: Motivation -> Wisdom"));
    }
}
