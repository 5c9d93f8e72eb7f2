//! Input validation for QuoteCore.
//!
//! This module provides validation functions for all user inputs.
//! All validators return QuoteError::Validation on failure.

use crate::error::{QuoteError, QuoteResult};
use crate::models::Quote;

pub const MAX_QUOTE_TEXT_LENGTH: usize = 10_000;
pub const MAX_CATEGORY_LENGTH: usize = 100;

/// Validate quote text.
///
/// Text must be non-empty after trimming and no longer than
/// MAX_QUOTE_TEXT_LENGTH characters.
pub fn validate_quote_text(text: &str) -> QuoteResult<()> {
    let stripped = text.trim();

    if stripped.is_empty() {
        return Err(QuoteError::validation(
            "text",
            "cannot be empty or whitespace only",
        ));
    }

    let len = stripped.chars().count();
    if len > MAX_QUOTE_TEXT_LENGTH {
        return Err(QuoteError::validation(
            "text",
            format!(
                "cannot exceed {} characters (got {})",
                MAX_QUOTE_TEXT_LENGTH, len
            ),
        ));
    }

    Ok(())
}

/// Validate a category for a newly added quote.
///
/// Blank categories are rejected here; only imported and remote records fall
/// back to the default category.
pub fn validate_category(category: &str) -> QuoteResult<()> {
    let stripped = category.trim();

    if stripped.is_empty() {
        return Err(QuoteError::validation(
            "category",
            "cannot be empty or whitespace only",
        ));
    }

    let len = stripped.chars().count();
    if len > MAX_CATEGORY_LENGTH {
        return Err(QuoteError::validation(
            "category",
            format!(
                "cannot exceed {} characters (got {})",
                MAX_CATEGORY_LENGTH, len
            ),
        ));
    }

    Ok(())
}

/// Parse and validate an import payload.
///
/// The payload must be JSON whose top-level value is an array, and every
/// item must carry non-blank text. Nothing is returned unless the whole
/// payload is valid.
pub fn parse_import_payload(payload: &str) -> QuoteResult<Vec<Quote>> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
        QuoteError::validation("import", format!("payload is not valid JSON: {}", e))
    })?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => {
            return Err(QuoteError::validation(
                "import",
                "top-level value must be an array of quotes",
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(QuoteError::validation(
                    "import",
                    format!("item {}: expected an object", i),
                ));
            }
            let quote: Quote = serde_json::from_value(item).map_err(|e| {
                QuoteError::validation("import", format!("item {}: {}", i, e))
            })?;
            validate_quote_text(&quote.text).map_err(|_| {
                QuoteError::validation("import", format!("item {}: missing quote text", i))
            })?;
            Ok(quote)
        })
        .collect()
}
