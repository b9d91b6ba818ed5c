//! Quote model

use serde::{Deserialize, Serialize};

use super::record::{Record, RecordId};

/// Category used for quotes mapped from the remote posts feed
pub const SERVER_CATEGORY: &str = "server";

/// Synchronized content of a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteBody {
    /// Quote text
    pub text: String,
    /// Category used for filtering
    pub category: String,
    /// Optional attribution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl QuoteBody {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            author: None,
        }
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// A quote as stored locally and exchanged with the server
pub type Quote = Record<QuoteBody>;

impl Record<QuoteBody> {
    /// Create a new quote with a fresh id, stamped now
    #[must_use]
    pub fn create(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            payload: QuoteBody::new(text, category),
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn text(&self) -> &str {
        &self.payload.text
    }

    pub fn category(&self) -> &str {
        &self.payload.category
    }

    /// Whether this quote belongs to `category` (case-insensitive)
    pub fn in_category(&self, category: &str) -> bool {
        self.payload.category.eq_ignore_ascii_case(category.trim())
    }

    /// Get first line as a preview, truncated to `max_len` characters
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.payload
            .text
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_create() {
        let quote = Quote::create("Stay hungry", "motivation");
        assert_eq!(quote.text(), "Stay hungry");
        assert_eq!(quote.category(), "motivation");
        assert!(quote.updated_at > 0);
        assert!(quote.payload.author.is_none());
    }

    #[test]
    fn test_in_category_ignores_case() {
        let quote = Quote::create("Keep going", "Motivation");
        assert!(quote.in_category("motivation"));
        assert!(quote.in_category(" MOTIVATION "));
        assert!(!quote.in_category("humor"));
    }

    #[test]
    fn test_preview() {
        let quote = Quote::create("First line\nSecond line", "misc");
        assert_eq!(quote.preview(50), "First line");
        assert_eq!(quote.preview(5), "First");
    }

    #[test]
    fn test_author_omitted_from_json_when_absent() {
        let body = QuoteBody::new("Hi", "misc");
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("author"));

        let with_author = body.with_author("Ada");
        let json = serde_json::to_string(&with_author).unwrap();
        assert!(json.contains("\"author\":\"Ada\""));
    }
}
