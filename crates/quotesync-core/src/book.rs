//! Quote book application state.
//!
//! A [`QuoteBook`] holds the quote collection and the selected category
//! filter. Clients load it, mutate it through its operations, and persist it.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};
use crate::models::{Quote, Settings, Side};
use crate::reconcile::{apply_resolution, find_duplicate_id, reconcile, Policy};
use crate::services::DatabaseService;
use crate::util::non_blank;

/// Filter value meaning "no filter"
pub const ALL_CATEGORIES: &str = "all";

/// Counts from merging an imported collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteBook {
    quotes: Vec<Quote>,
    filter: Option<String>,
}

impl QuoteBook {
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self {
            quotes,
            filter: None,
        }
    }

    /// Load quotes and the saved filter.
    pub async fn load(service: &DatabaseService) -> Result<Self> {
        let quotes = service.list_quotes(None).await?;
        let settings = service.load_settings().await?;
        Ok(Self {
            quotes,
            filter: settings.category_filter,
        })
    }

    /// Persist quotes and the filter.
    pub async fn persist(&self, service: &DatabaseService) -> Result<()> {
        service.replace_quotes(&self.quotes).await?;
        let settings = service.load_settings().await?;
        service
            .save_settings(&Settings {
                category_filter: self.filter.clone(),
                ..settings
            })
            .await
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

    /// Add a quote stamped now; text and category are trimmed and must not
    /// be empty.
    pub fn add_quote(&mut self, text: &str, category: &str) -> Result<&Quote> {
        self.add_quote_with_author(text, category, None)
    }

    /// Like [`QuoteBook::add_quote`], with an optional attribution
    pub fn add_quote_with_author(
        &mut self,
        text: &str,
        category: &str,
        author: Option<&str>,
    ) -> Result<&Quote> {
        let text = non_blank(text)
            .ok_or_else(|| Error::InvalidInput("quote text cannot be empty".to_string()))?;
        let category = non_blank(category)
            .ok_or_else(|| Error::InvalidInput("category cannot be empty".to_string()))?;

        let mut quote = Quote::create(text, category);
        quote.payload.author = author.and_then(non_blank);
        tracing::debug!("Added quote {}", quote.id);
        let index = self.quotes.len();
        self.quotes.push(quote);
        Ok(&self.quotes[index])
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> Vec<&str> {
        let mut categories = self
            .quotes
            .iter()
            .map(Quote::category)
            .collect::<Vec<_>>();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Select a category; `None`, blank, or [`ALL_CATEGORIES`] clears it.
    pub fn set_filter(&mut self, category: Option<&str>) {
        self.filter = category.and_then(non_blank)
            .filter(|category| !category.eq_ignore_ascii_case(ALL_CATEGORIES));
    }

    /// Quotes visible under the current filter
    pub fn filtered(&self) -> Vec<&Quote> {
        self.quotes
            .iter()
            .filter(|quote| {
                self.filter
                    .as_deref()
                    .map_or(true, |category| quote.in_category(category))
            })
            .collect()
    }

    /// Pick a random quote from the filtered view
    pub fn random_quote(&self, rng: &mut impl Rng) -> Option<&Quote> {
        self.filtered().choose(rng).copied()
    }

    /// Merge `imported` into the book, newest copy winning per id.
    ///
    /// Fails without changes when `imported` repeats an id.
    pub fn import(&mut self, imported: &[Quote]) -> Result<ImportSummary> {
        if let Some(id) = find_duplicate_id(imported) {
            return Err(Error::InvalidInput(format!(
                "import contains id '{id}' more than once"
            )));
        }

        let result = reconcile(&self.quotes, imported)?;
        let merged = apply_resolution(&self.quotes, &result, &Policy::PreferNewest)?;
        let summary = ImportSummary {
            added: merged.len() - self.quotes.len(),
            updated: result
                .conflicts
                .iter()
                .filter(|conflict| conflict.winner == Side::Remote)
                .count(),
            unchanged: result.unchanged.len(),
        };
        self.quotes = merged;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuoteBody, Record};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn quote(id: &str, text: &str, category: &str, updated_at: i64) -> Quote {
        Record::new(id, QuoteBody::new(text, category), updated_at)
    }

    fn book() -> QuoteBook {
        QuoteBook::new(vec![
            quote("a", "Stay hungry.", "Motivation", 10),
            quote("b", "Less is more.", "Design", 10),
            quote("c", "Keep going.", "Motivation", 10),
        ])
    }

    #[test]
    fn add_quote_trims_and_validates() {
        let mut book = QuoteBook::default();
        let added = book.add_quote("  Hello  ", " Greeting ").unwrap();
        assert_eq!(added.text(), "Hello");
        assert_eq!(added.category(), "Greeting");

        assert!(matches!(
            book.add_quote("   ", "x"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(book.add_quote("x", ""), Err(Error::InvalidInput(_))));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn add_quote_with_author_drops_blank_author() {
        let mut book = QuoteBook::default();
        let added = book
            .add_quote_with_author("Hello", "Greeting", Some(" Ada "))
            .unwrap();
        assert_eq!(added.payload.author.as_deref(), Some("Ada"));

        let added = book
            .add_quote_with_author("Hi", "Greeting", Some("  "))
            .unwrap();
        assert_eq!(added.payload.author, None);
    }

    #[test]
    fn categories_are_sorted_and_unique() {
        assert_eq!(book().categories(), vec!["Design", "Motivation"]);
    }

    #[test]
    fn filter_limits_view_and_all_clears_it() {
        let mut book = book();
        book.set_filter(Some("motivation"));
        assert_eq!(book.filter(), Some("motivation"));
        assert_eq!(book.filtered().len(), 2);

        book.set_filter(Some("All"));
        assert_eq!(book.filter(), None);
        assert_eq!(book.filtered().len(), 3);

        book.set_filter(Some("  "));
        assert_eq!(book.filter(), None);
    }

    #[test]
    fn random_quote_respects_filter() {
        let mut book = book();
        book.set_filter(Some("Design"));
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(book.random_quote(&mut rng).unwrap().id.as_str(), "b");
        }

        book.set_filter(Some("Nothing"));
        assert!(book.random_quote(&mut rng).is_none());
    }

    #[test]
    fn import_merges_newest_and_appends() {
        let mut book = book();
        let summary = book
            .import(&[
                quote("b", "Less, but better.", "Design", 20),
                quote("c", "Old text", "Motivation", 5),
                quote("a", "Stay hungry.", "Motivation", 10),
                quote("d", "New one", "Fresh", 1),
            ])
            .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                added: 1,
                updated: 1,
                unchanged: 1,
            }
        );
        let texts = book.quotes().iter().map(Quote::text).collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec!["Stay hungry.", "Less, but better.", "Keep going.", "New one"]
        );
    }

    #[test]
    fn import_rejects_duplicate_ids() {
        let mut book = book();
        let error = book
            .import(&[quote("x", "1", "a", 1), quote("x", "2", "a", 2)])
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert_eq!(book.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_and_persist_roundtrip() {
        let service = DatabaseService::open_in_memory().await.unwrap();
        let mut book = book();
        book.set_filter(Some("Design"));
        book.persist(&service).await.unwrap();

        let loaded = QuoteBook::load(&service).await.unwrap();
        assert_eq!(loaded, book);
    }
}
