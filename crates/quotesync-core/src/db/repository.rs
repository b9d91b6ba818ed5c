//! Quote repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::{Error, Result};
use crate::models::{Quote, QuoteBody, RecordId, Side, SyncConflict};
use libsql::{params, Connection, Value};

/// Trait for quote storage operations (async)
#[allow(async_fn_in_trait)]
pub trait QuoteRepository {
    /// Append a quote to the collection
    async fn create(&self, quote: &Quote) -> Result<()>;

    /// Get a quote by ID
    async fn get(&self, id: &RecordId) -> Result<Option<Quote>>;

    /// List quotes in collection order, optionally filtered by category
    async fn list(&self, category: Option<&str>) -> Result<Vec<Quote>>;

    /// Categories with quote counts, alphabetically
    async fn categories(&self) -> Result<Vec<(String, usize)>>;

    /// Remove a quote
    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// Replace the whole collection in one transaction
    async fn replace_all(&self, quotes: &[Quote]) -> Result<()>;

    /// Append resolved conflicts to the resolution log
    async fn log_conflicts(&self, conflicts: &[SyncConflict]) -> Result<()>;

    /// Most recently resolved conflicts first
    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `QuoteRepository`
pub struct LibSqlQuoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQuoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_quote(row: &libsql::Row) -> Result<Quote> {
        let id: String = row.get(0)?;
        let author = match row.get_value(3)? {
            Value::Null => None,
            Value::Text(author) => Some(author),
            other => {
                return Err(Error::Database(format!(
                    "quote {id} has a non-text author column: {other:?}"
                )))
            }
        };
        Ok(Quote {
            id: RecordId::new(id),
            payload: QuoteBody {
                text: row.get(1)?,
                category: row.get(2)?,
                author,
            },
            updated_at: row.get(4)?,
        })
    }

    fn parse_conflict(row: &libsql::Row) -> Result<SyncConflict> {
        let id: i64 = row.get(0)?;
        let winner: String = row.get(4)?;
        let winner = winner.parse::<Side>().map_err(|_| {
            Error::Database(format!("sync conflict {id} has unknown winner '{winner}'"))
        })?;
        Ok(SyncConflict {
            id,
            quote_id: row.get(1)?,
            local_updated_at: row.get(2)?,
            remote_updated_at: row.get(3)?,
            winner,
            resolved_at: row.get(5)?,
            strategy: row.get(6)?,
        })
    }

    async fn next_position(&self) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT COALESCE(MAX(position), -1) + 1 FROM quotes", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }

    async fn insert(&self, quote: &Quote, position: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO quotes (id, text, category, author, updated_at, position)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    quote.id.as_str(),
                    quote.payload.text.as_str(),
                    quote.payload.category.as_str(),
                    quote.payload.author.clone().map_or(Value::Null, Value::Text),
                    quote.updated_at,
                    position
                ],
            )
            .await?;
        Ok(())
    }

    async fn collect_quotes(mut rows: libsql::Rows) -> Result<Vec<Quote>> {
        let mut quotes = Vec::new();
        while let Some(row) = rows.next().await? {
            quotes.push(Self::parse_quote(&row)?);
        }
        Ok(quotes)
    }
}

impl QuoteRepository for LibSqlQuoteRepository<'_> {
    async fn create(&self, quote: &Quote) -> Result<()> {
        if self.get(&quote.id).await?.is_some() {
            return Err(Error::InvalidInput(format!(
                "Quote id already exists: {}",
                quote.id
            )));
        }
        let position = self.next_position().await?;
        self.insert(quote, position).await
    }

    async fn get(&self, id: &RecordId) -> Result<Option<Quote>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, text, category, author, updated_at FROM quotes WHERE id = ?",
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_quote(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, category: Option<&str>) -> Result<Vec<Quote>> {
        let rows = if let Some(category) = category {
            self.conn
                .query(
                    "SELECT id, text, category, author, updated_at FROM quotes
                     WHERE category = ? COLLATE NOCASE
                     ORDER BY position ASC",
                    [category.trim()],
                )
                .await?
        } else {
            self.conn
                .query(
                    "SELECT id, text, category, author, updated_at FROM quotes
                     ORDER BY position ASC",
                    (),
                )
                .await?
        };

        Self::collect_quotes(rows).await
    }

    async fn categories(&self) -> Result<Vec<(String, usize)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT category, COUNT(*) FROM quotes
                 GROUP BY category COLLATE NOCASE
                 ORDER BY category COLLATE NOCASE ASC",
                (),
            )
            .await?;

        let mut categories = Vec::new();
        while let Some(row) = rows.next().await? {
            let name: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            categories.push((name, usize::try_from(count).unwrap_or_default()));
        }
        Ok(categories)
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM quotes WHERE id = ?", [id.as_str()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn replace_all(&self, quotes: &[Quote]) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        let outcome = async {
            self.conn.execute("DELETE FROM quotes", ()).await?;
            for (position, quote) in quotes.iter().enumerate() {
                self.insert(quote, position as i64).await?;
            }
            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = outcome {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(())
    }

    async fn log_conflicts(&self, conflicts: &[SyncConflict]) -> Result<()> {
        for conflict in conflicts {
            self.conn
                .execute(
                    "INSERT INTO sync_conflicts (
                        quote_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy
                     ) VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        conflict.quote_id.as_str(),
                        conflict.local_updated_at,
                        conflict.remote_updated_at,
                        conflict.winner.as_str(),
                        conflict.resolved_at,
                        conflict.strategy.as_str()
                    ],
                )
                .await?;
        }
        Ok(())
    }

    async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, quote_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                [limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(Self::parse_conflict(&row)?);
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::Record;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn quote(id: &str, text: &str, category: &str, updated_at: i64) -> Quote {
        Record::new(id, QuoteBody::new(text, category), updated_at)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        let created = Quote::create("Be curious", "wisdom");
        repo.create(&created).await.unwrap();

        let fetched = repo.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_existing_id() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        let created = quote("a", "One", "misc", 1);
        repo.create(&created).await.unwrap();
        assert!(repo.create(&created).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_author_round_trips() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        let mut attributed = quote("a", "Hello", "misc", 1);
        attributed.payload.author = Some("User 1".to_string());
        repo.create(&attributed).await.unwrap();

        let fetched = repo.get(&attributed.id).await.unwrap().unwrap();
        assert_eq!(fetched.payload.author.as_deref(), Some("User 1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_keeps_insertion_order_and_filters() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        repo.create(&quote("c", "Third", "humor", 3)).await.unwrap();
        repo.create(&quote("a", "First", "wisdom", 1)).await.unwrap();
        repo.create(&quote("b", "Second", "Humor", 2)).await.unwrap();

        let all = repo.list(None).await.unwrap();
        let ids = all.iter().map(|q| q.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let humor = repo.list(Some("humor")).await.unwrap();
        assert_eq!(humor.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_categories_counts() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        repo.create(&quote("a", "1", "wisdom", 1)).await.unwrap();
        repo.create(&quote("b", "2", "humor", 1)).await.unwrap();
        repo.create(&quote("c", "3", "humor", 1)).await.unwrap();

        let categories = repo.categories().await.unwrap();
        assert_eq!(
            categories,
            vec![("humor".to_string(), 2), ("wisdom".to_string(), 1)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        repo.create(&quote("a", "1", "wisdom", 1)).await.unwrap();
        repo.delete(&RecordId::new("a")).await.unwrap();

        assert!(repo.get(&RecordId::new("a")).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&RecordId::new("a")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_all() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        repo.create(&quote("old", "gone", "misc", 1)).await.unwrap();

        let replacement = vec![quote("b", "B", "misc", 2), quote("a", "A", "misc", 1)];
        repo.replace_all(&replacement).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap(), replacement);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_all_is_atomic() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        let original = vec![quote("keep", "K", "misc", 1)];
        repo.replace_all(&original).await.unwrap();

        // Duplicate primary key aborts the transaction
        let broken = vec![quote("x", "1", "misc", 1), quote("x", "2", "misc", 1)];
        assert!(repo.replace_all(&broken).await.is_err());

        assert_eq!(repo.list(None).await.unwrap(), original);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_author_survives_save_and_resync() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        let mut blank = quote("server-1", "Hello", "server", 1);
        blank.payload.author = Some(String::new());
        let remote = vec![blank, quote("server-2", "Bye", "server", 1)];
        repo.replace_all(&remote).await.unwrap();

        let loaded = repo.list(None).await.unwrap();
        assert_eq!(loaded, remote);

        let result = crate::reconcile::reconcile(&loaded, &remote).unwrap();
        assert!(result.conflicts.is_empty());
        assert_eq!(result.unchanged.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_winner_is_a_database_error() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());
        db.connection()
            .execute(
                "INSERT INTO sync_conflicts (
                    quote_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy
                 ) VALUES ('a', 1, 2, 'sideways', 3, 'newest')",
                (),
            )
            .await
            .unwrap();

        let error = repo.list_conflicts(10).await.unwrap_err();
        assert!(matches!(error, Error::Database(ref message) if message.contains("sideways")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_log_and_list_conflicts() {
        let db = setup().await;
        let repo = LibSqlQuoteRepository::new(db.connection());

        let logged = vec![
            SyncConflict {
                id: 0,
                quote_id: "a".to_string(),
                local_updated_at: 100,
                remote_updated_at: 200,
                winner: Side::Remote,
                resolved_at: 1_000,
                strategy: "newest".to_string(),
            },
            SyncConflict {
                id: 0,
                quote_id: "b".to_string(),
                local_updated_at: 300,
                remote_updated_at: 200,
                winner: Side::Local,
                resolved_at: 2_000,
                strategy: "manual".to_string(),
            },
        ];
        repo.log_conflicts(&logged).await.unwrap();

        let listed = repo.list_conflicts(10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].quote_id, "b");
        assert_eq!(listed[0].winner, Side::Local);
        assert_eq!(listed[1].strategy, "newest");

        assert_eq!(repo.list_conflicts(1).await.unwrap().len(), 1);
    }
}
