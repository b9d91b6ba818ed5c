//! Remote collection collaborators.
//!
//! The sync engine only sees [`RemoteSource`]. [`SimulatedServer`] keeps the
//! collection in-process with injectable faults; [`HttpRemote`] and
//! [`PostsFeed`] talk JSON over HTTP.

mod http;
mod simulated;

use crate::config::{RemoteKind, SyncSettings};
use crate::error::Result;
use crate::models::{Quote, QuoteBody, Record, SERVER_CATEGORY};

pub use http::{posts_to_quotes, HttpRemote, PlaceholderPost, PostsFeed, POSTS_FEED_LIMIT};
pub use simulated::{FaultPlan, SimulatedServer};

/// Source of the remote collection (async)
#[allow(async_fn_in_trait)]
pub trait RemoteSource<P> {
    /// Fetch the full remote collection
    async fn fetch_collection(&self) -> Result<Vec<Record<P>>>;

    /// Replace the remote collection with `records`
    async fn push_collection(&self, records: &[Record<P>]) -> Result<()>;
}

impl<P, T: RemoteSource<P>> RemoteSource<P> for std::sync::Arc<T> {
    async fn fetch_collection(&self) -> Result<Vec<Record<P>>> {
        self.as_ref().fetch_collection().await
    }

    async fn push_collection(&self, records: &[Record<P>]) -> Result<()> {
        self.as_ref().push_collection(records).await
    }
}

/// Quote remote selected from [`SyncSettings`]
pub enum QuoteRemote {
    Simulated(SimulatedServer<QuoteBody>),
    Collection(HttpRemote<QuoteBody>),
    Posts(PostsFeed),
}

impl QuoteRemote {
    /// Build the remote described by `settings`.
    ///
    /// Without a `remote_url` this is a simulated server seeded with
    /// [`sample_server_quotes`].
    pub fn from_settings(settings: &SyncSettings) -> Result<Self> {
        let Some(url) = settings.remote_url.as_deref() else {
            tracing::debug!("No remote URL configured; using the simulated server");
            return Ok(Self::Simulated(SimulatedServer::new(sample_server_quotes())));
        };
        match settings.remote_kind {
            RemoteKind::Collection => Ok(Self::Collection(HttpRemote::new(url)?)),
            RemoteKind::Posts => Ok(Self::Posts(PostsFeed::new(url)?)),
        }
    }

    /// Short description for logs and status output
    pub fn describe(&self) -> String {
        match self {
            Self::Simulated(_) => "simulated server".to_string(),
            Self::Collection(remote) => remote.url().to_string(),
            Self::Posts(feed) => format!("{} (posts feed)", feed.base_url()),
        }
    }
}

impl RemoteSource<QuoteBody> for QuoteRemote {
    async fn fetch_collection(&self) -> Result<Vec<Quote>> {
        match self {
            Self::Simulated(server) => server.fetch_collection().await,
            Self::Collection(remote) => remote.fetch_collection().await,
            Self::Posts(feed) => feed.fetch_collection().await,
        }
    }

    async fn push_collection(&self, records: &[Quote]) -> Result<()> {
        match self {
            Self::Simulated(server) => server.push_collection(records).await,
            Self::Collection(remote) => remote.push_collection(records).await,
            Self::Posts(feed) => feed.push_collection(records).await,
        }
    }
}

/// Fixed collection served by the simulated server
pub fn sample_server_quotes() -> Vec<Quote> {
    const UPDATED_AT: i64 = 1_700_000_000_000;
    [
        (
            "server-1",
            "The best way to predict the future is to invent it.",
            "Alan Kay",
        ),
        (
            "server-2",
            "Simplicity is prerequisite for reliability.",
            "Edsger W. Dijkstra",
        ),
        (
            "server-3",
            "Programs must be written for people to read.",
            "Harold Abelson",
        ),
    ]
    .into_iter()
    .map(|(id, text, author)| {
        Record::new(
            id,
            QuoteBody::new(text, SERVER_CATEGORY).with_author(author),
            UPDATED_AT,
        )
    })
    .collect()
}
