//! HTTP remote collaborators

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::RemoteSource;
use crate::error::{Error, Result};
use crate::models::{Quote, QuoteBody, Record, RecordId, SERVER_CATEGORY};
use crate::util::{is_web_url, non_blank, now_millis};

const HTTP_TIMEOUT_SECS: u64 = 10;
const ERROR_BODY_LIMIT: usize = 180;

/// Number of posts kept from the posts feed
pub const POSTS_FEED_LIMIT: usize = 10;

/// Remote collection exchanged as a JSON array of wire records.
///
/// `GET {url}` returns the collection; `PUT {url}` replaces it.
pub struct HttpRemote<P> {
    url: String,
    client: reqwest::Client,
    _payload: PhantomData<fn() -> P>,
}

impl<P> HttpRemote<P> {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = normalize_endpoint(url.into())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            url,
            client,
            _payload: PhantomData,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl<P> RemoteSource<P> for HttpRemote<P>
where
    P: Serialize + DeserializeOwned,
{
    async fn fetch_collection(&self) -> Result<Vec<Record<P>>> {
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let body = read_success_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|error| Error::Fetch(format!("malformed collection response: {error}")))
    }

    async fn push_collection(&self, records: &[Record<P>]) -> Result<()> {
        let response = self.client.put(&self.url).json(records).send().await?;
        read_success_body(response).await?;
        Ok(())
    }
}

/// A post from a JSONPlaceholder-style `/posts` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderPost {
    pub id: u64,
    pub user_id: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Map the first [`POSTS_FEED_LIMIT`] posts to quotes stamped `fetched_at`.
pub fn posts_to_quotes(posts: &[PlaceholderPost], fetched_at: i64) -> Vec<Quote> {
    posts
        .iter()
        .take(POSTS_FEED_LIMIT)
        .map(|post| Record {
            id: RecordId::new(format!("server-{}", post.id)),
            payload: QuoteBody::new(post.title.clone(), SERVER_CATEGORY)
                .with_author(format!("User {}", post.user_id)),
            updated_at: fetched_at,
        })
        .collect()
}

/// Read-mostly remote backed by a JSONPlaceholder-style posts API.
///
/// Fetch maps posts to quotes. Push posts the collection and only checks that
/// the server accepted it; the feed does not persist writes.
pub struct PostsFeed {
    base_url: String,
    client: reqwest::Client,
}

impl PostsFeed {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }
}

impl RemoteSource<QuoteBody> for PostsFeed {
    async fn fetch_collection(&self) -> Result<Vec<Quote>> {
        let response = self
            .client
            .get(self.posts_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let body = read_success_body(response).await?;
        let posts: Vec<PlaceholderPost> = serde_json::from_str(&body)
            .map_err(|error| Error::Fetch(format!("malformed posts response: {error}")))?;
        Ok(posts_to_quotes(&posts, now_millis()))
    }

    async fn push_collection(&self, records: &[Quote]) -> Result<()> {
        let response = self
            .client
            .post(self.posts_url())
            .json(records)
            .send()
            .await?;
        read_success_body(response).await?;
        tracing::debug!("Posted {} quotes to {}", records.len(), self.base_url);
        Ok(())
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::Fetch(parse_api_error(status, &body)))
    }
}

fn parse_api_error(status: reqwest::StatusCode, body: &str) -> String {
    let snippet = body.trim().chars().take(ERROR_BODY_LIMIT).collect::<String>();
    if snippet.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{snippet} ({})", status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = non_blank(&raw)
        .ok_or_else(|| Error::InvalidInput("remote URL must not be empty".to_string()))?;
    if is_web_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "remote URL must be an http:// or https:// URL with a host".to_string(),
        ))
    }
}
