//! Bluesky (AT Protocol) adapters

mod read;

pub use read::{BlueskyPostSource, DEFAULT_SERVICE_URL, FeedOptions};

use async_trait::async_trait;
use poem_enricher_domain::{FeedPage, PostSource, PostSourceError};
use std::sync::Mutex;

/// Stub post source serving predefined pages in order
pub struct StubPostSource {
    pages: Vec<FeedPage>,
    requests: Mutex<Vec<Option<String>>>,
}

impl StubPostSource {
    /// Create an empty stub
    pub fn empty() -> Self {
        Self::with_pages(vec![])
    }

    /// Create a stub with predefined pages
    pub fn with_pages(pages: Vec<FeedPage>) -> Self {
        Self {
            pages,
            requests: Mutex::new(vec![]),
        }
    }

    /// Cursors of every page requested so far
    pub fn requested_cursors(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PostSource for StubPostSource {
    async fn fetch_page(
        &self,
        _account: &str,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<FeedPage, PostSourceError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|e| PostSourceError::Api(e.to_string()))?;
        let index = requests.len();
        requests.push(cursor.map(String::from));
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use poem_enricher_domain::RawPost;
    use poem_enricher_domain::usecases::FeedFetcher;

    fn post(cid: &str) -> RawPost {
        RawPost {
            content: "poem".to_string(),
            published_at: "2024-03-10T09:00:00Z".to_string(),
            tags: String::new(),
            uri: format!("at://did:plc:abc/app.bsky.feed.post/{}", cid),
            cid: cid.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stub_serves_pages_to_fetcher() {
        let source = StubPostSource::with_pages(vec![
            FeedPage {
                posts: vec![post("a"), post("b")],
                cursor: Some("c1".to_string()),
            },
            FeedPage {
                posts: vec![post("c")],
                cursor: None,
            },
        ]);

        let posts: Vec<RawPost> = FeedFetcher::new(&source, "poet", 2)
            .stream()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(posts.len(), 3);
        assert_eq!(
            source.requested_cursors(),
            vec![None, Some("c1".to_string())]
        );
    }
}
