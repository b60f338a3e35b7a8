//! Feed pagination use case

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::{
    model::RawPost,
    ports::{PostSource, PostSourceError},
};

/// Largest page the source accepts
pub const MAX_PAGE_LIMIT: u32 = 100;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Turns a paginated [`PostSource`] into a lazy stream of posts
pub struct FeedFetcher<'a, S: PostSource + ?Sized> {
    source: &'a S,
    account: String,
    page_limit: u32,
}

impl<'a, S: PostSource + ?Sized> FeedFetcher<'a, S> {
    pub fn new(source: &'a S, account: impl Into<String>, page_limit: u32) -> Self {
        Self {
            source,
            account: account.into(),
            page_limit: page_limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    /// Stream posts newest first, fetching pages only as they are consumed
    ///
    /// Pagination ends when a page carries no cursor, or when a page hands
    /// back the cursor it was requested with. An empty page with a new cursor
    /// (e.g., a page of skipped reposts) is not the end of the feed.
    pub fn stream(&self) -> BoxStream<'_, Result<RawPost, PostSourceError>> {
        stream::try_unfold(Cursor::Start, move |cursor| async move {
            let cursor = match cursor {
                Cursor::Start => None,
                Cursor::Next(cursor) => Some(cursor),
                Cursor::Done => return Ok(None),
            };

            let page = self
                .source
                .fetch_page(&self.account, cursor.as_deref(), self.page_limit)
                .await?;

            tracing::info!(
                account = %self.account,
                count = page.posts.len(),
                has_cursor = page.cursor.is_some(),
                "Fetched page"
            );

            let next = match page.cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    tracing::warn!(cursor = %next, "Feed cursor did not advance, stopping");
                    Cursor::Done
                }
                Some(next) => Cursor::Next(next),
                None => Cursor::Done,
            };

            let posts = stream::iter(page.posts.into_iter().map(Ok::<_, PostSourceError>));
            Ok(Some((posts, next)))
        })
        .try_flatten()
        .boxed()
    }
}
