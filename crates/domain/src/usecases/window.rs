//! Date window selection over post streams

use futures::future;
use futures::stream::{BoxStream, Stream, StreamExt};
use time::{Date, Duration};

use crate::model::{FeedOrder, RawPost};

/// Which posts to process, by publication date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateWindow {
    /// Posts published today (UTC)
    #[default]
    Today,
    /// Posts from the last `n` calendar days, today included
    LastDays(u32),
    /// Explicit inclusive range; a missing side is open
    Between {
        start: Option<Date>,
        end: Option<Date>,
    },
    /// Every post
    Unbounded,
}

/// Resolved inclusive date bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBounds {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

impl DateBounds {
    pub fn contains(&self, date: Date) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }

    /// True when `date` is before the lower bound
    pub fn is_before(&self, date: Date) -> bool {
        self.start.is_some_and(|start| date < start)
    }
}

impl DateWindow {
    /// Resolve the window against the current UTC date; `None` means unbounded
    pub fn bounds(&self, today: Date) -> Option<DateBounds> {
        match *self {
            DateWindow::Today => Some(DateBounds {
                start: Some(today),
                end: Some(today),
            }),
            DateWindow::LastDays(days) => {
                let back = Duration::days(i64::from(days.saturating_sub(1)));
                Some(DateBounds {
                    start: Some(today.checked_sub(back).unwrap_or(Date::MIN)),
                    end: Some(today),
                })
            }
            DateWindow::Between { start, end } => Some(DateBounds { start, end }),
            DateWindow::Unbounded => None,
        }
    }
}

/// Filters a post sequence down to a date window
#[derive(Debug, Clone, Copy)]
pub struct WindowFilter {
    bounds: Option<DateBounds>,
}

impl WindowFilter {
    pub fn new(window: DateWindow, today: Date) -> Self {
        Self {
            bounds: window.bounds(today),
        }
    }

    /// Whether a single post falls inside the window
    pub fn contains(&self, post: &RawPost) -> bool {
        match self.bounds {
            None => true,
            Some(bounds) => post
                .published_date()
                .is_some_and(|date| bounds.contains(date)),
        }
    }

    /// True when a newest-first sequence can stop at this post
    fn ends_window(&self, post: &RawPost) -> bool {
        match (self.bounds, post.published_date()) {
            (Some(bounds), Some(date)) => bounds.is_before(date),
            _ => false,
        }
    }

    /// Apply the window to a stream, preserving order
    ///
    /// With [`FeedOrder::NewestFirst`] the stream stops being polled after
    /// the first post older than the window, so no further pages are fetched.
    /// Errors are passed through untouched.
    pub fn apply<'a, S, E>(self, posts: S, order: FeedOrder) -> BoxStream<'a, Result<RawPost, E>>
    where
        S: Stream<Item = Result<RawPost, E>> + Send + 'a,
        E: Send + 'a,
    {
        let keep = move |item: &Result<RawPost, E>| {
            let keep = match item {
                Ok(post) => self.contains(post),
                Err(_) => true,
            };
            future::ready(keep)
        };

        match order {
            FeedOrder::NewestFirst => posts
                .take_while(move |item| {
                    let more = match item {
                        Ok(post) => {
                            let ended = self.ends_window(post);
                            if ended {
                                tracing::debug!(
                                    published_at = %post.published_at,
                                    "Reached posts older than the window, stopping"
                                );
                            }
                            !ended
                        }
                        Err(_) => true,
                    };
                    future::ready(more)
                })
                .filter(keep)
                .boxed(),
            FeedOrder::Unordered => posts.filter(keep).boxed(),
        }
    }
}
