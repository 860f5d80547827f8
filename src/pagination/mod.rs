//! Pagination handling for Coda list endpoints.
//!
//! List endpoints return a page of `items` and, when more results exist, a
//! `nextPageToken` to pass back as `pageToken`. [`paginate`] turns a page
//! fetcher into a lazy stream of items; the search helpers consume such a
//! stream and stop pulling pages as soon as they have enough matches.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::errors::CodaResult;

/// A page of results from a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The items in this page.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Token for the next page.
    #[serde(default)]
    pub next_page_token: Option<String>,
    /// Link to the next page.
    #[serde(default)]
    pub next_page_link: Option<String>,
    /// API link of this listing.
    #[serde(default)]
    pub href: Option<String>,
}

impl<T> Page<T> {
    /// Creates a new page.
    pub fn new(items: Vec<T>, next_page_token: Option<String>) -> Self {
        Self {
            items,
            next_page_token,
            next_page_link: None,
            href: None,
        }
    }

    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.next_page_token
            .as_deref()
            .map_or(false, |token| !token.is_empty())
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this page is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Streams every item across pages.
///
/// `fetch` receives the continuation token (`None` for the first page).
/// Pages are fetched only when the consumer asks for an item past the end of
/// the current page, so dropping the stream early avoids further requests.
pub fn paginate<T, F, Fut>(mut fetch: F) -> impl Stream<Item = CodaResult<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = CodaResult<Page<T>>>,
{
    async_stream::try_stream! {
        let mut token: Option<String> = None;
        loop {
            let page = fetch(token.take()).await?;
            let next = if page.has_next() { page.next_page_token } else { None };
            for item in page.items {
                yield item;
            }
            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
    }
}

/// Collects up to `limit` items matching `predicate`.
///
/// Stops pulling from the stream once `limit` matches are found. A `limit`
/// of zero returns immediately without consuming anything.
pub async fn find<T, S, P>(stream: S, limit: usize, mut predicate: P) -> CodaResult<Vec<T>>
where
    S: Stream<Item = CodaResult<T>>,
    P: FnMut(&T) -> bool,
{
    let mut found = Vec::new();
    if limit == 0 {
        return Ok(found);
    }

    futures::pin_mut!(stream);
    while let Some(item) = stream.next().await {
        let item = item?;
        if predicate(&item) {
            found.push(item);
            if found.len() >= limit {
                break;
            }
        }
    }

    Ok(found)
}

/// Returns the first item matching `predicate`.
pub async fn find_first<T, S, P>(stream: S, predicate: P) -> CodaResult<Option<T>>
where
    S: Stream<Item = CodaResult<T>>,
    P: FnMut(&T) -> bool,
{
    Ok(find(stream, 1, predicate).await?.into_iter().next())
}

/// Collects every item of the stream.
pub async fn collect_all<T, S>(stream: S) -> CodaResult<Vec<T>>
where
    S: Stream<Item = CodaResult<T>>,
{
    futures::TryStreamExt::try_collect(stream).await
}
