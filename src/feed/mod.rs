pub mod extract;
pub mod innertube;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use types::Page;

pub use extract::extract_items;

/// Remote side of a paginated feed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Fetch the page that follows `page`.
    async fn continuation(&self, page: &Page) -> Result<Page>;
}

/// Produces the first page of a particular feed (home, trending, a channel
/// tab, ...) from a client.
#[async_trait]
pub trait FirstPage<C: ?Sized>: Send + Sync {
    async fn first_page(&self, client: &C) -> Result<Page>;
}
