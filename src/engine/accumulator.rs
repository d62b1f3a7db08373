use crate::config::FeedConfig;
use crate::feed::extract_items;
use crate::feed::types::{ContentContainer, Item, Page};
use crate::feed::{FeedClient, FirstPage};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;

/// Everything a consumer renders from.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub current_page: Option<Page>,
    pub items: Vec<Item>,
    /// Bumped on every change to `items`.
    pub revision: u64,
}

/// What a fetch attempt did. Failures are logged, never returned as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Initial page stored with this many items.
    Loaded(usize),
    /// Continuation page appended with this many items.
    Appended(usize),
    AlreadyActivated,
    NoFeed,
    NoContinuation,
    InFlight,
    Inactive,
    Failed,
    /// Result arrived after `deactivate` or `set_current_page` and was dropped.
    Discarded,
}

/// Clears the in-flight flag when the fetch finishes or its future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ordered list of feed items built up from successive pages.
pub struct FeedAccumulator<C, F> {
    client: C,
    first_page: F,
    config: FeedConfig,
    state: watch::Sender<FeedState>,
    active: watch::Sender<bool>,
    activated: AtomicBool,
    in_flight: AtomicBool,
    generation: AtomicU64,
}

impl<C, F> FeedAccumulator<C, F>
where
    C: FeedClient,
    F: FirstPage<C>,
{
    pub fn new(client: C, first_page: F, config: FeedConfig) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        let (active, _) = watch::channel(true);
        Self {
            client,
            first_page,
            config,
            state,
            active,
            activated: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Change notifications: a new value is published on every state change.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<Item> {
        self.state.borrow().items.clone()
    }

    pub fn item_count(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn current_page(&self) -> Option<Page> {
        self.state.borrow().current_page.clone()
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    fn begin_fetch(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    /// Fetch the first page. Only the first call on an accumulator does any
    /// work.
    pub async fn activate(&self) -> FetchOutcome {
        if self.activated.swap(true, Ordering::AcqRel) {
            tracing::debug!("initial fetch already issued");
            return FetchOutcome::AlreadyActivated;
        }
        if !self.is_active() {
            return FetchOutcome::Inactive;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let page = match self.first_page.first_page(&self.client).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "initial feed fetch failed");
                return FetchOutcome::Failed;
            }
        };

        tracing::debug!(kind = page.content_container().tag(), "result fetched");
        let items = extract_items(page.content_container());
        let count = items.len();

        let applied = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            s.items = items;
            s.current_page = Some(page);
            s.revision += 1;
            true
        });
        if applied {
            FetchOutcome::Loaded(count)
        } else {
            tracing::debug!("discarding stale initial page");
            FetchOutcome::Discarded
        }
    }

    /// Take in a container fetched elsewhere (e.g. a tab switch). With
    /// `reset` the current items are replaced, otherwise appended to.
    pub fn content_fetched(&self, container: &ContentContainer, reset: bool) {
        if !self.is_active() {
            tracing::debug!("ignoring pushed content after deactivation");
            return;
        }
        let extracted = extract_items(container);
        self.state.send_modify(|s| {
            if reset {
                s.items = extracted;
            } else {
                s.items.extend(extracted);
            }
            s.revision += 1;
        });
    }

    /// Swap in a different page, e.g. when switching feed source. Items are
    /// kept; any fetch still in flight is invalidated.
    pub fn set_current_page(&self, page: Page) {
        if !self.is_active() {
            tracing::debug!("ignoring page switch after deactivation");
            return;
        }
        self.state.send_modify(|s| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            s.current_page = Some(page);
        });
    }

    /// Request the continuation of the current page and append its items.
    pub async fn fetch_more(&self) -> FetchOutcome {
        tracing::debug!("fetch more");
        if !self.is_active() {
            return FetchOutcome::Inactive;
        }

        // Page is read under the guard so two callers can't both fetch the
        // same continuation.
        let Some(_guard) = self.begin_fetch() else {
            tracing::debug!("fetch already in flight");
            return FetchOutcome::InFlight;
        };

        let generation = self.generation.load(Ordering::Acquire);
        let page = match self.current_page() {
            None => {
                tracing::warn!("no feed available");
                return FetchOutcome::NoFeed;
            }
            Some(page) if !page.has_continuation() => {
                tracing::warn!("no continuation available");
                return FetchOutcome::NoContinuation;
            }
            Some(page) => page,
        };

        let next = match self.client.continuation(&page).await {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(error = %e, "continuation fetch failed");
                return FetchOutcome::Failed;
            }
        };

        tracing::debug!(kind = next.content_container().tag(), "feed content");
        let new_items = extract_items(next.content_container());
        let count = new_items.len();

        let applied = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            if count > 0 {
                s.items.extend(new_items);
                s.revision += 1;
            }
            s.current_page = Some(next);
            true
        });
        if applied {
            FetchOutcome::Appended(count)
        } else {
            tracing::debug!("discarding stale continuation");
            FetchOutcome::Discarded
        }
    }

    fn needs_more(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        let state = self.state.borrow();
        state.items.len() < self.config.min_items
            && state
                .current_page
                .as_ref()
                .is_some_and(Page::has_continuation)
    }

    /// Page forward until `min_items` are held, the feed runs out, or a
    /// fetch does not append. Returns the number of pages appended.
    pub async fn settle(&self) -> usize {
        let mut fetched = 0;
        while self.needs_more() {
            if fetched >= self.config.max_auto_fetches {
                tracing::warn!(
                    pages = fetched,
                    items = self.item_count(),
                    "auto-pagination cap reached"
                );
                break;
            }
            match self.fetch_more().await {
                FetchOutcome::Appended(_) => fetched += 1,
                _ => break,
            }
        }
        if fetched > 0 {
            tracing::debug!(pages = fetched, items = self.item_count(), "feed settled");
        }
        fetched
    }

    /// Re-run `settle` on every state change until `deactivate` is called.
    pub async fn run(&self) {
        let mut state_rx = self.state.subscribe();
        let mut active_rx = self.active.subscribe();
        loop {
            if !self.is_active() {
                break;
            }
            // Mark seen before settling: anything that lands while a fetch is
            // out must trigger another pass.
            let _ = state_rx.borrow_and_update();
            self.settle().await;

            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = active_rx.changed() => {
                    if changed.is_err() || !self.is_active() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("feed driver stopped");
    }

    /// Tear down: results of fetches still in flight are dropped and further
    /// operations are no-ops.
    pub fn deactivate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.active.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::types::ContinuationToken;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn grid(prefix: &str, n: usize) -> ContentContainer {
        let contents = (0..n)
            .map(|i| Item::from(json!({ "type": "RichItem", "id": format!("{}{}", prefix, i) })))
            .collect();
        ContentContainer::RichGrid { contents }
    }

    fn page(prefix: &str, n: usize, more: bool) -> Page {
        let token = more.then(|| ContinuationToken(format!("after-{}", prefix)));
        Page::new(grid(prefix, n), token)
    }

    /// Serves pages from a queue; the first pop answers the initial fetch.
    struct ScriptedClient {
        pages: Mutex<VecDeque<Result<Page>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(pages: Vec<Result<Page>>) -> Self {
            Self { pages: Mutex::new(pages.into()), calls: AtomicUsize::new(0) }
        }

        fn next(&self) -> Result<Page> {
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedClient for ScriptedClient {
        async fn continuation(&self, _page: &Page) -> Result<Page> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.next()
        }
    }

    struct Start;

    #[async_trait]
    impl FirstPage<ScriptedClient> for Start {
        async fn first_page(&self, client: &ScriptedClient) -> Result<Page> {
            client.next()
        }
    }

    fn accumulator(pages: Vec<Result<Page>>) -> FeedAccumulator<ScriptedClient, Start> {
        FeedAccumulator::new(ScriptedClient::new(pages), Start, FeedConfig::default())
    }

    fn ids(items: &[Item]) -> Vec<String> {
        items.iter().map(|i| i.payload["id"].as_str().unwrap().to_string()).collect()
    }

    #[tokio::test]
    async fn test_activate_loads_first_page() {
        let acc = accumulator(vec![Ok(page("a", 3, true))]);
        assert_eq!(acc.activate().await, FetchOutcome::Loaded(3));
        assert_eq!(ids(&acc.items()), vec!["a0", "a1", "a2"]);
        assert_eq!(acc.current_page(), Some(page("a", 3, true)));
        assert_eq!(acc.client().calls(), 0);
    }

    #[tokio::test]
    async fn test_activate_fires_once() {
        let acc = accumulator(vec![Ok(page("a", 1, false)), Ok(page("b", 1, false))]);
        acc.activate().await;
        assert_eq!(acc.activate().await, FetchOutcome::AlreadyActivated);
        assert_eq!(ids(&acc.items()), vec!["a0"]);
    }

    #[tokio::test]
    async fn test_failed_activation_leaves_state_empty() {
        let acc = accumulator(vec![Err(anyhow::anyhow!("offline"))]);
        assert_eq!(acc.activate().await, FetchOutcome::Failed);
        assert!(acc.items().is_empty());
        assert!(acc.current_page().is_none());
    }

    #[tokio::test]
    async fn test_fetch_more_appends_in_order() {
        let acc = accumulator(vec![Ok(page("a", 2, true)), Ok(page("b", 2, false))]);
        acc.activate().await;
        assert_eq!(acc.fetch_more().await, FetchOutcome::Appended(2));
        assert_eq!(ids(&acc.items()), vec!["a0", "a1", "b0", "b1"]);
        assert_eq!(acc.current_page(), Some(page("b", 2, false)));
    }

    #[tokio::test]
    async fn test_fetch_more_without_page_is_noop() {
        let acc = accumulator(vec![]);
        assert_eq!(acc.fetch_more().await, FetchOutcome::NoFeed);
        assert_eq!(acc.client().calls(), 0);
        assert!(acc.items().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_more_without_continuation_is_noop() {
        let acc = accumulator(vec![Ok(page("a", 2, false))]);
        acc.activate().await;
        let before = acc.snapshot();
        assert_eq!(acc.fetch_more().await, FetchOutcome::NoContinuation);
        assert_eq!(acc.client().calls(), 0);
        assert_eq!(acc.items(), before.items);
        assert_eq!(acc.current_page(), before.current_page);
    }

    #[tokio::test]
    async fn test_failed_continuation_leaves_state_untouched() {
        let acc = accumulator(vec![Ok(page("a", 2, true)), Err(anyhow::anyhow!("503"))]);
        acc.activate().await;
        let before = acc.snapshot();
        assert_eq!(acc.fetch_more().await, FetchOutcome::Failed);
        let after = acc.snapshot();
        assert_eq!(after.items, before.items);
        assert_eq!(after.current_page, before.current_page);
        assert_eq!(after.revision, before.revision);
    }

    #[tokio::test]
    async fn test_content_fetched_append_and_reset() {
        let acc = accumulator(vec![Ok(page("a", 2, false))]);
        acc.activate().await;

        acc.content_fetched(&grid("t", 1), false);
        assert_eq!(ids(&acc.items()), vec!["a0", "a1", "t0"]);

        acc.content_fetched(&grid("r", 2), true);
        assert_eq!(ids(&acc.items()), vec!["r0", "r1"]);
        assert_eq!(acc.current_page(), Some(page("a", 2, false)));
    }

    #[tokio::test]
    async fn test_content_fetched_unknown_shape() {
        let acc = accumulator(vec![Ok(page("a", 2, false))]);
        acc.activate().await;
        acc.content_fetched(&ContentContainer::Unknown { tag: "Playlist".into() }, false);
        assert_eq!(acc.item_count(), 2);
        acc.content_fetched(&ContentContainer::Unknown { tag: "Playlist".into() }, true);
        assert_eq!(acc.item_count(), 0);
    }

    #[tokio::test]
    async fn test_settle_converges_on_threshold() {
        let acc = accumulator(vec![
            Ok(page("a", 3, true)),
            Ok(page("b", 3, true)),
            Ok(page("c", 3, true)),
            Ok(page("d", 2, false)),
        ]);
        acc.activate().await;
        assert_eq!(acc.settle().await, 3);
        assert_eq!(acc.item_count(), 11);
        assert_eq!(acc.client().calls(), 3);

        // Nothing left to do.
        assert_eq!(acc.settle().await, 0);
        assert_eq!(acc.client().calls(), 3);
    }

    #[tokio::test]
    async fn test_settle_stops_when_threshold_met() {
        let acc = accumulator(vec![Ok(page("a", 6, true)), Ok(page("b", 6, true))]);
        acc.activate().await;
        assert_eq!(acc.settle().await, 1);
        assert_eq!(acc.item_count(), 12);
        assert!(acc.current_page().unwrap().has_continuation());
    }

    #[tokio::test]
    async fn test_settle_stops_on_failure() {
        let acc = accumulator(vec![Ok(page("a", 3, true)), Err(anyhow::anyhow!("timeout"))]);
        acc.activate().await;
        assert_eq!(acc.settle().await, 0);
        assert_eq!(acc.item_count(), 3);
        assert_eq!(acc.client().calls(), 1);
    }

    #[tokio::test]
    async fn test_settle_is_capped_on_empty_pages() {
        let pages = (0..10).map(|i| Ok(page(&format!("e{}", i), 0, true))).collect();
        let config = FeedConfig { max_auto_fetches: 4, ..FeedConfig::default() };
        let acc = FeedAccumulator::new(ScriptedClient::new(pages), Start, config);
        acc.activate().await;
        assert_eq!(acc.settle().await, 4);
        assert_eq!(acc.client().calls(), 4);
        assert_eq!(acc.item_count(), 0);
    }

    #[tokio::test]
    async fn test_set_current_page_redirects_pagination() {
        let acc = accumulator(vec![Ok(page("a", 2, false)), Ok(page("n", 3, false))]);
        acc.activate().await;
        assert_eq!(acc.fetch_more().await, FetchOutcome::NoContinuation);

        acc.set_current_page(page("other", 0, true));
        assert_eq!(acc.fetch_more().await, FetchOutcome::Appended(3));
        assert_eq!(ids(&acc.items()), vec!["a0", "a1", "n0", "n1", "n2"]);
    }

    #[tokio::test]
    async fn test_deactivated_accumulator_is_inert() {
        let acc = accumulator(vec![Ok(page("a", 2, true))]);
        acc.activate().await;
        acc.deactivate();
        assert_eq!(acc.fetch_more().await, FetchOutcome::Inactive);
        acc.content_fetched(&grid("t", 3), false);
        assert_eq!(acc.item_count(), 2);
        assert_eq!(acc.settle().await, 0);
        assert_eq!(acc.client().calls(), 0);
    }

    #[tokio::test]
    async fn test_page_switch_after_deactivation_is_ignored() {
        let acc = accumulator(vec![Ok(page("a", 2, false))]);
        acc.activate().await;
        let before = acc.snapshot();
        acc.deactivate();
        acc.set_current_page(page("other", 1, true));
        assert_eq!(acc.current_page(), before.current_page);
        assert_eq!(acc.fetch_more().await, FetchOutcome::Inactive);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let acc = accumulator(vec![Ok(page("a", 2, false))]);
        let mut rx = acc.subscribe();
        acc.activate().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().items.len(), 2);
        acc.content_fetched(&grid("t", 1), false);
        assert!(rx.has_changed().unwrap());
    }
}
