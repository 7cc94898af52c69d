//! Paginated collection query controller
//!
//! Owns the filter terms, sort and pagination of one table, keeps them in sync
//! with a location string and drives fetches through a [`CollectionClient`].
//!
//! The controller is driven from a single task: operations mutate state and
//! dispatch fetches synchronously, while quiet-period expiries and fetch
//! completions arrive on an internal channel and are applied by
//! [`CollectionController::next_update`].

use crate::client::CollectionClient;
use crate::error::{CoreError, CoreResult, DefaultErrorLogger, ErrorContext, ErrorLogger};
use crate::filter::{FilterSet, Operator};
use crate::models::{find_column, Column, PageResult};
use crate::paging::Pagination;
use crate::query::PageQuery;
use crate::scheduler::{Debouncer, FetchTicket, FetchTracker};
use crate::sort::{SortSpec, SortState};
use crate::url;
use expensedesk_config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default path the location is built on
pub const DEFAULT_PATH: &str = "/expenses";

/// Construction parameters of a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub path: String,
    pub default_page_size: u32,
    /// Quiet period before a filter edit is committed
    pub debounce: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            default_page_size: 5,
            debounce: Duration::from_millis(500),
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            default_page_size: config.pagination.default_page_size,
            debounce: Duration::from_millis(config.filter.debounce_ms),
        }
    }
}

/// Messages the controller's own timers and fetch tasks send back to it
#[derive(Debug)]
enum ControllerEvent<R> {
    QuietPeriodElapsed(u64),
    FetchResolved {
        ticket: FetchTicket,
        result: CoreResult<PageResult<R>>,
    },
}

/// What changed after an event was applied
#[derive(Debug, Clone, PartialEq)]
pub enum TableUpdate {
    /// A filter edit survived the quiet period and was committed
    FilterCommitted { filter: Option<String> },
    /// The quiet period ended but the expression did not change
    FilterUnchanged,
    /// A fetch for the current query was applied
    Loaded { query: PageQuery },
    /// A superseded fetch resolved and was dropped
    Discarded { seq: u64 },
    /// The fetch for the current query failed; the previous page stays
    FetchFailed(CoreError),
}

pub struct CollectionController<C: CollectionClient> {
    client: Arc<C>,
    columns: &'static [Column],
    options: ControllerOptions,

    /// Terms as currently typed
    filters: FilterSet,
    /// Expression of the last committed terms
    committed_filter: Option<String>,
    sort: SortState,
    paging: Pagination,

    debouncer: Debouncer,
    tracker: FetchTracker,
    events_tx: mpsc::UnboundedSender<ControllerEvent<C::Record>>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent<C::Record>>,

    result: PageResult<C::Record>,
    last_error: Option<CoreError>,
    logger: Box<dyn ErrorLogger + Send + Sync>,
}

/// State restored from a location
struct Hydrated {
    filters: FilterSet,
    sort: Option<SortSpec>,
    page: u32,
    size: u32,
}

fn hydrate(columns: &[Column], location: &str, default_size: u32) -> Hydrated {
    let query = url::parse_query_string(location, default_size);
    let filters = match &query.filter {
        Some(expression) => FilterSet::hydrate(columns, expression),
        None => FilterSet::new(columns),
    };
    let sort = query.sort.filter(|spec| {
        let known = find_column(columns, &spec.column).is_some();
        if !known {
            log::warn!("Ignoring sort on unknown column '{}' from location", spec.column);
        }
        known
    });
    Hydrated {
        filters,
        sort,
        page: query.page,
        size: query.size,
    }
}

impl<C> CollectionController<C>
where
    C: CollectionClient + 'static,
{
    /// Hydrate from `location` and dispatch the initial fetch
    ///
    /// Must be called inside a tokio runtime.
    pub fn mount(
        client: Arc<C>,
        columns: &'static [Column],
        options: ControllerOptions,
        location: &str,
    ) -> CoreResult<Self> {
        let state = hydrate(columns, location, options.default_page_size);
        let paging = Pagination::new(state.page, state.size)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut controller = Self {
            client,
            columns,
            committed_filter: state.filters.serialize(),
            filters: state.filters,
            sort: SortState::new(state.sort),
            paging,
            debouncer: Debouncer::new(options.debounce),
            tracker: FetchTracker::new(),
            events_tx,
            events_rx,
            result: PageResult::empty(state.size),
            last_error: None,
            logger: Box::new(DefaultErrorLogger),
            options,
        };
        log::debug!("Mounted at {}", controller.location());
        controller.dispatch(false);
        Ok(controller)
    }

    /// Replace the error logger
    pub fn with_logger(mut self, logger: Box<dyn ErrorLogger + Send + Sync>) -> Self {
        self.logger = logger;
        self
    }

    // ==================== State ====================

    pub fn columns(&self) -> &'static [Column] {
        self.columns
    }

    /// Terms as currently typed, committed or not
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn committed_filter(&self) -> Option<&str> {
        self.committed_filter.as_deref()
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn pagination(&self) -> Pagination {
        self.paging
    }

    pub fn default_page_size(&self) -> u32 {
        self.options.default_page_size
    }

    /// Last applied page
    pub fn page_result(&self) -> &PageResult<C::Record> {
        &self.result
    }

    pub fn rows(&self) -> &[C::Record] {
        &self.result.rows
    }

    /// Failure of the latest fetch for the current query, cleared on the next success
    pub fn last_error(&self) -> Option<&CoreError> {
        self.last_error.as_ref()
    }

    /// True while a fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.tracker.in_flight() > 0
    }

    /// True when no quiet period runs and no fetch is in flight
    pub fn is_idle(&self) -> bool {
        !self.debouncer.is_pending() && self.tracker.in_flight() == 0
    }

    /// The request the table currently wants to show
    pub fn page_query(&self) -> PageQuery {
        PageQuery::new(self.paging.page(), self.paging.size())
            .with_sort(self.sort.active().cloned())
            .with_filter(self.committed_filter.clone())
    }

    /// Canonical query string of the current state
    pub fn query_string(&self) -> String {
        url::to_query_string(&self.page_query(), self.options.default_page_size)
    }

    /// Canonical location of the current state
    pub fn location(&self) -> String {
        url::to_location(&self.options.path, &self.page_query(), self.options.default_page_size)
    }

    // ==================== Operations ====================

    /// Edit one filter term; the change is committed after the quiet period
    pub fn edit_filter(
        &mut self,
        column: &str,
        operator: Option<Operator>,
        value: Option<&str>,
    ) -> CoreResult<()> {
        self.filters.set_term(column, operator, value)?;
        self.restart_quiet_period();
        Ok(())
    }

    /// Reset every term; committed after the quiet period like any edit
    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.restart_quiet_period();
    }

    /// Advance the sort cycle of `column` and fetch from the first page
    pub fn toggle_sort(&mut self, column: &str) -> CoreResult<()> {
        self.sort.toggle(self.columns, column)?;
        self.paging.reset();
        self.dispatch(false);
        Ok(())
    }

    /// Go to `page`; returns whether a fetch was dispatched
    pub fn set_page(&mut self, page: u32) -> bool {
        if !self.paging.set_page(page) {
            return false;
        }
        self.dispatch(false)
    }

    /// Change the page size (back to the first page); returns whether a fetch was dispatched
    pub fn set_page_size(&mut self, size: u32) -> CoreResult<bool> {
        if !self.paging.set_size(size)? {
            return Ok(false);
        }
        Ok(self.dispatch(false))
    }

    /// Re-hydrate from a location (back/forward navigation)
    pub fn navigate(&mut self, location: &str) -> CoreResult<()> {
        self.debouncer.cancel();
        let state = hydrate(self.columns, location, self.options.default_page_size);
        self.paging = Pagination::new(state.page, state.size)?;
        self.committed_filter = state.filters.serialize();
        self.filters = state.filters;
        self.sort = SortState::new(state.sort);
        log::debug!("Navigated to {}", self.location());
        self.dispatch(false);
        Ok(())
    }

    /// Fetch the current query again even if it was the last one dispatched
    pub fn refresh(&mut self) {
        self.dispatch(true);
    }

    // ==================== Mutations ====================

    pub async fn create(&mut self, draft: &C::Draft) -> CoreResult<C::Record> {
        let created = self.client.create(draft).await;
        self.after_mutation("create", created)
    }

    pub async fn update(&mut self, id: i64, draft: &C::Draft) -> CoreResult<C::Record> {
        let updated = self.client.update(id, draft).await;
        self.after_mutation("update", updated)
    }

    /// Delete a record; an emptied last page is left as is
    pub async fn delete(&mut self, id: i64) -> CoreResult<()> {
        let deleted = self.client.delete(id).await;
        self.after_mutation("delete", deleted)
    }

    fn after_mutation<T>(&mut self, operation: &str, result: CoreResult<T>) -> CoreResult<T> {
        match result {
            Ok(value) => {
                self.dispatch(true);
                Ok(value)
            }
            Err(e) => {
                let context = ErrorContext::new(operation).with_location(self.query_string());
                self.logger.log_error(&e, &context);
                Err(e)
            }
        }
    }

    // ==================== Events ====================

    /// Wait for the next timer or fetch event and apply it
    ///
    /// Stale quiet-period expiries are consumed silently. Returns `None` only
    /// if the event channel closed.
    pub async fn next_update(&mut self) -> Option<TableUpdate> {
        loop {
            let event = self.events_rx.recv().await?;
            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    /// Apply events until no quiet period runs and no fetch is in flight
    pub async fn settle(&mut self) -> Vec<TableUpdate> {
        let mut updates = Vec::new();
        while !self.is_idle() {
            match self.next_update().await {
                Some(update) => updates.push(update),
                None => break,
            }
        }
        updates
    }

    /// Drop pending timers and make every in-flight fetch inapplicable
    pub fn unmount(mut self) {
        self.debouncer.cancel();
        self.tracker.invalidate();
        log::debug!("Unmounted from {}", self.location());
    }

    fn apply(&mut self, event: ControllerEvent<C::Record>) -> Option<TableUpdate> {
        match event {
            ControllerEvent::QuietPeriodElapsed(generation) => {
                if !self.debouncer.expire(generation) {
                    return None;
                }
                Some(self.commit_filter())
            }
            ControllerEvent::FetchResolved { ticket, result } => Some(self.resolve(ticket, result)),
        }
    }

    fn commit_filter(&mut self) -> TableUpdate {
        let filter = self.filters.serialize();
        if filter == self.committed_filter {
            log::debug!("Filter unchanged after quiet period");
            return TableUpdate::FilterUnchanged;
        }
        log::debug!("Committing filter {:?}", filter);
        self.committed_filter = filter.clone();
        self.paging.reset();
        self.dispatch(false);
        TableUpdate::FilterCommitted { filter }
    }

    fn resolve(&mut self, ticket: FetchTicket, result: CoreResult<PageResult<C::Record>>) -> TableUpdate {
        let result = result.and_then(|page| check_page(&ticket.query, page));
        let current = self.page_query();
        if !self.tracker.settle(&ticket, &current, result.is_ok()) {
            log::debug!("Discarding stale fetch #{} for {:?}", ticket.seq, ticket.query);
            return TableUpdate::Discarded { seq: ticket.seq };
        }

        match result {
            Ok(page) => {
                log::debug!(
                    "Loaded page {} ({} rows of {})",
                    page.number,
                    page.rows.len(),
                    page.total_elements
                );
                self.result = page;
                self.last_error = None;
                TableUpdate::Loaded { query: ticket.query }
            }
            Err(e) => {
                let context = ErrorContext::new("fetch").with_location(self.query_string());
                self.logger.log_error(&e, &context);
                self.last_error = Some(e.clone());
                TableUpdate::FetchFailed(e)
            }
        }
    }

    fn restart_quiet_period(&mut self) {
        self.debouncer
            .restart(&self.events_tx, ControllerEvent::QuietPeriodElapsed);
    }

    /// Dispatch a fetch of the current query; returns whether one was sent
    fn dispatch(&mut self, force: bool) -> bool {
        let query = self.page_query();
        if !self.tracker.should_dispatch(&query, force) {
            log::debug!("Skipping duplicate fetch for {:?}", query);
            return false;
        }

        let ticket = self.tracker.issue(query);
        let client = Arc::clone(&self.client);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.fetch(&ticket.query).await;
            // Nobody is listening after unmount
            let _ = events.send(ControllerEvent::FetchResolved { ticket, result });
        });
        true
    }
}

/// Reject a page that does not answer `query`
fn check_page<R>(query: &PageQuery, page: PageResult<R>) -> CoreResult<PageResult<R>> {
    if page.number != query.page {
        return Err(CoreError::Protocol {
            message: format!("asked for page {}, got page {}", query.page, page.number),
        });
    }
    if page.rows.len() > query.size as usize {
        return Err(CoreError::Protocol {
            message: format!("page of size {} holds {} rows", query.size, page.rows.len()),
        });
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EXPENSE_COLUMNS;
    use crate::sort::SortDirection;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted collection; rows come back tagged `slow:` or `fast:` by whether the call was delayed
    #[derive(Default)]
    struct FakeClient {
        rows: Mutex<Vec<String>>,
        calls: Mutex<Vec<PageQuery>>,
        delays: Mutex<VecDeque<Duration>>,
        failures: Mutex<VecDeque<CoreError>>,
        misreport_page: Mutex<bool>,
    }

    impl FakeClient {
        fn with_rows(count: usize) -> Arc<Self> {
            let client = Self::default();
            *client.rows.lock().unwrap() = (0..count).map(|i| format!("row{}", i)).collect();
            Arc::new(client)
        }

        fn delay_next(&self, delays: &[u64]) {
            let mut queue = self.delays.lock().unwrap();
            queue.extend(delays.iter().map(|ms| Duration::from_millis(*ms)));
        }

        fn fail_next(&self, error: CoreError) {
            self.failures.lock().unwrap().push_back(error);
        }

        fn calls(&self) -> Vec<PageQuery> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CollectionClient for FakeClient {
        type Record = String;
        type Draft = String;

        async fn fetch(&self, query: &PageQuery) -> CoreResult<PageResult<String>> {
            self.calls.lock().unwrap().push(query.clone());
            let delay = self.delays.lock().unwrap().pop_front();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            let tag = if delay.is_some() { "slow" } else { "fast" };
            let tagged: Vec<String> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|row| format!("{}:{}", tag, row))
                .collect();
            let mut page = PageResult::from_slice(&tagged, query.page, query.size);
            if *self.misreport_page.lock().unwrap() {
                page.number += 1;
            }
            Ok(page)
        }

        async fn get(&self, id: i64) -> CoreResult<String> {
            self.rows
                .lock()
                .unwrap()
                .get(id as usize)
                .cloned()
                .ok_or(CoreError::NotFound { id })
        }

        async fn create(&self, draft: &String) -> CoreResult<String> {
            self.rows.lock().unwrap().push(draft.clone());
            Ok(draft.clone())
        }

        async fn update(&self, id: i64, draft: &String) -> CoreResult<String> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id as usize).ok_or(CoreError::NotFound { id })?;
            *row = draft.clone();
            Ok(draft.clone())
        }

        async fn delete(&self, id: i64) -> CoreResult<()> {
            let mut rows = self.rows.lock().unwrap();
            if (id as usize) >= rows.len() {
                return Err(CoreError::NotFound { id });
            }
            rows.remove(id as usize);
            Ok(())
        }
    }

    fn mount(client: &Arc<FakeClient>, location: &str) -> CollectionController<FakeClient> {
        CollectionController::mount(
            Arc::clone(client),
            EXPENSE_COLUMNS,
            ControllerOptions::default(),
            location,
        )
        .unwrap()
    }

    fn is_loaded(update: &Option<TableUpdate>) -> bool {
        matches!(update, Some(TableUpdate::Loaded { .. }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_loads_first_page() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "");
        assert!(controller.is_loading());

        assert!(is_loaded(&controller.next_update().await));
        assert_eq!(controller.rows().len(), 5);
        assert_eq!(controller.page_result().total_pages, 3);
        assert_eq!(controller.location(), "/expenses");
        assert!(controller.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_hydrates_location() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "filter=amount%3E%27100%27&sort=date,desc&page=2");
        controller.settle().await;

        let query = controller.page_query();
        assert_eq!(query.page, 2);
        assert_eq!(query.size, 5);
        assert_eq!(query.sort, Some(SortSpec::new("date", SortDirection::Descending)));
        assert_eq!(query.filter.as_deref(), Some("amount>'100'"));
        assert_eq!(controller.filters().term("amount").unwrap().value, "100");
        assert_eq!(client.calls(), vec![query]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_drops_unknown_sort_column() {
        let client = FakeClient::with_rows(3);
        let controller = mount(&client, "sort=payee,asc&size=3");
        assert_eq!(controller.sort().active(), None);
        assert_eq!(controller.location(), "/expenses?size=3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_makes_one_fetch() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "");
        controller.settle().await;

        for value in ["F", "Fo", "Foo", "Food"] {
            controller
                .edit_filter("category", Some(Operator::ILike), Some(value))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(client.calls().len(), 1);

        assert_eq!(
            controller.next_update().await,
            Some(TableUpdate::FilterCommitted {
                filter: Some("category=ilike='%Food%'".to_string())
            })
        );
        assert!(is_loaded(&controller.next_update().await));

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].filter.as_deref(), Some("category=ilike='%Food%'"));
        assert_eq!(
            controller.location(),
            "/expenses?filter=category%3Dilike%3D%27%25Food%25%27"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_edits_fetch_each_time() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "");
        controller.settle().await;

        for value in ["1", "10", "100"] {
            controller
                .edit_filter("amount", Some(Operator::Gt), Some(value))
                .unwrap();
            tokio::time::sleep(Duration::from_millis(600)).await;
            let updates = controller.settle().await;
            assert!(matches!(updates[0], TableUpdate::FilterCommitted { .. }));
        }
        assert_eq!(client.calls().len(), 4);
        assert_eq!(controller.committed_filter(), Some("amount>'100'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_combined_filter_expression() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "");
        controller
            .edit_filter("amount", Some(Operator::Gt), Some("100"))
            .unwrap();
        controller
            .edit_filter("category", Some(Operator::ILike), Some("Food"))
            .unwrap();
        controller.settle().await;
        assert_eq!(
            controller.committed_filter(),
            Some("category=ilike='%Food%';amount>'100'")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_reverted_within_quiet_period() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "");
        controller.settle().await;

        controller.edit_filter("title", None, Some("x")).unwrap();
        controller.edit_filter("title", None, Some("")).unwrap();
        assert_eq!(controller.next_update().await, Some(TableUpdate::FilterUnchanged));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_result_never_overwrites_newer() {
        let client = FakeClient::with_rows(12);
        client.delay_next(&[300]);
        let mut controller = mount(&client, "");
        // let the initial fetch start and pick up the delay
        tokio::task::yield_now().await;

        // page 1 and then back to page 0 before the slow first fetch returns
        assert!(controller.set_page(1));
        assert!(controller.set_page(0));

        let updates = controller.settle().await;
        let loaded = updates.iter().filter(|u| matches!(u, TableUpdate::Loaded { .. })).count();
        let discarded = updates.iter().filter(|u| matches!(u, TableUpdate::Discarded { .. })).count();
        assert_eq!((loaded, discarded), (1, 2));

        assert_eq!(controller.page_result().number, 0);
        assert!(controller.rows()[0].starts_with("fast:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_resets_page() {
        let client = FakeClient::with_rows(30);
        let mut controller = mount(&client, "page=3");
        controller.settle().await;
        assert_eq!(controller.pagination().page(), 3);

        controller.edit_filter("title", None, Some("row")).unwrap();
        // The page stays until the quiet period ends
        assert_eq!(controller.pagination().page(), 3);
        controller.settle().await;
        assert_eq!(controller.pagination().page(), 0);
        assert_eq!(client.calls().last().unwrap().page, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sort_change_resets_page_and_fetches_immediately() {
        let client = FakeClient::with_rows(30);
        let mut controller = mount(&client, "page=2");
        controller.settle().await;

        controller.toggle_sort("amount").unwrap();
        assert_eq!(controller.pagination().page(), 0);
        assert!(controller.is_loading());
        controller.settle().await;
        assert_eq!(client.calls().len(), 2);
        let last = client.calls().pop().unwrap();
        assert_eq!(last.page, 0);
        assert_eq!(last.sort.unwrap().serialize(), "amount,asc");

        assert!(controller.toggle_sort("payee").is_err());
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_size_change() {
        let client = FakeClient::with_rows(30);
        let mut controller = mount(&client, "page=2");
        controller.settle().await;

        assert!(!controller.set_page_size(5).unwrap());
        assert!(controller.set_page_size(10).unwrap());
        assert_eq!(controller.location(), "/expenses?size=10");
        assert!(controller.set_page_size(0).is_err());
        controller.settle().await;
        assert_eq!(controller.rows().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_page_is_noop() {
        let client = FakeClient::with_rows(30);
        let mut controller = mount(&client, "");
        controller.settle().await;
        assert!(!controller.set_page(0));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_previous_page() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "");
        controller.settle().await;
        let before = controller.rows().to_vec();

        client.fail_next(CoreError::Transport {
            message: "connection refused".to_string(),
        });
        controller.refresh();
        assert!(matches!(
            controller.next_update().await,
            Some(TableUpdate::FetchFailed(CoreError::Transport { .. }))
        ));
        assert_eq!(controller.rows(), before.as_slice());
        assert!(controller.last_error().is_some());

        controller.refresh();
        controller.settle().await;
        assert!(controller.last_error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_misreported_page_is_protocol_error() {
        let client = FakeClient::with_rows(12);
        *client.misreport_page.lock().unwrap() = true;
        let mut controller = mount(&client, "");
        assert!(matches!(
            controller.next_update().await,
            Some(TableUpdate::FetchFailed(CoreError::Protocol { .. }))
        ));
        assert!(controller.rows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_cancels_quiet_period() {
        let client = FakeClient::with_rows(12);
        let mut controller = mount(&client, "");
        controller.settle().await;

        controller.edit_filter("title", None, Some("pending")).unwrap();
        controller.navigate("?page=1&sort=date,desc").unwrap();
        assert!(is_loaded(&controller.next_update().await));
        assert!(controller.is_idle());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.committed_filter(), None);
        assert_eq!(controller.filters().term("title").unwrap().value, "");
        assert_eq!(controller.location(), "/expenses?page=1&sort=date%2Cdesc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_force_refetch() {
        let client = FakeClient::with_rows(2);
        let mut controller = mount(&client, "");
        controller.settle().await;

        controller.create(&"lunch".to_string()).await.unwrap();
        controller.settle().await;
        assert_eq!(client.calls().len(), 2);
        assert_eq!(controller.rows().len(), 3);

        controller.delete(0).await.unwrap();
        controller.settle().await;
        assert_eq!(controller.rows().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_mutation_skips_refetch() {
        let client = FakeClient::with_rows(2);
        let mut controller = mount(&client, "");
        controller.settle().await;

        let result = controller.update(9, &"x".to_string()).await;
        assert_eq!(result, Err(CoreError::NotFound { id: 9 }));
        assert!(controller.is_idle());
        assert_eq!(client.calls().len(), 1);
    }

    /// Collects `operation CODE` for every logged error
    #[derive(Clone, Default)]
    struct RecordingLogger(Arc<Mutex<Vec<String>>>);

    impl ErrorLogger for RecordingLogger {
        fn log_error(&self, error: &CoreError, context: &ErrorContext) {
            self.0
                .lock()
                .unwrap()
                .push(format!("{} {}", context.operation, error.code()));
        }

        fn log_debug(&self, _message: &str, _context: &ErrorContext) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_reach_custom_logger() {
        let client = FakeClient::with_rows(2);
        let logger = RecordingLogger::default();
        let mut controller = mount(&client, "").with_logger(Box::new(logger.clone()));
        controller.settle().await;

        let _ = controller.delete(7).await;
        client.fail_next(CoreError::Timeout { seconds: 30 });
        controller.refresh();
        controller.settle().await;

        assert_eq!(
            *logger.0.lock().unwrap(),
            vec!["delete NOT_FOUND".to_string(), "fetch TIMEOUT".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleting_last_row_leaves_empty_page() {
        let client = FakeClient::with_rows(6);
        let mut controller = mount(&client, "page=1");
        controller.settle().await;
        assert_eq!(controller.rows().len(), 1);

        controller.delete(5).await.unwrap();
        controller.settle().await;
        assert_eq!(controller.pagination().page(), 1);
        assert!(controller.rows().is_empty());
        assert_eq!(controller.page_result().total_pages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_with_fetch_in_flight() {
        let client = FakeClient::with_rows(2);
        client.delay_next(&[100]);
        let controller = mount(&client, "");
        controller.unmount();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(client.calls().len(), 1);
    }
}
