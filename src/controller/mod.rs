//! The list-view data controller: query state, fetch coordination, page
//! bookkeeping and the status banner for one list screen.
//!
//! A fetch is split into [`ListController::begin_fetch`], which stamps the
//! request with the next sequence number, and [`ListController::complete`],
//! which applies a response only if it carries the latest stamp. Responses to
//! superseded requests are dropped whatever order they arrive in, so the list
//! always reflects the most recent query.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use time::Date;

use crate::api::{
    normalize_list, ApiError, ApiRequest, ApiResponse, EndpointSpec, ListShape, Transport,
};
use crate::pagination::{self, clamp_page, ControlState, PageControl, PageResult};
use crate::query::{FilterValue, QueryState, TabbedQueries};
use crate::status::{StatusKind, StatusState};

const EMPTY_RESULT: &str = "No results match the current filters.";
const TAB_FILTER: &str = "tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// Applied, but there were no rows.
    Empty,
    /// Totals applied; the requested page no longer exists and the query moved
    /// to `page`, which has to be fetched.
    Clamped { page: u32 },
    /// A newer request was issued after this one; nothing changed.
    Stale,
    /// The previous page stays visible and the banner shows the error.
    Failed(ApiError),
}

pub struct ListController<T> {
    resource: String,
    endpoint: EndpointSpec,
    query: QueryState,
    tabs: TabbedQueries,
    result: Option<PageResult<T>>,
    status: StatusState,
    issued: u64,
}

impl<T: DeserializeOwned> ListController<T> {
    pub fn new(
        resource: impl Into<String>,
        endpoint: EndpointSpec,
        page_size: u32,
        dismiss_after: Duration,
    ) -> Self {
        Self {
            resource: resource.into(),
            endpoint,
            query: QueryState::new(page_size),
            tabs: TabbedQueries::new(page_size),
            result: None,
            status: StatusState::new(dismiss_after),
            issued: 0,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn result(&self) -> Option<&PageResult<T>> {
        self.result.as_ref()
    }

    pub fn items(&self) -> &[T] {
        self.result
            .as_ref()
            .map(|result| result.items.as_slice())
            .unwrap_or_default()
    }

    pub fn status(&self) -> &StatusState {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusState {
        &mut self.status
    }

    pub fn active_tab(&self) -> Option<&str> {
        self.tabs.active().map(|(name, _)| name)
    }

    /// Makes `tab` the active tab. Each tab keeps its own filters and page;
    /// the tab name goes out as the `tab` filter. The first switch seeds the
    /// tab from the current query. Responses still in flight become stale.
    pub fn switch_tab(&mut self, tab: &str) {
        let active = self.tabs.active().map(|(name, _)| name.to_string());
        match active.as_deref() {
            Some(name) if name == tab => return,
            Some(name) => *self.tabs.tab_mut(name) = self.query.clone(),
            None => *self.tabs.tab_mut(tab) = self.query.clone(),
        }

        let state = self.tabs.switch_to(tab);
        let tab_value = FilterValue::Text(tab.to_string());
        if state.filter(TAB_FILTER) != Some(&tab_value) {
            state.set_filter(TAB_FILTER, tab_value);
        }
        self.query = state.clone();
        self.result = None;
        self.issued += 1;
        self.status.finish_loading();
        tracing::debug!(resource = %self.resource, %tab, page = self.query.page(), "tab switched");
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.result.as_ref().map(|result| result.total_pages)
    }

    pub fn set_filter(&mut self, name: impl Into<String>, value: FilterValue) {
        self.query.set_filter(name, value);
    }

    pub fn clear_filter(&mut self, name: &str) {
        self.query.clear_filter(name);
    }

    pub fn clear_filters(&mut self) {
        self.query.clear_filters();
    }

    /// Sets the `from`/`to` range; a reversed range is shown as an error and
    /// leaves the query untouched.
    pub fn set_date_range(&mut self, from: Option<Date>, to: Option<Date>) -> Result<(), ApiError> {
        self.query
            .set_date_range("from", "to", from, to)
            .inspect_err(|err| self.status.set_error(err.user_message()))
    }

    /// Moves to `page`, clamped to the known page count. Returns the page the
    /// query ended up on.
    pub fn set_page(&mut self, page: u32) -> u32 {
        let target = match self.total_pages() {
            Some(total) if total > 0 => clamp_page(page, total),
            _ => page.max(1),
        };
        self.query.set_page(target);
        target
    }

    /// Applies a page-control click. Returns whether the page changed.
    pub fn navigate(&mut self, control: PageControl) -> bool {
        let total = self.total_pages().unwrap_or(0);
        match pagination::navigate(self.query.page(), control, total) {
            Some(page) => {
                self.query.set_page(page);
                true
            }
            None => false,
        }
    }

    pub fn controls(&self) -> Vec<ControlState> {
        pagination::controls(self.query.page(), self.total_pages().unwrap_or(0))
    }

    /// Stamps and builds the request for the current query.
    ///
    /// The sequence advances even when the request cannot be built, so a
    /// response to an earlier query is never applied after the query changed.
    pub fn begin_fetch(&mut self, token: Option<&str>) -> Result<(FetchTicket, ApiRequest), ApiError> {
        self.issued += 1;
        let request = match self.endpoint.list_request(&self.query, token) {
            Ok(request) => request,
            Err(err) => {
                self.status.finish_loading();
                self.status.set_error(err.user_message());
                return Err(err);
            }
        };
        self.status.begin_loading();
        tracing::debug!(
            resource = %self.resource,
            seq = self.issued,
            page = self.query.page(),
            "list fetch issued"
        );
        Ok((FetchTicket { seq: self.issued }, request))
    }

    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        response: Result<ApiResponse, ApiError>,
    ) -> FetchOutcome {
        if ticket.seq != self.issued {
            tracing::warn!(
                resource = %self.resource,
                seq = ticket.seq,
                latest = self.issued,
                "discarding stale list response"
            );
            return FetchOutcome::Stale;
        }
        self.status.finish_loading();

        let page = match response.and_then(|response| self.decode(response)) {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(resource = %self.resource, error = %err, "list fetch failed");
                self.status.set_error(err.user_message());
                return FetchOutcome::Failed(err);
            }
        };
        self.apply(page)
    }

    /// Runs one fetch to completion, following a single clamp refetch.
    pub async fn load(&mut self, transport: &dyn Transport, token: Option<&str>) -> FetchOutcome {
        let mut outcome = self.fetch_once(transport, token).await;
        if let FetchOutcome::Clamped { page } = outcome {
            tracing::debug!(resource = %self.resource, page, "refetching clamped page");
            outcome = self.fetch_once(transport, token).await;
        }
        outcome
    }

    async fn fetch_once(&mut self, transport: &dyn Transport, token: Option<&str>) -> FetchOutcome {
        let (ticket, request) = match self.begin_fetch(token) {
            Ok(started) => started,
            Err(err) => return FetchOutcome::Failed(err),
        };
        let response = transport.send(request).await;
        self.complete(ticket, response)
    }

    fn decode(&self, response: ApiResponse) -> Result<PageResult<T>, ApiError> {
        let raw = normalize_list(
            response,
            self.endpoint.shape,
            self.query.page(),
            self.query.page_size(),
        )?;
        Ok(raw.try_map(serde_json::from_value::<T>)?)
    }

    fn apply(&mut self, mut page: PageResult<T>) -> FetchOutcome {
        let requested = self.query.page();
        let clamped = clamp_page(requested, page.total_pages);
        page.page = clamped;
        let empty = page.is_empty();
        self.result = Some(page);

        // A fresh result replaces error and empty-result banners; a pending
        // success message stays until it expires.
        if matches!(
            self.status.visible().map(|message| message.kind),
            Some(StatusKind::Error | StatusKind::Info)
        ) {
            self.status.clear();
        }
        if clamped != requested {
            self.query.set_page(clamped);
            if self.endpoint.shape == ListShape::Paged {
                return FetchOutcome::Clamped { page: clamped };
            }
        }
        if empty {
            self.status.set_info(EMPTY_RESULT);
            return FetchOutcome::Empty;
        }
        FetchOutcome::Applied
    }
}

/// Controller over raw JSON rows, for resources without a typed record.
pub type RawListController = ListController<Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedTransport;
    use assert_matches::assert_matches;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Article {
        id: u32,
        title: String,
    }

    fn articles(ids: std::ops::RangeInclusive<u32>, total: u64, page: u32) -> Value {
        let items: Vec<Value> = ids
            .map(|id| json!({ "id": id, "title": format!("Bài {id}") }))
            .collect();
        json!({
            "statusCode": 200,
            "message": "OK",
            "data": { "items": items, "totalCount": total, "pageNumber": page }
        })
    }

    fn controller() -> ListController<Article> {
        ListController::new(
            "articles",
            EndpointSpec::new("articles/filter"),
            10,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn newest_request_wins_regardless_of_arrival_order() {
        let mut list = controller();
        let (first, _) = list.begin_fetch(None).unwrap();
        let (second, _) = list.begin_fetch(None).unwrap();

        let applied = list.complete(second, Ok(ApiResponse::ok(articles(11..=12, 2, 1))));
        assert_eq!(applied, FetchOutcome::Applied);
        let late = list.complete(first, Ok(ApiResponse::ok(articles(1..=10, 23, 1))));
        assert_eq!(late, FetchOutcome::Stale);

        let ids: Vec<u32> = list.items().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![11, 12]);
        assert_eq!(list.total_pages(), Some(1));
    }

    #[test]
    fn filter_change_mid_flight_shows_new_filter_result() {
        let mut list = controller();
        list.set_filter("status", FilterValue::Text("draft".into()));
        let (old, old_request) = list.begin_fetch(None).unwrap();
        assert_eq!(old_request.query_value("status"), Some("draft"));

        list.set_filter("status", FilterValue::Text("published".into()));
        let (new, new_request) = list.begin_fetch(None).unwrap();
        assert_eq!(new_request.query_value("status"), Some("published"));

        assert_eq!(
            list.complete(new, Ok(ApiResponse::ok(articles(5..=5, 1, 1)))),
            FetchOutcome::Applied
        );
        assert_eq!(
            list.complete(old, Ok(ApiResponse::ok(articles(1..=3, 3, 1)))),
            FetchOutcome::Stale
        );
        assert_eq!(list.items()[0].title, "Bài 5");
    }

    #[test]
    fn stale_failure_does_not_raise_banner() {
        let mut list = controller();
        let (first, _) = list.begin_fetch(None).unwrap();
        let (second, _) = list.begin_fetch(None).unwrap();
        list.complete(second, Ok(ApiResponse::ok(articles(1..=2, 2, 1))));

        let outcome = list.complete(first, Err(ApiError::Transport("reset".into())));
        assert_eq!(outcome, FetchOutcome::Stale);
        assert!(list.status().error().is_none());
    }

    #[test]
    fn failure_keeps_previous_page_visible() {
        let mut list = controller();
        let (ticket, _) = list.begin_fetch(None).unwrap();
        list.complete(ticket, Ok(ApiResponse::ok(articles(1..=10, 23, 1))));

        list.navigate(PageControl::Next);
        let (ticket, _) = list.begin_fetch(None).unwrap();
        let outcome = list.complete(
            ticket,
            Err(ApiError::Server {
                status: 500,
                message: Some("Lỗi máy chủ".into()),
            }),
        );
        assert_matches!(outcome, FetchOutcome::Failed(ApiError::Server { status: 500, .. }));
        assert_eq!(list.items().len(), 10);
        assert_eq!(list.status().error(), Some("Error 500: Lỗi máy chủ"));
        assert!(!list.status().is_loading());
    }

    #[test]
    fn pages_follow_total_count() {
        let mut list = controller();
        let (ticket, _) = list.begin_fetch(None).unwrap();
        list.complete(ticket, Ok(ApiResponse::ok(articles(1..=10, 23, 1))));
        let result = list.result().unwrap();
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.page, 1);

        assert_eq!(list.set_page(4), 3);
        assert_eq!(list.query().page(), 3);
        assert!(!list.navigate(PageControl::Next));
        assert!(list.navigate(PageControl::Prev));
        assert_eq!(list.query().page(), 2);
        assert!(list.navigate(PageControl::Page(1)));
        assert!(!list.navigate(PageControl::Prev));
        assert_eq!(list.controls().len(), 5);
    }

    #[test]
    fn shrinking_total_clamps_page_and_asks_for_refetch() {
        let mut list = controller();
        let (ticket, _) = list.begin_fetch(None).unwrap();
        list.complete(ticket, Ok(ApiResponse::ok(articles(1..=10, 23, 1))));
        list.set_page(3);

        let (ticket, _) = list.begin_fetch(None).unwrap();
        let empty_page = json!({
            "statusCode": 200,
            "data": { "items": [], "totalCount": 12, "pageNumber": 3 }
        });
        let outcome = list.complete(ticket, Ok(ApiResponse::ok(empty_page)));
        assert_eq!(outcome, FetchOutcome::Clamped { page: 2 });
        assert_eq!(list.query().page(), 2);
        let result = list.result().unwrap();
        assert!(result.page >= 1 && result.page <= result.total_pages);
    }

    #[test]
    fn empty_result_is_informational() {
        let mut list = controller();
        let (ticket, _) = list.begin_fetch(None).unwrap();
        let body = json!({ "statusCode": 200, "data": { "items": [], "totalCount": 0 } });
        assert_eq!(list.complete(ticket, Ok(ApiResponse::ok(body))), FetchOutcome::Empty);
        assert!(list.status().error().is_none());
        assert_eq!(
            list.status().visible().map(|m| m.kind),
            Some(StatusKind::Info)
        );
        assert!(list.controls().is_empty());
    }

    #[test]
    fn missing_token_stops_before_network() {
        let mut list: ListController<Article> = ListController::new(
            "accounts",
            EndpointSpec::new("users/filter").authenticated(),
            10,
            Duration::from_secs(5),
        );
        assert_eq!(list.begin_fetch(None).unwrap_err(), ApiError::Unauthenticated);
        assert_eq!(
            list.status().error(),
            Some("Please sign in to continue.")
        );
    }

    #[test]
    fn failed_begin_still_supersedes_older_request() {
        let mut list: ListController<Article> = ListController::new(
            "accounts",
            EndpointSpec::new("users/filter").authenticated(),
            10,
            Duration::from_secs(5),
        );
        list.set_filter("status", FilterValue::Text("draft".into()));
        let (old, _) = list.begin_fetch(Some("token-1")).unwrap();

        list.set_filter("status", FilterValue::Text("published".into()));
        assert_eq!(list.begin_fetch(None).unwrap_err(), ApiError::Unauthenticated);
        assert!(!list.status().is_loading());

        let late = list.complete(old, Ok(ApiResponse::ok(articles(1..=3, 3, 1))));
        assert_eq!(late, FetchOutcome::Stale);
        assert!(list.items().is_empty());
        assert_eq!(list.status().error(), Some("Please sign in to continue."));
    }

    #[test]
    fn rows_after_empty_result_clear_the_notice() {
        let mut list = controller();
        list.set_filter("search", FilterValue::Text("không có".into()));
        let (ticket, _) = list.begin_fetch(None).unwrap();
        let body = json!({ "statusCode": 200, "data": { "items": [], "totalCount": 0 } });
        assert_eq!(list.complete(ticket, Ok(ApiResponse::ok(body))), FetchOutcome::Empty);
        assert!(list.status().visible().is_some());

        list.clear_filter("search");
        let (ticket, _) = list.begin_fetch(None).unwrap();
        let outcome = list.complete(ticket, Ok(ApiResponse::ok(articles(1..=1, 1, 1))));
        assert_eq!(outcome, FetchOutcome::Applied);
        assert!(list.status().visible().is_none());
    }

    #[test]
    fn success_message_survives_refresh() {
        let mut list = controller();
        list.status_mut().set_success("Đã lưu");
        let (ticket, _) = list.begin_fetch(None).unwrap();
        list.complete(ticket, Ok(ApiResponse::ok(articles(1..=2, 2, 1))));
        assert_eq!(
            list.status().visible().map(|m| m.kind),
            Some(StatusKind::Success)
        );
    }

    #[test]
    fn tabs_keep_their_own_filters_and_page() {
        let mut list = controller();
        list.switch_tab("views");
        list.set_filter("period", FilterValue::Text("week".into()));
        list.set_page(3);
        let (views_ticket, request) = list.begin_fetch(None).unwrap();
        assert_eq!(request.query_value("tab"), Some("views"));

        list.switch_tab("comments");
        assert_eq!(list.active_tab(), Some("comments"));
        assert_eq!(list.query().page(), 1);
        assert_eq!(list.query().filter("period"), None);
        assert_eq!(
            list.query().filter("tab"),
            Some(&FilterValue::Text("comments".into()))
        );
        let late = list.complete(views_ticket, Ok(ApiResponse::ok(articles(1..=10, 40, 3))));
        assert_eq!(late, FetchOutcome::Stale);
        assert!(list.result().is_none());

        list.switch_tab("views");
        assert_eq!(list.query().page(), 3);
        assert_eq!(
            list.query().filter("period"),
            Some(&FilterValue::Text("week".into()))
        );
    }

    #[test]
    fn reversed_date_range_is_flagged() {
        let mut list = controller();
        let result = list.set_date_range(
            Some(time::macros::date!(2024 - 05 - 02)),
            Some(time::macros::date!(2024 - 05 - 01)),
        );
        assert!(result.is_err());
        assert!(list.status().error().is_some());
        assert!(list.query().filters().is_empty());
    }

    #[tokio::test]
    async fn load_follows_clamp_with_second_request() {
        let transport = ScriptedTransport::new();
        transport
            .respond("articles/filter", articles(1..=10, 23, 1))
            .respond(
                "articles/filter",
                json!({ "statusCode": 200, "data": { "items": [], "totalCount": 11 } }),
            )
            .respond("articles/filter", articles(11..=11, 11, 2));

        let mut list = controller();
        assert_eq!(list.load(&transport, None).await, FetchOutcome::Applied);
        list.set_page(3);
        assert_eq!(list.load(&transport, None).await, FetchOutcome::Applied);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].query_value("pageNumber"), Some("3"));
        assert_eq!(requests[2].query_value("pageNumber"), Some("2"));
        assert_eq!(list.items()[0].id, 11);
    }

    #[tokio::test]
    async fn flat_resources_page_locally() {
        let transport = ScriptedTransport::new();
        let rows: Vec<Value> = (1..=23)
            .map(|id| json!({ "id": id, "title": format!("Chuyên mục {id}") }))
            .collect();
        transport.respond("categories", json!({ "statusCode": 200, "data": rows }));

        let mut list: ListController<Article> = ListController::new(
            "categories",
            EndpointSpec::new("categories").flat(),
            10,
            Duration::from_secs(5),
        );
        list.set_page(9);
        assert_eq!(list.load(&transport, None).await, FetchOutcome::Applied);
        assert_eq!(list.query().page(), 3);
        assert_eq!(list.items().len(), 3);
        assert_eq!(transport.calls_to("categories"), 1);
    }
}
