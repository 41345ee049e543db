use serde_json::Value;
use std::collections::HashSet;

use crate::cache::{CacheStore, PAYOUTS_CACHE_KEY};
use crate::error::{PayoutError, Result};
use crate::payout::record::{Page, Pagination, PayoutRecord, PayoutStatus, StatusUpdate};
use crate::remote::{Outcome, RemoteSource};

const PAYOUTS_PATH: &str = "payouts";

/// In-memory view of the payouts listing
#[derive(Debug, Default)]
pub struct AggregateState {
    pub payouts: Vec<PayoutRecord>,
    /// Sum of `amount` over every held payout
    pub total_amount: f64,
    /// Pagination of the last applied page
    pub pagination: Option<Pagination>,
    /// Record opened through a detail fetch
    pub current: Option<PayoutRecord>,
    pub error: Option<String>,
    /// The last applied page came from the cache rather than the server
    pub from_cache: bool,
    pending_initial: usize,
    pending_more: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StatusTally {
    pub count: usize,
    pub amount: f64,
}

impl AggregateState {
    /// A first-page fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.pending_initial > 0
    }

    /// A follow-up page fetch is in flight
    pub fn is_loading_more(&self) -> bool {
        self.pending_more > 0
    }

    pub fn find(&self, id: u64) -> Option<&PayoutRecord> {
        self.payouts.iter().find(|p| p.id == id)
    }

    /// Count and amount per status, in lifecycle order
    pub fn summary(&self) -> Vec<(PayoutStatus, StatusTally)> {
        PayoutStatus::ALL
            .iter()
            .map(|status| {
                let tally = self
                    .payouts
                    .iter()
                    .filter(|p| p.status == *status)
                    .fold(StatusTally::default(), |acc, p| StatusTally {
                        count: acc.count + 1,
                        amount: acc.amount + p.amount,
                    });
                (*status, tally)
            })
            .collect()
    }
}

/// Handle for one issued page request.
///
/// A page-1 completion replaces the list, so it is dropped when anything
/// issued after it has already been applied. Later pages only append; they
/// are dropped only when a replacement (or reset) issued after them has
/// landed.
#[derive(Debug)]
pub struct FetchTicket {
    seq: u64,
    page: u32,
}

impl FetchTicket {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Remote,
    Cache,
}

#[derive(Debug)]
pub struct FetchReport {
    pub page: Page,
    pub source: PageSource,
    /// False when the response was dropped as out of date
    pub applied: bool,
}

/// Owns the aggregate state together with its remote source and cache.
pub struct PayoutStore<R, C> {
    remote: R,
    cache: C,
    state: AggregateState,
    issued_seq: u64,
    applied_seq: u64,
    replaced_seq: u64,
}

impl<R: RemoteSource, C: CacheStore> PayoutStore<R, C> {
    pub fn new(remote: R, cache: C) -> Self {
        Self {
            remote,
            cache,
            state: AggregateState::default(),
            issued_seq: 0,
            applied_seq: 0,
            replaced_seq: 0,
        }
    }

    pub fn state(&self) -> &AggregateState {
        &self.state
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Back to the empty state. Requests issued before the reset are
    /// ignored when they complete.
    pub fn reset(&mut self) {
        self.state = AggregateState::default();
        self.applied_seq = self.issued_seq;
        self.replaced_seq = self.issued_seq;
    }

    /// Fetch one page (default 1) and merge it into the held list.
    pub fn fetch_list(&mut self, page: Option<u32>) -> Result<FetchReport> {
        let ticket = self.begin_fetch(page)?;
        let result = self.request_page(&ticket);
        self.complete_fetch(ticket, result)
    }

    pub fn refresh(&mut self) -> Result<FetchReport> {
        self.fetch_list(Some(1))
    }

    /// Fetch the page after the last applied one, if there is one. Stops
    /// once a page had to be served from the cache; `refresh` resumes.
    pub fn load_more(&mut self) -> Result<Option<FetchReport>> {
        if self.state.from_cache {
            return Ok(None);
        }
        let next = match self.state.pagination {
            Some(p) if p.has_more() => p.current_page + 1,
            _ => return Ok(None),
        };
        self.fetch_list(Some(next)).map(Some)
    }

    /// Issue a page request: validates the page, raises the matching
    /// loading flag and clears the previous error.
    pub fn begin_fetch(&mut self, page: Option<u32>) -> Result<FetchTicket> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(PayoutError::InvalidPage(page));
        }

        self.issued_seq += 1;
        if page == 1 {
            self.state.pending_initial += 1;
        } else {
            self.state.pending_more += 1;
        }
        self.state.error = None;

        tracing::debug!(page, seq = self.issued_seq, "fetching payouts page");
        Ok(FetchTicket {
            seq: self.issued_seq,
            page,
        })
    }

    /// The network half of a fetch; touches no state.
    pub fn request_page(&self, ticket: &FetchTicket) -> Result<Page> {
        let data = self
            .remote
            .get(PAYOUTS_PATH, &[("page", ticket.page.to_string())])?
            .into_data()?;
        let page: Page =
            serde_json::from_value(data).map_err(|e| PayoutError::Decode(e.to_string()))?;
        page.validate()
    }

    /// Apply the result of a request issued with `begin_fetch`.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Page>,
    ) -> Result<FetchReport> {
        if ticket.page == 1 {
            self.state.pending_initial = self.state.pending_initial.saturating_sub(1);
        } else {
            self.state.pending_more = self.state.pending_more.saturating_sub(1);
        }

        let superseded = ticket.seq <= self.applied_seq;
        let stale = if ticket.page == 1 {
            superseded
        } else {
            ticket.seq <= self.replaced_seq
        };
        if stale {
            tracing::debug!(
                page = ticket.page,
                seq = ticket.seq,
                applied = self.applied_seq,
                "discarding out-of-order response"
            );
        }

        match result {
            Ok(page) => {
                if !stale {
                    self.mark_applied(&ticket);
                    self.persist(&page);
                    self.merge(ticket.page, &page);
                    self.state.from_cache = false;
                    tracing::info!(
                        page = ticket.page,
                        received = page.payouts.len(),
                        held = self.state.payouts.len(),
                        "payouts page applied"
                    );
                }
                Ok(FetchReport {
                    page,
                    source: PageSource::Remote,
                    applied: !stale,
                })
            }
            Err(err) if stale => Err(err),
            Err(err) if err.is_transport() && !superseded => match self.read_cached() {
                Some(page) => {
                    tracing::warn!(
                        page = ticket.page,
                        error = %err,
                        "fetch failed, using cached payouts"
                    );
                    self.mark_applied(&ticket);
                    self.merge(ticket.page, &page);
                    self.state.from_cache = true;
                    Ok(FetchReport {
                        page,
                        source: PageSource::Cache,
                        applied: true,
                    })
                }
                None => {
                    self.state.error = Some(err.to_string());
                    Err(err)
                }
            },
            Err(err) => {
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn mark_applied(&mut self, ticket: &FetchTicket) {
        self.applied_seq = self.applied_seq.max(ticket.seq);
        if ticket.page == 1 {
            self.replaced_seq = ticket.seq;
        }
    }

    /// Load one payout into the `current` slot, independent of the list.
    pub fn fetch_detail(&mut self, id: u64) -> Result<&PayoutRecord> {
        self.state.error = None;

        let result = self
            .remote
            .get(&format!("{PAYOUTS_PATH}/{id}"), &[])
            .and_then(Outcome::into_data)
            .and_then(take_record);

        match result {
            Ok(record) => Ok(&*self.state.current.insert(record)),
            Err(err) => {
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Cancel remotely; on confirmation mark the held copies cancelled.
    pub fn cancel(&mut self, id: u64) -> Result<()> {
        self.state.error = None;

        let result = self
            .remote
            .delete(&format!("{PAYOUTS_PATH}/{id}"))
            .and_then(Outcome::into_data);

        match result {
            Ok(_) => {
                if let Some(payout) = self.state.payouts.iter_mut().find(|p| p.id == id) {
                    payout.cancel();
                }
                if let Some(current) = self.state.current.as_mut().filter(|c| c.id == id) {
                    current.cancel();
                }
                tracing::info!(id, "payout cancelled");
                Ok(())
            }
            Err(err) => {
                tracing::debug!(id, error = %err, "cancel refused");
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Mark a payout paid. The reference number is checked before anything
    /// else happens. Held state is not modified; the server's copy of the
    /// record is returned when the response includes one.
    pub fn submit_status_update(
        &mut self,
        id: u64,
        update: &StatusUpdate,
    ) -> Result<Option<PayoutRecord>> {
        let body = update.to_body()?;
        self.state.error = None;

        let result = self
            .remote
            .put(&format!("{PAYOUTS_PATH}/{id}/status"), &body)
            .and_then(Outcome::into_data);

        match result {
            Ok(Value::Null) => Ok(None),
            Ok(data) => match take_record(data) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    tracing::warn!(id, error = %err, "status update response had no usable payout");
                    Ok(None)
                }
            },
            Err(err) => {
                self.state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn merge(&mut self, requested_page: u32, page: &Page) {
        if requested_page == 1 {
            self.state.payouts = page.payouts.clone();
        } else {
            let mut held: HashSet<u64> = self.state.payouts.iter().map(|p| p.id).collect();
            for payout in &page.payouts {
                if held.insert(payout.id) {
                    self.state.payouts.push(payout.clone());
                }
            }
        }

        self.state.total_amount = self.state.payouts.iter().map(|p| p.amount).sum();

        // Appended pages never move the cursor backwards
        let advances = match self.state.pagination {
            Some(held) => page.pagination.current_page > held.current_page,
            None => true,
        };
        if requested_page == 1 || advances {
            self.state.pagination = Some(page.pagination);
        }
    }

    fn persist(&mut self, page: &Page) {
        let written = serde_json::to_string(page)
            .map_err(|e| PayoutError::Cache {
                key: PAYOUTS_CACHE_KEY.to_string(),
                reason: e.to_string(),
            })
            .and_then(|raw| self.cache.set_item(PAYOUTS_CACHE_KEY, &raw));

        if let Err(err) = written {
            tracing::warn!(error = %err, "could not cache payouts page");
        }
    }

    fn read_cached(&self) -> Option<Page> {
        let raw = match self.cache.get_item(PAYOUTS_CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "could not read payouts cache");
                return None;
            }
        };

        match serde_json::from_str::<Page>(&raw) {
            Ok(page) => Some(page),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable payouts cache");
                None
            }
        }
    }
}

/// Detail and update responses wrap the record as `data.payout`.
fn take_record(data: Value) -> Result<PayoutRecord> {
    let value = match data {
        Value::Object(mut map) if map.contains_key("payout") => {
            map.remove("payout").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(value).map_err(|e| PayoutError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::payout::record::PaymentMethod;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeRemote {
        responses: RefCell<VecDeque<Result<Outcome>>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeRemote {
        fn push(&self, response: Result<Outcome>) {
            self.responses.borrow_mut().push_back(response);
        }

        fn push_data(&self, data: Value) {
            self.push(Ok(Outcome::Success {
                data,
                message: None,
            }));
        }

        fn push_page(&self, rows: &[(u64, f64)], current_page: u32, last_page: u32) {
            self.push_data(page_json(rows, current_page, last_page));
        }

        fn push_network_error(&self) {
            self.push(Err(PayoutError::Transport("connection refused".to_string())));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn next(&self, call: String) -> Result<Outcome> {
            self.calls.borrow_mut().push(call);
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(PayoutError::Transport("no response queued".to_string())))
        }
    }

    impl RemoteSource for FakeRemote {
        fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Outcome> {
            let query: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            if query.is_empty() {
                self.next(format!("GET {path}"))
            } else {
                self.next(format!("GET {path}?{}", query.join("&")))
            }
        }

        fn post(&self, path: &str, _body: &Value) -> Result<Outcome> {
            self.next(format!("POST {path}"))
        }

        fn put(&self, path: &str, _body: &Value) -> Result<Outcome> {
            self.next(format!("PUT {path}"))
        }

        fn delete(&self, path: &str) -> Result<Outcome> {
            self.next(format!("DELETE {path}"))
        }
    }

    struct ReadOnlyCache;

    impl CacheStore for ReadOnlyCache {
        fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set_item(&mut self, key: &str, _value: &str) -> Result<()> {
            Err(PayoutError::Cache {
                key: key.to_string(),
                reason: "read-only".to_string(),
            })
        }
    }

    fn payout_json(id: u64, amount: f64, status: &str) -> Value {
        json!({
            "id": id,
            "amount": amount,
            "status": status,
            "scheduled_date": "2026-04-01",
            "paid_date": null,
            "notes": null,
            "reference_number": format!("REF-{id}"),
            "calculation_basis": {
                "method": "fixed",
                "base_amount": amount,
                "calculated_at": "2026-03-01T09:00:00Z"
            }
        })
    }

    fn page_json(rows: &[(u64, f64)], current_page: u32, last_page: u32) -> Value {
        let payouts: Vec<Value> = rows
            .iter()
            .map(|(id, amount)| payout_json(*id, *amount, "scheduled"))
            .collect();
        json!({
            "payouts": payouts,
            "pagination": {
                "current_page": current_page,
                "last_page": last_page,
                "per_page": 15,
                "total": rows.len()
            }
        })
    }

    fn store() -> PayoutStore<FakeRemote, MemoryCache> {
        PayoutStore::new(FakeRemote::default(), MemoryCache::new())
    }

    fn ids(store: &PayoutStore<FakeRemote, MemoryCache>) -> Vec<u64> {
        store.state().payouts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn first_page_replaces_list_and_sets_total() {
        let mut store = store();
        store.remote().push_page(&[(1, 100.0), (2, 50.5)], 1, 2);
        store.remote().push_page(&[(9, 10.0)], 1, 1);

        store.fetch_list(None).unwrap();
        assert_eq!(ids(&store), vec![1, 2]);
        assert_eq!(store.state().total_amount, 150.5);

        let report = store.fetch_list(Some(1)).unwrap();
        assert_eq!(report.source, PageSource::Remote);
        assert!(report.applied);
        assert_eq!(ids(&store), vec![9]);
        assert_eq!(store.state().total_amount, 10.0);
        assert_eq!(store.remote().calls(), vec!["GET payouts?page=1", "GET payouts?page=1"]);
    }

    #[test]
    fn later_pages_append_only_unseen_ids() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0), (2, 20.0), (3, 30.0)], 1, 2);
        store.remote().push_page(&[(3, 999.0), (4, 40.0), (5, 50.0)], 2, 2);

        store.fetch_list(Some(1)).unwrap();
        store.fetch_list(Some(2)).unwrap();

        assert_eq!(ids(&store), vec![1, 2, 3, 4, 5]);
        assert_eq!(store.state().find(3).unwrap().amount, 30.0);
        assert_eq!(store.state().total_amount, 150.0);
        assert_eq!(store.state().pagination.unwrap().current_page, 2);
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let mut store = store();
        store.remote().push_data(json!({
            "payouts": [],
            "pagination": {"current_page": 1, "last_page": 1, "per_page": 15, "total": 0}
        }));

        let report = store.fetch_list(None).unwrap();
        assert!(report.page.payouts.is_empty());
        assert!(store.state().payouts.is_empty());
        assert_eq!(store.state().total_amount, 0.0);
        assert_eq!(store.state().error, None);
    }

    #[test]
    fn network_failure_falls_back_to_cached_page() {
        let mut store = store();
        store
            .cache
            .set_item(
                PAYOUTS_CACHE_KEY,
                &json!({
                    "payouts": [payout_json(7, 100.0, "paid")],
                    "pagination": {"current_page": 1, "last_page": 1, "per_page": 15, "total": 1}
                })
                .to_string(),
            )
            .unwrap();
        store.remote().push_network_error();

        let report = store.fetch_list(Some(1)).unwrap();

        assert_eq!(report.source, PageSource::Cache);
        assert_eq!(report.page.payouts[0].id, 7);
        assert_eq!(ids(&store), vec![7]);
        assert_eq!(store.state().find(7).unwrap().status, PayoutStatus::Paid);
        assert_eq!(store.state().total_amount, 100.0);
        assert_eq!(store.state().error, None);
        assert!(!store.state().is_loading());
    }

    #[test]
    fn network_failure_without_cache_surfaces_error() {
        let mut store = store();
        store.remote().push_network_error();

        let err = store.fetch_list(None).unwrap_err();
        assert!(matches!(err, PayoutError::Transport(_)));
        assert_eq!(
            store.state().error.as_deref(),
            Some("Network error: connection refused")
        );
    }

    #[test]
    fn business_failure_does_not_use_cache() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0)], 1, 1);
        store.fetch_list(None).unwrap();

        store.remote().push(Ok(Outcome::Failure {
            reason: "Not allowed".to_string(),
        }));
        let err = store.fetch_list(None).unwrap_err();

        assert!(matches!(err, PayoutError::Rejected(_)));
        assert_eq!(store.state().error.as_deref(), Some("Not allowed"));
        assert_eq!(ids(&store), vec![1]);
    }

    #[test]
    fn malformed_page_degrades_to_cache() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0)], 1, 1);
        store.fetch_list(None).unwrap();

        store.remote().push_data(json!({"payouts": "nope"}));
        let report = store.fetch_list(None).unwrap();
        assert_eq!(report.source, PageSource::Cache);
        assert_eq!(ids(&store), vec![1]);
    }

    #[test]
    fn cache_holds_latest_page_only() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0)], 1, 2);
        store.remote().push_page(&[(2, 20.0)], 2, 2);

        store.fetch_list(Some(1)).unwrap();
        store.fetch_list(Some(2)).unwrap();

        let raw = store.cache().get_item(PAYOUTS_CACHE_KEY).unwrap().unwrap();
        let cached: Page = serde_json::from_str(&raw).unwrap();
        assert_eq!(cached.pagination.current_page, 2);
        assert_eq!(cached.payouts.len(), 1);
        assert_eq!(cached.payouts[0].id, 2);
    }

    #[test]
    fn cache_write_failure_does_not_fail_fetch() {
        let remote = FakeRemote::default();
        remote.push_page(&[(1, 10.0)], 1, 1);
        let mut store = PayoutStore::new(remote, ReadOnlyCache);

        let report = store.fetch_list(None).unwrap();
        assert!(report.applied);
        assert_eq!(store.state().payouts.len(), 1);
    }

    #[test]
    fn unreadable_cache_counts_as_missing() {
        let mut store = store();
        store.cache.set_item(PAYOUTS_CACHE_KEY, "{broken").unwrap();
        store.remote().push_network_error();

        assert!(store.fetch_list(None).is_err());
        assert!(store.state().error.is_some());
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut store = store();
        let slow = store.begin_fetch(Some(1)).unwrap();
        let fast = store.begin_fetch(Some(1)).unwrap();
        assert!(slow.seq() < fast.seq());

        store.remote().push_page(&[(10, 1.0), (11, 2.0)], 1, 1);
        let fresh = store.request_page(&fast);
        store.complete_fetch(fast, fresh).unwrap();

        store.remote().push_page(&[(1, 500.0)], 1, 1);
        let old = store.request_page(&slow);
        let report = store.complete_fetch(slow, old).unwrap();

        assert!(!report.applied);
        assert_eq!(ids(&store), vec![10, 11]);
        assert_eq!(store.state().total_amount, 3.0);
        assert!(!store.state().is_loading());

        let raw = store.cache().get_item(PAYOUTS_CACHE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"id\":10"));
    }

    #[test]
    fn stale_failure_leaves_error_slot_alone() {
        let mut store = store();
        let slow = store.begin_fetch(Some(1)).unwrap();
        let fast = store.begin_fetch(Some(2)).unwrap();

        store.remote().push_page(&[(5, 5.0)], 2, 2);
        let fresh = store.request_page(&fast);
        store.complete_fetch(fast, fresh).unwrap();

        let err = store
            .complete_fetch(slow, Err(PayoutError::Transport("timeout".to_string())))
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(store.state().error, None);
        assert_eq!(ids(&store), vec![5]);
    }

    #[test]
    fn loading_flags_track_initial_and_incremental_requests() {
        let mut store = store();
        let first = store.begin_fetch(None).unwrap();
        assert!(store.state().is_loading());
        assert!(!store.state().is_loading_more());

        let second = store.begin_fetch(Some(2)).unwrap();
        assert!(store.state().is_loading_more());

        store.remote().push_page(&[(1, 1.0)], 1, 2);
        let result = store.request_page(&first);
        store.complete_fetch(first, result).unwrap();
        assert!(!store.state().is_loading());
        assert!(store.state().is_loading_more());

        store.remote().push_page(&[(2, 1.0)], 2, 2);
        let result = store.request_page(&second);
        store.complete_fetch(second, result).unwrap();
        assert!(!store.state().is_loading_more());
        assert_eq!(ids(&store), vec![1, 2]);
    }

    #[test]
    fn page_zero_is_rejected_locally() {
        let mut store = store();
        let err = store.fetch_list(Some(0)).unwrap_err();
        assert!(matches!(err, PayoutError::InvalidPage(0)));
        assert!(store.remote().calls().is_empty());
        assert!(!store.state().is_loading());
        assert_eq!(store.state().error, None);
    }

    #[test]
    fn load_more_walks_until_last_page() {
        let mut store = store();
        assert!(store.load_more().unwrap().is_none());

        store.remote().push_page(&[(1, 1.0)], 1, 3);
        store.remote().push_page(&[(2, 1.0)], 2, 3);
        store.remote().push_page(&[(3, 1.0)], 3, 3);

        store.refresh().unwrap();
        while store.load_more().unwrap().is_some() {}

        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert_eq!(
            store.remote().calls(),
            vec!["GET payouts?page=1", "GET payouts?page=2", "GET payouts?page=3"]
        );
    }

    #[test]
    fn load_more_stops_after_falling_back_to_cache() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0)], 1, 3);
        store.refresh().unwrap();
        store.remote().push_network_error();

        let report = store.load_more().unwrap().unwrap();
        assert_eq!(report.source, PageSource::Cache);
        assert!(store.state().from_cache);
        assert!(store.load_more().unwrap().is_none());

        assert_eq!(ids(&store), vec![1]);
        assert_eq!(store.state().pagination.unwrap().current_page, 1);
        assert_eq!(
            store.remote().calls(),
            vec!["GET payouts?page=1", "GET payouts?page=2"]
        );

        store.remote().push_page(&[(1, 10.0)], 1, 3);
        store.refresh().unwrap();
        assert!(!store.state().from_cache);
        store.remote().push_page(&[(2, 20.0)], 2, 3);
        assert!(store.load_more().unwrap().is_some());
        assert_eq!(ids(&store), vec![1, 2]);
    }

    #[test]
    fn later_page_cache_fallback_appends_unseen_ids() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0), (2, 20.0)], 1, 3);
        store.fetch_list(Some(1)).unwrap();

        store
            .cache
            .set_item(
                PAYOUTS_CACHE_KEY,
                &page_json(&[(2, 999.0), (9, 90.0)], 2, 3).to_string(),
            )
            .unwrap();
        store.remote().push_network_error();

        let report = store.fetch_list(Some(2)).unwrap();
        assert_eq!(report.source, PageSource::Cache);
        assert_eq!(ids(&store), vec![1, 2, 9]);
        assert_eq!(store.state().find(2).unwrap().amount, 20.0);
        assert_eq!(store.state().total_amount, 120.0);
        assert_eq!(store.state().pagination.unwrap().current_page, 2);
        assert_eq!(store.state().error, None);
    }

    #[test]
    fn later_pages_completing_out_of_order_are_all_kept() {
        let mut store = store();
        store.remote().push_page(&[(1, 1.0)], 1, 3);
        store.refresh().unwrap();

        let second = store.begin_fetch(Some(2)).unwrap();
        let third = store.begin_fetch(Some(3)).unwrap();

        store.remote().push_page(&[(3, 3.0)], 3, 3);
        let result = store.request_page(&third);
        assert!(store.complete_fetch(third, result).unwrap().applied);

        store.remote().push_page(&[(2, 2.0)], 2, 3);
        let result = store.request_page(&second);
        assert!(store.complete_fetch(second, result).unwrap().applied);

        let mut held = ids(&store);
        held.sort();
        assert_eq!(held, vec![1, 2, 3]);
        assert_eq!(store.state().total_amount, 6.0);
        assert_eq!(store.state().pagination.unwrap().current_page, 3);
        assert!(store.load_more().unwrap().is_none());
        assert!(!store.state().is_loading_more());
    }

    #[test]
    fn later_page_issued_before_a_refresh_is_dropped() {
        let mut store = store();
        let before = store.begin_fetch(Some(2)).unwrap();

        store.remote().push_page(&[(1, 1.0)], 1, 2);
        store.refresh().unwrap();

        store.remote().push_page(&[(50, 5.0)], 2, 2);
        let result = store.request_page(&before);
        let report = store.complete_fetch(before, result).unwrap();

        assert!(!report.applied);
        assert_eq!(ids(&store), vec![1]);
        assert_eq!(store.state().pagination.unwrap().current_page, 1);
    }

    #[test]
    fn detail_fetch_fills_current_slot_only() {
        let mut store = store();
        store
            .remote()
            .push_data(json!({ "payout": payout_json(42, 75.0, "overdue") }));

        let record = store.fetch_detail(42).unwrap();
        assert_eq!(record.id, 42);
        assert_eq!(record.status, PayoutStatus::Overdue);
        assert!(store.state().payouts.is_empty());
        assert_eq!(store.remote().calls(), vec!["GET payouts/42"]);
    }

    #[test]
    fn cancel_updates_list_and_current_record() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0), (2, 20.0)], 1, 1);
        store.fetch_list(None).unwrap();
        store
            .remote()
            .push_data(json!({ "payout": payout_json(2, 20.0, "scheduled") }));
        store.fetch_detail(2).unwrap();

        store.remote().push_data(Value::Null);
        store.remote().push_data(Value::Null);
        store.cancel(2).unwrap();
        store.cancel(2).unwrap();

        assert_eq!(store.state().find(2).unwrap().status, PayoutStatus::Cancelled);
        assert_eq!(store.state().find(1).unwrap().status, PayoutStatus::Scheduled);
        assert_eq!(
            store.state().current.as_ref().unwrap().status,
            PayoutStatus::Cancelled
        );
        assert_eq!(
            &store.remote().calls()[2..],
            &["DELETE payouts/2", "DELETE payouts/2"]
        );
    }

    #[test]
    fn rejected_cancel_leaves_record_untouched() {
        let mut store = store();
        store.remote().push_data(json!({
            "payouts": [payout_json(42, 80.0, "scheduled")],
            "pagination": {"current_page": 1, "last_page": 1, "per_page": 15, "total": 1}
        }));
        store.fetch_list(None).unwrap();

        store.remote().push(Ok(Outcome::Failure {
            reason: "Already paid".to_string(),
        }));
        let err = store.cancel(42).unwrap_err();

        assert_eq!(err.to_string(), "Already paid");
        assert_eq!(store.state().find(42).unwrap().status, PayoutStatus::Scheduled);
        assert_eq!(store.state().error.as_deref(), Some("Already paid"));
    }

    #[test]
    fn empty_reference_never_reaches_the_network() {
        let mut store = store();
        store.remote().push(Ok(Outcome::Failure {
            reason: "earlier failure".to_string(),
        }));
        let _ = store.cancel(1);

        let update = StatusUpdate::new(PaymentMethod::BankTransfer, "", None);
        let err = store.submit_status_update(1, &update).unwrap_err();

        assert!(matches!(err, PayoutError::MissingReference));
        assert_eq!(store.remote().calls(), vec!["DELETE payouts/1"]);
        assert_eq!(store.state().error.as_deref(), Some("earlier failure"));
    }

    #[test]
    fn status_update_returns_server_record_without_local_mutation() {
        let mut store = store();
        store.remote().push_page(&[(3, 30.0)], 1, 1);
        store.fetch_list(None).unwrap();

        let mut paid = payout_json(3, 30.0, "paid");
        paid["paid_date"] = json!("2026-04-02");
        store.remote().push_data(json!({ "payout": paid }));

        let update = StatusUpdate::new(
            PaymentMethod::Cheque,
            " CHQ-001 ",
            Some("posted".to_string()),
        );
        let record = store.submit_status_update(3, &update).unwrap().unwrap();

        assert_eq!(record.status, PayoutStatus::Paid);
        assert_eq!(store.state().find(3).unwrap().status, PayoutStatus::Scheduled);
        assert_eq!(store.remote().calls()[1], "PUT payouts/3/status");
    }

    #[test]
    fn summary_groups_by_status() {
        let mut store = store();
        store.remote().push_data(json!({
            "payouts": [
                payout_json(1, 10.0, "paid"),
                payout_json(2, 15.0, "paid"),
                payout_json(3, 5.0, "overdue")
            ],
            "pagination": {"current_page": 1, "last_page": 1, "per_page": 15, "total": 3}
        }));
        store.fetch_list(None).unwrap();

        let summary = store.state().summary();
        assert_eq!(summary[0], (PayoutStatus::Scheduled, StatusTally::default()));
        assert_eq!(
            summary[1],
            (PayoutStatus::Paid, StatusTally { count: 2, amount: 25.0 })
        );
        assert_eq!(summary[2].1.count, 1);
        assert_eq!(summary[3].1.count, 0);
    }

    #[test]
    fn reset_drops_state_and_in_flight_requests() {
        let mut store = store();
        store.remote().push_page(&[(1, 10.0)], 1, 1);
        store.fetch_list(None).unwrap();

        let in_flight = store.begin_fetch(None).unwrap();
        store.reset();
        assert!(store.state().payouts.is_empty());
        assert!(!store.state().is_loading());

        store.remote().push_page(&[(2, 10.0)], 1, 1);
        let result = store.request_page(&in_flight);
        let report = store.complete_fetch(in_flight, result).unwrap();
        assert!(!report.applied);
        assert!(store.state().payouts.is_empty());
    }
}
