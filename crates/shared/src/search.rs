//! Place search against Nominatim.
//!
//! [`SearchSession`] owns the query lifecycle: each lookup gets a
//! [`Ticket`], answers for superseded tickets are dropped, and successful
//! results are kept in the `search` record store so a repeated query never
//! hits the network while fresh.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{LonLat, Millis};
use crate::persist::RecordStore;
use crate::store::{Store, Subscription};
use crate::timing::{RequestGate, Ticket};

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const SEARCH_STORE: &str = "search";
pub const SEARCH_TTL_MS: Millis = 60 * 60 * 1000;
pub const SEARCH_LIMIT: usize = 10;
/// Quiet period after the last keystroke before a lookup is sent.
pub const SEARCH_DEBOUNCE_MS: u32 = 1000;

/// One `format=jsonv2` hit. Coordinates arrive as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub place_id: u64,
    pub display_name: String,
    pub lat: String,
    pub lon: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    /// `[south, north, west, east]`
    #[serde(default)]
    pub boundingbox: Vec<String>,
}

impl SearchResult {
    pub fn lon_lat(&self) -> Option<LonLat> {
        let lon = self.lon.parse::<f64>().ok()?;
        let lat = self.lat.parse::<f64>().ok()?;
        (lon.is_finite() && lat.is_finite()).then_some([lon, lat])
    }

    /// Zoom that roughly fits the bounding box, 15 when there is none.
    pub fn zoom_hint(&self) -> f64 {
        let edges: Vec<f64> = self
            .boundingbox
            .iter()
            .filter_map(|v| v.parse::<f64>().ok())
            .collect();
        let &[south, north, west, east] = edges.as_slice() else {
            return 15.0;
        };
        let span = (north - south).abs().max((east - west).abs());
        if span <= 0.0 || !span.is_finite() {
            return 15.0;
        }
        (360.0 / span).log2().clamp(3.0, 18.0)
    }
}

/// Cache key for a query, or `None` when there is nothing to search for.
pub fn normalize_query(query: &str) -> Option<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    (!words.is_empty()).then(|| words.join(" ").to_lowercase())
}

pub fn build_search_url(query: &str, limit: usize) -> String {
    format!(
        "{}?format=jsonv2&q={}&addressdetails=1&polygon_geojson=1&limit={}",
        NOMINATIM_URL,
        urlencoding::encode(query.trim()),
        limit
    )
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub loading: bool,
    pub error: Option<String>,
}

/// A lookup that has to go to the network.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSearch {
    pub ticket: Ticket,
    pub query: String,
    key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchStart {
    /// Blank query; results cleared.
    Cleared,
    /// Answered from the record cache.
    Cached,
    Pending(PendingSearch),
}

#[derive(Clone)]
pub struct SearchSession {
    state: Store<SearchState>,
    gate: RequestGate,
    records: Rc<RecordStore>,
}

impl SearchSession {
    pub fn new(records: Rc<RecordStore>) -> Self {
        SearchSession {
            state: Store::new(SearchState::default()),
            gate: RequestGate::new(),
            records,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&SearchState) + 'static) -> Subscription {
        self.state.subscribe(listener)
    }

    /// Start a lookup for `query`. Every call supersedes earlier pending ones.
    pub fn begin(&self, query: &str) -> SearchStart {
        let Some(key) = normalize_query(query) else {
            self.gate.abort();
            self.state.set(SearchState {
                query: query.to_string(),
                ..Default::default()
            });
            return SearchStart::Cleared;
        };

        if let Some(results) = self
            .records
            .get_if_valid::<Vec<SearchResult>>(SEARCH_STORE, &key)
        {
            self.gate.abort();
            self.state.set(SearchState {
                query: query.to_string(),
                results,
                loading: false,
                error: None,
            });
            return SearchStart::Cached;
        }

        let ticket = self.gate.issue();
        self.state.update(|s| {
            s.query = query.to_string();
            s.loading = true;
            s.error = None;
        });
        SearchStart::Pending(PendingSearch {
            ticket,
            query: query.trim().to_string(),
            key,
        })
    }

    /// Still worth sending; false once a newer query has started.
    pub fn is_current(&self, pending: &PendingSearch) -> bool {
        self.gate.is_current(pending.ticket)
    }

    /// Apply a response. Returns false when it was stale and dropped.
    pub fn finish(&self, pending: PendingSearch, result: Result<Vec<SearchResult>, String>) -> bool {
        if !self.gate.is_current(pending.ticket) {
            debug!(query = %pending.query, "dropping stale search response");
            return false;
        }
        match result {
            Ok(results) => {
                self.records
                    .set(SEARCH_STORE, &pending.key, &results, SEARCH_TTL_MS);
                self.state.update(|s| {
                    s.results = results;
                    s.loading = false;
                    s.error = None;
                });
            }
            Err(e) => {
                self.state.update(|s| {
                    s.results.clear();
                    s.loading = false;
                    s.error = Some(e);
                });
            }
        }
        true
    }

    pub fn clear(&self) {
        self.gate.abort();
        self.state.set(SearchState::default());
    }
}
