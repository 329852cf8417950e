//! Shared helpers: an in-process [`Transport`] stub and payload fixtures.
#![allow(dead_code)]

use census_rs::{CensusError, Client, ClientConfig, RawResponse, RequestDescriptor, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE: &str = "http://stub.test/data";
pub const KEY: &str = "SECRETKEY123";

type Responder = Box<dyn Fn(&RequestDescriptor) -> census_rs::Result<RawResponse> + Send + Sync>;

/// Answers requests from a list of routes matched by URL substring, first
/// match wins. Unmatched requests get a 404.
pub struct StubTransport {
    routes: Vec<(String, Responder)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    log: Mutex<Vec<(String, Option<Duration>)>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn route(self, needle: &str, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        self.route_fn(needle, move |req| {
            Ok(RawResponse {
                status,
                body: body.clone(),
                url: req.redacted_url(),
            })
        })
    }

    pub fn route_fn<F>(mut self, needle: &str, f: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> census_rs::Result<RawResponse> + Send + Sync + 'static,
    {
        self.routes.push((needle.to_string(), Box::new(f)));
        self
    }

    /// Fail matching requests at the network level.
    pub fn fail(self, needle: &str, timed_out: bool) -> Self {
        self.route_fn(needle, move |req| {
            Err(CensusError::Transport {
                url: req.redacted_url(),
                timed_out,
                source: "connection reset by peer".into(),
            })
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Full URLs (key included) in the order they were sent.
    pub fn urls(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    /// Timeout passed with each request, in send order.
    pub fn timeouts(&self) -> Vec<(String, Option<Duration>)> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.urls().iter().filter(|u| u.contains(needle)).count()
    }
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: &RequestDescriptor, timeout: Option<Duration>) -> census_rs::Result<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = request.url();
        self.log.lock().unwrap().push((url.clone(), timeout));
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        for (needle, respond) in &self.routes {
            if url.contains(needle.as_str()) {
                return respond(request);
            }
        }
        Ok(RawResponse {
            status: 404,
            body: format!("no stub route for {url}"),
            url: request.redacted_url(),
        })
    }
}

pub fn config() -> ClientConfig {
    ClientConfig::default().base_url(BASE).api_key(KEY)
}

pub fn client(stub: &Arc<StubTransport>) -> Client {
    Client::with_transport(config(), stub.clone())
}

pub const STATES: [(&str, &str); 52] = [
    ("Alabama", "01"), ("Alaska", "02"), ("Arizona", "04"), ("Arkansas", "05"),
    ("California", "06"), ("Colorado", "08"), ("Connecticut", "09"), ("Delaware", "10"),
    ("District of Columbia", "11"), ("Florida", "12"), ("Georgia", "13"), ("Hawaii", "15"),
    ("Idaho", "16"), ("Illinois", "17"), ("Indiana", "18"), ("Iowa", "19"),
    ("Kansas", "20"), ("Kentucky", "21"), ("Louisiana", "22"), ("Maine", "23"),
    ("Maryland", "24"), ("Massachusetts", "25"), ("Michigan", "26"), ("Minnesota", "27"),
    ("Mississippi", "28"), ("Missouri", "29"), ("Montana", "30"), ("Nebraska", "31"),
    ("Nevada", "32"), ("New Hampshire", "33"), ("New Jersey", "34"), ("New Mexico", "35"),
    ("New York", "36"), ("North Carolina", "37"), ("North Dakota", "38"), ("Ohio", "39"),
    ("Oklahoma", "40"), ("Oregon", "41"), ("Pennsylvania", "42"), ("Rhode Island", "44"),
    ("South Carolina", "45"), ("South Dakota", "46"), ("Tennessee", "47"), ("Texas", "48"),
    ("Utah", "49"), ("Vermont", "50"), ("Virginia", "51"), ("Washington", "53"),
    ("West Virginia", "54"), ("Wisconsin", "55"), ("Wyoming", "56"), ("Puerto Rico", "72"),
];

/// ACS style payload: one row per state with estimate and margin for each code.
pub fn acs_states_payload(states: &[(&str, &str)], codes: &[&str]) -> String {
    let mut header = vec!["NAME".to_string()];
    for c in codes {
        header.push(format!("{c}E"));
        header.push(format!("{c}M"));
    }
    header.push("state".into());
    let mut rows = vec![serde_json::json!(header)];
    for (i, (name, fips)) in states.iter().enumerate() {
        let mut row = vec![name.to_string()];
        for (j, _) in codes.iter().enumerate() {
            row.push(format!("{}", (i + 1) * 1000 + j));
            row.push(format!("{}", (i + 1) * 10 + j));
        }
        row.push(fips.to_string());
        rows.push(serde_json::json!(row));
    }
    serde_json::Value::Array(rows).to_string()
}

/// A `variables.json` document listing `codes` as ACS estimates in their table group.
pub fn acs_catalog(codes: &[&str]) -> String {
    let mut vars = serde_json::Map::new();
    vars.insert(
        "NAME".into(),
        serde_json::json!({"label": "Geographic Area Name", "group": "N/A"}),
    );
    vars.insert(
        "for".into(),
        serde_json::json!({"label": "Census API FIPS 'for' clause"}),
    );
    for c in codes {
        let group = c.split('_').next().unwrap_or(c);
        vars.insert(
            format!("{c}E"),
            serde_json::json!({"label": format!("Estimate!!{c}"), "concept": format!("CONCEPT {group}"), "group": group}),
        );
        vars.insert(
            format!("{c}M"),
            serde_json::json!({"label": format!("Margin of Error!!{c}"), "concept": format!("CONCEPT {group}"), "group": group}),
        );
    }
    serde_json::json!({ "variables": vars }).to_string()
}
