mod common;

use census_rs::{CensusError, Dataset, Geography, Query, RawResponse};
use common::{KEY, StubTransport, client};
use std::sync::Arc;

fn state_query() -> Query {
    Query::new(Dataset::Acs5, 2019, Geography::State).variable("B01003_001")
}

fn fetch_with(status: u16, body: &str) -> CensusError {
    let stub = Arc::new(StubTransport::new().route("acs/acs5?", status, body));
    client(&stub).fetch(&state_query()).unwrap_err()
}

#[test]
fn unknown_variable_keeps_agency_text() {
    let body = "error: error: unknown variable 'B99999_001E'";
    let err = fetch_with(400, body);
    assert!(matches!(err, CensusError::UnknownVariable { .. }));
    assert_eq!(err.detail(), Some(body));
}

#[test]
fn unsupported_geography_matches_the_agency_spelling() {
    let body = "error: unknown/unsupported geography heirarchy";
    let err = fetch_with(400, body);
    assert!(matches!(err, CensusError::UnsupportedGeography { .. }));
    assert_eq!(err.detail(), Some(body));
}

#[test]
fn invalid_key_page_with_200_is_authentication() {
    let body = "<html><head><title>Invalid Key</title></head><body>A valid <em>key</em> must be included with each data API request.</body></html>";
    let err = fetch_with(200, body);
    assert!(matches!(err, CensusError::Authentication { .. }));
    assert_eq!(err.detail(), Some(body));
}

#[test]
fn forbidden_status_is_authentication() {
    assert!(matches!(
        fetch_with(403, "Forbidden"),
        CensusError::Authentication { .. }
    ));
}

#[test]
fn unrecognised_failures_fall_back_to_api_error() {
    match fetch_with(500, "Sorry, the system is currently undergoing maintenance.") {
        CensusError::Api { status, detail } => {
            assert_eq!(status, 500);
            assert_eq!(detail, "Sorry, the system is currently undergoing maintenance.");
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[test]
fn no_content_is_an_api_error() {
    assert!(matches!(
        fetch_with(204, ""),
        CensusError::Api { status: 204, .. }
    ));
}

#[test]
fn garbled_success_body_is_a_decode_error() {
    assert!(matches!(
        fetch_with(200, "[[\"NAME\",\"state\"],[\"Alabama\"]]"),
        CensusError::Decode(_)
    ));
    assert!(matches!(fetch_with(200, "not json"), CensusError::Decode(_)));
}

#[test]
fn transport_failure_reports_timeout_without_key() {
    let stub = Arc::new(StubTransport::new().fail("acs/acs5?", true));
    let err = client(&stub).fetch(&state_query()).unwrap_err();
    match &err {
        CensusError::Transport { url, timed_out, .. } => {
            assert!(*timed_out);
            assert!(!url.contains(KEY));
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    assert!(!err.to_string().contains(KEY));
    assert_eq!(stub.calls(), 1, "failures are not retried");
}

#[test]
fn failure_in_a_later_chunk_fails_the_whole_query() {
    let stub = Arc::new(StubTransport::new().route_fn("acs/acs5?", |req| {
        let get = req.param_value("get").unwrap_or("");
        let (status, body) = if get.contains("B01001_030E") {
            (400, "error: unknown variable 'B01001_030E'".to_string())
        } else {
            let header: Vec<&str> = get.split(',').chain(["state"]).collect();
            let mut row = vec!["Alabama".to_string()];
            row.extend(std::iter::repeat_n("1".to_string(), header.len() - 2));
            row.push("01".into());
            (200, serde_json::json!([header, row]).to_string())
        };
        Ok(RawResponse {
            status,
            body,
            url: req.redacted_url(),
        })
    }));
    let codes: Vec<String> = (1..=30).map(|n| format!("B01001_{n:03}")).collect();
    let q = Query::new(Dataset::Acs5, 2019, Geography::State).variables(codes);

    let err = client(&stub).fetch(&q).unwrap_err();
    assert!(matches!(err, CensusError::UnknownVariable { .. }));
    assert_eq!(stub.calls(), 2);
}

#[test]
fn show_call_masks_the_key() {
    let stub = Arc::new(StubTransport::new());
    let lines = client(&stub).show_call(&state_query()).unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("GET http://stub.test/data/2019/acs/acs5?"));
    assert!(lines[0].contains("key=<redacted>"));
    assert!(!lines[0].contains(KEY));
    assert_eq!(stub.calls(), 0);
}
