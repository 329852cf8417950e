//! Turns a validated [`Query`] into the concrete HTTP requests to send.
//!
//! Nothing here touches the network: the output can be rendered with
//! `Display` to show exactly what would be called (with the key masked).

use crate::dataset::Dataset;
use crate::error::{CensusError, Result};
use crate::geography::Geography;
use crate::models::{ApiKey, Query, Scope, VariableDescriptor};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use std::fmt;

/// Query parameter carrying the credential.
pub const KEY_PARAM: &str = "key";

// Keep the characters of `get`/`for`/`in` clauses readable.
const SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b',')
    .remove(b':')
    .remove(b'*');

fn enc(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, SAFE).to_string()
}

/// A fully-formed GET request.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: &'static str,
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: "GET",
            endpoint: endpoint.into(),
            params: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// The URL to send, credential included.
    pub fn url(&self) -> String {
        self.render(false)
    }

    /// The URL with the credential masked; safe for logs and `show_call`.
    pub fn redacted_url(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        if self.params.is_empty() {
            return self.endpoint.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(n, v)| {
                if redact && n == KEY_PARAM {
                    format!("{n}=<redacted>")
                } else {
                    format!("{}={}", enc(n), enc(v))
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.endpoint, query)
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.redacted_url())
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.redacted_url())
            .field("headers", &self.headers)
            .finish()
    }
}

/// One data request plus where its result goes when merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRequest {
    pub descriptor: RequestDescriptor,
    /// Index of the state group; groups are concatenated in order.
    pub group: usize,
    /// Variable codes carried by this request; chunks of a group are joined by entity.
    pub variables: Vec<String>,
}

pub fn data_endpoint(base_url: &str, dataset: Dataset, year: i32) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        year,
        dataset.spec().path
    )
}

/// Request for the dataset's full variable dictionary.
pub fn catalog_request(base_url: &str, dataset: Dataset, year: i32) -> RequestDescriptor {
    RequestDescriptor::get(format!(
        "{}/variables.json",
        data_endpoint(base_url, dataset, year)
    ))
}

/// Member variables of `table`, in catalog order.
///
/// ### Errors
/// [`CensusError::Validation`] when the catalog has no variable in that table.
pub fn expand_table(table: &str, catalog: &[VariableDescriptor]) -> Result<Vec<String>> {
    let prefix = format!("{}_", table.trim().to_ascii_uppercase());
    let codes: Vec<String> = catalog
        .iter()
        .filter(|v| v.code.starts_with(&prefix))
        .map(|v| v.code.clone())
        .collect();
    if codes.is_empty() {
        return Err(CensusError::validation(format!(
            "table `{table}` has no variables in this dataset"
        )));
    }
    Ok(codes)
}

/// Build every request needed to answer `query` for `variables`.
///
/// `variables` is the resolved list: the query's own codes, or the expansion
/// of its table. Requests are split when the `get` clause would exceed the
/// dataset's field limit, and repeated per state for geographies nested under
/// states.
pub fn build_requests(
    base_url: &str,
    query: &Query,
    scope: &Scope,
    variables: &[String],
    key: Option<&ApiKey>,
) -> Result<Vec<PlannedRequest>> {
    if variables.is_empty() {
        return Err(CensusError::validation("no variables to request"));
    }
    let spec = query.dataset.spec();
    let endpoint = data_endpoint(base_url, query.dataset, query.year);

    let mut fixed: Vec<String> = vec![spec.name_field.to_string()];
    fixed.extend(spec.dimension_fields.iter().map(|f| f.to_string()));
    fixed.extend(query.breakdown.iter().cloned());

    let per_var = spec.suffix.fields_per_variable();
    let room = spec.max_fields.saturating_sub(fixed.len());
    if room < per_var {
        return Err(CensusError::validation("too many breakdown fields for one request"));
    }
    let chunk_size = room / per_var;

    let groups = geography_clauses(query.geography, scope);
    let mut out = Vec::new();
    for (group, (for_clause, in_clause)) in groups.into_iter().enumerate() {
        for chunk in variables.chunks(chunk_size) {
            let mut get = fixed.clone();
            for code in chunk {
                let (value, margin) = spec.suffix.fields(code);
                get.push(value);
                get.extend(margin);
            }
            let mut req = RequestDescriptor::get(endpoint.clone())
                .param("get", get.join(","))
                .param("for", for_clause.clone());
            if let Some(in_clause) = &in_clause {
                req = req.param("in", in_clause.clone());
            }
            if let Some(key) = key {
                req = req.param(KEY_PARAM, key.expose());
            }
            out.push(PlannedRequest {
                descriptor: req,
                group,
                variables: chunk.to_vec(),
            });
        }
    }
    Ok(out)
}

/// `(for, in)` clause pairs, one per state group.
fn geography_clauses(geo: Geography, scope: &Scope) -> Vec<(String, Option<String>)> {
    let name = geo.wire_name();
    if geo.state_in_for_clause() {
        let states = if scope.states.is_empty() {
            "*".to_string()
        } else {
            scope.states.join(",")
        };
        return vec![(format!("{name}:{states}"), None)];
    }

    let counties = if scope.counties.is_empty() {
        "*".to_string()
    } else {
        scope.counties.join(",")
    };
    if geo == Geography::County {
        let for_clause = format!("county:{counties}");
        if scope.states.is_empty() {
            return vec![(for_clause, None)];
        }
        return scope
            .states
            .iter()
            .map(|s| (for_clause.clone(), Some(format!("state:{s}"))))
            .collect();
    }

    let for_clause = format!("{name}:*");
    if scope.states.is_empty() {
        return vec![(for_clause, None)];
    }
    scope
        .states
        .iter()
        .map(|s| {
            let mut in_clause = format!("state:{s}");
            if !scope.counties.is_empty() || geo.needs_county_level() {
                in_clause.push_str(&format!(" county:{counties}"));
            }
            if geo == Geography::Block {
                in_clause.push_str(" tract:*");
            }
            (for_clause.clone(), Some(in_clause))
        })
        .collect()
}
