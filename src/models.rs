use crate::dataset::Dataset;
use crate::error::{CensusError, Result};
use crate::fips;
use crate::geography::{Filter, Geography};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Layout of the returned table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputShape {
    /// One row per (entity, variable).
    #[default]
    Tidy,
    /// One row per entity, one column (or estimate/margin pair) per variable.
    Wide,
}

impl FromStr for OutputShape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tidy" | "long" => Ok(OutputShape::Tidy),
            "wide" => Ok(OutputShape::Wide),
            other => Err(format!("unknown output shape: {other}")),
        }
    }
}

/// One entry of a dataset's variable dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub code: String,
    pub label: String,
    pub concept: String,
}

/// Census API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for blank input.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Caller-supplied display names for variable codes.
///
/// Only renames the `variable` column (tidy) or column stems (wide).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasMap {
    entries: Vec<(String, String)>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias` for `code`. Rejects blank names and reuse of either side.
    pub fn insert(&mut self, alias: impl Into<String>, code: impl Into<String>) -> Result<()> {
        let alias = alias.into().trim().to_string();
        let code = code.into().trim().to_string();
        if alias.is_empty() || code.is_empty() {
            return Err(CensusError::validation("alias and variable code must be non-empty"));
        }
        if self.entries.iter().any(|(a, _)| *a == alias) {
            return Err(CensusError::validation(format!("alias `{alias}` used twice")));
        }
        if self.entries.iter().any(|(_, c)| *c == code) {
            return Err(CensusError::validation(format!(
                "variable `{code}` has more than one alias"
            )));
        }
        self.entries.push((alias, code));
        Ok(())
    }

    pub fn alias_of(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, c)| c == code)
            .map(|(a, _)| a.as_str())
    }

    /// Output name for `code`: its alias if one was given, otherwise the code.
    pub fn stem<'a>(&'a self, code: &'a str) -> &'a str {
        self.alias_of(code).unwrap_or(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, c)| c.as_str())
    }

    /// `(alias, code)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A request for Census data.
///
/// Built with [`Query::new`] and the chained setters, then handed to
/// [`Client::fetch`](crate::Client::fetch). Nothing is checked until
/// [`Query::validate`] runs, which the client does before any network call.
///
/// ```
/// # use census_rs::{Dataset, Geography, Query};
/// let q = Query::new(Dataset::Acs5, 2019, Geography::County)
///     .state("CA")
///     .variable("B19013_001")
///     .alias("medinc", "B19013_001");
/// assert!(q.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub dataset: Dataset,
    pub year: i32,
    pub geography: Geography,
    pub state: Vec<String>,
    pub county: Vec<String>,
    pub variables: Vec<String>,
    pub table: Option<String>,
    pub aliases: AliasMap,
    pub breakdown: Vec<String>,
    pub output: OutputShape,
    /// Check each requested code against the variable catalog first.
    pub verify_variables: bool,
    pub timeout: Option<Duration>,
    alias_error: Option<String>,
}

/// Filters after validation, in API form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub states: Vec<&'static str>,
    pub counties: Vec<String>,
}

impl Query {
    pub fn new(dataset: Dataset, year: i32, geography: Geography) -> Self {
        Self {
            dataset,
            year,
            geography,
            state: Vec::new(),
            county: Vec::new(),
            variables: Vec::new(),
            table: None,
            aliases: AliasMap::new(),
            breakdown: Vec::new(),
            output: OutputShape::Tidy,
            verify_variables: false,
            timeout: None,
            alias_error: None,
        }
    }

    /// Add a variable code. Surrounding whitespace is dropped.
    pub fn variable(mut self, code: impl Into<String>) -> Self {
        self.variables.push(code.into().trim().to_string());
        self
    }

    pub fn variables<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables
            .extend(codes.into_iter().map(|c| c.into().trim().to_string()));
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state.push(state.into());
        self
    }

    pub fn county(mut self, county: impl Into<String>) -> Self {
        self.county.push(county.into());
        self
    }

    /// Name `code` as `alias` in the output. Conflicts are reported by
    /// [`Query::validate`].
    pub fn alias(mut self, alias: impl Into<String>, code: impl Into<String>) -> Self {
        if let Err(e) = self.aliases.insert(alias, code) {
            let msg = match e {
                CensusError::Validation(msg) => msg,
                other => other.to_string(),
            };
            self.alias_error.get_or_insert(msg);
        }
        self
    }

    pub fn breakdown(mut self, field: impl Into<String>) -> Self {
        self.breakdown.push(field.into());
        self
    }

    pub fn output(mut self, shape: OutputShape) -> Self {
        self.output = shape;
        self
    }

    pub fn wide(self) -> Self {
        self.output(OutputShape::Wide)
    }

    pub fn verify_variables(mut self, verify: bool) -> Self {
        self.verify_variables = verify;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check every local invariant and resolve the geography filters.
    ///
    /// ### Errors
    /// [`CensusError::Validation`] describing the first broken rule.
    pub fn validate(&self) -> Result<Scope> {
        if let Some(msg) = &self.alias_error {
            return Err(CensusError::validation(msg.clone()));
        }
        let dataset = self.dataset;
        if !dataset.has_year(self.year) {
            return Err(CensusError::validation(format!(
                "{dataset} is not available for {}",
                self.year
            )));
        }
        if !dataset.supports(self.geography) {
            return Err(CensusError::validation(format!(
                "geography `{}` is not supported by {dataset}",
                self.geography
            )));
        }

        match (&self.table, self.variables.is_empty()) {
            (Some(_), false) => {
                return Err(CensusError::validation(
                    "set either `table` or `variables`, not both",
                ));
            }
            (None, true) => {
                return Err(CensusError::validation("no variables or table requested"));
            }
            (Some(t), true) if t.trim().is_empty() => {
                return Err(CensusError::validation("table name is empty"));
            }
            _ => {}
        }
        // Fields are public, so codes set directly may still carry whitespace.
        let codes: Vec<&str> = self.variables.iter().map(|v| v.trim()).collect();
        for (i, code) in codes.iter().enumerate() {
            if code.is_empty() {
                return Err(CensusError::validation("empty variable code"));
            }
            if codes[..i].contains(code) {
                return Err(CensusError::validation(format!(
                    "variable `{code}` requested twice"
                )));
            }
        }
        if self.table.is_none() {
            if let Some(code) = self.aliases.codes().find(|c| !codes.contains(c)) {
                return Err(CensusError::validation(format!(
                    "alias targets `{code}`, which is not a requested variable"
                )));
            }
            self.check_alias_names(&codes)?;
        } else {
            self.check_alias_names::<&str>(&[])?;
        }

        let spec = dataset.spec();
        if let Some(b) = self.breakdown.iter().find(|b| !spec.breakdowns.contains(&b.as_str())) {
            return Err(CensusError::validation(format!(
                "breakdown `{b}` is not available for {dataset}"
            )));
        }

        self.resolve_scope()
    }

    /// Output names must stay unique: an alias may not reuse another
    /// resolved code or a fixed column such as `id` or `name`.
    pub(crate) fn check_alias_names<S: AsRef<str>>(&self, codes: &[S]) -> Result<()> {
        let spec = self.dataset.spec();
        for (alias, code) in self.aliases.iter() {
            let reserved = ["id", "name"].contains(&alias)
                || spec.dimension_fields.contains(&alias)
                || spec.breakdowns.contains(&alias);
            if reserved {
                return Err(CensusError::validation(format!(
                    "alias `{alias}` clashes with a fixed output column"
                )));
            }
            if alias != code && codes.iter().any(|c| c.as_ref() == alias) {
                return Err(CensusError::validation(format!(
                    "alias `{alias}` for `{code}` is also a requested variable code"
                )));
            }
        }
        Ok(())
    }

    fn resolve_scope(&self) -> Result<Scope> {
        let geo = self.geography;
        let rule = geo.filter_rule();
        check_filter("state", rule.state, self.state.is_empty(), geo)?;
        check_filter("county", rule.county, self.county.is_empty(), geo)?;

        let mut states = Vec::with_capacity(self.state.len());
        for s in &self.state {
            let fips = fips::state_fips(s)
                .ok_or_else(|| CensusError::validation(format!("unknown state `{s}`")))?;
            if !states.contains(&fips) {
                states.push(fips);
            }
        }

        let mut counties = Vec::with_capacity(self.county.len());
        if !self.county.is_empty() {
            let [state] = states.as_slice() else {
                return Err(CensusError::validation(
                    "a county filter needs exactly one state",
                ));
            };
            for c in &self.county {
                let code = fips::county_fips(c, state)
                    .ok_or_else(|| CensusError::validation(format!("invalid county `{c}`")))?;
                if !counties.contains(&code) {
                    counties.push(code);
                }
            }
        }
        Ok(Scope { states, counties })
    }
}

fn check_filter(name: &str, rule: Filter, absent: bool, geo: Geography) -> Result<()> {
    match (rule, absent) {
        (Filter::Required, true) => Err(CensusError::validation(format!(
            "geography `{geo}` requires a {name} filter"
        ))),
        (Filter::Forbidden, false) => Err(CensusError::validation(format!(
            "geography `{geo}` does not accept a {name} filter"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_validation(r: Result<Scope>) -> bool {
        matches!(r, Err(CensusError::Validation(_)))
    }

    #[test]
    fn tract_without_state_is_rejected() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::Tract).variable("B01003_001");
        assert!(is_validation(q.validate()));
    }

    #[test]
    fn table_and_variables_are_exclusive() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .table("B19001");
        assert!(is_validation(q.validate()));
        let q = Query::new(Dataset::Acs5, 2019, Geography::State);
        assert!(is_validation(q.validate()));
    }

    #[test]
    fn county_requires_single_state() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::Tract)
            .state("CA")
            .state("OR")
            .county("037")
            .variable("B01003_001");
        assert!(is_validation(q.validate()));
    }

    #[test]
    fn scope_resolves_names_and_pads_counties() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::Tract)
            .state("California")
            .county("37")
            .variable("B01003_001");
        let scope = q.validate().unwrap();
        assert_eq!(scope.states, vec!["06"]);
        assert_eq!(scope.counties, vec!["037".to_string()]);
    }

    #[test]
    fn alias_must_target_requested_variable() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .alias("income", "B19013_001");
        assert!(is_validation(q.validate()));
    }

    #[test]
    fn duplicate_alias_is_reported() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variables(["B01003_001", "B19013_001"])
            .alias("x", "B01003_001")
            .alias("x", "B19013_001");
        assert!(is_validation(q.validate()));
    }

    #[test]
    fn alias_may_not_shadow_another_code_or_fixed_column() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variables(["B01003_001", "B19013_001"])
            .alias("B01003_001", "B19013_001");
        assert!(is_validation(q.validate()));
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .alias("name", "B01003_001");
        assert!(is_validation(q.validate()));
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .alias("B01003_001", "B01003_001");
        assert!(q.validate().is_ok());
    }

    #[test]
    fn codes_are_compared_trimmed() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variables(["B01003_001", " B01003_001"]);
        assert!(is_validation(q.validate()));
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable(" B01003_001 ")
            .alias("pop", "B01003_001");
        assert_eq!(q.variables, vec!["B01003_001"]);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn breakdown_only_where_declared() {
        let q = Query::new(Dataset::Acs5, 2019, Geography::State)
            .variable("B01003_001")
            .breakdown("SEX");
        assert!(is_validation(q.validate()));
        let q = Query::new(Dataset::EstimatesCharacteristics, 2019, Geography::State)
            .variable("POP")
            .breakdown("SEX");
        assert!(q.validate().is_ok());
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("s3cret").unwrap();
        assert!(!format!("{key:?}").contains("s3cret"));
        assert!(ApiKey::new("   ").is_none());
    }
}
