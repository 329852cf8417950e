/// Synchronous client for the **Census Bureau data API**.
///
/// A [`Query`] goes through the same steps every time:
/// validate locally, resolve a table into its variables (catalog lookup),
/// build the requests, send them, classify each answer, merge the payloads
/// and reshape them into a [`CanonicalTable`].
///
/// ### Notes
/// - The API caps a request at 50 `get` fields; larger variable lists are split
///   and joined back by entity.
/// - Nested geographies (tracts, block groups, ...) across several states are
///   fetched one state at a time.
/// - Nothing is retried. Transient failures come back as [`CensusError::Transport`].
///
/// Typical usage:
/// ```no_run
/// # use census_rs::{Client, ClientConfig, Dataset, Geography, Query};
/// let client = Client::new(ClientConfig::from_env())?;
/// let q = Query::new(Dataset::Acs5, 2019, Geography::State).variable("B01003_001");
/// let table = client.fetch(&q)?;
/// # Ok::<(), census_rs::CensusError>(())
/// ```
use crate::catalog::{FsCacheStore, VariableCatalog};
use crate::classify::classify;
use crate::config::ClientConfig;
use crate::dataset::Dataset;
use crate::error::{CensusError, Result};
use crate::models::{ApiKey, Query, VariableDescriptor};
use crate::normalize::{combine, normalize, parse_payload};
use crate::request::{PlannedRequest, build_requests, expand_table};
use crate::table::CanonicalTable;
use crate::transport::{HttpTransport, Transport};
use std::sync::Arc;

pub struct Client {
    base_url: String,
    transport: Arc<dyn Transport>,
    catalog: VariableCatalog,
    api_key: Option<ApiKey>,
    show_call: bool,
}

impl Client {
    /// Client backed by a blocking HTTP transport.
    ///
    /// ### Errors
    /// [`CensusError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout, config.connect_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client configured from `CENSUS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Client sending through `transport`.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let mut catalog = VariableCatalog::new(Arc::clone(&transport), config.base_url.clone());
        if config.cache_catalog {
            match config.effective_cache_dir() {
                Some(dir) => {
                    log::debug!("catalog cache at {}", dir.display());
                    catalog = catalog.with_store(Arc::new(FsCacheStore::new(dir)));
                }
                None => log::warn!("no cache directory available; catalog caching disabled"),
            }
        }
        Self {
            base_url: config.base_url,
            transport,
            catalog,
            api_key: config.api_key,
            show_call: config.show_call,
        }
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.catalog
    }

    /// Full variable dictionary for `dataset` in `year`.
    ///
    /// ### Errors
    /// [`CensusError::MetadataFetch`] when the dictionary cannot be downloaded.
    pub fn load_variables(&self, dataset: Dataset, year: i32) -> Result<Arc<Vec<VariableDescriptor>>> {
        self.catalog.lookup(dataset, year)
    }

    /// Variables whose code, label or concept matches `pattern` (case-insensitive regex).
    pub fn search_variables(
        &self,
        dataset: Dataset,
        year: i32,
        pattern: &str,
    ) -> Result<Vec<VariableDescriptor>> {
        self.catalog.search_text(dataset, year, pattern)
    }

    /// The requests `query` would send, without sending them.
    ///
    /// Table queries still read the catalog to learn the member variables.
    ///
    /// ### Errors
    /// [`CensusError::Validation`] for an invalid query; catalog errors for table queries.
    pub fn plan(&self, query: &Query) -> Result<Vec<PlannedRequest>> {
        Ok(self.prepare(query)?.0)
    }

    /// Rendered request lines for `query`, credential masked.
    pub fn show_call(&self, query: &Query) -> Result<Vec<String>> {
        Ok(self
            .plan(query)?
            .iter()
            .map(|p| p.descriptor.to_string())
            .collect())
    }

    /// Run `query` and return its table.
    ///
    /// ### Errors
    /// - [`CensusError::Validation`] before any request if the query is invalid
    /// - [`CensusError::MetadataFetch`] if a table expansion or verification needs the catalog and it is unavailable
    /// - the classified agency error, or [`CensusError::Transport`], for a failed request
    pub fn fetch(&self, query: &Query) -> Result<CanonicalTable> {
        let (planned, variables) = self.prepare(query)?;

        let mut payloads = Vec::with_capacity(planned.len());
        for p in &planned {
            if self.show_call {
                log::info!("{}", p.descriptor);
            }
            let raw = classify(self.transport.send(&p.descriptor, query.timeout)?)?;
            payloads.push(parse_payload(&raw.body)?);
        }

        let merged = combine(&query.dataset.spec(), &planned, payloads)?;
        let table = normalize(&merged, query, &variables)?;
        log::debug!(
            "{} {} {}: {} rows",
            query.dataset,
            query.year,
            query.geography,
            table.len()
        );
        Ok(table)
    }

    fn prepare(&self, query: &Query) -> Result<(Vec<PlannedRequest>, Vec<String>)> {
        let scope = query.validate()?;
        let variables = self.resolve_variables(query)?;
        let planned = build_requests(
            &self.base_url,
            query,
            &scope,
            &variables,
            self.api_key.as_ref(),
        )?;
        Ok((planned, variables))
    }

    fn resolve_variables(&self, query: &Query) -> Result<Vec<String>> {
        let variables = match &query.table {
            Some(table) => {
                let catalog = self.catalog_for(query)?;
                let codes = expand_table(table, &catalog)?;
                if let Some(code) = query.aliases.codes().find(|c| !codes.iter().any(|v| v == c)) {
                    return Err(CensusError::validation(format!(
                        "alias targets `{code}`, which is not in table `{table}`"
                    )));
                }
                query.check_alias_names(&codes)?;
                codes
            }
            None => query.variables.iter().map(|v| v.trim().to_string()).collect(),
        };

        if query.verify_variables && query.table.is_none() {
            let catalog = self.catalog_for(query)?;
            if let Some(code) = variables
                .iter()
                .find(|v| !catalog.iter().any(|d| &d.code == *v))
            {
                return Err(CensusError::UnknownVariable {
                    detail: format!(
                        "`{code}` is not in the {} {} variable catalog",
                        query.dataset, query.year
                    ),
                });
            }
        }
        Ok(variables)
    }

    fn catalog_for(&self, query: &Query) -> Result<Arc<Vec<VariableDescriptor>>> {
        self.catalog
            .lookup_with_timeout(query.dataset, query.year, query.timeout)
    }
}
