//! Variable dictionary per `(dataset, year)`, fetched once and shared.
//!
//! # Design
//!
//! - One bulk `variables.json` download per key, lazily on first use
//! - Concurrent first lookups for the same key wait on a per-key lock, so
//!   only one of them hits the network
//! - No eviction: a published dataset's dictionary never changes upstream
//! - Optional [`CacheStore`] so later processes skip the download; entries are
//!   written only after a complete, successful fetch

use crate::classify::classify;
use crate::dataset::Dataset;
use crate::error::{CensusError, Result};
use crate::models::VariableDescriptor;
use crate::request::catalog_request;
use crate::transport::Transport;
use regex::RegexBuilder;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogKey {
    pub dataset: Dataset,
    pub year: i32,
}

/// Persistent key-value store for catalogs.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CatalogKey) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &CatalogKey, bytes: &[u8]) -> Result<()>;
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
}

impl FsCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CatalogKey) -> PathBuf {
        let stem = key.dataset.spec().path.replace('/', "_");
        self.dir.join(format!("{stem}_{}_variables.json", key.year))
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, key: &CatalogKey) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a temp file in the same directory, then rename over the target.
    fn put(&self, key: &CatalogKey, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct VariablesDoc {
    variables: BTreeMap<String, RawVariable>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    #[serde(default)]
    label: String,
    #[serde(default)]
    concept: Option<String>,
    #[serde(default)]
    group: Option<String>,
}

/// Parse a `variables.json` document into descriptors sorted by code.
///
/// ### Errors
/// [`CensusError::Decode`] when the document is not the expected JSON object.
pub fn parse_catalog(dataset: Dataset, body: &str) -> Result<Vec<VariableDescriptor>> {
    let doc: VariablesDoc = serde_json::from_str(body)
        .map_err(|e| CensusError::Decode(format!("variables.json: {e}")))?;
    let mut out: Vec<VariableDescriptor> = doc
        .variables
        .into_iter()
        .filter_map(|(wire, v)| {
            let code = dataset.catalog_code(&wire, v.group.as_deref())?;
            Some(VariableDescriptor {
                code,
                label: v.label,
                concept: v.concept.unwrap_or_default(),
            })
        })
        .collect();
    out.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(out)
}

type Entries = Arc<Vec<VariableDescriptor>>;

pub struct VariableCatalog {
    transport: Arc<dyn Transport>,
    base_url: String,
    store: Option<Arc<dyn CacheStore>>,
    entries: RwLock<HashMap<CatalogKey, Entries>>,
    inflight: Mutex<HashMap<CatalogKey, Arc<Mutex<()>>>>,
}

impl VariableCatalog {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            store: None,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// All variables of `dataset` in `year`.
    ///
    /// ### Errors
    /// [`CensusError::MetadataFetch`] wrapping the transport or agency error.
    pub fn lookup(&self, dataset: Dataset, year: i32) -> Result<Entries> {
        self.lookup_with_timeout(dataset, year, None)
    }

    /// Like [`Self::lookup`], with `timeout` applied to the download if one is needed.
    pub fn lookup_with_timeout(
        &self,
        dataset: Dataset,
        year: i32,
        timeout: Option<Duration>,
    ) -> Result<Entries> {
        let key = CatalogKey { dataset, year };
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let lock = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(inflight.entry(key).or_default())
        };
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited.
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let result = self.load(&key, timeout);
        if let Ok(entries) = &result {
            self.entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, Arc::clone(entries));
        }
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        result
    }

    /// Variables matching `predicate`.
    pub fn search<F>(&self, dataset: Dataset, year: i32, predicate: F) -> Result<Vec<VariableDescriptor>>
    where
        F: Fn(&VariableDescriptor) -> bool,
    {
        let all = self.lookup(dataset, year)?;
        Ok(all.iter().filter(|v| predicate(v)).cloned().collect())
    }

    /// Case-insensitive regex search over code, label and concept.
    ///
    /// ### Errors
    /// [`CensusError::Validation`] for an invalid pattern, otherwise as [`Self::lookup`].
    pub fn search_text(&self, dataset: Dataset, year: i32, pattern: &str) -> Result<Vec<VariableDescriptor>> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| CensusError::validation(format!("invalid search pattern: {e}")))?;
        self.search(dataset, year, |v| {
            re.is_match(&v.code) || re.is_match(&v.label) || re.is_match(&v.concept)
        })
    }

    fn cached(&self, key: &CatalogKey) -> Option<Entries> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn load(&self, key: &CatalogKey, timeout: Option<Duration>) -> Result<Entries> {
        if let Some(entries) = self.read_store(key) {
            return Ok(Arc::new(entries));
        }
        let entries = self.fetch(key, timeout).map_err(|e| CensusError::MetadataFetch {
            dataset: key.dataset.to_string(),
            year: key.year,
            source: Box::new(e),
        })?;
        log::info!(
            "fetched {} variables for {} {}",
            entries.len(),
            key.dataset,
            key.year
        );
        self.write_store(key, &entries);
        Ok(Arc::new(entries))
    }

    fn fetch(&self, key: &CatalogKey, timeout: Option<Duration>) -> Result<Vec<VariableDescriptor>> {
        let request = catalog_request(&self.base_url, key.dataset, key.year);
        let raw = classify(self.transport.send(&request, timeout)?)?;
        parse_catalog(key.dataset, &raw.body)
    }

    fn read_store(&self, key: &CatalogKey) -> Option<Vec<VariableDescriptor>> {
        let store = self.store.as_ref()?;
        match store.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(entries) => {
                    log::info!("loaded {} {} variables from disk cache", key.dataset, key.year);
                    Some(entries)
                }
                Err(e) => {
                    log::warn!("ignoring unreadable cache entry for {} {}: {e}", key.dataset, key.year);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("cache read failed for {} {}: {e}", key.dataset, key.year);
                None
            }
        }
    }

    fn write_store(&self, key: &CatalogKey, entries: &[VariableDescriptor]) {
        let Some(store) = &self.store else {
            return;
        };
        let persisted = serde_json::to_vec(entries)
            .map_err(|e| CensusError::Decode(e.to_string()))
            .and_then(|bytes| store.put(key, &bytes));
        if let Err(e) = persisted {
            log::warn!("could not persist {} {} variables: {e}", key.dataset, key.year);
        }
    }
}
