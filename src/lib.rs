//! census_rs
//!
//! A Rust library for querying U.S. Census Bureau tabular APIs (ACS,
//! decennial, population estimates, migration flows) and reshaping their
//! array-of-arrays payloads into tidy or wide tables. Pairs with the `census` CLI.
//!
//! ### Features
//! - Typed queries: dataset, year, geography and filters are checked before any request
//! - State/county filters accept FIPS codes, abbreviations or names
//! - Table expansion and variable search through a shared, optionally on-disk, catalog
//! - Suppression placeholders become explicit missing values
//! - Agency errors classified into distinct kinds with the original text kept
//! - Save as CSV or JSON
//!
//! ### Example
//! ```no_run
//! use census_rs::{Client, ClientConfig, Dataset, Geography, Query};
//!
//! let client = Client::new(ClientConfig::from_env().cache_catalog(true))?;
//! let q = Query::new(Dataset::Acs5, 2019, Geography::County)
//!     .state("CA")
//!     .variables(["B01003_001", "B19013_001"])
//!     .alias("population", "B01003_001")
//!     .alias("median_income", "B19013_001");
//! let table = client.fetch(&q)?;
//! census_rs::storage::save_csv(&table, "ca_counties.csv")?;
//! # Ok::<(), census_rs::CensusError>(())
//! ```

pub mod api;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fips;
pub mod geography;
pub mod models;
pub mod normalize;
pub mod request;
pub mod storage;
pub mod table;
pub mod transport;

pub use api::Client;
pub use catalog::{CacheStore, CatalogKey, FsCacheStore, VariableCatalog};
pub use config::ClientConfig;
pub use dataset::{Dataset, MeasureKind};
pub use error::{CensusError, Result};
pub use geography::Geography;
pub use models::{AliasMap, ApiKey, OutputShape, Query, VariableDescriptor};
pub use request::{PlannedRequest, RequestDescriptor};
pub use table::{CanonicalTable, Measure, TidyRow, TidyTable, WideRow, WideTable};
pub use transport::{HttpTransport, RawResponse, Transport};
