//! eres-data - Shared data caching layer for the ERES energy analytics
//! platform.
//!
//! Sits between the slow-changing upstream datasets (EGS retail offers,
//! PJM locational marginal prices, PTC default-service rates) and the
//! consumer modules that each need differently-shaped views of them. Each
//! raw dataset is fetched at most once per validity window; per-consumer
//! views are derived from the snapshot and cached independently; concurrent
//! requests for the same data are collapsed into a single fetch and a
//! single derivation (single-flight de-duplication).
//!
//! # Architecture
//!
//! The crate follows Hexagonal Architecture:
//!
//! - **Domain Layer** (`domain`): keys, payload models, errors, and the
//!   `RawFetcher` port
//! - **Service Layer** (`services`): the memoization store, the derivation
//!   registry, and the `SharedDataManager` façade
//! - **Adapters** (`adapters`): MySQL-backed fetchers for the upstream views
//! - **Infrastructure** (`infrastructure`): configuration loading and
//!   logging setup
//!
//! # Example
//!
//! ```ignore
//! use eres_data::{ConfigLoader, SharedDataManager};
//! use eres_data::adapters::mysql::{create_pool, MySqlEgsFetcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let pool = create_pool(&config.database, None).await?;
//!     let manager = SharedDataManager::builder()
//!         .with_fetcher(Arc::new(MySqlEgsFetcher::new(pool)))
//!         .with_config(config.cache)
//!         .build()?;
//!
//!     let view = manager.egs_for_future(Some("PECO Energy".into())).await?;
//!     println!("{} points", view.len());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DataError, DataResult};
pub use domain::models::{
    CacheConfig, Config, ConsumerId, DatabaseConfig, DeriveParams, DerivedView, EgsRecord,
    EgsSource, FetchParams, LoggingConfig, PjmRecord, PtcRecord, RatePoint, RawSnapshot, SourceId,
};
pub use domain::ports::RawFetcher;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    DerivationRegistry, MemoizationStore, SharedDataManager, SharedDataManagerBuilder, StalePolicy,
};
