//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters implement:
//! - RawFetcher: snapshot retrieval from an upstream data source
//!
//! The cache core depends only on these contracts, so fetchers are
//! pluggable and replaceable without touching cache logic.

pub mod raw_fetcher;

pub use raw_fetcher::RawFetcher;
