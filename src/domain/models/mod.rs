//! Domain models: keys, payloads, EDC tables, and configuration.

pub mod config;
pub mod edc;
pub mod key;
pub mod records;

pub use config::{CacheConfig, Config, DatabaseConfig, LoggingConfig};
pub use key::{ConsumerId, DeriveParams, DerivedKey, FetchParams, RawKey, SourceId};
pub use records::{
    DerivedView, EgsRecord, EgsSource, PjmRecord, PtcRecord, RatePoint, RawSnapshot,
};
