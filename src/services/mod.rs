//! Service layer: the caching core and its façade.

pub mod derivation;
pub mod memo_store;
pub mod shared_data;

pub use derivation::{DerivationRegistry, Transform, BUILTIN_PAIRS};
pub use memo_store::{MemoizationStore, StalePolicy};
pub use shared_data::{SharedDataManager, SharedDataManagerBuilder};
