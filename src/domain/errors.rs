//! Domain errors for the ERES shared-data layer.

use thiserror::Error;

use crate::domain::models::{ConsumerId, SourceId};

/// Domain-level errors surfaced by the caching layer.
///
/// The enum is `Clone` on purpose: single-flight de-duplication fans one
/// producer failure out to every concurrent waiter, so the error must be
/// shareable. Underlying causes are captured as strings at the adapter
/// boundary rather than carried as source errors; the field naming it the
/// data source is `source_id`, since thiserror reserves `source` for a
/// wrapped `std::error::Error`.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// A raw fetch against a data source failed. Transient; callers may
    /// retry after the failure cooldown elapses.
    #[error("fetch failed for source {source_id}: {cause}")]
    FetchFailed { source_id: SourceId, cause: String },

    /// No transform is registered for a (source, consumer) pair. This is a
    /// wiring bug and is checked at startup, not at request time.
    #[error("no derivation registered for ({source_id}, {consumer})")]
    UnregisteredDerivation {
        source_id: SourceId,
        consumer: ConsumerId,
    },

    /// A registered transform rejected its input snapshot.
    #[error("derivation ({source_id}, {consumer}) failed: {cause}")]
    DerivationFailed {
        source_id: SourceId,
        consumer: ConsumerId,
        cause: String,
    },

    /// A cache invariant was violated, e.g. a flight channel closed without
    /// publishing a result. Must not occur in practice; treated as a defect.
    #[error("cache invariant violated: {0}")]
    StoreCorruption(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_name_the_source_and_consumer() {
        let fetch = DataError::FetchFailed {
            source_id: SourceId::Egs,
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            fetch.to_string(),
            "fetch failed for source egs: connection refused"
        );

        let unregistered = DataError::UnregisteredDerivation {
            source_id: SourceId::Pjm,
            consumer: ConsumerId::Pjm,
        };
        assert_eq!(
            unregistered.to_string(),
            "no derivation registered for (pjm, pjm)"
        );
    }

    #[test]
    fn causes_are_strings_not_wrapped_errors() {
        // Causes are flattened to strings at the adapter boundary, so no
        // variant carries an error chain.
        let err = DataError::DerivationFailed {
            source_id: SourceId::Egs,
            consumer: ConsumerId::Fees,
            cause: "wrong snapshot shape".to_string(),
        };
        assert!(err.source().is_none());
        assert!(err.to_string().contains("wrong snapshot shape"));

        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }
}
