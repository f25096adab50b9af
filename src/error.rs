use thiserror::Error;

/// Errors surfaced by the row mapper and parameter binder.
///
/// None of these are recovered from internally: every variant is handed
/// back to the caller with as much offending
/// context — entity type, column name, parameter name — as the call site
/// has available.
#[derive(Debug, Error)]
pub enum MapperError {
    /// Commit or rollback was requested on a session with no active
    /// transaction. The core itself never opens/commits/aborts a
    /// transaction (it only forwards an opaque handle), but callers that
    /// build on top of it hit this when they misuse the handle.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// A single-row contract (`query_single`, `GridReader::read_single`)
    /// yielded zero rows.
    #[error("sequence contains no rows (expected exactly one)")]
    SequenceEmpty,

    /// A single-row contract yielded more than one row.
    #[error("sequence contains more than one row (expected exactly one)")]
    SequenceMultiple,

    /// The target entity type has no usable constructor, or a required
    /// handler contract is violated (e.g. an enum field missing its
    /// database-name mapping).
    #[error("entity `{entity}` cannot be constructed: {reason}")]
    InvalidEntity { entity: &'static str, reason: String },

    /// A registered type handler returned an inconsistent value: a
    /// nullable unwrap failed, or the produced value did not match the
    /// target type.
    #[error("type handler for `{target_type}` violated its contract: {reason}")]
    HandlerContract {
        target_type: &'static str,
        reason: String,
    },

    /// Any error surfaced by the underlying driver: connection, SQL, or
    /// type-coercion failures. Wrapped with the SQL text and, where known,
    /// the parameter names that were bound when the failure occurred.
    #[error("driver failure executing `{sql}`: {source}")]
    DriverFailure {
        sql: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A cancellation signal was observed before or during execution.
    #[error("operation cancelled")]
    Cancelled,
}

impl MapperError {
    pub fn invalid_entity(entity: &'static str, reason: impl Into<String>) -> Self {
        MapperError::InvalidEntity {
            entity,
            reason: reason.into(),
        }
    }

    pub fn handler_contract(target_type: &'static str, reason: impl Into<String>) -> Self {
        MapperError::HandlerContract {
            target_type,
            reason: reason.into(),
        }
    }

    pub fn driver_failure(
        sql: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MapperError::DriverFailure {
            sql: sql.into(),
            source: Box::new(source),
        }
    }
}

pub type MapperResult<T> = Result<T, MapperError>;
