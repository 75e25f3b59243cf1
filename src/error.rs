use crate::classify::ErrorClass;
use derive_more::{
    Display,
    Error,
};

/// A failed statement as reported by the driver, reduced to what the
/// classifier needs.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("{class}: {text}")]
pub struct QueryFailure {
    pub class: ErrorClass,
    pub text: String,
}

impl QueryFailure {
    pub fn new(class: ErrorClass, text: impl Into<String>) -> Self {
        Self {
            class,
            text: text.into(),
        }
    }
}

/// Everything that can go wrong inside one collection cycle. None of these
/// escape the cycle; they end up in logs and as missing samples.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum CollectError {
    /// The daemon could not be reached or the session broke.
    #[display("cannot connect to daemon: {reason}")]
    Connectivity { reason: String },

    /// A statement failed in a way that taints the whole session.
    #[display("query `{name}` failed: {failure}")]
    CriticalQuery {
        name: String,
        #[error(not(source))]
        failure: QueryFailure,
    },

    /// The daemon permanently rejects this statement.
    #[display("query `{name}` is not supported and was removed: {failure}")]
    PrunableQuery {
        name: String,
        #[error(not(source))]
        failure: QueryFailure,
    },

    /// A single value in an otherwise good row.
    #[display("cannot parse `{key}`: {reason}")]
    Parse { key: String, reason: String },
}
