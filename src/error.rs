//! Error types for the resolver core.
//!
//! Most failures encountered while walking a response (a missing
//! non-nullable field, a type mismatch, an authorization deny) are *not*
//! represented here: they are recorded in the arena's errors array and
//! drive null propagation, per the GraphQL error-handling rules. The types
//! in this module are for the two situations that abort the walk outright,
//! plus internal invariant violations that must fail loudly instead of
//! silently dropping data.

/// Create an internal error.
#[macro_export]
macro_rules! internal_error {
    ( $( $arg:tt )+ ) => {
        $crate::error::ResolverError::Internal(format!( $( $arg )+ ))
    };
}

/// Break out of the current function, returning an internal error.
#[macro_export]
macro_rules! bail {
    ( $( $arg:tt )+ ) => {
        return Err($crate::internal_error!( $( $arg )+ ))
    };
}

/// In debug builds, panics on failure; in release, returns an internal error.
/// Use only for conditions that should never happen in normal operation.
#[macro_export]
macro_rules! ensure {
    ( $expr:expr, $( $arg:tt )+ ) => {
        if !$expr {
            #[cfg(debug_assertions)]
            panic!( $( $arg )+ );
            #[cfg(not(debug_assertions))]
            return Err($crate::internal_error!( $( $arg )+ ));
        }
    };
}

/// Errors that abort a resolve() call instead of being recorded as a
/// GraphQL error in the response's `errors` array.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The external authorizer returned an error (not a deny — a deny is
    /// recorded as a GraphQL error and handled via null propagation).
    #[error("authorization backend failed: {0}")]
    AuthorizationFailed(String),

    /// A write to the output sink failed. Once this happens, all
    /// subsequent writes for the request are no-ops.
    #[error("failed to write response: {0}")]
    Write(String),

    /// The initial data payload could not be parsed as JSON.
    #[error("failed to parse initial data: {0}")]
    InvalidInitialData(#[from] serde_json::Error),

    /// A custom scalar's resolve callback failed.
    #[error("custom resolver for field failed: {0}")]
    CustomResolver(String),

    /// An invariant the walker relies on was violated — e.g. an unknown
    /// plan node variant. `spec.md`'s "open question" on this is resolved
    /// as: fail loudly rather than silently drop the subtree.
    #[error("internal resolver error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
