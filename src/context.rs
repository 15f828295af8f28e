//! Per-request context: variables, type-name rename rules, and the
//! external collaborators (authorizer, rate limiter, tracer) the walker
//! consults. None of these collaborators are implemented here — only
//! their interfaces, per `spec.md`'s scope boundary.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value as JsonValue;

use crate::config::ResolverOptions;
use crate::error::Result;
use crate::plan::GraphCoordinate;

/// The operation kind, used verbatim in non-nullable-field error messages
/// (`Cannot return null for non-nullable field Query.me.name.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Query => "Query",
            OperationType::Mutation => "Mutation",
            OperationType::Subscription => "Subscription",
        };
        f.write_str(s)
    }
}

/// A `(from, to)` rename applied to `__typename`-valued strings, used to
/// hide internal subgraph type names from clients.
#[derive(Debug, Clone)]
pub struct RenameRule {
    pub from: ByteString,
    pub to: ByteString,
}

/// The outcome of an authorization check for a single field.
#[derive(Debug, Clone)]
pub enum AuthorizationOutcome {
    Allow,
    Deny { reason: Option<String> },
}

/// External authorizer collaborator. Implementations may be backed by
/// network calls internally, but from the walker's perspective this call
/// is synchronous: it returns a decision or a fatal error.
pub trait Authorizer {
    fn has_response_extension_data(&self, ctx: &Context) -> bool;

    fn render_response_extension(&self, ctx: &Context, writer: &mut dyn std::io::Write) -> Result<()>;

    fn authorize_object_field(
        &self,
        ctx: &Context,
        datasource_id: &str,
        flat_object_bytes: &[u8],
        coordinate: &GraphCoordinate,
    ) -> Result<AuthorizationOutcome>;
}

/// External rate-limiter collaborator.
pub trait RateLimiter {
    fn render_response_extension(&self, ctx: &Context, writer: &mut dyn std::io::Write) -> Result<()>;
}

/// Opaque fetch-tree payload handed to [`Tracer::get_trace`]. Its contents
/// are produced entirely by the out-of-scope fetch execution layer; the
/// resolver only forwards it.
#[derive(Debug, Clone, Default)]
pub struct FetchTree(pub Vec<u8>);

/// External tracer collaborator. `get_trace` is a black box producing
/// already-serialized JSON bytes.
pub trait Tracer {
    fn get_trace(&self, ctx: &Context, fetch_tree: &FetchTree, debug: bool) -> Result<Vec<u8>>;
}

/// Per-request tracing configuration, present only when tracing is active
/// for this request.
pub struct TraceOptions {
    pub tracer: Arc<dyn Tracer + Send + Sync>,
    pub fetch_tree: FetchTree,
    pub debug: bool,
}

/// Everything the walker needs that isn't the plan or the data itself.
pub struct Context {
    pub operation_type: OperationType,
    pub variables: IndexMap<String, JsonValue>,
    pub rename_type_names: Vec<RenameRule>,
    pub authorizer: Option<Arc<dyn Authorizer + Send + Sync>>,
    pub rate_limiter: Option<Arc<dyn RateLimiter + Send + Sync>>,
    pub trace: Option<TraceOptions>,
    /// Whether rate-limit stats should be included in `extensions`, for
    /// rate limiters that have stats to report only some of the time.
    pub include_rate_limit_stats: bool,
}

impl Context {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            variables: IndexMap::new(),
            rename_type_names: Vec::new(),
            authorizer: None,
            rate_limiter: None,
            trace: None,
            include_rate_limit_stats: false,
        }
    }

    /// Builds a context from statically configured [`ResolverOptions`],
    /// leaving the per-request collaborators and variables for the caller
    /// to fill in afterwards.
    pub fn from_options(operation_type: OperationType, options: &ResolverOptions) -> Self {
        Self {
            rename_type_names: options.rename_rules(),
            include_rate_limit_stats: options.include_rate_limit_stats,
            ..Self::new(operation_type)
        }
    }

    /// `@skip(if: $var)` / `@include(if: $var)` evaluation: resolves a
    /// variable to a strict boolean. Missing or non-boolean variables are
    /// not an error here — callers interpret `None` per the directive's
    /// own default-on-missing rule.
    pub fn resolve_bool_variable(&self, name: &str) -> Option<bool> {
        match self.variables.get(name) {
            Some(JsonValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Applies `rename_type_names` to a `__typename` value. Returns the
    /// input unchanged if no rule matches.
    pub fn rename_type<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.rename_type_names
            .iter()
            .find(|rule| rule.from.as_str() == type_name)
            .map(|rule| rule.to.as_str())
            .unwrap_or(type_name)
    }
}
