//! Configuration of the resolver core itself — not of a surrounding
//! server. Deserializable the way `connectors::runtime`'s own small
//! per-feature config structs are (`#[derive(Deserialize)]` plus
//! `#[serde(default)]` fields so a caller's config document only needs to
//! mention what it overrides).

use serde::{Deserialize, Serialize};
use serde_json_bytes::ByteString;

use crate::context::RenameRule;

/// Behavior flags the walker and extensions writer need at construction
/// time. Built once per gateway configuration load and shared across
/// requests; per-request state (variables, the authorizer/tracer/rate
/// limiter instances themselves) lives on [`crate::context::Context`]
/// instead.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverOptions {
    /// Include a `trace` section in `extensions` when a tracer is
    /// configured for the request.
    pub include_trace: bool,
    /// Include a `rateLimit` section in `extensions` when a rate limiter is
    /// configured for the request.
    pub include_rate_limit_stats: bool,
    /// `__typename` rewrites applied to every response, e.g. hiding
    /// subgraph-internal type names from clients.
    pub rename_type_names: Vec<RenameRuleConfig>,
}

/// The serializable form of [`RenameRule`] — `RenameRule` itself stores
/// interned `ByteString`s, which isn't a natural `serde` shape for a config
/// document authored as plain strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRuleConfig {
    pub from: String,
    pub to: String,
}

impl ResolverOptions {
    pub fn rename_rules(&self) -> Vec<RenameRule> {
        self.rename_type_names
            .iter()
            .map(|rule| RenameRule {
                from: ByteString::from(rule.from.as_str()),
                to: ByteString::from(rule.to.as_str()),
            })
            .collect()
    }
}
