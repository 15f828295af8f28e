//! Authorization cache: per-request memoization of allow/deny decisions
//! keyed by `(datasource_id, type_name, field_name)`, plus a one-slot memo
//! for the flat-serialized parent object so that authorizing several
//! fields of the same object in sequence only serializes it once.

use std::collections::{HashMap, HashSet};

use sha1::{Digest, Sha1};

use crate::arena::{Arena, NodeRef};
use crate::context::{AuthorizationOutcome, Context};
use crate::error::Result;
use crate::plan::{Field, GraphCoordinate};

#[derive(Debug, Clone)]
pub enum Decision {
    Allow,
    Deny { reason: Option<String> },
}

#[derive(Default)]
pub struct AuthorizationCache {
    allow: HashSet<String>,
    deny: HashMap<String, Option<String>>,
    flat_memo: Option<(NodeRef, Vec<u8>)>,
}

/// Hex-encoded SHA-1 digest of the coordinate's colon-delimited parts, used
/// as the cache key instead of the raw strings to keep entries fixed-size
/// regardless of how long a datasource/type/field name gets.
fn decision_key(datasource_id: &str, type_name: &str, field_name: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(datasource_id.as_bytes());
    hasher.update(b":");
    hasher.update(type_name.as_bytes());
    hasher.update(b":");
    hasher.update(field_name.as_bytes());
    hex::encode(hasher.finalize())
}

impl AuthorizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.allow.clear();
        self.deny.clear();
        self.flat_memo = None;
    }

    /// Resolves the concrete type name for `parent_ref`: `__typename` on
    /// the parent object if present and a string, else the field's
    /// statically-known parent type.
    fn resolve_type_name<'a>(
        &self,
        arena: &Arena,
        parent_ref: NodeRef,
        field: &Field,
    ) -> Option<String> {
        let typename_ref = arena.get_field(parent_ref, "__typename");
        if let Some(crate::arena::Node::String(bytes)) = arena.kind(typename_ref) {
            if let Ok(s) = std::str::from_utf8(bytes) {
                return Some(s.to_string());
            }
        }
        field
            .info
            .exact_parent_type_name
            .as_ref()
            .map(|n| n.as_str().to_string())
    }

    fn flat_object_bytes(&mut self, arena: &Arena, parent_ref: NodeRef) -> Result<Vec<u8>> {
        if let Some((cached_ref, bytes)) = &self.flat_memo {
            if *cached_ref == parent_ref {
                return Ok(bytes.clone());
            }
        }
        let bytes = arena.to_flat_vec(parent_ref)?;
        self.flat_memo = Some((parent_ref, bytes.clone()));
        Ok(bytes)
    }

    /// Runs the decision algorithm for one field requiring authorization.
    /// An `Err` here is always a *fatal* authorization error and should
    /// abort the whole walk.
    pub fn authorize(
        &mut self,
        arena: &Arena,
        ctx: &Context,
        parent_ref: NodeRef,
        field: &Field,
        datasource_id: &str,
    ) -> Result<Decision> {
        let type_name = self
            .resolve_type_name(arena, parent_ref, field)
            .unwrap_or_default();
        let key = decision_key(datasource_id, &type_name, field.name.as_str());

        if self.allow.contains(&key) {
            return Ok(Decision::Allow);
        }
        if let Some(reason) = self.deny.get(&key) {
            return Ok(Decision::Deny {
                reason: reason.clone(),
            });
        }

        let Some(authorizer) = &ctx.authorizer else {
            // No authorizer configured but a rule is present: fail open
            // is not an option here, since the plan asked for a check.
            // Treat as allow-by-default would silently defeat the rule;
            // surface it as a fatal error instead.
            return Err(crate::internal_error!(
                "field '{}' requires authorization but no authorizer is configured",
                field.name.as_str()
            ));
        };

        let flat_bytes = self.flat_object_bytes(arena, parent_ref)?;
        let coordinate = field.graph_coordinate(type_name.as_str().into());
        let outcome = authorizer.authorize_object_field(ctx, datasource_id, &flat_bytes, &coordinate)?;

        let decision = match outcome {
            AuthorizationOutcome::Allow => {
                self.allow.insert(key);
                Decision::Allow
            }
            AuthorizationOutcome::Deny { reason } => {
                self.deny.insert(key, reason.clone());
                Decision::Deny { reason }
            }
        };
        Ok(decision)
    }
}
