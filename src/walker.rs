//! The response walker: the two-phase tree traversal that maps plan nodes
//! onto arena data nodes. Both phases share one dispatch function, toggled
//! by `emit`:
//!
//! * Collect (`emit = false`) validates the shape of the data against the
//!   plan, runs authorization, and mutates the arena in place so that
//!   failures are resolved to `Null`/`NullSkipError` at the point where a
//!   nullable ancestor absorbs them. No output is built.
//! * Emit (`emit = true`) re-runs the same structural logic over the
//!   (now-consistent) arena and builds the output tree under plan field
//!   names, in plan order.
//!
//! Modeled on `connectors::runtime::responses::GraphQLDataMapper::map_data`'s
//! selection-set walk, generalized from a fixed two-variant `MappedResponse`
//! into the closed `PlanNode` sum type and given explicit null-bubbling per
//! `spec.md`'s propagation rules (compare
//! `other_examples/.../response/write/mod.rs`'s `propagate_error`, which
//! threads the same "fail, then let the nearest nullable ancestor absorb"
//! decision through a response builder).

use serde_json_bytes::{json, ByteString};

use crate::arena::{Arena, Node, NodeRef, INVALID_REF};
use crate::authorization::{AuthorizationCache, Decision};
use crate::context::Context;
use crate::error::{Result, ResolverError};
use crate::path::Path;
use crate::plan::{Field, PlanNode};
use crate::response::{messages, GraphQLError};

/// Result of walking one plan node. `Value` always means "this position
/// resolved successfully" — in the emit phase it carries the built output
/// node; in the collect phase the ref is meaningless (`INVALID_REF`) since
/// collect never builds output. `NullBubble` means the position failed and
/// the caller must either absorb it (if nullable) or keep propagating.
pub enum Outcome {
    Value(NodeRef),
    NullBubble,
}

type WalkResult = Result<Outcome>;

/// Counters incremented only below the operation root (`depth >= 2`), kept
/// purely for the stats the emit phase can optionally surface; nothing in
/// the walker's control flow depends on them.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkStats {
    pub objects_visited: u64,
    pub fields_resolved: u64,
}

pub struct Walker<'a> {
    pub arena: &'a mut Arena,
    pub path: &'a mut Path,
    pub errors: &'a mut Vec<GraphQLError>,
    pub auth_cache: &'a mut AuthorizationCache,
    pub ctx: &'a Context,
    pub stats: &'a mut WalkStats,
    depth: usize,
}

impl<'a> Walker<'a> {
    pub fn new(
        arena: &'a mut Arena,
        path: &'a mut Path,
        errors: &'a mut Vec<GraphQLError>,
        auth_cache: &'a mut AuthorizationCache,
        ctx: &'a Context,
        stats: &'a mut WalkStats,
    ) -> Self {
        Self {
            arena,
            path,
            errors,
            auth_cache,
            ctx,
            stats,
            depth: 0,
        }
    }

    fn root_type(&self) -> String {
        self.ctx.operation_type.to_string()
    }

    fn push_segments(&mut self, segments: &[ByteString]) {
        for segment in segments {
            self.path.push_name(segment.clone());
        }
    }

    fn pop_segments(&mut self, count: usize) {
        for _ in 0..count {
            self.path.pop();
        }
    }

    fn record_error(&mut self, emit: bool, message: impl Into<String>) {
        if emit {
            return;
        }
        let error = GraphQLError::new(message, self.path);
        self.errors.push(error);
    }

    /// Shared nullability gate for "this node's data is absent or explicit
    /// null". `already_errored` means a higher-level failure (an
    /// authorization deny, or a custom resolver failure) has already
    /// recorded a GraphQL error for this subtree, via `NullSkipError` —
    /// registering a second "cannot return null" error would double-count.
    fn resolve_nullish(&mut self, nullable: bool, emit: bool, already_errored: bool) -> WalkResult {
        if nullable || already_errored {
            return Ok(Outcome::Value(if emit { self.arena.append_null() } else { INVALID_REF }));
        }
        let root_type = self.root_type();
        let display = self.path.display_with_root(&root_type);
        self.record_error(emit, messages::non_nullable_field_is_null(&display));
        Ok(Outcome::NullBubble)
    }

    /// Dispatches on plan-node variant. Entry point for both phases.
    pub fn walk(&mut self, node: &PlanNode, incoming_ref: NodeRef, emit: bool) -> WalkResult {
        match node {
            PlanNode::Object { path, nullable, fields } => {
                self.walk_object(path, *nullable, fields, incoming_ref, emit)
            }
            PlanNode::Array { path, nullable, item } => {
                self.walk_array(path, *nullable, item, incoming_ref, emit)
            }
            PlanNode::String { path, nullable, is_typename, unescape_response_json } => {
                self.walk_string(path, *nullable, *is_typename, *unescape_response_json, incoming_ref, emit)
            }
            PlanNode::Boolean { path, nullable } => {
                self.walk_scalar(path, *nullable, incoming_ref, emit, |n| match n {
                    Node::Boolean(_) => None,
                    _ => Some(messages::bool_mismatch),
                })
            }
            PlanNode::Integer { path, nullable } => {
                self.walk_scalar(path, *nullable, incoming_ref, emit, |n| match n {
                    Node::Number(bytes) if is_integer_bytes(bytes) => None,
                    _ => Some(messages::int_mismatch),
                })
            }
            PlanNode::Float { path, nullable } => {
                self.walk_scalar(path, *nullable, incoming_ref, emit, |n| match n {
                    Node::Number(_) => None,
                    _ => Some(messages::float_mismatch),
                })
            }
            PlanNode::BigInt { path, nullable } => {
                self.walk_scalar(path, *nullable, incoming_ref, emit, |n| match n {
                    Node::Number(_) => None,
                    _ => Some(messages::float_mismatch),
                })
            }
            PlanNode::Scalar { path, nullable } => {
                // Accepts anything; no kind check at all.
                self.walk_scalar(path, *nullable, incoming_ref, emit, |_| None)
            }
            PlanNode::Null => Ok(Outcome::Value(if emit { self.arena.append_null() } else { INVALID_REF })),
            PlanNode::EmptyObject => {
                Ok(Outcome::Value(if emit { self.arena.append_object(Vec::new()) } else { INVALID_REF }))
            }
            PlanNode::EmptyArray => {
                Ok(Outcome::Value(if emit { self.arena.append_array(Vec::new()) } else { INVALID_REF }))
            }
            PlanNode::Custom { path, nullable, resolve } => {
                self.walk_custom(path, *nullable, resolve, incoming_ref, emit)
            }
        }
    }

    fn walk_object(
        &mut self,
        path: &[ByteString],
        nullable: bool,
        fields: &[Field],
        incoming_ref: NodeRef,
        emit: bool,
    ) -> WalkResult {
        self.push_segments(path);
        let data_ref = self.arena.get(incoming_ref, path);
        let result = self.walk_object_at(nullable, fields, data_ref, emit);
        self.pop_segments(path.len());
        result
    }

    fn walk_object_at(
        &mut self,
        nullable: bool,
        fields: &[Field],
        data_ref: NodeRef,
        emit: bool,
    ) -> WalkResult {
        let already_errored = matches!(self.arena.kind(data_ref), Some(Node::NullSkipError));
        if data_ref == INVALID_REF || matches!(self.arena.kind(data_ref), Some(Node::Null) | Some(Node::NullSkipError)) {
            return self.resolve_nullish(nullable, emit, already_errored);
        }
        if !matches!(self.arena.kind(data_ref), Some(Node::Object(_))) {
            self.record_error(emit, messages::object_non_object());
            return Ok(Outcome::NullBubble);
        }

        self.depth += 1;
        if self.depth >= 2 {
            self.stats.objects_visited += 1;
        }
        let mut emitted: Vec<(ByteString, NodeRef)> = Vec::new();

        for field in fields {
            if let Some(var) = &field.skip_variable_name {
                if self.ctx.resolve_bool_variable(var) == Some(true) {
                    continue;
                }
            }
            if let Some(var) = &field.include_variable_name {
                // Missing or non-boolean variables default to excluding the
                // field — permissive in the sense that a malformed
                // directive never crashes the walk, but flagged here as the
                // resolved open question rather than silently guessed at.
                if self.ctx.resolve_bool_variable(var) != Some(true) {
                    continue;
                }
            }
            if !field.on_type_names.is_empty() {
                let typename_ref = self.arena.get_field(data_ref, "__typename");
                let matches_type = match self.arena.kind(typename_ref) {
                    Some(Node::String(bytes)) => std::str::from_utf8(bytes)
                        .map(|s| field.on_type_names.iter().any(|n| n.as_str() == s))
                        .unwrap_or(false),
                    _ => false,
                };
                if !matches_type {
                    continue;
                }
            }

            if !emit && field.info.has_authorization_rule {
                let datasource_id = field
                    .info
                    .source_ids
                    .first()
                    .map(|s| s.as_str())
                    .unwrap_or("");
                let decision = self
                    .auth_cache
                    .authorize(self.arena, self.ctx, data_ref, field, datasource_id)
                    .map_err(|e| ResolverError::AuthorizationFailed(e.to_string()))?;
                if let Decision::Deny { reason } = decision {
                    tracing::warn!(
                        field = field.name.as_str(),
                        reason = reason.as_deref().unwrap_or(""),
                        "authorization denied field"
                    );
                    self.record_auth_denial(field, reason.as_deref());
                    let field_ref = self.arena.get(data_ref, field.value.path());
                    if field.value.nullable() {
                        if field_ref != INVALID_REF {
                            self.arena.set_kind(field_ref, Node::NullSkipError);
                        }
                        continue;
                    } else if nullable {
                        self.arena.set_kind(data_ref, Node::NullSkipError);
                        self.depth -= 1;
                        return Ok(Outcome::Value(INVALID_REF));
                    } else {
                        self.depth -= 1;
                        return Ok(Outcome::NullBubble);
                    }
                }
            }

            self.stats.fields_resolved += 1;
            let outcome = self.walk_field_value(&field.value, data_ref, emit)?;
            match outcome {
                Outcome::NullBubble => {
                    if nullable {
                        self.arena.set_kind(data_ref, Node::Null);
                        self.depth -= 1;
                        return Ok(Outcome::Value(if emit { self.arena.append_null() } else { INVALID_REF }));
                    }
                    self.depth -= 1;
                    return Ok(Outcome::NullBubble);
                }
                Outcome::Value(child_ref) => {
                    if emit {
                        emitted.push((field.name.clone(), child_ref));
                    }
                }
            }
        }

        self.depth -= 1;
        Ok(Outcome::Value(if emit { self.arena.append_object(emitted) } else { INVALID_REF }))
    }

    /// Recurses into a field's plan node using the *current* object's
    /// resolved data ref — the field's own `path` navigates from there, not
    /// from the grandparent.
    fn walk_field_value(&mut self, value: &PlanNode, parent_ref: NodeRef, emit: bool) -> WalkResult {
        self.walk(value, parent_ref, emit)
    }

    fn record_auth_denial(&mut self, field: &Field, reason: Option<&str>) {
        let extra = field.value.path().len();
        self.push_segments(field.value.path());
        let root_type = self.root_type();
        let display = self.path.display_with_root(&root_type);
        let message = messages::unauthorized(&display, reason);
        let extensions = json!({ "code": "UNAUTHORIZED_FIELD_OR_TYPE" });
        let error = GraphQLError::new(message, self.path).with_extensions(extensions);
        self.errors.push(error);
        self.pop_segments(extra);
    }

    fn walk_array(
        &mut self,
        path: &[ByteString],
        nullable: bool,
        item: &PlanNode,
        incoming_ref: NodeRef,
        emit: bool,
    ) -> WalkResult {
        self.push_segments(path);
        let data_ref = self.arena.get(incoming_ref, path);
        let result = self.walk_array_at(nullable, item, data_ref, emit);
        self.pop_segments(path.len());
        result
    }

    fn walk_array_at(
        &mut self,
        nullable: bool,
        item: &PlanNode,
        data_ref: NodeRef,
        emit: bool,
    ) -> WalkResult {
        let already_errored = matches!(self.arena.kind(data_ref), Some(Node::NullSkipError));
        if data_ref == INVALID_REF || matches!(self.arena.kind(data_ref), Some(Node::Null) | Some(Node::NullSkipError)) {
            return self.resolve_nullish(nullable, emit, already_errored);
        }
        let Some(Node::Array(values)) = self.arena.kind(data_ref) else {
            self.record_error(emit, messages::array_non_array());
            return Ok(Outcome::NullBubble);
        };
        let values = values.clone();

        let mut emitted: Vec<NodeRef> = Vec::new();
        for (index, element_ref) in values.iter().enumerate() {
            self.path.push_index(index);
            let outcome = self.walk(item, *element_ref, emit);
            self.path.pop();
            match outcome? {
                Outcome::NullBubble => {
                    if nullable {
                        self.arena.set_kind(data_ref, Node::Null);
                        return Ok(Outcome::Value(if emit { self.arena.append_null() } else { INVALID_REF }));
                    }
                    return Ok(Outcome::NullBubble);
                }
                Outcome::Value(child_ref) => {
                    if emit {
                        emitted.push(child_ref);
                    }
                }
            }
        }

        Ok(Outcome::Value(if emit { self.arena.append_array(emitted) } else { INVALID_REF }))
    }

    fn walk_string(
        &mut self,
        path: &[ByteString],
        nullable: bool,
        is_typename: bool,
        unescape_response_json: bool,
        incoming_ref: NodeRef,
        emit: bool,
    ) -> WalkResult {
        self.push_segments(path);
        let data_ref = self.arena.get(incoming_ref, path);
        let result = (|| -> WalkResult {
            let already_errored = matches!(self.arena.kind(data_ref), Some(Node::NullSkipError));
            if data_ref == INVALID_REF
                || matches!(self.arena.kind(data_ref), Some(Node::Null) | Some(Node::NullSkipError))
            {
                return self.resolve_nullish(nullable, emit, already_errored);
            }
            let Some(Node::String(bytes)) = self.arena.kind(data_ref) else {
                let value = self.arena.display_value(data_ref);
                self.record_error(emit, messages::string_mismatch(&value));
                return Ok(Outcome::NullBubble);
            };
            if !emit {
                return Ok(Outcome::Value(INVALID_REF));
            }
            let bytes = bytes.clone();
            if is_typename {
                let renamed = std::str::from_utf8(&bytes)
                    .map(|s| self.ctx.rename_type(s).to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
                return Ok(Outcome::Value(self.arena.append_string_bytes(renamed)));
            }
            if unescape_response_json {
                if let Ok(embedded) = self.arena.append_any_json_bytes(&bytes) {
                    return Ok(Outcome::Value(embedded));
                }
            }
            Ok(Outcome::Value(self.arena.append_string_bytes(bytes)))
        })();
        self.pop_segments(path.len());
        result
    }

    /// Shared body for Boolean/Integer/Float/BigInt/Scalar: existence and
    /// nullability gate, then an optional kind check. `check` returns
    /// `Some(message_fn)` when the node's kind doesn't match; `None` means
    /// the node passed (or the variant accepts any kind, as `Scalar` does).
    fn walk_scalar(
        &mut self,
        path: &[ByteString],
        nullable: bool,
        incoming_ref: NodeRef,
        emit: bool,
        check: impl Fn(&Node) -> Option<fn(&str) -> String>,
    ) -> WalkResult {
        self.push_segments(path);
        let data_ref = self.arena.get(incoming_ref, path);
        let result = (|| -> WalkResult {
            let already_errored = matches!(self.arena.kind(data_ref), Some(Node::NullSkipError));
            if data_ref == INVALID_REF
                || matches!(self.arena.kind(data_ref), Some(Node::Null) | Some(Node::NullSkipError))
            {
                return self.resolve_nullish(nullable, emit, already_errored);
            }
            let node = self.arena.kind(data_ref).expect("checked above");
            if let Some(message_fn) = check(node) {
                let value = self.arena.display_value(data_ref);
                self.record_error(emit, message_fn(&value));
                return Ok(Outcome::NullBubble);
            }
            Ok(Outcome::Value(if emit { data_ref } else { INVALID_REF }))
        })();
        self.pop_segments(path.len());
        result
    }

    fn walk_custom(
        &mut self,
        path: &[ByteString],
        nullable: bool,
        resolve: &crate::plan::CustomResolveFn,
        incoming_ref: NodeRef,
        emit: bool,
    ) -> WalkResult {
        self.push_segments(path);
        let data_ref = self.arena.get(incoming_ref, path);
        let result = (|| -> WalkResult {
            let already_errored = matches!(self.arena.kind(data_ref), Some(Node::NullSkipError));
            if data_ref == INVALID_REF
                || matches!(self.arena.kind(data_ref), Some(Node::Null) | Some(Node::NullSkipError))
            {
                return self.resolve_nullish(nullable, emit, already_errored);
            }
            let raw = self.arena.to_vec(data_ref)?;
            match resolve(self.ctx, &raw) {
                Ok(output_bytes) => {
                    if !emit {
                        return Ok(Outcome::Value(INVALID_REF));
                    }
                    let embedded = self.arena.append_any_json_bytes(&output_bytes)?;
                    Ok(Outcome::Value(embedded))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "custom resolver failed");
                    self.record_error(
                        emit,
                        ResolverError::CustomResolver(e.to_string()).to_string(),
                    );
                    self.resolve_nullish(nullable, emit, true)
                }
            }
        })();
        self.pop_segments(path.len());
        result
    }
}

fn is_integer_bytes(bytes: &[u8]) -> bool {
    !bytes
        .iter()
        .any(|&b| b == b'.' || b == b'e' || b == b'E')
}
