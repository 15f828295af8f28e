//! `Resolvable`: the top-level type tying the arena, path tracker,
//! authorization cache, and walker together into `init`/`resolve`/`reset`,
//! mirroring the `init` → run → `reset`-for-pool-reuse lifecycle
//! `connectors::runtime` gives its per-request response mapper.

use std::io::Write;

use serde_json_bytes::ByteString;

use crate::arena::{Arena, Node, NodeRef, INVALID_REF};
use crate::authorization::AuthorizationCache;
use crate::context::{Context, OperationType};
use crate::error::{Result, ResolverError};
use crate::extensions;
use crate::path::Path;
use crate::plan::PlanNode;
use crate::response::GraphQLError;
use crate::walker::{Outcome, WalkStats, Walker};

fn write_err(e: std::io::Error) -> ResolverError {
    ResolverError::Write(e.to_string())
}

/// The configured sub-paths a subscription event wrapper is unpacked
/// through. `select_response_extensions_path` is a supplemental addition:
/// when set, its sub-document is shallow-merged into the final response's
/// `extensions` object ahead of the authorization/rate-limit/trace
/// sections.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPostProcessing {
    pub select_response_data_path: Vec<ByteString>,
    pub select_response_errors_path: Option<Vec<ByteString>>,
    pub merge_path: Vec<ByteString>,
    pub select_response_extensions_path: Option<Vec<ByteString>>,
}

/// One request's worth of resolver state. Not shared across requests —
/// callers pool instances and call [`Resolvable::reset`] between uses.
pub struct Resolvable {
    arena: Arena,
    path: Path,
    errors: Vec<GraphQLError>,
    auth_cache: AuthorizationCache,
    data_root: NodeRef,
    operation_type: OperationType,
    subscription_extensions: Option<Vec<u8>>,
    stats: WalkStats,
}

impl Default for Resolvable {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolvable {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            path: Path::new(),
            errors: Vec::new(),
            auth_cache: AuthorizationCache::new(),
            data_root: INVALID_REF,
            operation_type: OperationType::Query,
            subscription_extensions: None,
            stats: WalkStats::default(),
        }
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Clears all per-request state (arena, path stack, auth cache, errors,
    /// depth/stats, operation type, subscription extensions) so the
    /// instance can be returned to an externally managed pool.
    pub fn reset(&mut self) {
        self.arena.reset();
        self.path.clear();
        self.errors.clear();
        self.auth_cache.reset();
        self.data_root = INVALID_REF;
        self.operation_type = OperationType::Query;
        self.subscription_extensions = None;
        self.stats = WalkStats::default();
    }

    /// Parses `initial_data` into the arena and establishes the data root.
    pub fn init(&mut self, initial_data: &[u8], operation_type: OperationType) -> Result<()> {
        self.reset();
        self.operation_type = operation_type;
        self.data_root = self.arena.append_any_json_bytes(initial_data)?;
        tracing::debug!(operation_type = %operation_type, "resolver initialized");
        Ok(())
    }

    /// As [`Resolvable::init`], but `initial_data` is a subscription event
    /// wrapper: the configured sub-paths are read out of it, the extracted
    /// data is merged under `merge_path` into a fresh data root, extracted
    /// errors are appended to the errors array, and — if configured — the
    /// extracted extensions sub-document is retained for the final
    /// response's `extensions` object.
    pub fn init_subscription(
        &mut self,
        initial_data: &[u8],
        operation_type: OperationType,
        post_processing: &SubscriptionPostProcessing,
    ) -> Result<()> {
        self.reset();
        self.operation_type = operation_type;
        let wrapper_root = self.arena.append_any_json_bytes(initial_data)?;

        let fresh_root = self.arena.append_object(Vec::new());
        let extracted_data = self
            .arena
            .get(wrapper_root, &post_processing.select_response_data_path);
        if extracted_data != INVALID_REF {
            self.arena
                .merge_nodes_with_path(fresh_root, extracted_data, &post_processing.merge_path)?;
        }
        self.data_root = fresh_root;

        if let Some(errors_path) = &post_processing.select_response_errors_path {
            let errors_ref = self.arena.get(wrapper_root, errors_path);
            if let Some(Node::Array(items)) = self.arena.kind(errors_ref) {
                let items = items.clone();
                for item in items {
                    let bytes = self.arena.to_vec(item)?;
                    match serde_json::from_slice::<GraphQLError>(&bytes) {
                        Ok(error) => self.errors.push(error),
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to parse subscription error entry");
                        }
                    }
                }
            }
        }

        if let Some(ext_path) = &post_processing.select_response_extensions_path {
            let ext_ref = self.arena.get(wrapper_root, ext_path);
            if ext_ref != INVALID_REF {
                self.subscription_extensions = Some(self.arena.to_vec(ext_ref)?);
            }
        }

        tracing::debug!(operation_type = %operation_type, "subscription resolver initialized");
        Ok(())
    }

    /// Runs the two-phase walk and writes `{ "errors": [...], "data": ...,
    /// "extensions": {...} }` to `writer`.
    pub fn resolve(&mut self, ctx: &Context, root_plan: &PlanNode, writer: &mut impl Write) -> Result<()> {
        tracing::debug!(phase = "collect", "walk started");
        let collect_outcome = {
            let mut walker = Walker::new(
                &mut self.arena,
                &mut self.path,
                &mut self.errors,
                &mut self.auth_cache,
                ctx,
                &mut self.stats,
            );
            walker.walk(root_plan, self.data_root, false)?
        };

        let data_ref = match collect_outcome {
            Outcome::NullBubble => None,
            Outcome::Value(_) => {
                tracing::debug!(phase = "emit", "walk started");
                let mut walker = Walker::new(
                    &mut self.arena,
                    &mut self.path,
                    &mut self.errors,
                    &mut self.auth_cache,
                    ctx,
                    &mut self.stats,
                );
                match walker.walk(root_plan, self.data_root, true)? {
                    Outcome::Value(r) => Some(r),
                    Outcome::NullBubble => None,
                }
            }
        };

        self.write_document(ctx, data_ref, writer)
    }

    fn write_document(
        &self,
        ctx: &Context,
        data_ref: Option<NodeRef>,
        writer: &mut impl Write,
    ) -> Result<()> {
        writer.write_all(b"{").map_err(write_err)?;
        let mut wrote_any = false;

        if !self.errors.is_empty() {
            writer.write_all(b"\"errors\":").map_err(write_err)?;
            serde_json::to_writer(&mut *writer, &self.errors)
                .map_err(|e| ResolverError::Write(e.to_string()))?;
            wrote_any = true;
        }

        if wrote_any {
            writer.write_all(b",").map_err(write_err)?;
        }
        writer.write_all(b"\"data\":").map_err(write_err)?;
        match data_ref {
            Some(r) => self.arena.print_node(r, writer)?,
            None => writer.write_all(b"null").map_err(write_err)?,
        }

        let sub_ext = self.subscription_extensions.as_deref();
        if extensions::has_any(ctx, sub_ext) {
            writer.write_all(b",").map_err(write_err)?;
            extensions::write_extensions(ctx, sub_ext, writer)?;
        }

        writer.write_all(b"}").map_err(write_err)
    }
}
