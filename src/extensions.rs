//! Extensions writer: streams the response's `extensions` object, if any
//! collaborator has something to contribute. Order is fixed — authorization,
//! then rate-limit, then trace — so that output is deterministic across
//! requests regardless of which collaborators happen to be configured.

use std::io::Write;

use crate::context::Context;
use crate::error::{Result, ResolverError};

fn write_err(e: std::io::Error) -> ResolverError {
    ResolverError::Write(e.to_string())
}

/// Returns `true` if at least one configured collaborator has data to
/// contribute, i.e. whether an `extensions` object should be written at
/// all. Checked before opening the `{` so an empty object is never emitted.
pub fn has_any(ctx: &Context, subscription_extensions: Option<&[u8]>) -> bool {
    let has_authz = ctx
        .authorizer
        .as_ref()
        .map(|a| a.has_response_extension_data(ctx))
        .unwrap_or(false);
    let has_rate_limit = ctx.rate_limiter.is_some() && ctx.include_rate_limit_stats;
    let has_trace = ctx.trace.is_some();
    has_authz || has_rate_limit || has_trace || subscription_extensions.is_some()
}

/// Writes `extensions: {...}` (including the leading key and braces) to
/// `writer`. Caller is responsible for the surrounding object's commas.
///
/// `subscription_extensions`, when present, is the raw JSON object captured
/// by `Resolvable::init_subscription` from the event wrapper's
/// `select_response_extensions_path`; its fields are shallow-merged in
/// ahead of the authorization/rate-limit/trace sections.
pub fn write_extensions(
    ctx: &Context,
    subscription_extensions: Option<&[u8]>,
    writer: &mut impl Write,
) -> Result<()> {
    writer.write_all(b"\"extensions\":{").map_err(write_err)?;
    let mut wrote_any = false;

    if let Some(bytes) = subscription_extensions {
        let inner = strip_object_braces(bytes);
        if !inner.is_empty() {
            writer.write_all(inner).map_err(write_err)?;
            wrote_any = true;
        }
    }

    if let Some(authorizer) = &ctx.authorizer {
        if authorizer.has_response_extension_data(ctx) {
            if wrote_any {
                writer.write_all(b",").map_err(write_err)?;
            }
            writer.write_all(b"\"authorization\":").map_err(write_err)?;
            authorizer.render_response_extension(ctx, writer)?;
            wrote_any = true;
        }
    }

    if ctx.include_rate_limit_stats {
        if let Some(rate_limiter) = &ctx.rate_limiter {
            if wrote_any {
                writer.write_all(b",").map_err(write_err)?;
            }
            writer.write_all(b"\"rateLimit\":").map_err(write_err)?;
            rate_limiter.render_response_extension(ctx, writer)?;
            wrote_any = true;
        }
    }

    if let Some(trace_options) = &ctx.trace {
        if wrote_any {
            writer.write_all(b",").map_err(write_err)?;
        }
        writer.write_all(b"\"trace\":").map_err(write_err)?;
        let trace_bytes = trace_options
            .tracer
            .get_trace(ctx, &trace_options.fetch_tree, trace_options.debug)?;
        writer.write_all(&trace_bytes).map_err(write_err)?;
    }

    writer.write_all(b"}").map_err(write_err)
}

/// Strips the outermost `{`/`}` from a JSON object's serialized bytes so
/// its fields can be spliced into another object. Returns the input
/// unchanged if it isn't wrapped in braces.
fn strip_object_braces(bytes: &[u8]) -> &[u8] {
    let trimmed = trim_ascii_whitespace(bytes);
    match trimmed.split_first() {
        Some((b'{', rest)) => match rest.split_last() {
            Some((b'}', inner)) => trim_ascii_whitespace(inner),
            _ => trimmed,
        },
        _ => trimmed,
    }
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &bytes[start..end]
}
