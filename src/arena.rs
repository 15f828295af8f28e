//! JSON Arena: an indexed, mutable JSON tree with path lookup, merge, and
//! printing. Nodes are referenced by integer index rather than by pointer
//! so that the walker can rewrite a node's kind in place (e.g. to `Null`,
//! for GraphQL null propagation) without rebuilding the surrounding tree.

use std::io::Write;

use serde_json_bytes::ByteString;

use crate::bail;
use crate::error::{ResolverError, Result};

/// Reference to a node in the arena. `INVALID_REF` stands in for "no such
/// node" the way a null pointer would in an unmanaged tree.
pub type NodeRef = i64;

pub const INVALID_REF: NodeRef = -1;

/// A node in the arena. Object field order is insertion order, which the
/// walker relies on only indirectly (plan order drives output order; data
/// order here just has to be stable for repeated `get` calls).
#[derive(Debug, Clone)]
pub enum Node {
    Object(Vec<(ByteString, NodeRef)>),
    Array(Vec<NodeRef>),
    String(Vec<u8>),
    Number(Vec<u8>),
    Boolean(bool),
    Null,
    /// Behaves as `Null` for serialization, but tells the walker that a
    /// non-nullable-field error has already been recorded for this subtree
    /// and must not be emitted again.
    NullSkipError,
}

impl Node {
    pub fn is_null_like(&self) -> bool {
        matches!(self, Node::Null | Node::NullSkipError)
    }
}

/// An indexed heap of JSON nodes, owned by the resolver for the duration of
/// one request and returned to an empty state by [`Arena::reset`].
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    pub fn kind(&self, r: NodeRef) -> Option<&Node> {
        if r == INVALID_REF {
            return None;
        }
        self.nodes.get(r as usize)
    }

    fn kind_mut(&mut self, r: NodeRef) -> Option<&mut Node> {
        if r == INVALID_REF {
            return None;
        }
        self.nodes.get_mut(r as usize)
    }

    fn push(&mut self, node: Node) -> NodeRef {
        self.nodes.push(node);
        (self.nodes.len() - 1) as NodeRef
    }

    pub fn append_object(&mut self, fields: Vec<(ByteString, NodeRef)>) -> NodeRef {
        self.push(Node::Object(fields))
    }

    pub fn append_array(&mut self, values: Vec<NodeRef>) -> NodeRef {
        self.push(Node::Array(values))
    }

    pub fn append_null(&mut self) -> NodeRef {
        self.push(Node::Null)
    }

    pub fn append_null_skip_error(&mut self) -> NodeRef {
        self.push(Node::NullSkipError)
    }

    pub fn append_boolean(&mut self, value: bool) -> NodeRef {
        self.push(Node::Boolean(value))
    }

    pub fn append_string_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> NodeRef {
        self.push(Node::String(bytes.into()))
    }

    pub fn append_number_bytes(&mut self, bytes: impl Into<Vec<u8>>) -> NodeRef {
        self.push(Node::Number(bytes.into()))
    }

    /// Rewrites the kind of an existing node in place. Used for null
    /// propagation: a subtree is collapsed to `Null`/`NullSkipError`
    /// without being removed from the arena (other refs into it, if any,
    /// observe the rewrite too, matching single-parent ownership).
    pub fn set_kind(&mut self, r: NodeRef, node: Node) {
        if let Some(slot) = self.kind_mut(r) {
            *slot = node;
        }
    }

    /// Parses `bytes` as JSON and appends the resulting tree, returning the
    /// ref to its root.
    pub fn append_any_json_bytes(&mut self, bytes: &[u8]) -> Result<NodeRef> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(self.append_serde_value(&value))
    }

    /// `serde_json`'s `arbitrary_precision` feature is on (see `Cargo.toml`),
    /// so `Value::Number`'s `to_string()` here reproduces the exact digits
    /// parsed from the source JSON rather than round-tripping through `f64`
    /// or `i64`/`u64` — required for `BigInt` leaves, which must pass
    /// through integers outside those ranges without coercion.
    fn append_serde_value(&mut self, value: &serde_json::Value) -> NodeRef {
        match value {
            serde_json::Value::Null => self.append_null(),
            serde_json::Value::Bool(b) => self.append_boolean(*b),
            serde_json::Value::Number(n) => self.append_number_bytes(n.to_string()),
            serde_json::Value::String(s) => self.append_string_bytes(s.clone()),
            serde_json::Value::Array(items) => {
                let refs = items.iter().map(|v| self.append_serde_value(v)).collect();
                self.append_array(refs)
            }
            serde_json::Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(k, v)| {
                        let child = self.append_serde_value(v);
                        (ByteString::from(k.as_str()), child)
                    })
                    .collect();
                self.append_object(fields)
            }
        }
    }

    /// Follows a chain of object field lookups starting at `start`. Returns
    /// `INVALID_REF` if any step is missing or the current node isn't an
    /// object.
    pub fn get(&self, start: NodeRef, path: &[ByteString]) -> NodeRef {
        let mut current = start;
        for segment in path {
            let Some(Node::Object(fields)) = self.kind(current) else {
                return INVALID_REF;
            };
            match fields.iter().find(|(key, _)| key == segment) {
                Some((_, child)) => current = *child,
                None => return INVALID_REF,
            }
        }
        current
    }

    /// Looks up a single field name directly on an object node (equivalent
    /// to `get(r, &[name])`, used heavily enough — e.g. `__typename` reads
    /// — to warrant its own entry point).
    pub fn get_field(&self, r: NodeRef, name: &str) -> NodeRef {
        let Some(Node::Object(fields)) = self.kind(r) else {
            return INVALID_REF;
        };
        fields
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, child)| *child)
            .unwrap_or(INVALID_REF)
    }

    /// Shallow merge of object `b`'s fields into object `a`; `b`'s keys
    /// overwrite `a`'s on conflict. Both must be object nodes.
    pub fn merge_nodes(&mut self, a: NodeRef, b: NodeRef) -> Result<()> {
        let Some(Node::Object(b_fields)) = self.kind(b) else {
            bail!("merge_nodes: source is not an object");
        };
        let b_fields = b_fields.clone();
        let Some(Node::Object(a_fields)) = self.kind_mut(a) else {
            bail!("merge_nodes: target is not an object");
        };
        for (key, value) in b_fields {
            if let Some(slot) = a_fields.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
            } else {
                a_fields.push((key, value));
            }
        }
        Ok(())
    }

    /// Merges `source` into `target` at `path`, creating intermediate
    /// objects along the way if they don't already exist.
    pub fn merge_nodes_with_path(
        &mut self,
        target: NodeRef,
        source: NodeRef,
        path: &[ByteString],
    ) -> Result<()> {
        let Some(first) = path.first() else {
            return self.merge_nodes(target, source);
        };
        let existing = self.get_field(target, first.as_str());
        let rest = &path[1..];
        let next_target = if existing != INVALID_REF {
            existing
        } else {
            let created = self.append_object(Vec::new());
            let Some(Node::Object(fields)) = self.kind_mut(target) else {
                bail!("merge_nodes_with_path: target is not an object");
            };
            fields.push((first.clone(), created));
            created
        };
        self.merge_nodes_with_path(next_target, source, rest)
    }

    /// Appends `b`'s values onto `a`. Both must be array nodes.
    pub fn merge_arrays(&mut self, a: NodeRef, b: NodeRef) -> Result<()> {
        let Some(Node::Array(b_values)) = self.kind(b) else {
            bail!("merge_arrays: source is not an array");
        };
        let b_values = b_values.clone();
        let Some(Node::Array(a_values)) = self.kind_mut(a) else {
            bail!("merge_arrays: target is not an array");
        };
        a_values.extend(b_values);
        Ok(())
    }

    /// Canonical JSON serialization of the subtree rooted at `r`.
    pub fn print_node(&self, r: NodeRef, writer: &mut impl Write) -> Result<()> {
        match self.kind(r) {
            None | Some(Node::Null) | Some(Node::NullSkipError) => {
                writer.write_all(b"null").map_err(write_err)
            }
            Some(Node::Boolean(b)) => writer
                .write_all(if *b { b"true" } else { b"false" })
                .map_err(write_err),
            Some(Node::Number(bytes)) => writer.write_all(bytes).map_err(write_err),
            Some(Node::String(bytes)) => {
                write_json_string(writer, bytes)?;
                Ok(())
            }
            Some(Node::Array(values)) => {
                let values = values.clone();
                writer.write_all(b"[").map_err(write_err)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        writer.write_all(b",").map_err(write_err)?;
                    }
                    self.print_node(*value, writer)?;
                }
                writer.write_all(b"]").map_err(write_err)
            }
            Some(Node::Object(fields)) => {
                let fields = fields.clone();
                writer.write_all(b"{").map_err(write_err)?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        writer.write_all(b",").map_err(write_err)?;
                    }
                    write_json_string(writer, key.as_str().as_bytes())?;
                    writer.write_all(b":").map_err(write_err)?;
                    self.print_node(*value, writer)?;
                }
                writer.write_all(b"}").map_err(write_err)
            }
        }
    }

    /// Serializes an object excluding nested object/array fields — used to
    /// hand a bounded, primitives-only view of the parent object to the
    /// authorizer, so nested PII never leaks into the authorization
    /// context and the payload stays small.
    pub fn print_object_flat(&self, r: NodeRef, writer: &mut impl Write) -> Result<()> {
        let Some(Node::Object(fields)) = self.kind(r) else {
            bail!("print_object_flat: not an object");
        };
        let fields = fields.clone();
        writer.write_all(b"{").map_err(write_err)?;
        let mut first = true;
        for (key, value) in &fields {
            if matches!(self.kind(*value), Some(Node::Object(_)) | Some(Node::Array(_))) {
                continue;
            }
            if !first {
                writer.write_all(b",").map_err(write_err)?;
            }
            first = false;
            write_json_string(writer, key.as_str().as_bytes())?;
            writer.write_all(b":").map_err(write_err)?;
            self.print_node(*value, writer)?;
        }
        writer.write_all(b"}").map_err(write_err)
    }

    pub fn to_vec(&self, r: NodeRef) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.print_node(r, &mut buf)?;
        Ok(buf)
    }

    pub fn to_flat_vec(&self, r: NodeRef) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.print_object_flat(r, &mut buf)?;
        Ok(buf)
    }

    /// Renders a node's value for embedding in a type-mismatch message,
    /// e.g. `oops` for a string, `{"a":1}` for an object.
    pub fn display_value(&self, r: NodeRef) -> String {
        match self.kind(r) {
            None | Some(Node::Null) | Some(Node::NullSkipError) => "null".to_string(),
            Some(Node::Boolean(b)) => if *b { "true" } else { "false" }.to_string(),
            Some(Node::Number(bytes)) | Some(Node::String(bytes)) => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            Some(Node::Object(_)) | Some(Node::Array(_)) => {
                let mut buf = Vec::new();
                let _ = self.print_node(r, &mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            }
        }
    }
}

fn write_err(e: std::io::Error) -> ResolverError {
    ResolverError::Write(e.to_string())
}

/// Writes `bytes` as a quoted JSON string, escaping `"`, `\`, and control
/// characters. The arena stores string values already un-escaped (as
/// `serde_json` hands them back from parsing), so printing has to put the
/// escaping back rather than assume it's still there.
fn write_json_string(writer: &mut impl Write, bytes: &[u8]) -> Result<()> {
    writer.write_all(b"\"").map_err(write_err)?;
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let escape: &[u8] = match b {
            b'"' => b"\\\"",
            b'\\' => b"\\\\",
            0x08 => b"\\b",
            0x0c => b"\\f",
            b'\n' => b"\\n",
            b'\r' => b"\\r",
            b'\t' => b"\\t",
            0x00..=0x1f => {
                writer.write_all(&bytes[start..i]).map_err(write_err)?;
                write!(writer, "\\u{:04x}", b).map_err(write_err)?;
                start = i + 1;
                continue;
            }
            _ => continue,
        };
        writer.write_all(&bytes[start..i]).map_err(write_err)?;
        writer.write_all(escape).map_err(write_err)?;
        start = i + 1;
    }
    writer.write_all(&bytes[start..]).map_err(write_err)?;
    writer.write_all(b"\"").map_err(write_err)
}
