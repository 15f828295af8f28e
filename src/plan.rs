//! Plan AST: a read-only, externally constructed tree describing the
//! response shape a client expects. Represented as a closed tagged-variant
//! sum type so the walker can dispatch on it with a single `match` rather
//! than virtual calls — see `DESIGN.md` for why this was kept over a
//! trait-object design.

use std::sync::Arc;

use serde_json_bytes::ByteString;

use crate::context::Context;
use crate::error::Result;

/// A custom scalar's resolve callback: given the request context and the
/// raw bytes at the field's path, produces the bytes to embed in the
/// output. Boxed since the plan is built once (by the query planner, out
/// of scope here) and walked many times.
pub type CustomResolveFn =
    Arc<dyn Fn(&Context, &[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// A node of the plan tree. Every variant that reads data carries the
/// `path` used to navigate from the enclosing object/array to the data it
/// describes, plus `nullable` controlling what happens when that data is
/// missing or invalid.
#[derive(Clone)]
pub enum PlanNode {
    Object {
        path: Vec<ByteString>,
        nullable: bool,
        fields: Vec<Field>,
    },
    Array {
        path: Vec<ByteString>,
        nullable: bool,
        item: Arc<PlanNode>,
    },
    String {
        path: Vec<ByteString>,
        nullable: bool,
        is_typename: bool,
        unescape_response_json: bool,
    },
    Boolean {
        path: Vec<ByteString>,
        nullable: bool,
    },
    Integer {
        path: Vec<ByteString>,
        nullable: bool,
    },
    Float {
        path: Vec<ByteString>,
        nullable: bool,
    },
    BigInt {
        path: Vec<ByteString>,
        nullable: bool,
    },
    /// Accepts any primitive; non-primitive subtrees are re-serialized
    /// into the output as embedded JSON rather than type-checked.
    Scalar {
        path: Vec<ByteString>,
        nullable: bool,
    },
    Null,
    EmptyObject,
    EmptyArray,
    Custom {
        path: Vec<ByteString>,
        nullable: bool,
        resolve: CustomResolveFn,
    },
}

impl PlanNode {
    pub fn path(&self) -> &[ByteString] {
        match self {
            PlanNode::Object { path, .. }
            | PlanNode::Array { path, .. }
            | PlanNode::String { path, .. }
            | PlanNode::Boolean { path, .. }
            | PlanNode::Integer { path, .. }
            | PlanNode::Float { path, .. }
            | PlanNode::BigInt { path, .. }
            | PlanNode::Scalar { path, .. }
            | PlanNode::Custom { path, .. } => path,
            PlanNode::Null | PlanNode::EmptyObject | PlanNode::EmptyArray => &[],
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            PlanNode::Object { nullable, .. }
            | PlanNode::Array { nullable, .. }
            | PlanNode::String { nullable, .. }
            | PlanNode::Boolean { nullable, .. }
            | PlanNode::Integer { nullable, .. }
            | PlanNode::Float { nullable, .. }
            | PlanNode::BigInt { nullable, .. }
            | PlanNode::Scalar { nullable, .. }
            | PlanNode::Custom { nullable, .. } => *nullable,
            PlanNode::Null | PlanNode::EmptyObject | PlanNode::EmptyArray => true,
        }
    }
}

/// Identifies a schema position for authorization: `(type_name, field_name)`.
#[derive(Debug, Clone)]
pub struct GraphCoordinate {
    pub type_name: ByteString,
    pub field_name: ByteString,
}

/// Authorization- and routing-relevant metadata attached to a [`Field`].
#[derive(Debug, Clone, Default)]
pub struct FieldInfo {
    /// Datasource identifiers this field may be resolved from; used as
    /// part of the authorization cache key.
    pub source_ids: Vec<ByteString>,
    pub exact_parent_type_name: Option<ByteString>,
    pub has_authorization_rule: bool,
}

/// One field of an [`PlanNode::Object`].
#[derive(Clone)]
pub struct Field {
    pub name: ByteString,
    pub value: PlanNode,
    pub skip_variable_name: Option<String>,
    pub include_variable_name: Option<String>,
    /// Conditional inclusion by `__typename` (interface/union dispatch).
    pub on_type_names: Vec<ByteString>,
    pub info: FieldInfo,
}

impl Field {
    pub fn new(name: impl Into<ByteString>, value: PlanNode) -> Self {
        Self {
            name: name.into(),
            value,
            skip_variable_name: None,
            include_variable_name: None,
            on_type_names: Vec::new(),
            info: FieldInfo::default(),
        }
    }

    pub fn with_on_type_names(mut self, names: Vec<ByteString>) -> Self {
        self.on_type_names = names;
        self
    }

    pub fn with_skip_variable(mut self, name: impl Into<String>) -> Self {
        self.skip_variable_name = Some(name.into());
        self
    }

    pub fn with_include_variable(mut self, name: impl Into<String>) -> Self {
        self.include_variable_name = Some(name.into());
        self
    }

    pub fn with_authorization(mut self, source_ids: Vec<ByteString>, exact_parent_type_name: Option<ByteString>) -> Self {
        self.info.source_ids = source_ids;
        self.info.exact_parent_type_name = exact_parent_type_name;
        self.info.has_authorization_rule = true;
        self
    }

    pub fn graph_coordinate(&self, type_name: ByteString) -> GraphCoordinate {
        GraphCoordinate {
            type_name,
            field_name: self.name.clone(),
        }
    }
}
