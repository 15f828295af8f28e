//! Path tracker: a stack of name/index elements identifying the walker's
//! current position, used both for `errors[].path` in the GraphQL response
//! and for building human-readable field-path strings in error messages.

use serde_json_bytes::ByteString;

/// One segment of a response path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    Name(ByteString),
    ArrayIndex(usize),
}

impl PathElement {
    fn push_display(&self, out: &mut String, first: bool) {
        match self {
            PathElement::Name(name) => {
                if !first {
                    out.push('.');
                }
                out.push_str(name.as_str());
            }
            PathElement::ArrayIndex(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
}

/// A stack of [`PathElement`]s tracking the walker's current depth.
///
/// Callers push on descent and must pop on every return path, including
/// early returns from failure bubbling — `push_name`/`push_index` and `pop`
/// are plain stack operations with no RAII guard, so every call site is
/// responsible for popping what it pushed.
#[derive(Debug, Default, Clone)]
pub struct Path {
    elements: Vec<PathElement>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_name(&mut self, name: ByteString) {
        self.elements.push(PathElement::Name(name));
    }

    pub fn push_index(&mut self, index: usize) {
        self.elements.push(PathElement::ArrayIndex(index));
    }

    pub fn pop(&mut self) {
        self.elements.pop();
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Renders a human-readable field path, e.g. `Query.user.reviews[0].product.upc`.
    pub fn display_with_root(&self, root_type: &str) -> String {
        let mut out = String::from(root_type);
        for element in &self.elements {
            element.push_display(&mut out, false);
        }
        out
    }
}
