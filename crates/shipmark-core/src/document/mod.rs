//! Dotted-path navigation over tree-shaped documents.
//!
//! A path such as `image.tag` or `spec.containers.0.image` is split into
//! keys by [`parse_path`]. [`get`] walks any [`Tree`]; [`set`] walks an
//! [`Editable`] document and replaces (or, on a map, adds) exactly the final
//! key, leaving everything else in the document alone.
//!
//! Sequence steps take a decimal index. Intermediate containers are never
//! created: a missing or scalar intermediate node is a
//! [`DocumentError::Unresolved`] naming the prefix that could not be walked.
//! A node that holds data the document cannot edit (see
//! [`Tree::verbatim_reason`]) is reported as [`DocumentError::Unsupported`]
//! instead.

pub mod yaml;

pub use yaml::YamlDocument;

use thiserror::Error;
use tracing::debug;

/// Errors raised while navigating or editing a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The key path contained no keys.
    #[error("key path is empty")]
    EmptyPath,

    /// An intermediate key is missing or is not a map or sequence.
    #[error("cannot resolve path {0:?}: key is missing or holds a scalar")]
    Unresolved(String),

    /// The final key exists but its node cannot be replaced in place.
    #[error("cannot set {path:?}: {reason}")]
    Unsupported {
        /// Full dotted path of the target.
        path: String,
        /// What made the edit impossible.
        reason: String,
    },

    /// The document layout could not be understood.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

/// Result type alias using [`DocumentError`].
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Shape of a node as far as navigation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Keyed collection.
    Map,
    /// Indexed collection.
    Seq,
    /// Anything else: scalars, nulls, unparsed content.
    Leaf,
}

/// Read access to a document tree.
pub trait Tree {
    /// What kind of node this is.
    fn kind(&self) -> NodeKind;

    /// Child of a map node by key. `None` for other kinds.
    fn child(&self, key: &str) -> Option<&Self>;

    /// Child of a sequence node by position. `None` for other kinds.
    fn item(&self, index: usize) -> Option<&Self>;

    /// Why this node cannot be walked into, when it does hold content.
    fn verbatim_reason(&self) -> Option<&'static str> {
        None
    }
}

/// A document whose nodes can be edited in place.
///
/// Edits are computed against an immutable borrow, then applied, so a
/// document never observes a half-finished mutation.
pub trait Editable {
    /// Node type navigated by [`set`].
    type Node: Tree;
    /// A computed, not yet applied, change.
    type Edit;

    /// Root node of the document.
    fn root(&self) -> &Self::Node;

    /// Work out how to store `value` under `key` in `parent`.
    ///
    /// `path` is the full dotted path, for error messages.
    fn plan_set(
        &self,
        parent: &Self::Node,
        key: &str,
        value: &str,
        path: &str,
    ) -> DocumentResult<Self::Edit>;

    /// Apply a change produced by [`Editable::plan_set`].
    fn apply(&mut self, edit: Self::Edit) -> DocumentResult<()>;
}

/// Split a dotted path into keys.
///
/// A segment wrapped in single or double quotes is one key even if it
/// contains dots (`labels."app.kubernetes.io/version"`). Quotes only
/// delimit; there is no escaping. Empty segments are dropped.
pub fn parse_path(dotted: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in dotted.chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => quote = Some(ch),
            (None, '.') => {
                if !current.is_empty() {
                    keys.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }
    if !current.is_empty() {
        keys.push(current);
    }
    keys
}

fn step<'a, T: Tree>(node: &'a T, key: &str) -> Option<&'a T> {
    match node.kind() {
        NodeKind::Map => node.child(key),
        NodeKind::Seq => key.parse().ok().and_then(|index| node.item(index)),
        NodeKind::Leaf => None,
    }
}

/// Walk `keys` from `root`.
///
/// Returns `None` as soon as a step cannot be taken. Whatever node the walk
/// ends on is returned; callers decide which kinds of leaf they accept.
pub fn get<'a, T: Tree>(root: &'a T, keys: &[String]) -> Option<&'a T> {
    keys.iter().try_fold(root, |node, key| step(node, key))
}

/// Store `value` at `keys` inside `doc`.
///
/// Every key but the last must resolve to a map or sequence. The last key
/// may name an existing scalar (replaced) or, on a map, a missing key
/// (added).
pub fn set<D: Editable>(doc: &mut D, keys: &[String], value: &str) -> DocumentResult<()> {
    let Some((last, parents)) = keys.split_last() else {
        return Err(DocumentError::EmptyPath);
    };
    let path = keys.join(".");

    let mut parent = doc.root();
    for (depth, key) in parents.iter().enumerate() {
        parent = match step(parent, key) {
            Some(next) => next,
            None => {
                return Err(match parent.verbatim_reason() {
                    Some(reason) => unsupported(&keys[..depth], reason),
                    None => DocumentError::Unresolved(keys[..=depth].join(".")),
                });
            }
        };
    }
    if parent.kind() == NodeKind::Leaf {
        return Err(match parent.verbatim_reason() {
            Some(reason) => unsupported(parents, reason),
            None => DocumentError::Unresolved(prefix(parents)),
        });
    }

    debug!(%path, "planning document edit");
    let edit = doc.plan_set(parent, last, value, &path)?;
    doc.apply(edit)
}

fn prefix(keys: &[String]) -> String {
    if keys.is_empty() {
        "<root>".to_string()
    } else {
        keys.join(".")
    }
}

fn unsupported(keys: &[String], reason: &str) -> DocumentError {
    DocumentError::Unsupported {
        path: prefix(keys),
        reason: reason.to_string(),
    }
}
