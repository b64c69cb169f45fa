//! Arena-backed syntax tree.
//!
//! A [`Tree`] owns every node of one parsed statement. Nodes are addressed by
//! [`NodeId`] and record their owning container as a back-reference, which is
//! only consulted by lookups such as [`crate::search::index_of`].
//!
//! ```text
//! Statement
//! ├── Keyword  "SELECT"
//! ├── Whitespace " "
//! ├── Function
//! │   ├── Name "IFNULL"
//! │   └── Parenthesis
//! │       └── ...
//! └── ...
//! ```

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::error::{TransError, TransResult};
use crate::lexer::Lexer;

/// Index of a node inside its [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Semantic tag of a leaf token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Keyword,
    Name,
    QuotedName,
    String,
    Number,
    Operator,
    Punctuation,
    Whitespace,
    Comment,
    Wildcard,
    /// Opaque text inserted without dialect context.
    Raw,
}

impl TokenKind {
    /// Whitespace and comments carry no meaning for rules.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

/// Kind of an ordered container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupKind {
    Statement,
    Parenthesis,
    /// A name immediately followed by a parenthesis.
    Function,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Statement => write!(f, "Statement"),
            GroupKind::Parenthesis => write!(f, "Parenthesis"),
            GroupKind::Function => write!(f, "Function"),
        }
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Token { kind: TokenKind, value: String },
    Group { kind: GroupKind, children: Vec<NodeId> },
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
}

/// Input element for building or splicing containers.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Text that is re-lexed when a lexer is available, otherwise kept as one
    /// [`TokenKind::Raw`] token.
    Raw(String),
    Token(TokenKind, String),
    /// An existing node of the same tree.
    Node(NodeId),
    Group(GroupKind, Vec<Fragment>),
}

impl Fragment {
    pub fn raw(text: impl Into<String>) -> Self {
        Fragment::Raw(text.into())
    }

    pub fn token(kind: TokenKind, value: impl Into<String>) -> Self {
        Fragment::Token(kind, value.into())
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Fragment::Raw(text.to_string())
    }
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Fragment::Raw(text)
    }
}

impl From<NodeId> for Fragment {
    fn from(id: NodeId) -> Self {
        Fragment::Node(id)
    }
}

/// One parsed statement: the root container plus every node it reaches.
///
/// Detached nodes stay in the arena until the tree is dropped.
#[derive(Debug, Clone)]
pub struct Tree {
    slots: Vec<Slot>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create an empty statement.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot {
                data: NodeData::Group {
                    kind: GroupKind::Statement,
                    children: Vec::new(),
                },
                parent: None,
            }],
            root: NodeId(0),
        }
    }

    /// Build a statement from a mix of raw text and typed fragments.
    pub fn from_fragments(
        fragments: Vec<Fragment>,
        lexer: Option<&dyn Lexer>,
    ) -> TransResult<Self> {
        let mut tree = Self::new();
        let root = tree.root;
        tree.splice(root, 0..0, fragments, lexer)?;
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of slots in the arena, detached nodes included.
    pub fn arena_len(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.slots.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0).and_then(|s| s.parent)
    }

    pub fn is_group(&self, id: NodeId) -> bool {
        self.group_kind(id).is_some()
    }

    pub fn token_kind(&self, id: NodeId) -> Option<TokenKind> {
        match self.slots.get(id.0).map(|s| &s.data) {
            Some(NodeData::Token { kind, .. }) => Some(*kind),
            _ => None,
        }
    }

    pub fn group_kind(&self, id: NodeId) -> Option<GroupKind> {
        match self.slots.get(id.0).map(|s| &s.data) {
            Some(NodeData::Group { kind, .. }) => Some(*kind),
            _ => None,
        }
    }

    /// Literal value of a token; `None` for containers.
    pub fn value(&self, id: NodeId) -> Option<&str> {
        match self.slots.get(id.0).map(|s| &s.data) {
            Some(NodeData::Token { value, .. }) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Direct children of a container; empty for tokens.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.slots.get(id.0).map(|s| &s.data) {
            Some(NodeData::Group { children, .. }) => children,
            _ => &[],
        }
    }

    pub fn get(&self, container: NodeId, index: usize) -> Option<NodeId> {
        self.children(container).get(index).copied()
    }

    /// Overwrite one slot with an existing node, detaching the old element.
    pub fn set(&mut self, container: NodeId, index: usize, node: NodeId) -> TransResult<NodeId> {
        let ids = self.splice(container, index..index + 1, vec![Fragment::Node(node)], None)?;
        Ok(ids[0])
    }

    /// Allocate a detached token.
    pub fn new_token(&mut self, kind: TokenKind, value: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Token {
            kind,
            value: value.into(),
        })
    }

    /// Append fragments to the end of a container.
    pub fn append(
        &mut self,
        container: NodeId,
        fragments: Vec<Fragment>,
        lexer: Option<&dyn Lexer>,
    ) -> TransResult<Vec<NodeId>> {
        let end = self.children(container).len();
        self.splice(container, end..end, fragments, lexer)
    }

    /// Replace `range` of a container's children with `fragments`.
    ///
    /// Elements of the range that are not reused by the fragments end up
    /// detached. Returns the ids now occupying the range.
    pub fn splice(
        &mut self,
        container: NodeId,
        range: Range<usize>,
        fragments: Vec<Fragment>,
        lexer: Option<&dyn Lexer>,
    ) -> TransResult<Vec<NodeId>> {
        if !self.is_group(container) || range.start > range.end {
            return Err(TransError::StaleReference { node: container });
        }
        let replaced = match self.children(container).get(range.clone()) {
            Some(slice) => slice.to_vec(),
            None => return Err(TransError::StaleReference { node: container }),
        };

        let mut claimed = HashSet::new();
        let new_ids = self.materialize(fragments, lexer, &replaced, &mut claimed)?;

        for id in &replaced {
            if !claimed.contains(id) {
                self.slots[id.0].parent = None;
            }
        }
        for id in &new_ids {
            self.slots[id.0].parent = Some(container);
        }
        if let NodeData::Group { children, .. } = &mut self.slots[container.0].data {
            children.splice(range, new_ids.iter().copied());
        }
        Ok(new_ids)
    }

    fn materialize(
        &mut self,
        fragments: Vec<Fragment>,
        lexer: Option<&dyn Lexer>,
        movable: &[NodeId],
        claimed: &mut HashSet<NodeId>,
    ) -> TransResult<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            match fragment {
                Fragment::Raw(text) => match lexer {
                    Some(lexer) => {
                        for (kind, value) in lexer.tokenize(&text)? {
                            ids.push(self.new_token(kind, value));
                        }
                    }
                    None => ids.push(self.new_token(TokenKind::Raw, text)),
                },
                Fragment::Token(kind, value) => ids.push(self.new_token(kind, value)),
                Fragment::Node(id) => {
                    if !self.contains(id) {
                        return Err(TransError::StaleReference { node: id });
                    }
                    let free = id != self.root
                        && (movable.contains(&id) || self.parent(id).is_none());
                    if free && claimed.insert(id) {
                        ids.push(id);
                    } else {
                        ids.push(self.deep_copy(id));
                    }
                }
                Fragment::Group(kind, inner) => {
                    let children = self.materialize(inner, lexer, movable, claimed)?;
                    let group = self.alloc(NodeData::Group {
                        kind,
                        children: children.clone(),
                    });
                    for child in children {
                        self.slots[child.0].parent = Some(group);
                    }
                    ids.push(group);
                }
            }
        }
        Ok(ids)
    }

    /// Copy the subtree under `id` into fresh detached slots.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let data = self.slots[id.0].data.clone();
        match data {
            NodeData::Token { .. } => self.alloc(data),
            NodeData::Group { kind, children } => {
                let copies: Vec<NodeId> = children.iter().map(|c| self.deep_copy(*c)).collect();
                let group = self.alloc(NodeData::Group {
                    kind,
                    children: copies.clone(),
                });
                for child in copies {
                    self.slots[child.0].parent = Some(group);
                }
                group
            }
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot { data, parent: None });
        id
    }

    /// Literal text of a node, concatenating descendants in order.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_text(id, &mut out);
        out
    }

    fn write_text(&self, id: NodeId, out: &mut String) {
        match self.slots.get(id.0).map(|s| &s.data) {
            Some(NodeData::Token { value, .. }) => out.push_str(value),
            Some(NodeData::Group { children, .. }) => {
                for child in children {
                    self.write_text(*child, out);
                }
            }
            None => {}
        }
    }

    /// Indented structure listing, one node per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(self.root, 0, &mut out);
        out
    }

    fn write_outline(&self, id: NodeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match &self.slots[id.0].data {
            NodeData::Token { kind, value } => {
                out.push_str(&format!("{}{:?} {:?}\n", indent, kind, value));
            }
            NodeData::Group { kind, children } => {
                out.push_str(&format!("{}{}\n", indent, kind));
                for child in children {
                    self.write_outline(*child, depth + 1, out);
                }
            }
        }
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text(self.root))
    }
}
