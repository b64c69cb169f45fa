//! Node search and in-place replacement.

use std::sync::Arc;

use crate::error::{TransError, TransResult};
use crate::lexer::Lexer;
use crate::tree::{Fragment, GroupKind, NodeId, TokenKind, Tree};

/// Shared node predicate, as used by rules and structural paths.
pub type Matcher = Arc<dyn Fn(&Tree, NodeId) -> bool + Send + Sync>;

/// A slot inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub parent: NodeId,
    pub index: usize,
}

/// Lazy pre-order search below a start node.
///
/// A node is yielded before its descendants, and descendants before the
/// node's later siblings.
#[derive(Clone)]
pub struct Find<'t, P> {
    tree: &'t Tree,
    predicate: P,
    start: NodeId,
    stack: Vec<(NodeId, usize)>,
}

impl<P> Find<'_, P> {
    /// Rewind to the start node.
    pub fn restart(&mut self) {
        self.stack.clear();
        self.stack.push((self.start, 0));
    }
}

impl<P> Iterator for Find<'_, P>
where
    P: Fn(&Tree, NodeId) -> bool,
{
    type Item = Location;

    fn next(&mut self) -> Option<Location> {
        loop {
            let (container, index) = *self.stack.last()?;
            let Some(child) = self.tree.get(container, index) else {
                self.stack.pop();
                continue;
            };
            if let Some(frame) = self.stack.last_mut() {
                frame.1 += 1;
            }
            if self.tree.is_group(child) {
                self.stack.push((child, 0));
            }
            if (self.predicate)(self.tree, child) {
                return Some(Location {
                    parent: container,
                    index,
                });
            }
        }
    }
}

/// Search the descendants of `start` for nodes satisfying `predicate`.
pub fn find<P>(tree: &Tree, start: NodeId, predicate: P) -> Find<'_, P>
where
    P: Fn(&Tree, NodeId) -> bool,
{
    Find {
        tree,
        predicate,
        start,
        stack: vec![(start, 0)],
    }
}

/// First matching descendant in document order.
pub fn find_first<P>(tree: &Tree, start: NodeId, predicate: P) -> Option<NodeId>
where
    P: Fn(&Tree, NodeId) -> bool,
{
    find(tree, start, predicate)
        .next()
        .and_then(|loc| tree.get(loc.parent, loc.index))
}

/// Follow a structural path: each matcher selects among the direct children
/// of the node matched by the previous one. Backtracks over sibling choices.
pub fn find_path(tree: &Tree, start: NodeId, path: &[Matcher]) -> Option<NodeId> {
    let Some((head, rest)) = path.split_first() else {
        return Some(start);
    };
    tree.children(start)
        .iter()
        .filter(|child| head(tree, **child))
        .find_map(|child| find_path(tree, *child, rest))
}

/// Position of `node` inside its recorded parent.
pub fn index_of(tree: &Tree, node: NodeId) -> TransResult<usize> {
    let parent = tree
        .parent(node)
        .ok_or(TransError::StaleReference { node })?;
    tree.children(parent)
        .iter()
        .position(|child| *child == node)
        .ok_or(TransError::StaleReference { node })
}

/// Splice `fragments` into the slot held by `old`, leaving `old` detached
/// unless a fragment reuses it.
pub fn replace(
    tree: &mut Tree,
    old: NodeId,
    fragments: Vec<Fragment>,
    lexer: Option<&dyn Lexer>,
) -> TransResult<Vec<NodeId>> {
    let index = index_of(tree, old)?;
    let parent = tree
        .parent(old)
        .ok_or(TransError::StaleReference { node: old })?;
    tree.splice(parent, index..index + 1, fragments, lexer)
}

/// Detach `node` from its parent.
pub fn remove(tree: &mut Tree, node: NodeId) -> TransResult<()> {
    replace(tree, node, Vec::new(), None).map(|_| ())
}

/// Next sibling that is not whitespace or a comment.
pub fn next_significant(tree: &Tree, node: NodeId) -> Option<NodeId> {
    let parent = tree.parent(node)?;
    let index = index_of(tree, node).ok()?;
    tree.children(parent)[index + 1..]
        .iter()
        .copied()
        .find(|id| !tree.token_kind(*id).is_some_and(TokenKind::is_trivia))
}

pub fn is_kind(kind: TokenKind) -> Matcher {
    Arc::new(move |tree: &Tree, id: NodeId| tree.token_kind(id) == Some(kind))
}

pub fn is_group(kind: GroupKind) -> Matcher {
    Arc::new(move |tree: &Tree, id: NodeId| tree.group_kind(id) == Some(kind))
}

/// Keyword token equal to `word`, ignoring case.
pub fn is_keyword(word: &str) -> Matcher {
    let word = word.to_string();
    Arc::new(move |tree: &Tree, id: NodeId| {
        tree.token_kind(id) == Some(TokenKind::Keyword)
            && tree.value(id).is_some_and(|v| v.eq_ignore_ascii_case(&word))
    })
}

/// Function call whose name equals `name`, ignoring case.
pub fn is_function(name: &str) -> Matcher {
    let name = name.to_string();
    Arc::new(move |tree: &Tree, id: NodeId| {
        tree.group_kind(id) == Some(GroupKind::Function)
            && tree
                .children(id)
                .first()
                .and_then(|callee| tree.value(*callee))
                .is_some_and(|v| v.eq_ignore_ascii_case(&name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{GenericParser, SqlParser};

    fn parse(sql: &str) -> Tree {
        GenericParser::default().parse(sql).unwrap().remove(0)
    }

    fn names(n: usize) -> Tree {
        let fragments = (0..n)
            .map(|i| Fragment::token(TokenKind::Name, format!("n{}", i)))
            .collect();
        Tree::from_fragments(fragments, None).unwrap()
    }

    #[test]
    fn test_find_document_order() {
        let tree = parse("SELECT f(a), b");
        let found: Vec<String> = find(&tree, tree.root(), |t, id| {
            t.token_kind(id) == Some(TokenKind::Name)
        })
        .map(|loc| tree.text(tree.get(loc.parent, loc.index).unwrap()))
        .collect();
        assert_eq!(found, vec!["f", "a", "b"]);
    }

    #[test]
    fn test_find_is_restartable() {
        let tree = parse("SELECT a, b");
        let mut search = find(&tree, tree.root(), |t, id| {
            t.token_kind(id) == Some(TokenKind::Name)
        });
        let first: Vec<Location> = search.by_ref().collect();
        assert_eq!(first.len(), 2);
        search.restart();
        let second: Vec<Location> = search.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_path() {
        let tree = parse("SELECT x, IFNULL(a, 0)");
        let path = vec![
            is_function("ifnull"),
            is_group(GroupKind::Parenthesis),
            is_kind(TokenKind::Number),
        ];
        let found = find_path(&tree, tree.root(), &path).unwrap();
        assert_eq!(tree.value(found), Some("0"));
        assert!(find_path(&tree, tree.root(), &[is_keyword("from")]).is_none());
    }

    #[test]
    fn test_replace_shift() {
        let mut tree = names(5);
        let root = tree.root();
        let originals: Vec<NodeId> = tree.children(root).to_vec();
        let idx = 2;
        replace(
            &mut tree,
            originals[idx],
            vec![
                Fragment::token(TokenKind::Name, "x"),
                Fragment::token(TokenKind::Name, "y"),
                Fragment::token(TokenKind::Name, "z"),
            ],
            None,
        )
        .unwrap();
        let children = tree.children(root).to_vec();
        assert_eq!(children.len(), 7);
        assert_eq!(&children[..idx], &originals[..idx]);
        assert_eq!(&children[idx + 3..], &originals[idx + 1..]);
        assert_eq!(tree.to_string(), "n0n1xyzn3n4");
        for id in children {
            assert_eq!(tree.parent(id), Some(root));
        }
        assert_eq!(tree.parent(originals[idx]), None);
    }

    #[test]
    fn test_stale_reference() {
        let mut tree = names(3);
        let root = tree.root();
        let old = tree.get(root, 1).unwrap();
        remove(&mut tree, old).unwrap();
        assert!(matches!(
            index_of(&tree, old),
            Err(TransError::StaleReference { .. })
        ));
        let err = replace(&mut tree, old, vec!["x".into()], None).unwrap_err();
        assert!(matches!(err, TransError::StaleReference { node } if node == old));
        assert_eq!(tree.to_string(), "n0n2");
    }

    #[test]
    fn test_index_of_root_is_stale() {
        let tree = names(1);
        assert!(index_of(&tree, tree.root()).is_err());
    }

    #[test]
    fn test_next_significant_skips_trivia() {
        let tree = parse("LIMIT  /* x */ 5");
        let limit = tree.get(tree.root(), 0).unwrap();
        let next = next_significant(&tree, limit).unwrap();
        assert_eq!(tree.value(next), Some("5"));
    }
}
