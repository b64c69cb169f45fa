//! Statement parser built on the lexer.
//!
//! The parser only groups what rules need to see structurally:
//! statements split at top-level `;`, balanced parentheses, and a name
//! directly followed by a parenthesis as a function call.

use std::sync::Arc;

use crate::error::{TransError, TransResult};
use crate::lexer::{Lexer, SqlLexer};
use crate::tree::{Fragment, GroupKind, TokenKind, Tree};

/// Parse/render capability for one dialect.
pub trait SqlParser: Send + Sync {
    /// Parse SQL text into one tree per statement.
    fn parse(&self, sql: &str) -> TransResult<Vec<Tree>>;

    /// Render a tree back to SQL text.
    fn render(&self, tree: &Tree) -> String {
        tree.to_string()
    }

    /// Lexer used to decompose text injected by rules.
    fn lexer(&self) -> Arc<dyn Lexer>;
}

/// Parser shared by the built-in dialects.
#[derive(Clone)]
pub struct GenericParser {
    lexer: Arc<dyn Lexer>,
}

impl Default for GenericParser {
    fn default() -> Self {
        Self::new(Arc::new(SqlLexer::new()))
    }
}

impl GenericParser {
    pub fn new(lexer: Arc<dyn Lexer>) -> Self {
        Self { lexer }
    }

    /// Parser for a named dialect. Unknown names get the generic lexer.
    pub fn for_dialect(dialect: &str) -> Self {
        let lexer = SqlLexer::new().with_backticks(dialect.eq_ignore_ascii_case("mysql"));
        Self::new(Arc::new(lexer))
    }
}

impl SqlParser for GenericParser {
    fn parse(&self, sql: &str) -> TransResult<Vec<Tree>> {
        let tokens = self.lexer.tokenize(sql)?;
        split_statements(tokens)
            .into_iter()
            .map(|(offset, tokens)| {
                let fragments = group_tokens(tokens, offset)?;
                Tree::from_fragments(fragments, None)
            })
            .collect()
    }

    fn lexer(&self) -> Arc<dyn Lexer> {
        self.lexer.clone()
    }
}

type Token = (TokenKind, String);

/// Split at top-level `;`. Trivia right after a terminator stays with the
/// statement it follows; a trailing trivia-only segment is dropped.
fn split_statements(tokens: Vec<Token>) -> Vec<(usize, Vec<Token>)> {
    let mut statements = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    let mut depth = 0usize;
    let mut terminated = false;

    for (kind, value) in tokens {
        let len = value.len();
        if terminated && !kind.is_trivia() {
            statements.push((start, std::mem::take(&mut current)));
            start = offset;
            terminated = false;
        }
        if kind == TokenKind::Punctuation {
            match value.as_str() {
                "(" => depth += 1,
                ")" => depth = depth.saturating_sub(1),
                ";" if depth == 0 => terminated = true,
                _ => {}
            }
        }
        current.push((kind, value));
        offset += len;
    }

    if current.iter().any(|(kind, _)| !kind.is_trivia()) {
        statements.push((start, current));
    } else if let Some((_, last)) = statements.last_mut() {
        last.extend(current);
    }
    statements
}

/// Nest parentheses and function calls.
fn group_tokens(tokens: Vec<Token>, mut offset: usize) -> TransResult<Vec<Fragment>> {
    let mut stack: Vec<Vec<Fragment>> = vec![Vec::new()];
    let mut opened: Vec<usize> = Vec::new();

    for (kind, value) in tokens {
        let len = value.len();
        let is_punct = kind == TokenKind::Punctuation;
        if is_punct && value == "(" {
            opened.push(offset);
            stack.push(vec![Fragment::Token(kind, value)]);
        } else if is_punct && value == ")" {
            if stack.len() == 1 {
                return Err(TransError::parse(offset, "Unmatched ')'"));
            }
            let mut inner = stack.pop().unwrap_or_default();
            opened.pop();
            inner.push(Fragment::Token(kind, value));
            let paren = Fragment::Group(GroupKind::Parenthesis, inner);
            let Some(top) = stack.last_mut() else {
                return Err(TransError::parse(offset, "Unmatched ')'"));
            };
            match top.pop() {
                Some(Fragment::Token(k @ (TokenKind::Name | TokenKind::QuotedName), name)) => {
                    let callee = Fragment::Token(k, name);
                    top.push(Fragment::Group(GroupKind::Function, vec![callee, paren]));
                }
                Some(other) => {
                    top.push(other);
                    top.push(paren);
                }
                None => top.push(paren),
            }
        } else if let Some(top) = stack.last_mut() {
            top.push(Fragment::Token(kind, value));
        }
        offset += len;
    }

    if let Some(position) = opened.last() {
        return Err(TransError::parse(*position, "Unclosed '('"));
    }
    Ok(stack.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_statement() {
        let trees = GenericParser::default().parse("SELECT 1").unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].to_string(), "SELECT 1");
    }

    #[test]
    fn test_split_keeps_trailing_space() {
        let trees = GenericParser::default()
            .parse("SELECT 1; SELECT (2; 3);\n")
            .unwrap();
        let texts: Vec<String> = trees.iter().map(|t| t.to_string()).collect();
        assert_eq!(texts, vec!["SELECT 1; ", "SELECT (2; 3);\n"]);
    }

    #[test]
    fn test_function_grouping() {
        let trees = GenericParser::default().parse("SELECT IFNULL(a, (b))").unwrap();
        let tree = &trees[0];
        let root = tree.root();
        let func = tree.children(root)[2];
        assert_eq!(tree.group_kind(func), Some(GroupKind::Function));
        assert_eq!(tree.value(tree.children(func)[0]), Some("IFNULL"));
        let paren = tree.children(func)[1];
        assert_eq!(tree.group_kind(paren), Some(GroupKind::Parenthesis));
        assert_eq!(tree.text(paren), "(a, (b))");
    }

    #[test]
    fn test_keyword_paren_is_not_function() {
        let trees = GenericParser::default().parse("VALUES (1)").unwrap();
        let tree = &trees[0];
        let last = *tree.children(tree.root()).last().unwrap();
        assert_eq!(tree.group_kind(last), Some(GroupKind::Parenthesis));
    }

    #[test]
    fn test_unbalanced() {
        let err = GenericParser::default().parse("SELECT (1").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 7: Unclosed '('");
        let err = GenericParser::default().parse("SELECT 1)").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at position 8: Unmatched ')'");
    }

    #[test]
    fn test_mysql_backticks() {
        let trees = GenericParser::for_dialect("mysql").parse("SELECT `id`").unwrap();
        let tree = &trees[0];
        let last = *tree.children(tree.root()).last().unwrap();
        assert_eq!(tree.token_kind(last), Some(TokenKind::QuotedName));
    }

    #[test]
    fn test_parents_are_consistent() {
        let trees = GenericParser::default().parse("SELECT f(x, (y))").unwrap();
        let tree = &trees[0];
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            for child in tree.children(id) {
                assert_eq!(tree.parent(*child), Some(id));
                stack.push(*child);
            }
        }
    }
}
