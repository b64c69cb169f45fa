//! Built-in dialect packs.
//!
//! ```text
//! mysql ──► ansi ──► postgres
//!             └────► sqlite
//! ```
//!
//! `mysql -> postgres` and `mysql -> sqlite` have no direct step and are
//! routed through `ansi`.

use std::sync::Arc;

use anyhow::anyhow;

use crate::error::TransResult;
use crate::lexer::Lexer;
use crate::parser::{GenericParser, SqlParser};
use crate::rule::Rule;
use crate::search::{is_keyword, Matcher};
use crate::transform::{Translation, TranslationStep};
use crate::translator::Translator;
use crate::tree::{Fragment, GroupKind, NodeId, TokenKind, Tree};

pub const MYSQL: &str = "mysql";
pub const ANSI: &str = "ansi";
pub const POSTGRES: &str = "postgres";
pub const SQLITE: &str = "sqlite";

/// Register the built-in parsers and steps.
pub fn register_builtin(translator: &Translator) -> TransResult<()> {
    translator.register_parser(MYSQL, Arc::new(GenericParser::for_dialect(MYSQL)));
    for step in builtin_steps() {
        let (src, tgt) = (step.src().to_string(), step.tgt().to_string());
        translator.register_translation(&src, &tgt, Translation::from(step), false)?;
    }
    Ok(())
}

pub fn builtin_steps() -> Vec<TranslationStep> {
    vec![mysql_to_ansi(), ansi_to_postgres(), ansi_to_sqlite()]
}

pub fn mysql_to_ansi() -> TranslationStep {
    TranslationStep::new(
        MYSQL,
        ANSI,
        vec![limit_with_offset()].into(),
        vec![backtick_names(), rename_function("ifnull", "IFNULL", "COALESCE")].into(),
    )
    .with_lexer(lexer_for(ANSI))
}

pub fn ansi_to_postgres() -> TranslationStep {
    TranslationStep::new(
        ANSI,
        POSTGRES,
        Vec::new().into(),
        vec![rename_function("char-length", "CHAR_LENGTH", "LENGTH")].into(),
    )
    .with_lexer(lexer_for(POSTGRES))
}

pub fn ansi_to_sqlite() -> TranslationStep {
    TranslationStep::new(
        ANSI,
        SQLITE,
        vec![truncate_to_delete()].into(),
        vec![
            Rule::substitute("true-literal", is_keyword("true"), "1"),
            Rule::substitute("false-literal", is_keyword("false"), "0"),
            Rule::substitute(
                "current-timestamp",
                is_keyword("current_timestamp"),
                "datetime('now')",
            ),
        ]
        .into(),
    )
    .with_lexer(lexer_for(SQLITE))
}

fn lexer_for(dialect: &str) -> Arc<dyn Lexer> {
    GenericParser::for_dialect(dialect).lexer()
}

/// Rename the callee of a function call, keeping its arguments.
pub fn rename_function(rule: &str, from: &str, to: &str) -> Rule {
    let from = from.to_string();
    let matcher: Matcher = Arc::new(move |tree: &Tree, id: NodeId| {
        tree.token_kind(id) == Some(TokenKind::Name)
            && tree.value(id).is_some_and(|v| v.eq_ignore_ascii_case(&from))
            && tree
                .parent(id)
                .filter(|p| tree.group_kind(*p) == Some(GroupKind::Function))
                .and_then(|p| tree.children(p).first().copied())
                == Some(id)
    });
    let to = to.to_string();
    Rule::when(rule, matcher, move |_: &Tree, _: NodeId| {
        Ok(vec![Fragment::token(TokenKind::Name, to.clone())])
    })
}

/// `` `name` `` to `"name"`.
fn backtick_names() -> Rule {
    let matcher: Matcher = Arc::new(|tree: &Tree, id: NodeId| {
        tree.token_kind(id) == Some(TokenKind::QuotedName)
            && tree.value(id).is_some_and(|v| v.starts_with('`'))
    });
    Rule::when("backtick-names", matcher, |tree: &Tree, id: NodeId| {
        let value = tree
            .value(id)
            .ok_or_else(|| anyhow!("quoted name without text"))?;
        let inner = value.trim_matches('`').replace('"', "\"\"");
        Ok(vec![Fragment::token(
            TokenKind::QuotedName,
            format!("\"{}\"", inner),
        )])
    })
}

/// `LIMIT offset, count` to `LIMIT count OFFSET offset`.
fn limit_with_offset() -> Rule {
    Rule::new(
        "limit-offset",
        |tree: &Tree, id: NodeId| Ok(id == tree.root() && find_limit_pair(tree, id).is_some()),
        |tree: &Tree, id: NodeId| {
            let (limit, offset, count) =
                find_limit_pair(tree, id).ok_or_else(|| anyhow!("LIMIT clause not found"))?;
            let children = tree.children(id);
            let mut out: Vec<Fragment> = children[..=limit].iter().map(|c| Fragment::Node(*c)).collect();
            out.push(Fragment::token(TokenKind::Whitespace, " "));
            out.push(Fragment::Node(children[count]));
            out.push(Fragment::raw(" OFFSET "));
            out.push(Fragment::Node(children[offset]));
            out.extend(children[count + 1..].iter().map(|c| Fragment::Node(*c)));
            Ok(out)
        },
    )
}

/// Indices of `LIMIT`, its offset, and its count among the root's children.
fn find_limit_pair(tree: &Tree, root: NodeId) -> Option<(usize, usize, usize)> {
    let children = tree.children(root);
    let limit = children
        .iter()
        .position(|id| keyword_is(tree, *id, "limit"))?;
    let following = significant_after(tree, children, limit, 3);
    let [offset, comma, count] = following.as_slice() else {
        return None;
    };
    let is_operand = |i: usize| {
        matches!(
            tree.token_kind(children[i]),
            Some(TokenKind::Number | TokenKind::Name)
        )
    };
    let is_comma = tree.token_kind(children[*comma]) == Some(TokenKind::Punctuation)
        && tree.value(children[*comma]) == Some(",");
    (is_operand(*offset) && is_comma && is_operand(*count)).then_some((limit, *offset, *count))
}

/// `TRUNCATE TABLE t` to `DELETE FROM t`.
fn truncate_to_delete() -> Rule {
    Rule::new(
        "truncate-delete",
        |tree: &Tree, id: NodeId| Ok(id == tree.root() && find_truncate(tree, id).is_some()),
        |tree: &Tree, id: NodeId| {
            let (truncate, table) =
                find_truncate(tree, id).ok_or_else(|| anyhow!("TRUNCATE TABLE not found"))?;
            let children = tree.children(id);
            let mut out: Vec<Fragment> =
                children[..truncate].iter().map(|c| Fragment::Node(*c)).collect();
            out.push(Fragment::raw("DELETE FROM"));
            out.extend(children[table + 1..].iter().map(|c| Fragment::Node(*c)));
            Ok(out)
        },
    )
}

fn find_truncate(tree: &Tree, root: NodeId) -> Option<(usize, usize)> {
    let children = tree.children(root);
    let leading = significant_after(tree, children, 0, 2);
    let first = children
        .first()
        .filter(|id| !is_trivia(tree, **id))
        .map(|_| 0);
    let (truncate, table) = match (first, leading.as_slice()) {
        (Some(first), [second, ..]) => (first, *second),
        (None, [first, second]) => (*first, *second),
        _ => return None,
    };
    (keyword_is(tree, children[truncate], "truncate") && keyword_is(tree, children[table], "table"))
        .then_some((truncate, table))
}

/// Up to `n` indices after `index` that are not whitespace or comments.
fn significant_after(tree: &Tree, children: &[NodeId], index: usize, n: usize) -> Vec<usize> {
    (index + 1..children.len())
        .filter(|i| !is_trivia(tree, children[*i]))
        .take(n)
        .collect()
}

fn is_trivia(tree: &Tree, id: NodeId) -> bool {
    tree.token_kind(id).is_some_and(TokenKind::is_trivia)
}

fn keyword_is(tree: &Tree, id: NodeId, word: &str) -> bool {
    tree.token_kind(id) == Some(TokenKind::Keyword)
        && tree.value(id).is_some_and(|v| v.eq_ignore_ascii_case(word))
}
