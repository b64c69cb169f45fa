//! SQL lexer using nom.
//!
//! Splits SQL text into typed `(TokenKind, text)` pairs. Concatenating the
//! text of every pair reproduces the input exactly, whitespace and comments
//! included.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, one_of},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{pair, tuple},
    IResult,
};

use crate::error::{TransError, TransResult};
use crate::tree::TokenKind;

/// Words lexed as [`TokenKind::Keyword`] rather than names.
pub const KEYWORDS: &[&str] = &[
    "all", "alter", "and", "as", "asc", "between", "by", "case", "create", "cross",
    "current_date", "current_timestamp", "default", "delete", "desc", "distinct", "drop",
    "else", "end", "exists", "false", "from", "full", "group", "having", "ignore", "in",
    "index", "inner", "insert", "into", "is", "join", "left", "like", "limit", "not",
    "null", "offset", "on", "or", "order", "outer", "returning", "right", "select", "set",
    "table", "then", "true", "truncate", "union", "update", "values", "when", "where",
    "with",
];

/// Capability to turn text into typed tokens.
pub trait Lexer: Send + Sync {
    fn tokenize(&self, text: &str) -> TransResult<Vec<(TokenKind, String)>>;
}

/// Lexer for the common SQL surface shared by the built-in dialects.
#[derive(Debug, Clone, Default)]
pub struct SqlLexer {
    backtick_names: bool,
}

impl SqlLexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `` `name` `` as a quoted identifier (MySQL).
    pub fn with_backticks(mut self, enabled: bool) -> Self {
        self.backtick_names = enabled;
        self
    }
}

impl Lexer for SqlLexer {
    fn tokenize(&self, text: &str) -> TransResult<Vec<(TokenKind, String)>> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            match lex_token(rest, self.backtick_names) {
                Ok((remaining, (kind, value))) => {
                    tokens.push((kind, value.to_string()));
                    rest = remaining;
                }
                Err(_) => {
                    let position = text.len() - rest.len();
                    let found = rest.chars().next().unwrap_or_default();
                    return Err(TransError::parse(
                        position,
                        format!("Unexpected character '{}'", found),
                    ));
                }
            }
        }
        Ok(tokens)
    }
}

/// Check whether a word is a reserved keyword.
pub fn is_keyword(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    KEYWORDS.contains(&lower.as_str())
}

fn lex_token(input: &str, backticks: bool) -> IResult<&str, (TokenKind, &str)> {
    if backticks {
        if let Ok((rest, name)) = parse_backtick(input) {
            return Ok((rest, (TokenKind::QuotedName, name)));
        }
    }
    alt((
        map(multispace1, |s| (TokenKind::Whitespace, s)),
        map(parse_comment, |s| (TokenKind::Comment, s)),
        map(parse_string, |s| (TokenKind::String, s)),
        map(parse_double_quoted, |s| (TokenKind::QuotedName, s)),
        map(parse_number, |s| (TokenKind::Number, s)),
        parse_word,
        map(parse_placeholder, |s| (TokenKind::Name, s)),
        map(parse_operator, |s| (TokenKind::Operator, s)),
        map(tag("*"), |s| (TokenKind::Wildcard, s)),
        map(recognize(one_of("(),;.")), |s| (TokenKind::Punctuation, s)),
    ))(input)
}

/// Parse `-- line` or `/* block */` comments.
fn parse_comment(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(tag("--"), not_line_ending)),
        recognize(tuple((tag("/*"), take_until("*/"), tag("*/")))),
    ))(input)
}

/// Parse a single-quoted string with `''` escapes.
fn parse_string(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        char('\''),
        many0(alt((tag("''"), is_not("'")))),
        char('\''),
    )))(input)
}

fn parse_double_quoted(input: &str) -> IResult<&str, &str> {
    recognize(tuple((char('"'), opt(is_not("\"")), char('"'))))(input)
}

fn parse_backtick(input: &str) -> IResult<&str, &str> {
    recognize(tuple((char('`'), opt(is_not("`")), char('`'))))(input)
}

/// Parse an integer or decimal number.
fn parse_number(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

/// Parse a keyword or bare identifier.
fn parse_word(input: &str) -> IResult<&str, (TokenKind, &str)> {
    let (input, word) = recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)?;
    let kind = if is_keyword(word) {
        TokenKind::Keyword
    } else {
        TokenKind::Name
    };
    Ok((input, (kind, word)))
}

/// Parse bind placeholders: `$1`, `?`, `:name`.
fn parse_placeholder(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(char('$'), digit1)),
        tag("?"),
        recognize(pair(
            char(':'),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    ))(input)
}

fn parse_operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("<="),
        tag(">="),
        tag("<>"),
        tag("!="),
        tag("||"),
        tag("::"),
        recognize(one_of("=<>+-/%")),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        SqlLexer::new()
            .tokenize(sql)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect()
    }

    #[test]
    fn test_simple_select() {
        let tokens = SqlLexer::new().tokenize("SELECT id FROM users").unwrap();
        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[0], (TokenKind::Keyword, "SELECT".to_string()));
        assert_eq!(tokens[2], (TokenKind::Name, "id".to_string()));
    }

    #[test]
    fn test_lossless() {
        let sql = "select a, 'it''s' -- note\n FROM t WHERE x >= 1.5 /* c */;";
        let tokens = SqlLexer::new().tokenize(sql).unwrap();
        let joined: String = tokens.into_iter().map(|(_, v)| v).collect();
        assert_eq!(joined, sql);
    }

    #[test]
    fn test_string_with_escape() {
        let tokens = SqlLexer::new().tokenize("'it''s'").unwrap();
        assert_eq!(tokens, vec![(TokenKind::String, "'it''s'".to_string())]);
    }

    #[test]
    fn test_backticks_only_when_enabled() {
        assert!(SqlLexer::new().tokenize("`id`").is_err());
        let tokens = SqlLexer::new().with_backticks(true).tokenize("`id`").unwrap();
        assert_eq!(tokens, vec![(TokenKind::QuotedName, "`id`".to_string())]);
    }

    #[test]
    fn test_operators_and_placeholders() {
        assert_eq!(
            kinds("a<>$1"),
            vec![TokenKind::Name, TokenKind::Operator, TokenKind::Name]
        );
        assert_eq!(kinds("*"), vec![TokenKind::Wildcard]);
    }

    #[test]
    fn test_unexpected_character() {
        let err = SqlLexer::new().tokenize("SELECT #").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at position 7: Unexpected character '#'"
        );
    }

    #[test]
    fn test_keyword_case_insensitive() {
        assert!(is_keyword("select"));
        assert!(is_keyword("Current_Timestamp"));
        assert!(!is_keyword("ifnull"));
    }
}
