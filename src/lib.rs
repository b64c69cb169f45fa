//! # sqltrans
//!
//! Rule-based translation of SQL between dialects.
//!
//! Statements are parsed into a lossless token tree, rewritten by ordered
//! rule passes, and rendered back to text. Translations are registered per
//! `(source, target)` dialect pair; pairs without a direct translation are
//! served by chaining registered ones along the shortest route.
//!
//! ## Quick Example
//!
//! ```rust
//! let sql = sqltrans::translate(
//!     "SELECT `id` FROM `users` LIMIT 10, 5",
//!     "mysql",
//!     "postgres",
//!     None,
//! )?;
//! assert_eq!(sql, vec!["SELECT \"id\" FROM \"users\" LIMIT 5 OFFSET 10"]);
//! # Ok::<(), sqltrans::error::TransError>(())
//! ```
//!
//! ## Layers
//!
//! | Module        | Role                                       |
//! |---------------|--------------------------------------------|
//! | `tree`        | Arena tree of tokens and groups            |
//! | `lexer`       | SQL text to typed tokens                   |
//! | `parser`      | Tokens to one tree per statement           |
//! | `search`      | Pre-order search, replace and remove       |
//! | `rule`        | Predicate + action rewrite rules           |
//! | `engine`      | Statement and recursive rule passes        |
//! | `transform`   | Translation steps and composites           |
//! | `graph`       | Dialect graph and shortest routes          |
//! | `translator`  | Registry and public entry points           |
//! | `dialects`    | Built-in mysql / ansi / postgres / sqlite  |

pub mod config;
pub mod dialects;
pub mod engine;
pub mod error;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod rule;
pub mod search;
pub mod transform;
pub mod translator;
pub mod tree;

pub mod prelude {
    pub use crate::config::TransConfig;
    pub use crate::engine::{FirePolicy, Pass, PassKind};
    pub use crate::error::*;
    pub use crate::graph::{Route, TranslationGraph};
    pub use crate::lexer::{Lexer, SqlLexer};
    pub use crate::parser::{GenericParser, SqlParser};
    pub use crate::rule::{Rule, RuleSet};
    pub use crate::search::{find, find_first, find_path, remove, replace, Location, Matcher};
    pub use crate::transform::{Translation, TranslationStep};
    pub use crate::translator::Translator;
    pub use crate::tree::{Fragment, GroupKind, NodeId, TokenKind, Tree};
}

pub use translator::{build_translation, register_translation, translate};
