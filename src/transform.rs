//! Translation steps and composite translations.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::engine::{FirePolicy, Pass, PassKind};
use crate::error::TransResult;
use crate::lexer::Lexer;
use crate::rule::RuleSet;
use crate::tree::Tree;

/// Ordered passes bound to a source and target dialect.
///
/// The usual shape is one statement pass followed by one recursive pass, so
/// structural rewrites settle before token rewrites begin.
#[derive(Clone)]
pub struct TranslationStep {
    src: String,
    tgt: String,
    passes: Vec<Pass>,
    lexer: Option<Arc<dyn Lexer>>,
}

impl TranslationStep {
    /// Statement-level rules first, then recursive rules.
    pub fn new(
        src: impl Into<String>,
        tgt: impl Into<String>,
        statement_rules: RuleSet,
        recursive_rules: RuleSet,
    ) -> Self {
        Self::from_passes(
            src,
            tgt,
            vec![
                Pass::statement(statement_rules),
                Pass::recursive(recursive_rules),
            ],
        )
    }

    pub fn from_passes(src: impl Into<String>, tgt: impl Into<String>, passes: Vec<Pass>) -> Self {
        Self {
            src: src.into(),
            tgt: tgt.into(),
            passes,
            lexer: None,
        }
    }

    /// Lexer used to decompose raw text produced by this step's rules.
    pub fn with_lexer(mut self, lexer: Arc<dyn Lexer>) -> Self {
        self.lexer = Some(lexer);
        self
    }

    /// Set the fire policy of every recursive pass.
    pub fn with_policy(mut self, policy: FirePolicy) -> Self {
        self.passes = self
            .passes
            .into_iter()
            .map(|pass| match pass.kind() {
                PassKind::Recursive => pass.with_policy(policy),
                PassKind::Statement => pass,
            })
            .collect();
        self
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn tgt(&self) -> &str {
        &self.tgt
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    /// Run every pass in order over `tree`.
    pub fn apply(&self, tree: &mut Tree) -> TransResult<()> {
        debug!(src = %self.src, tgt = %self.tgt, "applying translation step");
        for pass in &self.passes {
            pass.run(tree, self.lexer.as_deref())?;
        }
        Ok(())
    }
}

impl fmt::Debug for TranslationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationStep")
            .field("src", &self.src)
            .field("tgt", &self.tgt)
            .field("passes", &self.passes)
            .field("lexer", &self.lexer.is_some())
            .finish()
    }
}

/// A registered step, or a chain of translations built for a route.
#[derive(Debug, Clone)]
pub enum Translation {
    Step(Arc<TranslationStep>),
    Composite {
        src: String,
        tgt: String,
        parts: Vec<Arc<Translation>>,
    },
}

impl From<TranslationStep> for Translation {
    fn from(step: TranslationStep) -> Self {
        Translation::Step(Arc::new(step))
    }
}

impl Translation {
    pub fn composite(
        src: impl Into<String>,
        tgt: impl Into<String>,
        parts: Vec<Arc<Translation>>,
    ) -> Self {
        Translation::Composite {
            src: src.into(),
            tgt: tgt.into(),
            parts,
        }
    }

    /// Zero-hop translation that leaves trees unchanged.
    pub fn identity(dialect: &str) -> Self {
        Self::composite(dialect, dialect, Vec::new())
    }

    pub fn src(&self) -> &str {
        match self {
            Translation::Step(step) => step.src(),
            Translation::Composite { src, .. } => src,
        }
    }

    pub fn tgt(&self) -> &str {
        match self {
            Translation::Step(step) => step.tgt(),
            Translation::Composite { tgt, .. } => tgt,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.hops().is_empty()
    }

    /// The registered edges this translation runs, in order.
    pub fn hops(&self) -> Vec<(String, String)> {
        match self {
            Translation::Step(step) => vec![(step.src.clone(), step.tgt.clone())],
            Translation::Composite { parts, .. } => parts.iter().flat_map(|p| p.hops()).collect(),
        }
    }

    /// Rewrite `tree` in place. Composites stop at the first failing part.
    pub fn apply(&self, tree: &mut Tree) -> TransResult<()> {
        match self {
            Translation::Step(step) => step.apply(tree),
            Translation::Composite { parts, .. } => {
                for part in parts {
                    part.apply(tree)?;
                }
                Ok(())
            }
        }
    }

    /// By-value form of [`Translation::apply`].
    pub fn translate(&self, mut tree: Tree) -> TransResult<Tree> {
        self.apply(&mut tree)?;
        Ok(tree)
    }
}
