//! Rule application engine.
//!
//! A [`Pass`] applies one [`RuleSet`] to a tree using one of two traversal
//! strategies:
//!
//! - **Statement**: every rule is tried once, in order, against the root and
//!   then its direct children. A rule fires at most once, on the first
//!   element it matches, and later rules see the rewritten statement.
//! - **Recursive**: a pre-order walk of the whole tree. Each node gets the
//!   rule set per [`FirePolicy`]. Every node is evaluated at most once per
//!   pass: nodes produced by a rewrite are not matched again, but their
//!   descendants are walked before the next original sibling.
//!
//! A rule whose action returns exactly its own node is a guard and leaves
//! the tree untouched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{TransError, TransResult};
use crate::lexer::Lexer;
use crate::rule::{Rule, RuleSet};
use crate::search;
use crate::tree::{Fragment, NodeId, Tree};

/// How many rules may fire on one node during a recursive pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirePolicy {
    /// Stop at the first matching rule.
    #[default]
    First,
    /// Keep trying later rules against a single-element replacement.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Statement,
    Recursive,
}

/// One application of a rule set over a tree.
#[derive(Debug, Clone)]
pub struct Pass {
    kind: PassKind,
    rules: RuleSet,
    policy: FirePolicy,
}

enum Outcome {
    Skipped,
    Kept,
    Replaced(Vec<NodeId>),
}

impl Pass {
    pub fn statement(rules: RuleSet) -> Self {
        Self {
            kind: PassKind::Statement,
            rules,
            policy: FirePolicy::First,
        }
    }

    pub fn recursive(rules: RuleSet) -> Self {
        Self {
            kind: PassKind::Recursive,
            rules,
            policy: FirePolicy::First,
        }
    }

    pub fn with_policy(mut self, policy: FirePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Run the pass. On error the tree may be partially rewritten and must
    /// not be reused.
    pub fn run(&self, tree: &mut Tree, lexer: Option<&dyn Lexer>) -> TransResult<()> {
        if self.rules.is_empty() {
            return Ok(());
        }
        match self.kind {
            PassKind::Statement => self.run_statement(tree, lexer),
            PassKind::Recursive => {
                let root = tree.root();
                let mut seen = HashSet::from([root]);
                self.visit_root(tree, lexer)?;
                self.walk(tree, root, lexer, &mut seen)
            }
        }
    }

    fn run_statement(&self, tree: &mut Tree, lexer: Option<&dyn Lexer>) -> TransResult<()> {
        let root = tree.root();
        for rule in self.rules.iter() {
            if !matches!(fire(rule, tree, root, lexer)?, Outcome::Skipped) {
                continue;
            }
            let mut index = 0;
            while let Some(node) = tree.get(root, index) {
                if !matches!(fire(rule, tree, node, lexer)?, Outcome::Skipped) {
                    break;
                }
                index += 1;
            }
        }
        Ok(())
    }

    fn visit_root(&self, tree: &mut Tree, lexer: Option<&dyn Lexer>) -> TransResult<()> {
        let root = tree.root();
        for rule in self.rules.iter() {
            match fire(rule, tree, root, lexer)? {
                Outcome::Skipped => continue,
                _ if self.policy == FirePolicy::First => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn walk(
        &self,
        tree: &mut Tree,
        container: NodeId,
        lexer: Option<&dyn Lexer>,
        seen: &mut HashSet<NodeId>,
    ) -> TransResult<()> {
        let mut index = 0;
        while let Some(node) = tree.get(container, index) {
            let produced = if seen.insert(node) {
                trace!(node = %node, index, "visit");
                self.visit(tree, node, lexer)?
            } else {
                None
            };
            match produced {
                Some(produced) => {
                    seen.extend(produced.iter().copied());
                    for id in &produced {
                        if tree.is_group(*id) {
                            self.walk(tree, *id, lexer, seen)?;
                        }
                    }
                    index += produced.len();
                }
                None => {
                    if tree.is_group(node) {
                        self.walk(tree, node, lexer, seen)?;
                    }
                    index += 1;
                }
            }
        }
        Ok(())
    }

    /// Apply the rule set to one node. Returns the replacement ids if the
    /// node was rewritten.
    fn visit(
        &self,
        tree: &mut Tree,
        node: NodeId,
        lexer: Option<&dyn Lexer>,
    ) -> TransResult<Option<Vec<NodeId>>> {
        let mut current = node;
        let mut produced = None;
        for rule in self.rules.iter() {
            match fire(rule, tree, current, lexer)? {
                Outcome::Skipped => continue,
                Outcome::Kept => {
                    if self.policy == FirePolicy::First {
                        break;
                    }
                }
                Outcome::Replaced(ids) => {
                    let next = match ids.as_slice() {
                        [single] => Some(*single),
                        _ => None,
                    };
                    produced = Some(ids);
                    match next {
                        Some(single) if self.policy == FirePolicy::All => current = single,
                        _ => break,
                    }
                }
            }
        }
        Ok(produced)
    }
}

/// Evaluate one rule at one node and apply it if it matches.
fn fire(
    rule: &Rule,
    tree: &mut Tree,
    node: NodeId,
    lexer: Option<&dyn Lexer>,
) -> TransResult<Outcome> {
    let matched = rule
        .matches(tree, node)
        .map_err(|e| rule_error(rule, tree, node, e))?;
    if !matched {
        return Ok(Outcome::Skipped);
    }
    let fragments = rule
        .apply(tree, node)
        .map_err(|e| rule_error(rule, tree, node, e))?;
    if fragments.len() == 1 && fragments[0] == Fragment::Node(node) {
        debug!(rule = rule.name(), node = %node, "rule matched without change");
        return Ok(Outcome::Kept);
    }

    debug!(rule = rule.name(), location = %describe(tree, node), "rule fired");
    let root = tree.root();
    if node == root {
        let len = tree.children(root).len();
        tree.splice(root, 0..len, fragments, lexer)?;
        return Ok(Outcome::Kept);
    }
    let ids = search::replace(tree, node, fragments, lexer)?;
    Ok(Outcome::Replaced(ids))
}

fn rule_error(rule: &Rule, tree: &Tree, node: NodeId, source: anyhow::Error) -> TransError {
    TransError::RuleApplication {
        rule: rule.name().to_string(),
        location: describe(tree, node),
        source,
    }
}

/// Path of a node from the root, e.g. `Statement[4]/Function[1]`.
pub fn describe(tree: &Tree, node: NodeId) -> String {
    if node == tree.root() {
        return "Statement".to_string();
    }
    let mut parts = Vec::new();
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        let Ok(index) = search::index_of(tree, current) else {
            break;
        };
        let kind = tree
            .group_kind(parent)
            .map(|k| k.to_string())
            .unwrap_or_default();
        parts.push(format!("{}[{}]", kind, index));
        current = parent;
    }
    if current != tree.root() {
        return format!("detached node {}", node);
    }
    parts.reverse();
    parts.join("/")
}
