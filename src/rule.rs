//! Rewrite rules.
//!
//! A [`Rule`] pairs a predicate with an action. Both see the tree read-only;
//! the action returns the fragments that take the matched node's place.

use std::fmt;
use std::sync::Arc;

use crate::search::Matcher;
use crate::tree::{Fragment, NodeId, Tree};

pub type Predicate = Arc<dyn Fn(&Tree, NodeId) -> anyhow::Result<bool> + Send + Sync>;
pub type Action = Arc<dyn Fn(&Tree, NodeId) -> anyhow::Result<Vec<Fragment>> + Send + Sync>;

/// An immutable predicate + action pair.
#[derive(Clone)]
pub struct Rule {
    name: String,
    predicate: Predicate,
    action: Action,
}

impl Rule {
    /// Create a rule from a fallible predicate and action.
    pub fn new<P, A>(name: impl Into<String>, predicate: P, action: A) -> Self
    where
        P: Fn(&Tree, NodeId) -> anyhow::Result<bool> + Send + Sync + 'static,
        A: Fn(&Tree, NodeId) -> anyhow::Result<Vec<Fragment>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            action: Arc::new(action),
        }
    }

    /// Create a rule guarded by an infallible matcher.
    pub fn when<A>(name: impl Into<String>, matcher: Matcher, action: A) -> Self
    where
        A: Fn(&Tree, NodeId) -> anyhow::Result<Vec<Fragment>> + Send + Sync + 'static,
    {
        Self::new(name, move |tree: &Tree, id: NodeId| Ok(matcher(tree, id)), action)
    }

    /// Replace every matched node with `text`, re-lexed by the running pass.
    pub fn substitute(name: impl Into<String>, matcher: Matcher, text: &str) -> Self {
        let text = text.to_string();
        Self::when(name, matcher, move |_: &Tree, _: NodeId| {
            Ok(vec![Fragment::Raw(text.clone())])
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, tree: &Tree, node: NodeId) -> anyhow::Result<bool> {
        (self.predicate)(tree, node)
    }

    pub fn apply(&self, tree: &Tree, node: NodeId) -> anyhow::Result<Vec<Fragment>> {
        (self.action)(tree, node)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Ordered rules; earlier rules are tried first.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Builder form of [`RuleSet::push`].
    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::is_keyword;
    use crate::tree::TokenKind;

    #[test]
    fn test_rule_order_preserved() {
        let set: RuleSet = vec![
            Rule::substitute("a", is_keyword("select"), "SELECT"),
            Rule::substitute("b", is_keyword("from"), "FROM"),
        ]
        .into();
        let names: Vec<&str> = set.iter().map(Rule::name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_substitute_action() {
        let tree =
            Tree::from_fragments(vec![Fragment::token(TokenKind::Keyword, "true")], None).unwrap();
        let node = tree.children(tree.root())[0];
        let rule = Rule::substitute("bool", is_keyword("TRUE"), "1");
        assert!(rule.matches(&tree, node).unwrap());
        assert_eq!(rule.apply(&tree, node).unwrap(), vec![Fragment::raw("1")]);
    }

    #[test]
    fn test_failing_predicate_surfaces() {
        let rule = Rule::new(
            "broken",
            |_: &Tree, _: NodeId| anyhow::bail!("no context"),
            |_: &Tree, _: NodeId| Ok(vec![]),
        );
        let tree = Tree::new();
        assert!(rule.matches(&tree, tree.root()).is_err());
    }

    #[test]
    fn test_debug_shows_name() {
        let rule = Rule::substitute("bool", is_keyword("TRUE"), "1");
        assert_eq!(format!("{:?}", rule), "Rule { name: \"bool\" }");
    }
}
