//! Translation graph and routing.
//!
//! Dialects are vertices and registered translations are directed edges.
//! When no direct edge exists, the shortest chain of edges is composed into
//! a [`Translation::Composite`] on demand.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{TransError, TransResult};
use crate::transform::Translation;

/// Ordered `(hop source, hop target)` pairs.
pub type Route = Vec<(String, String)>;

/// Registered translations keyed by source, then target dialect.
#[derive(Debug, Clone, Default)]
pub struct TranslationGraph {
    edges: BTreeMap<String, BTreeMap<String, Arc<Translation>>>,
}

impl TranslationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `translation` for `src -> tgt`.
    pub fn register(
        &mut self,
        src: &str,
        tgt: &str,
        translation: impl Into<Arc<Translation>>,
        overwrite: bool,
    ) -> TransResult<()> {
        let translation = translation.into();
        if translation.src() != src || translation.tgt() != tgt {
            warn!(
                src,
                tgt,
                declared_src = translation.src(),
                declared_tgt = translation.tgt(),
                "registering translation under a different dialect pair"
            );
        }
        let targets = self.edges.entry(src.to_string()).or_default();
        if targets.contains_key(tgt) && !overwrite {
            return Err(TransError::duplicate(src, tgt));
        }
        debug!(src, tgt, overwrite, "registered translation");
        targets.insert(tgt.to_string(), translation);
        Ok(())
    }

    pub fn get(&self, src: &str, tgt: &str) -> Option<Arc<Translation>> {
        self.edges.get(src).and_then(|t| t.get(tgt)).cloned()
    }

    pub fn contains(&self, src: &str, tgt: &str) -> bool {
        self.edges.get(src).is_some_and(|t| t.contains_key(tgt))
    }

    /// Every registered edge in key order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .flat_map(|(src, targets)| targets.keys().map(move |tgt| (src.as_str(), tgt.as_str())))
    }

    /// Every dialect appearing on either end of an edge.
    pub fn dialects(&self) -> BTreeSet<&str> {
        self.edges().flat_map(|(src, tgt)| [src, tgt]).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.values().all(BTreeMap::is_empty)
    }

    /// Shortest route from `src` to `tgt`; see [`find_route`].
    pub fn find_route(&self, src: &str, tgt: &str) -> Option<Route> {
        find_route(self, src, tgt)
    }

    /// Resolve a route into a runnable translation.
    ///
    /// A one-hop route returns the registered translation itself; longer
    /// routes are wrapped in a composite; `src == tgt` yields the identity.
    pub fn build_translation(&self, src: &str, tgt: &str) -> TransResult<Arc<Translation>> {
        let route = self
            .find_route(src, tgt)
            .ok_or_else(|| TransError::not_found(src, tgt))?;
        match route.as_slice() {
            [] => Ok(Arc::new(Translation::identity(src))),
            [(hop_src, hop_tgt)] => self
                .get(hop_src, hop_tgt)
                .ok_or_else(|| TransError::not_found(hop_src, hop_tgt)),
            hops => {
                let parts = hops
                    .iter()
                    .map(|(s, t)| self.get(s, t).ok_or_else(|| TransError::not_found(s, t)))
                    .collect::<TransResult<Vec<_>>>()?;
                debug!(src, tgt, hops = parts.len(), "built composite translation");
                Ok(Arc::new(Translation::composite(src, tgt, parts)))
            }
        }
    }
}

/// Breadth-first search for the fewest-hop route.
///
/// Each dialect is expanded at most once, so cycles terminate. Among routes
/// of equal length the one reached first in key order wins. `src == tgt`
/// returns an empty route.
pub fn find_route(graph: &TranslationGraph, src: &str, tgt: &str) -> Option<Route> {
    if src == tgt {
        return Some(Vec::new());
    }
    let mut previous: HashMap<&str, &str> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::from([src]);
    let mut queue: VecDeque<&str> = VecDeque::from([src]);

    while let Some(current) = queue.pop_front() {
        let Some(targets) = graph.edges.get(current) else {
            continue;
        };
        for next in targets.keys() {
            let next = next.as_str();
            if !visited.insert(next) {
                continue;
            }
            previous.insert(next, current);
            if next == tgt {
                return Some(unwind(&previous, src, tgt));
            }
            queue.push_back(next);
        }
    }
    None
}

fn unwind(previous: &HashMap<&str, &str>, src: &str, tgt: &str) -> Route {
    let mut route = Vec::new();
    let mut current = tgt;
    while current != src {
        let Some(&prev) = previous.get(current) else {
            break;
        };
        route.push((prev.to_string(), current.to_string()));
        current = prev;
    }
    route.reverse();
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleSet;
    use crate::transform::TranslationStep;

    fn step(src: &str, tgt: &str) -> Translation {
        TranslationStep::new(src, tgt, RuleSet::new(), RuleSet::new()).into()
    }

    fn graph(edges: &[(&str, &str)]) -> TranslationGraph {
        let mut graph = TranslationGraph::new();
        for (src, tgt) in edges {
            graph.register(src, tgt, step(src, tgt), false).unwrap();
        }
        graph
    }

    fn pairs(route: &Route) -> Vec<(&str, &str)> {
        route.iter().map(|(s, t)| (s.as_str(), t.as_str())).collect()
    }

    #[test]
    fn test_route_minimality() {
        let g = graph(&[("a", "b"), ("b", "c"), ("a", "d"), ("d", "c")]);
        let route = g.find_route("a", "c").unwrap();
        assert_eq!(route.len(), 2);
        assert_eq!(pairs(&route), vec![("a", "b"), ("b", "c")]);
    }

    #[test]
    fn test_prefers_shorter_over_first_found() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "e"), ("a", "z"), ("z", "e")]);
        assert_eq!(pairs(&g.find_route("a", "e").unwrap()), vec![("a", "z"), ("z", "e")]);
    }

    #[test]
    fn test_route_absence() {
        let g = graph(&[("a", "b")]);
        assert!(g.find_route("a", "c").is_none());
        let err = g.build_translation("a", "c").unwrap_err();
        assert!(matches!(err, TransError::TranslationNotFound { .. }));
    }

    #[test]
    fn test_cycle_terminates() {
        let g = graph(&[("a", "b"), ("b", "a")]);
        assert!(g.find_route("a", "c").is_none());
    }

    #[test]
    fn test_same_dialect_is_empty_route() {
        let g = TranslationGraph::new();
        assert_eq!(g.find_route("a", "a"), Some(Vec::new()));
        assert!(g.build_translation("a", "a").unwrap().is_identity());
    }

    #[test]
    fn test_single_hop_is_not_wrapped() {
        let g = graph(&[("a", "b")]);
        let built = g.build_translation("a", "b").unwrap();
        assert!(Arc::ptr_eq(&built, &g.get("a", "b").unwrap()));
    }

    #[test]
    fn test_multi_hop_is_composite() {
        let g = graph(&[("a", "b"), ("b", "c")]);
        let built = g.build_translation("a", "c").unwrap();
        assert!(matches!(*built, Translation::Composite { .. }));
        assert_eq!(built.src(), "a");
        assert_eq!(built.tgt(), "c");
        assert_eq!(built.hops().len(), 2);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut g = graph(&[("a", "b")]);
        let err = g.register("a", "b", step("a", "b"), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Translation from a to b already exists. Use overwrite if you want to replace it"
        );
        g.register("a", "b", step("a", "b"), true).unwrap();
    }

    #[test]
    fn test_dialects_and_edges() {
        let g = graph(&[("mysql", "ansi"), ("ansi", "postgres")]);
        assert_eq!(
            g.dialects().into_iter().collect::<Vec<_>>(),
            vec!["ansi", "mysql", "postgres"]
        );
        assert_eq!(
            g.edges().collect::<Vec<_>>(),
            vec![("ansi", "postgres"), ("mysql", "ansi")]
        );
    }
}
