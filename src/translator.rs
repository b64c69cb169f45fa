//! Translation registry and public entry points.
//!
//! Every read and write of the graph goes through one `RwLock`, so
//! registration and translation may interleave across threads. Trees are
//! never shared: each call parses its own statements.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::config::TransConfig;
use crate::dialects;
use crate::engine::FirePolicy;
use crate::error::{TransError, TransResult};
use crate::graph::{Route, TranslationGraph};
use crate::parser::{GenericParser, SqlParser};
use crate::rule::RuleSet;
use crate::transform::{Translation, TranslationStep};
use crate::tree::Tree;

static GLOBAL: Lazy<(Translator, Option<String>)> = Lazy::new(|| {
    let translator = Translator::new();
    let failure = dialects::register_builtin(&translator).err().map(|e| {
        error!(error = %e, "failed to register built-in dialects");
        e.to_string()
    });
    (translator, failure)
});

/// Graph and composite cache, guarded together so a cached entry is never
/// older than the graph it was built from.
#[derive(Default)]
struct Registry {
    graph: TranslationGraph,
    cache: HashMap<(String, String), Arc<Translation>>,
}

/// Registered translations plus the parsers for each dialect.
pub struct Translator {
    registry: RwLock<Registry>,
    parsers: RwLock<HashMap<String, Arc<dyn SqlParser>>>,
    cache_routes: bool,
    policy: FirePolicy,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    /// An isolated, empty translator.
    pub fn new() -> Self {
        Self::with_config(&TransConfig::default())
    }

    pub fn with_config(config: &TransConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            parsers: RwLock::new(HashMap::new()),
            cache_routes: config.cache_routes,
            policy: config.fire_policy,
        }
    }

    /// Process-wide translator with the built-in dialects registered.
    ///
    /// If registering the built-ins failed the translator holds whatever
    /// was registered before the failure; [`Translator::try_global`]
    /// reports it.
    pub fn global() -> &'static Translator {
        &GLOBAL.0
    }

    /// Like [`Translator::global`], but fails if the built-ins did not
    /// register.
    pub fn try_global() -> TransResult<&'static Translator> {
        match &GLOBAL.1 {
            None => Ok(&GLOBAL.0),
            Some(message) => Err(TransError::Builtin(message.clone())),
        }
    }

    pub fn register_parser(&self, dialect: &str, parser: Arc<dyn SqlParser>) {
        self.parsers.write().insert(dialect.to_string(), parser);
    }

    /// Parser registered for `dialect`, or the generic one.
    pub fn parser(&self, dialect: &str) -> Arc<dyn SqlParser> {
        if let Some(parser) = self.parsers.read().get(dialect) {
            return parser.clone();
        }
        Arc::new(GenericParser::for_dialect(dialect))
    }

    pub fn register_translation(
        &self,
        src: &str,
        tgt: &str,
        translation: impl Into<Arc<Translation>>,
        overwrite: bool,
    ) -> TransResult<()> {
        let mut registry = self.registry.write();
        registry.graph.register(src, tgt, translation, overwrite)?;
        registry.cache.clear();
        Ok(())
    }

    /// Assemble a step from raw rule lists, optionally registering it.
    pub fn build_translation(
        &self,
        src: &str,
        tgt: &str,
        global_rules: RuleSet,
        local_rules: RuleSet,
        register: bool,
    ) -> TransResult<Arc<Translation>> {
        let step = TranslationStep::new(src, tgt, global_rules, local_rules)
            .with_lexer(self.parser(tgt).lexer())
            .with_policy(self.policy);
        let translation = Arc::new(Translation::from(step));
        if register {
            self.register_translation(src, tgt, translation.clone(), false)?;
        }
        Ok(translation)
    }

    pub fn find_route(&self, src: &str, tgt: &str) -> Option<Route> {
        self.registry.read().graph.find_route(src, tgt)
    }

    /// Registered or routed translation for a dialect pair.
    pub fn find_translation(&self, src: &str, tgt: &str) -> TransResult<Arc<Translation>> {
        if !self.cache_routes {
            let translation = self.registry.read().graph.build_translation(src, tgt)?;
            debug!(src, tgt, hops = translation.hops().len(), "resolved translation");
            return Ok(translation);
        }
        let key = (src.to_string(), tgt.to_string());
        if let Some(cached) = self.registry.read().cache.get(&key) {
            return Ok(cached.clone());
        }
        // Build and insert under one guard; a registration cannot clear the
        // cache between the two.
        let mut registry = self.registry.write();
        if let Some(cached) = registry.cache.get(&key) {
            return Ok(cached.clone());
        }
        let translation = registry.graph.build_translation(src, tgt)?;
        debug!(src, tgt, hops = translation.hops().len(), "resolved translation");
        registry.cache.insert(key, translation.clone());
        Ok(translation)
    }

    /// Number of cached route resolutions.
    pub fn cached_routes(&self) -> usize {
        self.registry.read().cache.len()
    }

    /// Registered edges in key order.
    pub fn routes(&self) -> Vec<(String, String)> {
        self.registry
            .read()
            .graph
            .edges()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    pub fn dialects(&self) -> Vec<String> {
        self.registry
            .read()
            .graph
            .dialects()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Parse, translate each statement, and return the rewritten trees.
    pub fn translate_parsed(
        &self,
        sql: &str,
        src: &str,
        tgt: &str,
        translation: Option<&Translation>,
    ) -> TransResult<Vec<Tree>> {
        let resolved;
        let translation = match translation {
            Some(t) => t,
            None => {
                resolved = self.find_translation(src, tgt)?;
                resolved.as_ref()
            }
        };
        let trees = self.parser(src).parse(sql)?;
        debug!(src, tgt, statements = trees.len(), "translating");
        trees
            .into_iter()
            .map(|tree| translation.translate(tree))
            .collect()
    }

    /// Translate SQL text, one rendered string per statement.
    pub fn translate(
        &self,
        sql: &str,
        src: &str,
        tgt: &str,
        translation: Option<&Translation>,
    ) -> TransResult<Vec<String>> {
        let parser = self.parser(tgt);
        Ok(self
            .translate_parsed(sql, src, tgt, translation)?
            .iter()
            .map(|tree| parser.render(tree))
            .collect())
    }

    /// Translate SQL text holding exactly one statement.
    pub fn translate_one(
        &self,
        sql: &str,
        src: &str,
        tgt: &str,
        translation: Option<&Translation>,
    ) -> TransResult<String> {
        let mut statements = self.translate(sql, src, tgt, translation)?;
        match statements.len() {
            1 => Ok(statements.remove(0)),
            found => Err(TransError::StatementCount { expected: 1, found }),
        }
    }

    /// Translate SQL text and join the statements back into one string.
    pub fn translate_text(&self, sql: &str, src: &str, tgt: &str) -> TransResult<String> {
        Ok(self.translate(sql, src, tgt, None)?.concat())
    }
}

/// Translate with the global translator, optionally with an explicit
/// translation instead of the registered route.
pub fn translate(
    sql: &str,
    src: &str,
    tgt: &str,
    translation: Option<&Translation>,
) -> TransResult<Vec<String>> {
    Translator::try_global()?.translate(sql, src, tgt, translation)
}

/// Register a translation with the global translator.
pub fn register_translation(
    src: &str,
    tgt: &str,
    translation: impl Into<Arc<Translation>>,
    overwrite: bool,
) -> TransResult<()> {
    Translator::try_global()?.register_translation(src, tgt, translation, overwrite)
}

/// Build (and optionally register) a translation on the global translator.
pub fn build_translation(
    src: &str,
    tgt: &str,
    global_rules: RuleSet,
    local_rules: RuleSet,
    register: bool,
) -> TransResult<Arc<Translation>> {
    Translator::try_global()?.build_translation(src, tgt, global_rules, local_rules, register)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;
    use crate::search::is_kind;
    use crate::tree::{NodeId, TokenKind};

    fn rename(from: &'static str, to: &'static str) -> RuleSet {
        vec![Rule::new(
            format!("{}-{}", from, to),
            move |tree: &Tree, id: NodeId| Ok(tree.value(id) == Some(from)),
            move |_: &Tree, _: NodeId| Ok(vec![to.into()]),
        )]
        .into()
    }

    #[test]
    fn test_translate_direct() {
        let t = Translator::new();
        t.build_translation("a", "b", RuleSet::new(), rename("x", "y"), true)
            .unwrap();
        assert_eq!(
            t.translate("SELECT x; SELECT x", "a", "b", None).unwrap(),
            vec!["SELECT y; ", "SELECT y"]
        );
    }

    #[test]
    fn test_translate_not_found() {
        let t = Translator::new();
        t.build_translation("a", "b", RuleSet::new(), RuleSet::new(), true)
            .unwrap();
        let err = t.translate("SELECT 1", "a", "c", None).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't find a to c translation");
    }

    #[test]
    fn test_explicit_translation_skips_lookup() {
        let t = Translator::new();
        let explicit = t
            .build_translation("a", "b", RuleSet::new(), rename("x", "z"), false)
            .unwrap();
        assert!(t.find_route("a", "b").is_none());
        let out = t.translate("SELECT x", "a", "b", Some(explicit.as_ref())).unwrap();
        assert_eq!(out, vec!["SELECT z"]);
    }

    #[test]
    fn test_translate_one() {
        let t = Translator::new();
        t.build_translation("a", "b", RuleSet::new(), rename("x", "y"), true)
            .unwrap();
        assert_eq!(t.translate_one("SELECT x", "a", "b", None).unwrap(), "SELECT y");
        let err = t
            .translate_one("SELECT x; SELECT x", "a", "b", None)
            .unwrap_err();
        assert!(matches!(
            err,
            TransError::StatementCount {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_cache_invalidated_on_registration() {
        let config = TransConfig {
            cache_routes: true,
            ..Default::default()
        };
        let t = Translator::with_config(&config);
        t.build_translation("a", "b", RuleSet::new(), rename("x", "y"), true)
            .unwrap();
        assert_eq!(t.translate_text("SELECT x", "a", "b").unwrap(), "SELECT y");
        let replacement = t
            .build_translation("a", "b", RuleSet::new(), rename("x", "w"), false)
            .unwrap();
        t.register_translation("a", "b", replacement, true).unwrap();
        assert_eq!(t.translate_text("SELECT x", "a", "b").unwrap(), "SELECT w");
    }

    #[test]
    fn test_cache_rebuilt_after_overwrite() {
        let config = TransConfig {
            cache_routes: true,
            ..Default::default()
        };
        let t = Translator::with_config(&config);
        t.build_translation("a", "b", RuleSet::new(), rename("x", "y"), true)
            .unwrap();
        t.build_translation("b", "c", RuleSet::new(), RuleSet::new(), true)
            .unwrap();
        // Resolve and cache the composite, then replace one of its hops.
        let stale = t.find_translation("a", "c").unwrap();
        assert_eq!(t.cached_routes(), 1);
        let replacement = t
            .build_translation("a", "b", RuleSet::new(), rename("x", "w"), false)
            .unwrap();
        t.register_translation("a", "b", replacement, true).unwrap();
        assert_eq!(t.cached_routes(), 0);

        let fresh = t.find_translation("a", "c").unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert_eq!(t.translate_text("SELECT x", "a", "c").unwrap(), "SELECT w");
    }

    #[test]
    fn test_overwrite_during_cached_lookups() {
        let config = TransConfig {
            cache_routes: true,
            ..Default::default()
        };
        let t = Arc::new(Translator::with_config(&config));
        t.build_translation("a", "b", RuleSet::new(), rename("x", "y"), true)
            .unwrap();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let t = t.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        t.translate_text("SELECT x", "a", "b").unwrap();
                    }
                })
            })
            .collect();
        for to in ["p", "q", "r", "w"] {
            let replacement = t
                .build_translation("a", "b", RuleSet::new(), rename("x", to), false)
                .unwrap();
            t.register_translation("a", "b", replacement, true).unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
        // Whatever interleaving happened, the last registration wins.
        assert_eq!(t.translate_text("SELECT x", "a", "b").unwrap(), "SELECT w");
    }

    #[test]
    fn test_global_has_builtins() {
        let global = Translator::try_global().unwrap();
        assert!(global.find_route(dialects::MYSQL, dialects::POSTGRES).is_some());
    }

    #[test]
    fn test_policy_from_config() {
        let config = TransConfig {
            fire_policy: FirePolicy::All,
            ..Default::default()
        };
        let t = Translator::with_config(&config);
        let rules: RuleSet = vec![
            Rule::substitute("one", is_kind(TokenKind::Number), "2"),
            Rule::substitute("two", is_kind(TokenKind::Number), "3"),
        ]
        .into();
        t.build_translation("a", "b", RuleSet::new(), rules, true)
            .unwrap();
        assert_eq!(t.translate_text("SELECT 1", "a", "b").unwrap(), "SELECT 3");
    }

    #[test]
    fn test_concurrent_reads() {
        let t = Arc::new(Translator::new());
        t.build_translation("a", "b", RuleSet::new(), rename("x", "y"), true)
            .unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let t = t.clone();
                std::thread::spawn(move || t.translate_text("SELECT x", "a", "b").unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "SELECT y");
        }
    }
}
