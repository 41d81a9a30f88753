//! Repairs missing call targets using name, namespace and call-site
//! evidence gathered across the merged graph.

use std::collections::BTreeSet;

use cxxgraph_core::config::{ResolutionConfig, ResolutionMode};
use cxxgraph_core::errors::CallGraphError;
use tracing::{debug, info, warn};

use super::index::FunctionIndex;
use super::stats::ResolutionStats;
use crate::call_graph::{naming, CallGraph, FunctionRecord};

const BASE_NAME_SCORE: f64 = 5.0;
const ARITY_SCORE: f64 = 3.0;
const ARG_TYPE_SCORE: f64 = 2.0;
const CONTEXT_SCORE: f64 = 3.0;
const NAMESPACE_SCORE: f64 = 4.0;
const ARG_TYPE_WEIGHT: usize = 2;
const CONTEXT_WEIGHT: usize = 1;

/// How a missing name was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exact,
    QualifiedSuffix,
    BaseName,
    NamespaceHint,
    Scored,
}

/// One accepted match.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub missing: String,
    pub target: String,
    pub strategy: Strategy,
    /// Winning score for `Strategy::Scored`.
    pub score: Option<f64>,
}

/// Call-site evidence for one missing name.
#[derive(Debug, Default)]
struct Evidence {
    /// Argument counts in first-seen order with their votes.
    arg_counts: Vec<(usize, usize)>,
    /// `|`-joined argument type tokens with accumulated weight.
    arg_types: Vec<(String, usize)>,
    /// Receiver or enclosing class with accumulated weight.
    contexts: Vec<(String, usize)>,
    caller_namespaces: BTreeSet<String>,
}

fn bump<K: PartialEq>(list: &mut Vec<(K, usize)>, key: K, weight: usize) {
    match list.iter_mut().find(|(k, _)| *k == key) {
        Some((_, w)) => *w += weight,
        None => list.push((key, weight)),
    }
}

impl Evidence {
    fn gather(graph: &CallGraph, missing: &str) -> Self {
        let mut evidence = Self::default();
        for caller in graph.callers_of(missing) {
            let Some(record) = graph.get_function(&caller) else {
                continue;
            };
            if !record.namespace.is_empty() {
                evidence.caller_namespaces.insert(record.namespace.clone());
            }
            for site in record.call_sites.iter().filter(|s| s.target == missing) {
                if let Some(count) = site.arg_count {
                    bump(&mut evidence.arg_counts, count, 1);
                }
                if site.arg_types.iter().any(|t| t != "?") {
                    bump(&mut evidence.arg_types, site.arg_type_key(), ARG_TYPE_WEIGHT);
                }
                if let Some(context) = &site.context_type {
                    bump(&mut evidence.contexts, context.clone(), CONTEXT_WEIGHT);
                }
            }
        }
        evidence
    }

    /// Most voted argument count; the first seen wins a tie.
    fn majority_arg_count(&self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for &(count, votes) in &self.arg_counts {
            if best.map_or(true, |(_, v)| votes > v) {
                best = Some((count, votes));
            }
        }
        best.map(|(count, _)| count)
    }
}

/// Unknown tokens (`?`) match anything; at least one token must be known.
fn arg_types_match(clue: &str, record: &FunctionRecord) -> bool {
    let clue: Vec<&str> = clue.split('|').collect();
    if clue.len() != record.param_types.len() {
        return false;
    }
    let mut known = 0;
    for (token, param) in clue.iter().zip(&record.param_types) {
        if *token == "?" {
            continue;
        }
        if *token != naming::normalize_type_token(param) {
            return false;
        }
        known += 1;
    }
    known > 0
}

fn namespace_of(record: &FunctionRecord) -> String {
    if record.namespace.is_empty() {
        naming::qualifier(&record.name).unwrap_or("").to_string()
    } else {
        record.namespace.clone()
    }
}

fn class_of(record: &FunctionRecord) -> Option<String> {
    record
        .class_name
        .clone()
        .or_else(|| naming::qualifier(&record.name).map(naming::strip_template_args))
}

/// Repairs `missing_functions` of a merged graph. Never fails as a whole:
/// names it cannot place stay missing.
#[derive(Debug, Clone, Default)]
pub struct CrossFileResolver {
    config: ResolutionConfig,
}

impl CrossFileResolver {
    pub fn new(config: ResolutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Resolves with the configured mode.
    pub fn resolve(&self, graph: &mut CallGraph) -> ResolutionStats {
        self.resolve_with_mode(graph, self.config.effective_mode())
    }

    pub fn resolve_with_mode(&self, graph: &mut CallGraph, mode: ResolutionMode) -> ResolutionStats {
        let mut stats = ResolutionStats::new(mode);
        if mode == ResolutionMode::Basic {
            stats.remaining_missing = graph.missing_functions().len();
            return stats;
        }

        let index = FunctionIndex::build(graph);
        let missing: Vec<String> = graph.missing_functions().iter().cloned().collect();
        for name in missing {
            let outcome = self
                .match_structural(graph, &index, &name)
                .or_else(|_| match mode {
                    ResolutionMode::Full => self.match_scored(graph, &index, &name, &mut stats),
                    _ => Err(CallGraphError::ResolutionFailed {
                        name: name.clone(),
                        message: "no unique candidate".to_string(),
                    }),
                });
            match outcome {
                Ok(resolution) => {
                    Self::apply(graph, &resolution);
                    match resolution.strategy {
                        Strategy::Exact => stats.exact += 1,
                        Strategy::QualifiedSuffix => stats.qualified_suffix += 1,
                        Strategy::BaseName => stats.base_name += 1,
                        Strategy::NamespaceHint => stats.namespace_hint += 1,
                        Strategy::Scored => stats.scored += 1,
                    }
                }
                Err(error) => debug!(%error, "left unresolved"),
            }
        }

        if mode == ResolutionMode::Full {
            graph.link_specializations();
        }
        stats.remaining_missing = graph.missing_functions().len();
        info!(
            mode = %mode,
            resolved = stats.resolved(),
            remaining = stats.remaining_missing,
            "cross-file resolution complete"
        );
        stats
    }

    /// Exact, qualified-suffix, base-name and namespace-hint tiers.
    pub fn match_structural(
        &self,
        graph: &CallGraph,
        index: &FunctionIndex,
        missing: &str,
    ) -> Result<Resolution, CallGraphError> {
        let accept = |target: &str, strategy| Resolution {
            missing: missing.to_string(),
            target: target.to_string(),
            strategy,
            score: None,
        };

        if graph.contains(missing) {
            return Ok(accept(missing, Strategy::Exact));
        }
        if let [only] = index.by_qualified_suffix(missing).as_slice() {
            return Ok(accept(only.as_str(), Strategy::QualifiedSuffix));
        }
        let candidates = index.candidates(missing);
        match candidates {
            [] => Err(CallGraphError::ResolutionFailed {
                name: missing.to_string(),
                message: "no candidate with this base name".to_string(),
            }),
            [only] => Ok(accept(only.as_str(), Strategy::BaseName)),
            _ => {
                let namespaces = Evidence::gather(graph, missing).caller_namespaces;
                let hinted: Vec<&String> = candidates
                    .iter()
                    .filter(|c| {
                        graph
                            .get_function(c)
                            .is_some_and(|r| namespaces.contains(&namespace_of(r)))
                    })
                    .collect();
                // Candidates are sorted, so the first hinted one is the smallest name.
                match hinted.as_slice() {
                    [] => Err(CallGraphError::ResolutionFailed {
                        name: missing.to_string(),
                        message: format!("{} candidates, none in a caller namespace", candidates.len()),
                    }),
                    [_, _, ..] if self.config.effective_reject_ties() => Err(CallGraphError::ResolutionFailed {
                        name: missing.to_string(),
                        message: format!("{} candidates share a caller namespace", hinted.len()),
                    }),
                    [first, ..] => Ok(accept(first.as_str(), Strategy::NamespaceHint)),
                }
            }
        }
    }

    /// Scores every base-name candidate against the call-site evidence.
    fn match_scored(
        &self,
        graph: &CallGraph,
        index: &FunctionIndex,
        missing: &str,
        stats: &mut ResolutionStats,
    ) -> Result<Resolution, CallGraphError> {
        let evidence = Evidence::gather(graph, missing);
        let majority = evidence.majority_arg_count();

        let mut scored: Vec<(f64, &String)> = index
            .candidates(missing)
            .iter()
            .filter_map(|name| graph.get_function(name).map(|r| (r, name)))
            .map(|(record, name)| (Self::score(record, &evidence, majority), name))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let failed = |message: String| CallGraphError::ResolutionFailed {
            name: missing.to_string(),
            message,
        };
        let Some(&(best, target)) = scored.first() else {
            return Err(failed("no candidate with this base name".to_string()));
        };
        let threshold = self.config.effective_acceptance_threshold();
        if best <= threshold {
            stats.rejected_low_confidence += 1;
            warn!(missing, target = %target, score = best, threshold, "rejected low-confidence match");
            return Err(failed(format!("best score {best} does not exceed {threshold}")));
        }
        let tied = scored.get(1).is_some_and(|(second, _)| *second == best);
        if tied && self.config.effective_reject_ties() {
            stats.rejected_ties += 1;
            warn!(missing, score = best, "rejected tied candidates");
            return Err(failed(format!("tie at score {best}")));
        }
        Ok(Resolution {
            missing: missing.to_string(),
            target: target.clone(),
            strategy: Strategy::Scored,
            score: Some(best),
        })
    }

    fn score(record: &FunctionRecord, evidence: &Evidence, majority: Option<usize>) -> f64 {
        let mut score = BASE_NAME_SCORE;
        if majority == Some(record.param_count()) {
            score += ARITY_SCORE;
        }
        for (clue, weight) in &evidence.arg_types {
            if arg_types_match(clue, record) {
                score += ARG_TYPE_SCORE * *weight as f64;
            }
        }
        if let Some(class) = class_of(record) {
            for (context, weight) in &evidence.contexts {
                if *context == class {
                    score += CONTEXT_SCORE * *weight as f64;
                }
            }
        }
        let namespace = namespace_of(record);
        if !namespace.is_empty() && evidence.caller_namespaces.contains(&namespace) {
            score += NAMESPACE_SCORE;
        }
        score
    }

    fn apply(graph: &mut CallGraph, resolution: &Resolution) {
        if resolution.strategy == Strategy::Exact {
            graph.resolve_exact(&resolution.missing);
        } else {
            let rewired = graph.rewire(&resolution.missing, &resolution.target);
            debug!(
                missing = %resolution.missing,
                target = %resolution.target,
                strategy = ?resolution.strategy,
                rewired,
                "resolved"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_graph::CallSite;

    #[test]
    fn majority_prefers_first_seen_on_ties() {
        let evidence = Evidence {
            arg_counts: vec![(2, 1), (1, 1), (3, 2)],
            ..Default::default()
        };
        assert_eq!(evidence.majority_arg_count(), Some(3));
        let evidence = Evidence {
            arg_counts: vec![(2, 1), (1, 1)],
            ..Default::default()
        };
        assert_eq!(evidence.majority_arg_count(), Some(2));
    }

    #[test]
    fn unknown_tokens_match_anything_but_not_everything() {
        let mut record = FunctionRecord::new("f");
        record.param_types = ["const std::string &".to_string(), "int".to_string()]
            .into_iter()
            .collect();
        assert!(arg_types_match("string|?", &record));
        assert!(!arg_types_match("?|?", &record));
        assert!(!arg_types_match("int|int", &record));
        assert!(!arg_types_match("string", &record));
    }

    fn tied_runs() -> CallGraph {
        let mut graph = CallGraph::new();
        for ns in ["b", "a"] {
            let mut record = FunctionRecord::new(format!("{ns}::run"));
            record.namespace = ns.to_string();
            record.param_types = std::iter::once("int".to_string()).collect();
            graph.add_function(record);
        }
        let mut site = CallSite::structural("run", 1);
        site.arg_count = Some(1);
        let mut caller = FunctionRecord::new("main");
        caller.add_call_site(site);
        graph.add_function(caller);
        graph
    }

    #[test]
    fn top_score_tie_goes_to_smallest_name() {
        let mut graph = tied_runs();
        let stats = CrossFileResolver::default().resolve_with_mode(&mut graph, ResolutionMode::Full);
        assert_eq!(stats.scored, 1);
        assert_eq!(stats.rejected_ties, 0);
        assert!(!graph.is_missing("run"));
        assert_eq!(graph.get_function("main").map(|m| m.calls.clone()), Some(vec!["a::run".to_string()]));
    }

    #[test]
    fn strict_ties_leave_name_missing() {
        let mut graph = tied_runs();
        let strict = CrossFileResolver::new(ResolutionConfig {
            reject_ties: Some(true),
            ..Default::default()
        });
        let stats = strict.resolve_with_mode(&mut graph, ResolutionMode::Full);
        assert_eq!(stats.rejected_ties, 1);
        assert_eq!(stats.scored, 0);
        assert!(graph.is_missing("run"));
    }

    #[test]
    fn namespace_hint_takes_first_candidate_in_caller_namespace() {
        let mut graph = CallGraph::new();
        for name in ["io::detail::open", "io::open", "net::open"] {
            let mut record = FunctionRecord::new(name);
            record.namespace = "io".to_string();
            graph.add_function(record);
        }
        graph.get_function_mut("net::open").unwrap().namespace = "net".to_string();
        let mut caller = FunctionRecord::new("io::load");
        caller.namespace = "io".to_string();
        caller.add_call_site(CallSite::structural("open", 2));
        graph.add_function(caller);
        let index = FunctionIndex::build(&graph);

        let resolution = CrossFileResolver::default()
            .match_structural(&graph, &index, "open")
            .unwrap();
        assert_eq!(resolution.strategy, Strategy::NamespaceHint);
        assert_eq!(resolution.target, "io::detail::open");

        let strict = CrossFileResolver::new(ResolutionConfig {
            reject_ties: Some(true),
            ..Default::default()
        });
        assert!(strict.match_structural(&graph, &index, "open").is_err());
    }
}
