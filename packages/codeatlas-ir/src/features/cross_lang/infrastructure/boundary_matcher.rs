//! Boundary-to-implementation matching
//!
//! Matches a service boundary to its server-side handler by, in order of
//! confidence: framework decorator patterns (exact beats fuzzy),
//! operationId (exact/fuzzy), endpoint-keyword similarity against
//! function names, and file-path hints. The highest-confidence candidate
//! wins; ties break on score.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::features::cross_lang::domain::{BoundarySpec, Confidence, MatchCandidate};
use crate::features::structural_ir::domain::IrDocument;

static DECORATOR_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        // FastAPI / Flask style: @app.get("/path"), @router.post("/path")
        (
            "fastapi",
            Regex::new(r#"(?:app|router)\.(get|post|put|delete|patch)\(\s*["']([^"']+)["']"#)
                .expect("valid regex"),
        ),
        (
            "flask",
            Regex::new(r#"(?:app|blueprint|bp)\.route\(\s*["']([^"']+)["']"#)
                .expect("valid regex"),
        ),
        // Express style: router.get('/path', handler)
        (
            "express",
            Regex::new(r#"router\.(get|post|put|delete)\(\s*["']([^"']+)["']"#)
                .expect("valid regex"),
        ),
    ]
});

const PATH_HINTS: [&str; 5] = ["handler", "controller", "route", "api", "view"];

pub struct BoundaryMatcher;

impl BoundaryMatcher {
    /// Match one boundary against every function in the documents.
    pub fn match_boundary(
        boundary: &BoundarySpec,
        docs: &[IrDocument],
    ) -> Option<MatchCandidate> {
        let mut candidates = Vec::new();

        candidates.extend(Self::match_by_decorator(boundary, docs));
        candidates.extend(Self::match_by_operation_id(boundary, docs));
        candidates.extend(Self::match_by_fuzzy_name(boundary, docs));
        candidates.extend(Self::match_by_file_path(boundary, docs));

        // Highest confidence wins; ties break on score
        candidates.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then(b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
        });

        let best = candidates.into_iter().next();
        if let Some(candidate) = &best {
            debug!(
                endpoint = %boundary.endpoint,
                handler = %candidate.function_fqn,
                confidence = candidate.confidence.as_str(),
                reason = %candidate.reason,
                "boundary_matched"
            );
        }
        best
    }

    /// Match every boundary; unmatched boundaries map to None.
    pub fn batch_match<'a>(
        boundaries: &'a [BoundarySpec],
        docs: &[IrDocument],
    ) -> Vec<(&'a BoundarySpec, Option<MatchCandidate>)> {
        boundaries
            .iter()
            .map(|b| (b, Self::match_boundary(b, docs)))
            .collect()
    }

    fn match_by_decorator(boundary: &BoundarySpec, docs: &[IrDocument]) -> Vec<MatchCandidate> {
        let mut out = Vec::new();
        let normalized_endpoint = normalize_endpoint(&boundary.endpoint);

        for doc in docs {
            for func in doc.callables() {
                let Some(decorators) = func.attrs.get("decorators").and_then(|v| v.as_array())
                else {
                    continue;
                };
                for decorator in decorators.iter().filter_map(|v| v.as_str()) {
                    for (framework, pattern) in DECORATOR_PATTERNS.iter() {
                        let Some(captures) = pattern.captures(decorator) else {
                            continue;
                        };
                        // Last capture group is the path; a leading group,
                        // when present, is the HTTP method
                        let path = captures
                            .get(captures.len() - 1)
                            .map(|m| m.as_str())
                            .unwrap_or("");
                        let method = if captures.len() >= 3 {
                            captures.get(1).map(|m| m.as_str().to_uppercase())
                        } else {
                            None
                        };

                        if normalize_endpoint(path) == normalized_endpoint {
                            let method_matches = match (&boundary.http_method, &method) {
                                (Some(want), Some(got)) => want.eq_ignore_ascii_case(got),
                                _ => true,
                            };
                            if method_matches {
                                out.push(MatchCandidate {
                                    node_id: func.id.clone(),
                                    function_fqn: func.fqn.clone(),
                                    file_path: func.file_path.clone(),
                                    score: 1.0,
                                    confidence: Confidence::High,
                                    reason: format!("decorator_exact ({})", framework),
                                });
                                continue;
                            }
                        }
                        let similarity =
                            endpoint_similarity(&normalized_endpoint, &normalize_endpoint(path));
                        if similarity > 0.6 {
                            out.push(MatchCandidate {
                                node_id: func.id.clone(),
                                function_fqn: func.fqn.clone(),
                                file_path: func.file_path.clone(),
                                score: similarity,
                                confidence: Confidence::Medium,
                                reason: format!("decorator_fuzzy ({})", framework),
                            });
                        }
                    }
                }
            }
        }
        out
    }

    fn match_by_operation_id(boundary: &BoundarySpec, docs: &[IrDocument]) -> Vec<MatchCandidate> {
        let Some(operation_id) = &boundary.operation_id else {
            return Vec::new();
        };
        let snake = camel_to_snake(operation_id);

        let mut out = Vec::new();
        for doc in docs {
            for func in doc.callables() {
                if func.name == snake || func.name == *operation_id {
                    out.push(MatchCandidate {
                        node_id: func.id.clone(),
                        function_fqn: func.fqn.clone(),
                        file_path: func.file_path.clone(),
                        score: 1.0,
                        confidence: Confidence::High,
                        reason: "operation_id_exact".to_string(),
                    });
                } else if func.name.contains(&snake) || snake.contains(&func.name) {
                    out.push(MatchCandidate {
                        node_id: func.id.clone(),
                        function_fqn: func.fqn.clone(),
                        file_path: func.file_path.clone(),
                        score: 0.8,
                        confidence: Confidence::Medium,
                        reason: "operation_id_fuzzy".to_string(),
                    });
                }
            }
        }
        out
    }

    fn match_by_fuzzy_name(boundary: &BoundarySpec, docs: &[IrDocument]) -> Vec<MatchCandidate> {
        let keywords = endpoint_keywords(&boundary.endpoint);
        if keywords.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        for doc in docs {
            for func in doc.callables() {
                let score = name_similarity(&keywords, &func.name);
                if score > 0.5 {
                    let confidence = if score > 0.75 {
                        Confidence::Medium
                    } else {
                        Confidence::Low
                    };
                    out.push(MatchCandidate {
                        node_id: func.id.clone(),
                        function_fqn: func.fqn.clone(),
                        file_path: func.file_path.clone(),
                        score,
                        confidence,
                        reason: "fuzzy_name".to_string(),
                    });
                }
            }
        }
        out
    }

    fn match_by_file_path(boundary: &BoundarySpec, docs: &[IrDocument]) -> Vec<MatchCandidate> {
        let resource = endpoint_resource(&boundary.endpoint);
        if resource.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        for doc in docs {
            let path_lower = doc.file_path.to_lowercase();
            let is_server_file = PATH_HINTS.iter().any(|h| path_lower.contains(h));
            if !is_server_file || !path_lower.contains(&resource) {
                continue;
            }
            for func in doc.callables() {
                out.push(MatchCandidate {
                    node_id: func.id.clone(),
                    function_fqn: func.fqn.clone(),
                    file_path: func.file_path.clone(),
                    score: 0.4,
                    confidence: Confidence::Low,
                    reason: "file_path_hint".to_string(),
                });
            }
        }
        out
    }
}

/// Strip parameter placeholders and trailing slashes: `/users/{id}/` and
/// `/users/:id` both normalize to `/users/*`.
fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    trimmed
        .split('/')
        .map(|seg| {
            if (seg.starts_with('{') && seg.ends_with('}')) || seg.starts_with(':') {
                "*"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}

fn endpoint_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a_segments: Vec<&str> = a.split('/').filter(|s| !s.is_empty()).collect();
    let b_segments: Vec<&str> = b.split('/').filter(|s| !s.is_empty()).collect();
    if a_segments.is_empty() || b_segments.is_empty() {
        return 0.0;
    }
    let matching = a_segments
        .iter()
        .zip(&b_segments)
        .filter(|(x, y)| x == y || **x == "*" || **y == "*")
        .count();
    matching as f64 / a_segments.len().max(b_segments.len()) as f64
}

/// Meaningful path segments (placeholders and empties dropped).
fn endpoint_keywords(endpoint: &str) -> Vec<String> {
    endpoint
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{') && !s.starts_with(':'))
        .map(|s| s.to_lowercase())
        .collect()
}

/// Last meaningful segment: the resource name.
fn endpoint_resource(endpoint: &str) -> String {
    endpoint_keywords(endpoint)
        .last()
        .cloned()
        .unwrap_or_default()
}

fn name_similarity(keywords: &[String], function_name: &str) -> f64 {
    let name = function_name.to_lowercase();
    let words: Vec<&str> = name.split('_').filter(|w| !w.is_empty()).collect();
    if words.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    for keyword in keywords {
        let singular = keyword.trim_end_matches('s');
        if words
            .iter()
            .any(|w| *w == keyword || w.trim_end_matches('s') == singular)
        {
            hits += 1;
        }
    }
    hits as f64 / keywords.len() as f64
}

fn camel_to_snake(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
