//! Query intent classification
//!
//! Pattern-based; the retriever picks per-index weights from the intent.
//! An optional LLM assist can override, but the patterns are the default
//! path and the fallback when the provider is unavailable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    SymbolNav,
    CodeSearch,
    FlowTrace,
    ConceptSearch,
    Balanced,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::SymbolNav => "symbol_nav",
            IntentKind::CodeSearch => "code_search",
            IntentKind::FlowTrace => "flow_trace",
            IntentKind::ConceptSearch => "concept_search",
            IntentKind::Balanced => "balanced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "symbol_nav" => Some(IntentKind::SymbolNav),
            "code_search" => Some(IntentKind::CodeSearch),
            "flow_trace" => Some(IntentKind::FlowTrace),
            "concept_search" => Some(IntentKind::ConceptSearch),
            "balanced" => Some(IntentKind::Balanced),
            _ => None,
        }
    }
}

static SYMBOL_NAV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(definition|defined|declaration|where is|go to|class|struct|interface|symbol)\b")
        .expect("valid regex")
});
static FLOW_TRACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(flow|trace|call(s|ed|er|ers)?|propagat\w*|reaches|taint|path)\b")
        .expect("valid regex")
});
static CONCEPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(how does|what is|explain|why|concept|overview|architecture)\b")
        .expect("valid regex")
});
static CODE_SEARCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(implement\w*|function|method|handler|parse|usage|example|snippet)\b")
        .expect("valid regex")
});

/// Classify a query's intent from surface patterns.
pub fn classify_intent(query: &str) -> IntentKind {
    if SYMBOL_NAV.is_match(query) {
        return IntentKind::SymbolNav;
    }
    if FLOW_TRACE.is_match(query) {
        return IntentKind::FlowTrace;
    }
    if CONCEPT.is_match(query) {
        return IntentKind::ConceptSearch;
    }
    if CODE_SEARCH.is_match(query) {
        return IntentKind::CodeSearch;
    }
    // A lone dotted identifier reads as symbol navigation
    if query.split_whitespace().count() <= 2 && query.contains('.') {
        return IntentKind::SymbolNav;
    }
    IntentKind::Balanced
}
