//! Type inference domain models
//!
//! Every inferred type records where it came from; when several sources
//! disagree, the higher-priority source wins.

use serde::{Deserialize, Serialize};

/// Type inference source, ordered by priority (higher wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InferSource {
    /// Explicit annotation (`def foo() -> int`)
    Annotation,
    /// Control flow narrowing (instance checks, `is None` guards)
    Narrowing,
    /// Literal value inference (`x = 42`)
    Literal,
    /// Inter-procedural return-type summary propagation
    Summary,
    /// Callee return type via signature lookup
    CallGraph,
    /// Overload resolution
    Overload,
    /// Builtin method return-type table
    BuiltinMethod,
    /// Union from a phi node at a merge point
    PhiNode,
    /// External LSP-like fallback
    External,
    /// Could not infer
    Unknown,
}

impl InferSource {
    /// Priority for source selection (higher = better).
    pub fn priority(&self) -> u32 {
        match self {
            InferSource::Annotation => 100,
            InferSource::Narrowing => 95,
            InferSource::Literal => 90,
            InferSource::Summary => 85,
            InferSource::CallGraph => 80,
            InferSource::Overload => 75,
            InferSource::BuiltinMethod => 70,
            InferSource::PhiNode => 65,
            InferSource::External => 50,
            InferSource::Unknown => 0,
        }
    }

    /// True when the source needs no external tools.
    pub fn is_self_contained(&self) -> bool {
        !matches!(self, InferSource::External | InferSource::Unknown)
    }
}

/// Result of inferring one expression or variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferResult {
    pub inferred_type: Option<String>,
    pub source: InferSource,
    pub confidence: f64,
    /// For narrowing: the type before the guard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_type: Option<String>,
}

impl InferResult {
    pub fn from_annotation(type_str: impl Into<String>) -> Self {
        Self {
            inferred_type: Some(type_str.into()),
            source: InferSource::Annotation,
            confidence: 1.0,
            original_type: None,
        }
    }

    pub fn from_narrowing(narrowed: impl Into<String>, original: Option<String>) -> Self {
        Self {
            inferred_type: Some(narrowed.into()),
            source: InferSource::Narrowing,
            confidence: 0.98,
            original_type: original,
        }
    }

    pub fn from_literal(type_str: impl Into<String>) -> Self {
        Self {
            inferred_type: Some(type_str.into()),
            source: InferSource::Literal,
            confidence: 1.0,
            original_type: None,
        }
    }

    pub fn from_summary(type_str: impl Into<String>) -> Self {
        Self {
            inferred_type: Some(type_str.into()),
            source: InferSource::Summary,
            confidence: 0.85,
            original_type: None,
        }
    }

    pub fn from_call_graph(return_type: impl Into<String>) -> Self {
        Self {
            inferred_type: Some(return_type.into()),
            source: InferSource::CallGraph,
            confidence: 0.95,
            original_type: None,
        }
    }

    pub fn from_overload(return_type: impl Into<String>) -> Self {
        Self {
            inferred_type: Some(return_type.into()),
            source: InferSource::Overload,
            confidence: 0.92,
            original_type: None,
        }
    }

    pub fn from_builtin_method(return_type: impl Into<String>) -> Self {
        Self {
            inferred_type: Some(return_type.into()),
            source: InferSource::BuiltinMethod,
            confidence: 0.99,
            original_type: None,
        }
    }

    /// Union type from a phi node's branches. Duplicates collapse; a
    /// single surviving type keeps a slightly higher confidence.
    pub fn from_phi_node(union_types: &[String]) -> Self {
        if union_types.is_empty() {
            return Self::unknown();
        }
        let mut unique: Vec<&str> = Vec::new();
        for t in union_types {
            if !unique.contains(&t.as_str()) {
                unique.push(t);
            }
        }
        if unique.len() == 1 {
            return Self {
                inferred_type: Some(unique[0].to_string()),
                source: InferSource::PhiNode,
                confidence: 0.95,
                original_type: None,
            };
        }
        Self {
            inferred_type: Some(unique.join(" | ")),
            source: InferSource::PhiNode,
            confidence: 0.9,
            original_type: None,
        }
    }

    pub fn from_external(type_str: impl Into<String>) -> Self {
        Self {
            inferred_type: Some(type_str.into()),
            source: InferSource::External,
            confidence: 0.98,
            original_type: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            inferred_type: None,
            source: InferSource::Unknown,
            confidence: 0.0,
            original_type: None,
        }
    }

    pub fn is_inferred(&self) -> bool {
        self.source != InferSource::Unknown && self.inferred_type.is_some()
    }
}

/// Return type summary for inter-procedural propagation, carrying generic
/// type parameters with their constraints.
///
/// Invariants: `is_generic` iff `type_parameters` is non-empty, and the
/// return type is never an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnTypeSummary {
    pub function_fqn: String,
    pub return_type: Option<String>,
    pub confidence: f64,
    pub source: InferSource,
    /// Callee fqns this summary still depends on (for propagation)
    pub dependencies: Vec<String>,
    pub type_parameters: Vec<String>,
    pub is_generic: bool,
    /// (type parameter, constraint) pairs
    pub type_constraints: Vec<(String, String)>,
}

impl ReturnTypeSummary {
    pub fn new(
        function_fqn: impl Into<String>,
        return_type: Option<String>,
        confidence: f64,
        source: InferSource,
    ) -> Result<Self, String> {
        let summary = Self {
            function_fqn: function_fqn.into(),
            return_type,
            confidence,
            source,
            dependencies: Vec::new(),
            type_parameters: Vec::new(),
            is_generic: false,
            type_constraints: Vec::new(),
        };
        summary.validate()?;
        Ok(summary)
    }

    pub fn with_generics(
        mut self,
        type_parameters: Vec<String>,
        type_constraints: Vec<(String, String)>,
    ) -> Result<Self, String> {
        self.is_generic = !type_parameters.is_empty();
        self.type_parameters = type_parameters;
        self.type_constraints = type_constraints;
        self.validate()?;
        Ok(self)
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn from_annotation(function_fqn: &str, return_type: &str) -> Result<Self, String> {
        Self::new(
            function_fqn,
            Some(return_type.to_string()),
            1.0,
            InferSource::Annotation,
        )
    }

    pub fn unknown(function_fqn: &str) -> Self {
        Self {
            function_fqn: function_fqn.to_string(),
            return_type: None,
            confidence: 0.0,
            source: InferSource::Unknown,
            dependencies: Vec::new(),
            type_parameters: Vec::new(),
            is_generic: false,
            type_constraints: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.return_type.is_some() && self.source != InferSource::Unknown
    }

    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be 0.0-1.0, got {}",
                self.confidence
            ));
        }
        if let Some(rt) = &self.return_type {
            if rt.trim().is_empty() {
                return Err(format!(
                    "return_type cannot be empty for {}",
                    self.function_fqn
                ));
            }
        }
        if self.is_generic && self.type_parameters.is_empty() {
            return Err(format!(
                "is_generic without type_parameters for {}",
                self.function_fqn
            ));
        }
        if !self.is_generic && !self.type_parameters.is_empty() {
            return Err(format!(
                "type_parameters without is_generic for {}",
                self.function_fqn
            ));
        }
        for tp in &self.type_parameters {
            if !is_valid_type_param(tp) {
                return Err(format!(
                    "invalid type parameter '{}' for {}",
                    tp, self.function_fqn
                ));
            }
        }
        Ok(())
    }

    /// Substitute concrete types observed at a call site into a generic
    /// return type (`T` with `T=int` becomes `int`).
    pub fn instantiate(&self, bindings: &[(String, String)]) -> Option<String> {
        let rt = self.return_type.as_ref()?;
        if !self.is_generic {
            return Some(rt.clone());
        }
        let mut out = rt.clone();
        for (param, concrete) in bindings {
            if out == *param {
                out = concrete.clone();
            } else {
                out = out
                    .replace(&format!("[{}]", param), &format!("[{}]", concrete))
                    .replace(&format!("[{},", param), &format!("[{},", concrete))
                    .replace(&format!(" {}]", param), &format!(" {}]", concrete));
            }
        }
        Some(out)
    }
}

/// Type parameters are single uppercase letters (T, K, V) or T1, T2, ...
fn is_valid_type_param(name: &str) -> bool {
    if name.len() == 1 {
        return name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    }
    name.starts_with('T') && name.len() <= 3 && name[1..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(InferSource::Annotation.priority() > InferSource::Narrowing.priority());
        assert!(InferSource::Narrowing.priority() > InferSource::Literal.priority());
        assert!(InferSource::Literal.priority() > InferSource::Summary.priority());
        assert!(InferSource::Summary.priority() > InferSource::CallGraph.priority());
        assert!(InferSource::CallGraph.priority() > InferSource::Overload.priority());
        assert!(InferSource::Overload.priority() > InferSource::BuiltinMethod.priority());
        assert!(InferSource::BuiltinMethod.priority() > InferSource::PhiNode.priority());
        assert!(InferSource::PhiNode.priority() > InferSource::External.priority());
        assert_eq!(InferSource::Unknown.priority(), 0);
    }

    #[test]
    fn test_phi_union_dedup() {
        let result =
            InferResult::from_phi_node(&["int".to_string(), "str".to_string(), "int".to_string()]);
        assert_eq!(result.inferred_type.as_deref(), Some("int | str"));
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_phi_single_type() {
        let result = InferResult::from_phi_node(&["int".to_string(), "int".to_string()]);
        assert_eq!(result.inferred_type.as_deref(), Some("int"));
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_summary_rejects_empty_return_type() {
        let err = ReturnTypeSummary::new("f", Some("  ".to_string()), 1.0, InferSource::Annotation);
        assert!(err.is_err());
    }

    #[test]
    fn test_summary_generic_invariant() {
        let base =
            ReturnTypeSummary::new("f", Some("T".to_string()), 1.0, InferSource::Annotation)
                .unwrap();
        let generic = base
            .clone()
            .with_generics(vec!["T".to_string()], vec![])
            .unwrap();
        assert!(generic.is_generic);

        let invalid = base.with_generics(vec!["lower".to_string()], vec![]);
        assert!(invalid.is_err());
    }

    #[test]
    fn test_generic_instantiation() {
        let summary =
            ReturnTypeSummary::new("identity", Some("T".to_string()), 1.0, InferSource::Annotation)
                .unwrap()
                .with_generics(vec!["T".to_string()], vec![])
                .unwrap();
        let instantiated = summary.instantiate(&[("T".to_string(), "int".to_string())]);
        assert_eq!(instantiated.as_deref(), Some("int"));
    }

    #[test]
    fn test_generic_instantiation_parametric_container() {
        let summary = ReturnTypeSummary::new(
            "first",
            Some("list[T]".to_string()),
            1.0,
            InferSource::Annotation,
        )
        .unwrap()
        .with_generics(vec!["T".to_string()], vec![])
        .unwrap();
        let instantiated = summary.instantiate(&[("T".to_string(), "str".to_string())]);
        assert_eq!(instantiated.as_deref(), Some("list[str]"));
    }
}
