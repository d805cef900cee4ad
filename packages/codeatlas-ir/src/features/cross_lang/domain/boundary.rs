//! Service boundary domain model
//!
//! A boundary is a service-to-service call site (REST/gRPC/GraphQL) where
//! a value crosses languages. Boundaries are either declared (parsed from
//! OpenAPI/Protobuf/GraphQL) or heuristically inferred with a confidence
//! label.

use serde::{Deserialize, Serialize};

/// Match confidence, ordered best-first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Guess,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
            Confidence::Guess => "GUESS",
        }
    }
}

/// Declared or inferred service boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundarySpec {
    pub service: String,
    /// Endpoint path, e.g. `/users/{id}`
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<String>,
    /// HIGH for declared specs; heuristic inference degrades from there
    pub confidence: Confidence,
}

impl BoundarySpec {
    pub fn declared(service: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            endpoint: endpoint.into(),
            http_method: None,
            operation_id: None,
            request_schema: None,
            response_schema: None,
            confidence: Confidence::High,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = Some(method.into());
        self
    }

    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }
}

/// A boundary matched to its server-side implementation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// IR node id of the handler function
    pub node_id: String,
    pub function_fqn: String,
    pub file_path: String,
    pub score: f64,
    pub confidence: Confidence,
    /// Which strategy produced the match
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert!(Confidence::Low > Confidence::Guess);
    }

    #[test]
    fn test_declared_boundary_is_high_confidence() {
        let spec = BoundarySpec::declared("users-svc", "/users/{id}").with_method("GET");
        assert_eq!(spec.confidence, Confidence::High);
        assert_eq!(spec.http_method.as_deref(), Some("GET"));
    }
}
