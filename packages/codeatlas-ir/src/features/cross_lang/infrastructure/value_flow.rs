//! Cross-service value flow overlay
//!
//! Once boundaries are matched to handler implementations, cross-service
//! edges are plain inter-procedural edges in the unified graph; the
//! forward/backward/taint traces of the query engine work unchanged.

use tracing::info;

use crate::features::cross_lang::domain::{BoundarySpec, MatchCandidate};
use crate::features::query_engine::domain::QueryEdgeKind;
use crate::features::query_engine::infrastructure::unified_graph::UnifiedGraph;

/// A resolved cross-service link: the client-side call node and the
/// matched server-side handler.
#[derive(Debug, Clone)]
pub struct CrossServiceLink {
    pub boundary: BoundarySpec,
    /// Node id on the caller side (the function making the request)
    pub client_node_id: String,
    pub handler: MatchCandidate,
}

pub struct ValueFlowOverlay;

impl ValueFlowOverlay {
    /// Add cross-service edges for every resolved link. Request flow goes
    /// client → handler; response flow goes handler → client.
    pub fn apply(graph: &mut UnifiedGraph, links: &[CrossServiceLink]) -> usize {
        let mut added = 0;
        for link in links {
            if graph.get_node(&link.client_node_id).is_none()
                || graph.get_node(&link.handler.node_id).is_none()
            {
                continue;
            }
            graph.add_edge(
                &link.client_node_id,
                &link.handler.node_id,
                QueryEdgeKind::InterProc,
            );
            graph.add_edge(
                &link.handler.node_id,
                &link.client_node_id,
                QueryEdgeKind::InterProc,
            );
            added += 2;
        }
        info!(links = links.len(), edges = added, "cross_service_edges_applied");
        added
    }
}
