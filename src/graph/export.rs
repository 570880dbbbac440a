//! Parts Map export.
//!
//! A plain node/edge structure for force-directed renderers. One node per
//! registered Part, one edge per graph edge, nothing else.

use serde::{Deserialize, Serialize};

use super::RelationshipGraph;
use crate::parts::{Part, PartId, PartKind, PartRegistry, PartState};

/// A Part as rendered on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub id: PartId,
    pub kind: PartKind,
    /// Current activation; drives node size.
    pub charge: f64,
    pub state: PartState,
}

impl From<&Part> for ExportNode {
    fn from(part: &Part) -> Self {
        Self {
            id: part.id,
            kind: part.kind(),
            charge: part.activation(),
            state: part.state(),
        }
    }
}

/// A relationship as rendered on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEdge {
    pub source: PartId,
    pub target: PartId,
    pub kind: String,
    /// Tension for polarized edges, `null` otherwise.
    pub tension: Option<f64>,
}

/// The whole map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartsMap {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

impl PartsMap {
    pub fn build(parts: &PartRegistry, graph: &RelationshipGraph) -> Self {
        let nodes = parts.iter().map(ExportNode::from).collect();
        let edges = graph
            .edges()
            .iter()
            .map(|e| ExportEdge {
                source: e.source,
                target: e.target,
                kind: e.kind.as_str().to_string(),
                tension: e.kind.tension(),
            })
            .collect();
        Self { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::parts::{Exile, Firefighter, Manager};

    #[test]
    fn test_export_counts_and_shape() {
        let mut reg = PartRegistry::new();
        let mgr = reg
            .add(Part::manager("critic", 12, "x", Manager::new(0.8)))
            .unwrap();
        let ff = reg
            .add(Part::firefighter("binge", 15, "x", Firefighter::new(0.6)))
            .unwrap();
        let exile = reg.add(Part::exile("child", 6, "x", Exile::new(0.9))).unwrap();

        let mut graph = RelationshipGraph::new();
        graph.add_edge(&reg, Edge::protects(mgr, exile)).unwrap();
        graph.add_edge(&reg, Edge::polarized(mgr, ff, 0.7)).unwrap();

        let map = graph.to_export(&reg);
        assert_eq!(map.nodes.len(), reg.len());
        assert_eq!(map.edges.len(), graph.len());
        assert_eq!(map.nodes[2].charge, 0.9);

        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["nodes"][0]["kind"], "manager");
        assert_eq!(value["nodes"][0]["state"], "idle");
        assert_eq!(value["nodes"][2]["state"], "isolated");
        assert_eq!(value["edges"][0]["kind"], "protects");
        assert!(value["edges"][0]["tension"].is_null());
        assert_eq!(value["edges"][1]["tension"], 0.7);
    }

    #[test]
    fn test_empty_export() {
        let map = RelationshipGraph::new().to_export(&PartRegistry::new());
        assert!(map.nodes.is_empty());
        assert!(map.edges.is_empty());
    }
}
