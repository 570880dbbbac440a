//! Relationship graph: typed edges between Parts.
//!
//! Nodes are the Parts of a [`PartRegistry`]; the graph stores only edges and
//! checks every endpoint against the registry when an edge is added.
//!
//! - `protects`: a protector guards an Exile (source → target).
//! - `allied`: Parts cooperating toward a shared protective goal.
//! - `polarized`: two Parts locked in mutual escalation. The pair is
//!   unordered and carries a tension level and an escalation coefficient.
//!
//! Polarization *detection* lives in [`polarization`] and only ever returns
//! suggestions; a suggestion becomes an edge when the caller adds it.

pub mod export;
pub mod polarization;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_unit, IfsError, Result};
use crate::parts::{Part, PartId, PartRegistry};

pub use export::{ExportEdge, ExportNode, PartsMap};
pub use polarization::{
    detect_polarization, suggest_structural_polarization, ActivationHistory,
    PolarizationSuggestion, SuggestionBasis, DEFAULT_POLARIZATION_THRESHOLD,
    DEFAULT_STRUCTURAL_TRUST_THRESHOLD,
};

/// Default tension for a declared polarization.
pub const DEFAULT_TENSION_LEVEL: f64 = 0.5;

/// Default escalation coefficient for a declared polarization.
pub const DEFAULT_ESCALATION: f64 = 0.1;

/// Relationship type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeKind {
    Protects,
    Allied,
    Polarized {
        #[serde(default = "default_tension")]
        tension_level: f64,
        #[serde(default = "default_escalation")]
        escalation: f64,
    },
}

fn default_tension() -> f64 {
    DEFAULT_TENSION_LEVEL
}

fn default_escalation() -> f64 {
    DEFAULT_ESCALATION
}

impl EdgeKind {
    pub fn polarized(tension_level: f64) -> Self {
        EdgeKind::Polarized {
            tension_level,
            escalation: DEFAULT_ESCALATION,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Protects => "protects",
            EdgeKind::Allied => "allied",
            EdgeKind::Polarized { .. } => "polarized",
        }
    }

    pub fn tension(&self) -> Option<f64> {
        match self {
            EdgeKind::Polarized { tension_level, .. } => Some(*tension_level),
            _ => None,
        }
    }

    fn same_variant(&self, other: &EdgeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A typed relationship between two Parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: PartId,
    pub target: PartId,
    #[serde(flatten)]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: PartId, target: PartId, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }

    pub fn protects(protector: PartId, exile: PartId) -> Self {
        Self::new(protector, exile, EdgeKind::Protects)
    }

    pub fn allied(a: PartId, b: PartId) -> Self {
        Self::new(a, b, EdgeKind::Allied)
    }

    pub fn polarized(a: PartId, b: PartId, tension_level: f64) -> Self {
        Self::new(a, b, EdgeKind::polarized(tension_level))
    }

    /// Whether this edge touches both `a` and `b`, in either direction.
    pub fn joins(&self, a: PartId, b: PartId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    fn duplicates(&self, other: &Edge) -> bool {
        if !self.kind.same_variant(&other.kind) {
            return false;
        }
        match self.kind {
            EdgeKind::Polarized { .. } => self.joins(other.source, other.target),
            _ => self.source == other.source && self.target == other.target,
        }
    }
}

/// The relationship graph of one system.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationshipGraph {
    edges: Vec<Edge>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge between two registered Parts.
    pub fn add_edge(&mut self, parts: &PartRegistry, edge: Edge) -> Result<()> {
        for id in [edge.source, edge.target] {
            if !parts.contains(id) {
                return Err(IfsError::PartNotFound(id));
            }
        }
        if edge.source == edge.target {
            return Err(IfsError::validation(
                "target",
                format!("part {} cannot relate to itself", edge.source),
            ));
        }
        if let EdgeKind::Polarized {
            tension_level,
            escalation,
        } = edge.kind
        {
            ensure_unit("tension_level", tension_level)?;
            ensure_unit("escalation", escalation)?;
        }
        if self.edges.iter().any(|e| e.duplicates(&edge)) {
            return Err(IfsError::validation(
                "edge",
                format!(
                    "{} edge between {} and {} already exists",
                    edge.kind.as_str(),
                    edge.source,
                    edge.target
                ),
            ));
        }
        log::debug!(
            "Edge added: {} -[{}]-> {}",
            edge.source,
            edge.kind.as_str(),
            edge.target
        );
        self.edges.push(edge);
        Ok(())
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges leaving `part_id`.
    pub fn edges_from(&self, part_id: PartId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == part_id)
    }

    /// Parts holding a `protects` edge into `exile_id`, in edge order.
    pub fn protectors_of<'a>(&self, parts: &'a PartRegistry, exile_id: PartId) -> Vec<&'a Part> {
        self.edges
            .iter()
            .filter(|e| e.target == exile_id && e.kind == EdgeKind::Protects)
            .filter_map(|e| parts.get(e.source).ok())
            .collect()
    }

    /// Ids of the Parts `protector_id` protects.
    pub fn protected_by(&self, protector_id: PartId) -> Vec<PartId> {
        self.edges_from(protector_id)
            .filter(|e| e.kind == EdgeKind::Protects)
            .map(|e| e.target)
            .collect()
    }

    /// Every `polarized` edge.
    pub fn polarized_pairs(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::Polarized { .. }))
            .collect()
    }

    pub fn is_polarized(&self, a: PartId, b: PartId) -> bool {
        self.polarized_pairs().iter().any(|e| e.joins(a, b))
    }

    /// Exiles protected by both `a` and `b`.
    pub fn shared_exiles(&self, a: PartId, b: PartId) -> Vec<PartId> {
        let b_targets = self.protected_by(b);
        self.protected_by(a)
            .into_iter()
            .filter(|id| b_targets.contains(id))
            .collect()
    }

    /// One round of mutual escalation between a polarized pair: tension is
    /// multiplied by `1 + escalation`, capped at 1.0. Returns the new tension.
    pub fn record_escalation(&mut self, a: PartId, b: PartId) -> Result<f64> {
        let edge = self
            .edges
            .iter_mut()
            .find(|e| matches!(e.kind, EdgeKind::Polarized { .. }) && e.joins(a, b))
            .ok_or(IfsError::EdgeNotFound {
                source_id: a,
                target_id: b,
            })?;
        let EdgeKind::Polarized {
            tension_level,
            escalation,
        } = &mut edge.kind
        else {
            return Err(IfsError::EdgeNotFound {
                source_id: a,
                target_id: b,
            });
        };
        *tension_level = (*tension_level * (1.0 + *escalation)).min(1.0);
        log::debug!("Polarization {} <-> {} escalated to {:.2}", a, b, tension_level);
        Ok(*tension_level)
    }

    /// The graph as plain data for rendering layers.
    pub fn to_export(&self, parts: &PartRegistry) -> PartsMap {
        PartsMap::build(parts, self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parts::{Exile, Firefighter, Manager};

    fn system() -> (PartRegistry, PartId, PartId, PartId) {
        let mut reg = PartRegistry::new();
        let mgr = reg
            .add(Part::manager("perfectionist", 12, "avoid failure", Manager::new(0.8)))
            .unwrap();
        let ff = reg
            .add(Part::firefighter("procrastinator", 14, "avoid pain", Firefighter::new(0.6)))
            .unwrap();
        let exile = reg
            .add(Part::exile("not good enough", 7, "hold shame", Exile::new(0.8)))
            .unwrap();
        (reg, mgr, ff, exile)
    }

    #[test]
    fn test_protectors_of() {
        let (reg, mgr, ff, exile) = system();
        let mut graph = RelationshipGraph::new();
        graph.add_edge(&reg, Edge::protects(mgr, exile)).unwrap();
        graph.add_edge(&reg, Edge::protects(ff, exile)).unwrap();
        let ids: Vec<_> = graph.protectors_of(&reg, exile).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![mgr, ff]);
        assert_eq!(graph.shared_exiles(mgr, ff), vec![exile]);
        assert!(graph.protectors_of(&reg, mgr).is_empty());
    }

    #[test]
    fn test_rejects_bad_edges() {
        let (reg, mgr, ff, _) = system();
        let mut graph = RelationshipGraph::new();

        let err = graph.add_edge(&reg, Edge::allied(mgr, PartId::new())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = graph.add_edge(&reg, Edge::allied(mgr, mgr)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = graph.add_edge(&reg, Edge::polarized(mgr, ff, 1.4)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(graph.is_empty());
    }

    #[test]
    fn test_polarized_pair_is_unordered() {
        let (reg, mgr, ff, _) = system();
        let mut graph = RelationshipGraph::new();
        graph.add_edge(&reg, Edge::polarized(mgr, ff, 0.7)).unwrap();
        assert!(graph.add_edge(&reg, Edge::polarized(ff, mgr, 0.2)).is_err());
        assert!(graph.is_polarized(ff, mgr));
        assert_eq!(graph.polarized_pairs().len(), 1);
        // A different relationship between the same Parts is fine.
        graph.add_edge(&reg, Edge::allied(mgr, ff)).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_record_escalation_caps() {
        let (reg, mgr, ff, _) = system();
        let mut graph = RelationshipGraph::new();
        graph
            .add_edge(
                &reg,
                Edge::new(
                    mgr,
                    ff,
                    EdgeKind::Polarized {
                        tension_level: 0.5,
                        escalation: 0.5,
                    },
                ),
            )
            .unwrap();
        assert!((graph.record_escalation(ff, mgr).unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(graph.record_escalation(mgr, ff).unwrap(), 1.0);

        let err = graph.record_escalation(mgr, PartId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_edge_serde_flattens_kind() {
        let (_, mgr, ff, _) = system();
        let value = serde_json::to_value(Edge::polarized(mgr, ff, 0.7)).unwrap();
        assert_eq!(value["kind"], "polarized");
        assert_eq!(value["tension_level"], 0.7);

        let edge: Edge = serde_json::from_value(serde_json::json!({
            "source": mgr,
            "target": ff,
            "kind": "protects",
        }))
        .unwrap();
        assert_eq!(edge.kind, EdgeKind::Protects);
    }
}
