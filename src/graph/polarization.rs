//! Polarization detection.
//!
//! Two heuristics, both returning suggestions only:
//!
//! - **Correlation**: activation series recorded over time; pairs whose
//!   Pearson correlation is at or below `−threshold` are escalating in
//!   opposition (one rises as the other falls).
//! - **Structural**: a Manager and a Firefighter that both guard the same
//!   Exile while both distrust Self.
//!
//! Neither touches the graph. Callers commit a suggestion with
//! [`PolarizationSuggestion::to_edge`] and `add_edge`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Edge, RelationshipGraph};
use crate::error::{ensure_unit, Result};
use crate::parts::{Part, PartId, PartKind, PartRegistry};

/// Default |r| above which anti-correlated Parts are suggested.
pub const DEFAULT_POLARIZATION_THRESHOLD: f64 = 0.6;

/// Trust below which a protector counts as rigidly defensive.
pub const DEFAULT_STRUCTURAL_TRUST_THRESHOLD: f64 = 0.4;

/// Fewer aligned samples than this and a pair is not compared.
pub const MIN_SAMPLES: usize = 3;

/// Per-Part activation series, oldest sample first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationHistory {
    series: BTreeMap<PartId, Vec<f64>>,
}

impl ActivationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, part_id: PartId, activation: f64) {
        self.series.entry(part_id).or_default().push(activation);
    }

    /// Append every registered Part's current activation.
    pub fn record(&mut self, parts: &PartRegistry) {
        for part in parts.iter() {
            self.push(part.id, part.activation());
        }
    }

    pub fn series(&self, part_id: PartId) -> &[f64] {
        self.series.get(&part_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Why a pair was suggested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum SuggestionBasis {
    Correlation { coefficient: f64, samples: usize },
    SharedExiles { exiles: Vec<PartId> },
}

/// A candidate polarized pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarizationSuggestion {
    pub part_a: PartId,
    pub part_b: PartId,
    pub tension_level: f64,
    #[serde(flatten)]
    pub basis: SuggestionBasis,
}

impl PolarizationSuggestion {
    pub fn to_edge(&self) -> Edge {
        Edge::polarized(self.part_a, self.part_b, self.tension_level)
    }
}

/// Pearson correlation over the most recent `n` samples of both series,
/// where `n` is the shorter length. `None` if fewer than [`MIN_SAMPLES`]
/// or either window is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < MIN_SAMPLES {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Suggest pairs whose activations are anti-correlated with
/// `r ≤ −threshold`. Tension is `|r|`.
pub fn detect_polarization(history: &ActivationHistory, threshold: f64) -> Result<Vec<PolarizationSuggestion>> {
    ensure_unit("threshold", threshold)?;
    let ids: Vec<PartId> = history.series.keys().copied().collect();
    let mut suggestions = Vec::new();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let (sa, sb) = (history.series(a), history.series(b));
            let Some(r) = pearson(sa, sb) else {
                continue;
            };
            if r <= -threshold {
                suggestions.push(PolarizationSuggestion {
                    part_a: a,
                    part_b: b,
                    tension_level: r.abs(),
                    basis: SuggestionBasis::Correlation {
                        coefficient: r,
                        samples: sa.len().min(sb.len()),
                    },
                });
            }
        }
    }
    Ok(suggestions)
}

/// Suggest Manager/Firefighter pairs guarding a shared Exile while both sit
/// below `trust_threshold`. Tension is `1 − min(trust)`, to two decimals.
/// Pairs already polarized in `graph` are skipped.
pub fn suggest_structural_polarization(
    parts: &PartRegistry,
    graph: &RelationshipGraph,
    trust_threshold: f64,
) -> Result<Vec<PolarizationSuggestion>> {
    ensure_unit("trust_threshold", trust_threshold)?;
    let managers: Vec<&Part> = parts
        .of_kind(PartKind::Manager)
        .filter(|p| p.trust_level < trust_threshold)
        .collect();
    let firefighters: Vec<&Part> = parts
        .of_kind(PartKind::Firefighter)
        .filter(|p| p.trust_level < trust_threshold)
        .collect();

    let mut suggestions = Vec::new();
    for mgr in &managers {
        for ff in &firefighters {
            if graph.is_polarized(mgr.id, ff.id) {
                continue;
            }
            let exiles = graph.shared_exiles(mgr.id, ff.id);
            if exiles.is_empty() {
                continue;
            }
            let tension = 1.0 - mgr.trust_level.min(ff.trust_level);
            suggestions.push(PolarizationSuggestion {
                part_a: mgr.id,
                part_b: ff.id,
                tension_level: (tension * 100.0).round() / 100.0,
                basis: SuggestionBasis::SharedExiles { exiles },
            });
        }
    }
    Ok(suggestions)
}

impl RelationshipGraph {
    /// Correlation suggestions, minus pairs already polarized here.
    pub fn suggest_polarization(
        &self,
        history: &ActivationHistory,
        threshold: f64,
    ) -> Result<Vec<PolarizationSuggestion>> {
        Ok(detect_polarization(history, threshold)?
            .into_iter()
            .filter(|s| !self.is_polarized(s.part_a, s.part_b))
            .collect())
    }
}
