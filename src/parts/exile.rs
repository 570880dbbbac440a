//! Exile: burdened vulnerability.
//!
//! Two charges live here and must not be confused: `Exile::emotional_charge`
//! is the live activation affecting the system now, `Burden::emotional_charge`
//! is the stored intensity locked in the payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{illegal, PartId, Transition};
use crate::error::{ensure_unit, Result};

/// Default live charge for a new Exile.
pub const DEFAULT_EMOTIONAL_CHARGE: f64 = 0.5;

/// Exile state machine. `Unburdened` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExileState {
    #[default]
    Isolated,
    Leaking,
    Flooding,
    Unburdened,
}

impl ExileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExileState::Isolated => "isolated",
            ExileState::Leaking => "leaking",
            ExileState::Flooding => "flooding",
            ExileState::Unburdened => "unburdened",
        }
    }

    /// Adjacency for caller-requested transitions. `Unburdened` is not
    /// reachable this way.
    pub fn can_transition_to(self, next: ExileState) -> bool {
        use ExileState::*;
        matches!((self, next), (Isolated, Leaking) | (Leaking, Flooding))
    }

    pub fn is_terminal(self) -> bool {
        self == ExileState::Unburdened
    }
}

impl fmt::Display for ExileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin classification of a burden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurdenKind {
    Personal,
    Legacy,
    Unattached,
    Societal,
}

/// A limiting belief or extreme feeling taken on at the time of wounding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Burden {
    pub kind: BurdenKind,
    /// Origin context, e.g. "Age 7, school failure".
    pub origin: String,
    /// The limiting belief, e.g. "I am not enough".
    pub content: String,
    /// Stored intensity of the payload (0.0–1.0).
    #[serde(default = "default_charge")]
    pub emotional_charge: f64,
    /// Carrier chain for legacy burdens, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lineage: Vec<String>,
}

impl Burden {
    pub fn new(
        kind: BurdenKind,
        origin: impl Into<String>,
        content: impl Into<String>,
        emotional_charge: f64,
    ) -> Self {
        Self {
            kind,
            origin: origin.into(),
            content: content.into(),
            emotional_charge,
            lineage: Vec::new(),
        }
    }

    pub fn with_lineage<I, S>(mut self, lineage: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lineage = lineage.into_iter().map(Into::into).collect();
        self
    }

    /// Number of generations the burden has passed through; 0 without lineage.
    pub fn generation_depth(&self) -> usize {
        self.lineage.len()
    }
}

fn default_charge() -> f64 {
    DEFAULT_EMOTIONAL_CHARGE
}

/// Exile fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exile {
    #[serde(default)]
    pub burden: Option<Burden>,
    /// Live activation (0.0–1.0).
    #[serde(default = "default_charge")]
    pub emotional_charge: f64,
    /// Qualities invited in after unburdening.
    #[serde(default)]
    pub invited_qualities: Vec<String>,
    #[serde(default)]
    pub state: ExileState,
}

impl Default for Exile {
    fn default() -> Self {
        Self::new(DEFAULT_EMOTIONAL_CHARGE)
    }
}

impl Exile {
    pub fn new(emotional_charge: f64) -> Self {
        Self {
            burden: None,
            emotional_charge,
            invited_qualities: Vec::new(),
            state: ExileState::Isolated,
        }
    }

    pub fn with_burden(mut self, burden: Burden) -> Self {
        self.burden = Some(burden);
        self
    }

    pub fn set_emotional_charge(&mut self, charge: f64) -> Result<()> {
        ensure_unit("emotional_charge", charge)?;
        self.emotional_charge = charge;
        Ok(())
    }

    /// Compare live charge against what the system can contain.
    ///
    /// An isolated Exile starts leaking once its charge exceeds
    /// `leak_threshold`; a leaking Exile floods once its charge exceeds
    /// `capacity`. One hop per call.
    pub fn check_containment(&mut self, capacity: f64, leak_threshold: f64) -> Option<Transition<ExileState>> {
        let next = match self.state {
            ExileState::Isolated if self.emotional_charge > leak_threshold => ExileState::Leaking,
            ExileState::Leaking if self.emotional_charge > capacity => ExileState::Flooding,
            _ => return None,
        };
        let hop = Transition::new(self.state, next);
        self.state = next;
        Some(hop)
    }

    /// Request an explicit state change along the breakthrough path.
    pub fn transition_to(&mut self, part_id: PartId, next: ExileState) -> Result<Transition<ExileState>> {
        if !self.state.can_transition_to(next) {
            return Err(illegal(part_id, self.state, next));
        }
        let hop = Transition::new(self.state, next);
        self.state = next;
        Ok(hop)
    }

    /// Release the burden and mark the Exile healed. Only the unburdening
    /// pipeline calls this.
    pub(crate) fn release_burden(&mut self, residual_charge: f64) -> Option<Burden> {
        let released = self.burden.take();
        self.emotional_charge = self.emotional_charge.min(residual_charge);
        self.state = ExileState::Unburdened;
        released
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wounded_child() -> Exile {
        Exile::new(0.7).with_burden(Burden::new(
            BurdenKind::Personal,
            "Age 7, school failure",
            "I am not enough",
            0.9,
        ))
    }

    #[test]
    fn test_breakthrough_path() {
        let mut e = wounded_child();
        let hop = e.check_containment(0.3, 0.5).unwrap();
        assert_eq!(hop, Transition::new(ExileState::Isolated, ExileState::Leaking));
        let hop = e.check_containment(0.3, 0.5).unwrap();
        assert_eq!(hop.to, ExileState::Flooding);
        assert!(e.check_containment(0.0, 0.0).is_none());
    }

    #[test]
    fn test_contained_when_capacity_suffices() {
        let mut e = wounded_child();
        e.state = ExileState::Leaking;
        assert!(e.check_containment(0.9, 0.5).is_none());
        assert_eq!(e.state, ExileState::Leaking);
    }

    #[test]
    fn test_unburdened_not_requestable() {
        let mut e = wounded_child();
        let err = e
            .transition_to(PartId::new(), ExileState::Unburdened)
            .unwrap_err();
        assert!(err.to_string().contains("isolated -> unburdened"));
    }

    #[test]
    fn test_release_keeps_burden_record_intact() {
        let mut e = wounded_child();
        let released = e.release_burden(0.1).unwrap();
        assert_eq!(released.content, "I am not enough");
        assert_eq!(released.emotional_charge, 0.9);
        assert!(e.burden.is_none());
        assert_eq!(e.state, ExileState::Unburdened);
        assert!((e.emotional_charge - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_legacy_lineage_depth() {
        let b = Burden::new(BurdenKind::Legacy, "family", "never show weakness", 0.6)
            .with_lineage(["grandmother", "mother", "self"]);
        assert_eq!(b.generation_depth(), 3);
    }

    #[test]
    fn test_set_charge_validates() {
        let mut e = wounded_child();
        assert!(e.set_emotional_charge(1.2).is_err());
        assert_eq!(e.emotional_charge, 0.7);
    }
}
