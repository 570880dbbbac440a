//! Part registry: the typed records for every sub-personality in a system.
//!
//! A [`Part`] carries the identity fields shared by all kinds (narrative,
//! developmental age, protective intent, trust in Self) plus a [`PartRole`]
//! variant holding the kind-specific fields and state machine:
//!
//! | Kind        | States                                   | Driven by                      |
//! |-------------|------------------------------------------|--------------------------------|
//! | Manager     | idle → scanning → blocking → idle        | `scan`, `resolve_threat`       |
//! | Firefighter | dormant → active → cooldown → dormant    | `respond`, `tick`              |
//! | Exile       | isolated → leaking → flooding → unburdened | `force_visible`, `check_containment`, unburdening |
//!
//! Nothing runs in the background. "Continuous monitoring" is a caller
//! invoking `scan` or `tick`; the caller also supplies the clock.

pub mod exile;
pub mod firefighter;
pub mod manager;
pub mod registry;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ensure_unit, IfsError, Result};

pub use exile::{Burden, BurdenKind, Exile, ExileState};
pub use firefighter::{Firefighter, FirefighterState};
pub use manager::{Manager, ManagerState, ScanOutcome, Stimulus};
pub use registry::PartRegistry;

/// Default trust a freshly created Part has in Self.
pub const DEFAULT_TRUST_LEVEL: f64 = 0.5;

// ============================================================================
// Identity
// ============================================================================

/// Opaque unique handle for a Part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartId(Uuid);

impl PartId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PartId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PartId {
    type Err = IfsError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| IfsError::validation("part_id", e.to_string()))
    }
}

// ============================================================================
// Kind / state discriminators
// ============================================================================

/// The three Part kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Manager,
    Firefighter,
    Exile,
}

impl PartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Manager => "manager",
            PartKind::Firefighter => "firefighter",
            PartKind::Exile => "exile",
        }
    }

    /// Managers and Firefighters both protect Exiles.
    pub fn is_protector(&self) -> bool {
        matches!(self, PartKind::Manager | PartKind::Firefighter)
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current state of any Part, regardless of kind.
///
/// Serialized as the bare state name (`"blocking"`, `"dormant"`, ...). State
/// names are unique across kinds, so deserialization is unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartState {
    Manager(ManagerState),
    Firefighter(FirefighterState),
    Exile(ExileState),
}

impl PartState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartState::Manager(s) => s.as_str(),
            PartState::Firefighter(s) => s.as_str(),
            PartState::Exile(s) => s.as_str(),
        }
    }
}

impl fmt::Display for PartState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single state hop performed by a Part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
}

impl<S> Transition<S> {
    pub fn new(from: S, to: S) -> Self {
        Self { from, to }
    }
}

impl<S: Copy + Into<PartState>> Transition<S> {
    /// Erase the kind-specific state type.
    pub fn erase(self) -> Transition<PartState> {
        Transition::new(self.from.into(), self.to.into())
    }
}

impl From<ManagerState> for PartState {
    fn from(s: ManagerState) -> Self {
        PartState::Manager(s)
    }
}

impl From<FirefighterState> for PartState {
    fn from(s: FirefighterState) -> Self {
        PartState::Firefighter(s)
    }
}

impl From<ExileState> for PartState {
    fn from(s: ExileState) -> Self {
        PartState::Exile(s)
    }
}

pub(crate) fn illegal(part_id: PartId, from: impl fmt::Display, to: impl fmt::Display) -> IfsError {
    IfsError::IllegalStateTransition {
        part_id,
        from: from.to_string(),
        to: to.to_string(),
    }
}

// ============================================================================
// Part
// ============================================================================

/// Kind-specific payload of a Part. Serialized with a `kind` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartRole {
    Manager(Manager),
    Firefighter(Firefighter),
    Exile(Exile),
}

/// An autonomous sub-personality.
///
/// Every Part has positive protective intent, even when its behaviours are
/// extreme. `trust_level` is only ever raised, and only by the Befriend step
/// of the engagement workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PartRecord")]
pub struct Part {
    pub id: PartId,
    /// The story the Part tells about its origin.
    pub narrative: String,
    /// Developmental age at which the Part formed.
    pub age: u32,
    /// The protective goal.
    pub intent: String,
    /// Trust in Self (0.0–1.0).
    pub trust_level: f64,
    /// Whether the Part is accessible to awareness.
    pub visible: bool,
    #[serde(flatten)]
    pub role: PartRole,
}

impl Part {
    /// Create a Part with default trust. Exiles start hidden, protectors visible.
    pub fn new(
        narrative: impl Into<String>,
        age: u32,
        intent: impl Into<String>,
        role: PartRole,
    ) -> Self {
        let visible = !matches!(role, PartRole::Exile(_));
        Self {
            id: PartId::new(),
            narrative: narrative.into(),
            age,
            intent: intent.into(),
            trust_level: DEFAULT_TRUST_LEVEL,
            visible,
            role,
        }
    }

    pub fn manager(
        narrative: impl Into<String>,
        age: u32,
        intent: impl Into<String>,
        manager: Manager,
    ) -> Self {
        Self::new(narrative, age, intent, PartRole::Manager(manager))
    }

    pub fn firefighter(
        narrative: impl Into<String>,
        age: u32,
        intent: impl Into<String>,
        firefighter: Firefighter,
    ) -> Self {
        Self::new(narrative, age, intent, PartRole::Firefighter(firefighter))
    }

    pub fn exile(
        narrative: impl Into<String>,
        age: u32,
        intent: impl Into<String>,
        exile: Exile,
    ) -> Self {
        Self::new(narrative, age, intent, PartRole::Exile(exile))
    }

    /// Override the generated id.
    pub fn with_id(mut self, id: PartId) -> Self {
        self.id = id;
        self
    }

    /// Override the initial trust level.
    pub fn with_trust(mut self, trust_level: f64) -> Self {
        self.trust_level = trust_level;
        self
    }

    pub fn kind(&self) -> PartKind {
        match self.role {
            PartRole::Manager(_) => PartKind::Manager,
            PartRole::Firefighter(_) => PartKind::Firefighter,
            PartRole::Exile(_) => PartKind::Exile,
        }
    }

    pub fn state(&self) -> PartState {
        match &self.role {
            PartRole::Manager(m) => PartState::Manager(m.state),
            PartRole::Firefighter(f) => PartState::Firefighter(f.state),
            PartRole::Exile(e) => PartState::Exile(e.state),
        }
    }

    /// Current activation intensity of this Part (0.0–1.0).
    ///
    /// Exiles report their live emotional charge. Managers report their
    /// rigidity while blocking and half of it while scanning. Firefighters
    /// are fully activated while active.
    pub fn activation(&self) -> f64 {
        match &self.role {
            PartRole::Exile(e) => e.emotional_charge,
            PartRole::Manager(m) => match m.state {
                ManagerState::Idle => 0.0,
                ManagerState::Scanning => m.rigidity / 2.0,
                ManagerState::Blocking => m.rigidity,
            },
            PartRole::Firefighter(f) => match f.state {
                FirefighterState::Active => 1.0,
                FirefighterState::Dormant | FirefighterState::Cooldown => 0.0,
            },
        }
    }

    pub fn as_manager(&self) -> Option<&Manager> {
        match &self.role {
            PartRole::Manager(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_firefighter(&self) -> Option<&Firefighter> {
        match &self.role {
            PartRole::Firefighter(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_exile(&self) -> Option<&Exile> {
        match &self.role {
            PartRole::Exile(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn manager_mut(&mut self) -> Result<&mut Manager> {
        let id = self.id;
        let actual = self.kind();
        match &mut self.role {
            PartRole::Manager(m) => Ok(m),
            _ => Err(wrong_kind(id, PartKind::Manager, actual)),
        }
    }

    pub(crate) fn firefighter_mut(&mut self) -> Result<&mut Firefighter> {
        let id = self.id;
        let actual = self.kind();
        match &mut self.role {
            PartRole::Firefighter(f) => Ok(f),
            _ => Err(wrong_kind(id, PartKind::Firefighter, actual)),
        }
    }

    pub(crate) fn exile_mut(&mut self) -> Result<&mut Exile> {
        let id = self.id;
        let actual = self.kind();
        match &mut self.role {
            PartRole::Exile(e) => Ok(e),
            _ => Err(wrong_kind(id, PartKind::Exile, actual)),
        }
    }

    /// Request an explicit state change.
    ///
    /// Only adjacent transitions are honoured. Asking a Part for a state of
    /// another kind (e.g. `blocking` on a Firefighter) is reported as an
    /// illegal transition, never clamped. `unburdened` can only be reached
    /// through the unburdening pipeline.
    pub fn transition_to(&mut self, target: PartState, now: DateTime<Utc>) -> Result<Transition<PartState>> {
        let id = self.id;
        let current = self.state();
        match (&mut self.role, target) {
            (PartRole::Manager(m), PartState::Manager(to)) => m.transition_to(id, to).map(Transition::erase),
            (PartRole::Firefighter(f), PartState::Firefighter(to)) => {
                f.transition_to(id, to, now).map(Transition::erase)
            }
            (PartRole::Exile(e), PartState::Exile(to)) => e.transition_to(id, to).map(Transition::erase),
            _ => Err(illegal(id, current, target)),
        }
    }

    /// Range-check every bounded scalar on this Part.
    pub fn validate(&self) -> Result<()> {
        ensure_unit("trust_level", self.trust_level)?;
        match &self.role {
            PartRole::Manager(m) => ensure_unit("rigidity", m.rigidity),
            PartRole::Firefighter(f) => ensure_unit("pain_threshold", f.pain_threshold),
            PartRole::Exile(e) => {
                ensure_unit("emotional_charge", e.emotional_charge)?;
                if let Some(burden) = &e.burden {
                    ensure_unit("burden.emotional_charge", burden.emotional_charge)?;
                }
                Ok(())
            }
        }
    }

    /// Raise trust by `increment`, capped at 1.0. Never lowers trust.
    pub(crate) fn raise_trust(&mut self, increment: f64) -> f64 {
        let increment = increment.max(0.0);
        self.trust_level = (self.trust_level + increment).min(1.0);
        self.trust_level
    }
}

fn wrong_kind(part_id: PartId, expected: PartKind, actual: PartKind) -> IfsError {
    IfsError::WrongPartKind {
        part_id,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

/// Wire form of a [`Part`]: id and visibility are optional and defaulted
/// per kind, and ranges are checked before a `Part` is produced.
#[derive(Debug, Deserialize)]
struct PartRecord {
    #[serde(default)]
    id: Option<PartId>,
    narrative: String,
    age: u32,
    intent: String,
    #[serde(default)]
    trust_level: Option<f64>,
    #[serde(default)]
    visible: Option<bool>,
    #[serde(flatten)]
    role: PartRole,
}

impl TryFrom<PartRecord> for Part {
    type Error = IfsError;

    fn try_from(record: PartRecord) -> Result<Self> {
        let mut part = Part::new(record.narrative, record.age, record.intent, record.role);
        if let Some(id) = record.id {
            part.id = id;
        }
        if let Some(trust) = record.trust_level {
            part.trust_level = trust;
        }
        if let Some(visible) = record.visible {
            part.visible = visible;
        }
        part.validate()?;
        Ok(part)
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Serialize a `Duration` as fractional seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(
                "refractory_period must be a non-negative number of seconds",
            ));
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exile_hidden_by_default() {
        let exile = Part::exile("wounded child", 7, "hold the pain", Exile::new(0.7));
        assert!(!exile.visible);
        let mgr = Part::manager("critic", 12, "be perfect first", Manager::new(0.8));
        assert!(mgr.visible);
        assert_eq!(mgr.trust_level, DEFAULT_TRUST_LEVEL);
    }

    #[test]
    fn test_serde_uses_kind_discriminator() {
        let part = Part::manager(
            "critic",
            12,
            "be perfect first",
            Manager::new(0.7).with_triggers(["criticism"]),
        );
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["kind"], "manager");
        assert_eq!(value["state"], "idle");
        assert_eq!(value["triggers"][0], "criticism");

        let back: Part = serde_json::from_value(value).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn test_deserialize_defaults_per_kind() {
        let exile: Part = serde_json::from_value(serde_json::json!({
            "kind": "exile",
            "narrative": "lonely one",
            "age": 5,
            "intent": "carry the loneliness",
        }))
        .unwrap();
        assert!(!exile.visible);
        assert_eq!(exile.kind(), PartKind::Exile);
        assert_eq!(exile.state(), PartState::Exile(ExileState::Isolated));

        let ff: Part = serde_json::from_value(serde_json::json!({
            "kind": "firefighter",
            "narrative": "numbing",
            "age": 14,
            "intent": "stop the pain",
            "refractory_period": 60.0,
        }))
        .unwrap();
        assert_eq!(
            ff.as_firefighter().unwrap().refractory_period,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_deserialize_rejects_out_of_range() {
        let result: std::result::Result<Part, _> = serde_json::from_value(serde_json::json!({
            "kind": "manager",
            "narrative": "critic",
            "age": 12,
            "intent": "x",
            "rigidity": 1.7,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_unrepresentable_refractory_period() {
        let result: std::result::Result<Part, _> = serde_json::from_value(serde_json::json!({
            "kind": "firefighter",
            "narrative": "binger",
            "age": 15,
            "intent": "numb it",
            "refractory_period": 1e300,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_part_state_parses_bare_names() {
        let s: PartState = serde_json::from_str("\"blocking\"").unwrap();
        assert_eq!(s, PartState::Manager(ManagerState::Blocking));
        let s: PartState = serde_json::from_str("\"dormant\"").unwrap();
        assert_eq!(s, PartState::Firefighter(FirefighterState::Dormant));
        let s: PartState = serde_json::from_str("\"flooding\"").unwrap();
        assert_eq!(s, PartState::Exile(ExileState::Flooding));
    }

    #[test]
    fn test_cross_kind_request_is_illegal() {
        let mut ff = Part::firefighter("numbing", 14, "stop the pain", Firefighter::new(0.6));
        let err = ff
            .transition_to(PartState::Manager(ManagerState::Blocking), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IllegalStateTransition);
        assert!(err.to_string().contains("dormant -> blocking"));
    }

    #[test]
    fn test_raise_trust_caps_and_never_lowers() {
        let mut part = Part::manager("critic", 12, "x", Manager::new(0.5)).with_trust(0.95);
        assert_eq!(part.raise_trust(0.1), 1.0);
        assert_eq!(part.raise_trust(-0.5), 1.0);
    }

    #[test]
    fn test_activation_by_kind() {
        let mut mgr = Part::manager("critic", 12, "x", Manager::new(0.8));
        assert_eq!(mgr.activation(), 0.0);
        mgr.manager_mut().unwrap().state = ManagerState::Blocking;
        assert!((mgr.activation() - 0.8).abs() < 1e-12);

        let exile = Part::exile("child", 7, "x", Exile::new(0.6));
        assert!((exile.activation() - 0.6).abs() < 1e-12);
    }
}
