//! The Part registry: every Part in one simulated system, in insertion order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{
    ExileState, FirefighterState, Part, PartId, PartKind, PartRole, PartState, ScanOutcome,
    Stimulus, Transition,
};
use crate::error::{IfsError, Result};

/// Registry of all Parts in a system.
///
/// Parts are only ever added; the core never removes one.
#[derive(Debug, Clone, Default)]
pub struct PartRegistry {
    parts: HashMap<PartId, Part>,
    order: Vec<PartId>,
}

impl PartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Part after validating its ranges.
    pub fn add(&mut self, part: Part) -> Result<PartId> {
        part.validate()?;
        if self.parts.contains_key(&part.id) {
            return Err(IfsError::validation(
                "id",
                format!("part {} is already registered", part.id),
            ));
        }
        let id = part.id;
        log::debug!("Registered {} part {}", part.kind(), id);
        self.order.push(id);
        self.parts.insert(id, part);
        Ok(id)
    }

    pub fn get(&self, id: PartId) -> Result<&Part> {
        self.parts.get(&id).ok_or(IfsError::PartNotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: PartId) -> Result<&mut Part> {
        self.parts.get_mut(&id).ok_or(IfsError::PartNotFound(id))
    }

    pub fn contains(&self, id: PartId) -> bool {
        self.parts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All Parts in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.order.iter().filter_map(|id| self.parts.get(id))
    }

    pub fn ids(&self) -> &[PartId] {
        &self.order
    }

    pub fn of_kind(&self, kind: PartKind) -> impl Iterator<Item = &Part> {
        self.iter().filter(move |p| p.kind() == kind)
    }

    pub fn exiles(&self) -> impl Iterator<Item = &Part> {
        self.of_kind(PartKind::Exile)
    }

    /// Sum of every Part's current activation.
    pub fn total_activation(&self) -> f64 {
        self.iter().map(Part::activation).sum()
    }

    // ------------------------------------------------------------------
    // State machine drivers
    // ------------------------------------------------------------------

    /// Present a stimulus to a Manager.
    pub fn scan(&mut self, id: PartId, stimulus: &Stimulus) -> Result<ScanOutcome> {
        let outcome = self.get_mut(id)?.manager_mut()?.scan(stimulus)?;
        for hop in &outcome.transitions {
            log::debug!("Manager {} {} -> {}", id, hop.from, hop.to);
        }
        Ok(outcome)
    }

    /// Return a Manager to idle.
    pub fn resolve_threat(&mut self, id: PartId) -> Result<Transition<PartState>> {
        let hop = self.get_mut(id)?.manager_mut()?.resolve_threat(id)?;
        log::debug!("Manager {} threat resolved", id);
        Ok(hop.erase())
    }

    /// Let a Firefighter react to an Exile's current charge.
    pub fn firefighter_respond(
        &mut self,
        firefighter_id: PartId,
        exile_id: PartId,
        now: DateTime<Utc>,
    ) -> Result<Option<Transition<FirefighterState>>> {
        let charge = match self.get(exile_id)?.as_exile() {
            Some(exile) => exile.emotional_charge,
            None => {
                return Err(IfsError::WrongPartKind {
                    part_id: exile_id,
                    expected: PartKind::Exile.to_string(),
                    actual: self.get(exile_id)?.kind().to_string(),
                })
            }
        };
        let hop = self
            .get_mut(firefighter_id)?
            .firefighter_mut()?
            .respond(charge, now)?;
        if hop.is_some() {
            log::debug!(
                "Firefighter {} activated by exile {} (charge {:.2})",
                firefighter_id,
                exile_id,
                charge
            );
        }
        Ok(hop)
    }

    /// Advance one Firefighter's refractory clock.
    pub fn tick_firefighter(&mut self, id: PartId, now: DateTime<Utc>) -> Result<Option<Transition<FirefighterState>>> {
        Ok(self.get_mut(id)?.firefighter_mut()?.tick(now))
    }

    /// Advance every Firefighter's refractory clock.
    pub fn tick_all(&mut self, now: DateTime<Utc>) -> Vec<(PartId, Transition<FirefighterState>)> {
        let mut hops = Vec::new();
        for id in &self.order {
            if let Some(Part {
                role: PartRole::Firefighter(ff),
                ..
            }) = self.parts.get_mut(id)
            {
                if let Some(hop) = ff.tick(now) {
                    hops.push((*id, hop));
                }
            }
        }
        hops
    }

    /// Force an Exile into awareness. An isolated Exile starts leaking.
    pub fn force_visible(&mut self, id: PartId) -> Result<Option<Transition<ExileState>>> {
        let part = self.get_mut(id)?;
        part.exile_mut()?;
        part.visible = true;
        let exile = part.exile_mut()?;
        if exile.state != ExileState::Isolated {
            return Ok(None);
        }
        exile.state = ExileState::Leaking;
        log::debug!("Exile {} forced visible, now leaking", id);
        Ok(Some(Transition::new(ExileState::Isolated, ExileState::Leaking)))
    }

    /// Set an Exile's live charge.
    pub fn set_exile_charge(&mut self, id: PartId, charge: f64) -> Result<()> {
        self.get_mut(id)?.exile_mut()?.set_emotional_charge(charge)
    }

    /// Check an Exile's charge against the system's capacity.
    pub fn check_containment(
        &mut self,
        id: PartId,
        capacity: f64,
        leak_threshold: f64,
    ) -> Result<Option<Transition<ExileState>>> {
        let part = self.get_mut(id)?;
        let hop = part.exile_mut()?.check_containment(capacity, leak_threshold);
        if let Some(hop) = hop {
            part.visible = true;
            log::debug!("Exile {} {} -> {}", id, hop.from, hop.to);
        }
        Ok(hop)
    }

    /// Explicit state request on any Part.
    pub fn transition(&mut self, id: PartId, target: PartState, now: DateTime<Utc>) -> Result<Transition<PartState>> {
        let hop = self.get_mut(id)?.transition_to(target, now)?;
        log::debug!("Part {} {} -> {}", id, hop.from, hop.to);
        Ok(hop)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
