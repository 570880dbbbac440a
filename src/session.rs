//! Session: one internal system and everything done to it.
//!
//! A `Session` owns the Part registry, the Self Model, the relationship graph,
//! the workflow and pipeline state and the journal. It adds no behaviour of
//! its own: each method delegates to the component that owns the rule and
//! then journals what happened.
//!
//! ```ignore
//! let mut session = Session::new();
//! let critic = session.add_part(Part::manager("critic", 12, "be perfect first", Manager::new(0.7)))?;
//! session.blend(critic, 0.7, BTreeMap::new())?;
//! assert!(!session.is_self_led());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::InteractionPolicy;
use crate::dialogue::{DialogueMessage, DialogueProvider, PartDialogue};
use crate::error::{IfsError, Result};
use crate::graph::{
    suggest_structural_polarization, ActivationHistory, Edge, PartsMap, PolarizationSuggestion,
    RelationshipGraph,
};
use crate::journal::{Journal, JournalEvent};
use crate::parts::{
    ExileState, FirefighterState, Part, PartId, PartRegistry, PartState, ScanOutcome, Stimulus,
    Transition,
};
use crate::self_model::{EnergyVector, SelfModel, SelfQuality};
use crate::unburdening::{Element, UnburdeningPipeline, UnburdeningResult};
use crate::workflow::{FocusShift, SixFs, SixFsResult, SixFsStep, Trailhead, TrailheadLog};

/// Headline numbers for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub energy: f64,
    pub energy_vector: EnergyVector,
    pub is_self_led: bool,
    pub self_preservation_ratio: f64,
    pub part_count: usize,
    pub edge_count: usize,
    pub blend_count: usize,
    pub six_fs_target: Option<PartId>,
    pub six_fs_step: Option<SixFsStep>,
    pub journal_entries: usize,
    pub dialogue: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    policy: InteractionPolicy,
    parts: PartRegistry,
    self_model: SelfModel,
    graph: RelationshipGraph,
    trailheads: TrailheadLog,
    focus_shifts: Vec<FocusShift>,
    journal: Journal,
    six_fs: SixFs,
    unburdening: UnburdeningPipeline,
    history: ActivationHistory,
    dialogue: Option<PartDialogue>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// A fresh session with the default policy and no dialogue provider.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            policy: InteractionPolicy::default(),
            parts: PartRegistry::new(),
            self_model: SelfModel::new(),
            graph: RelationshipGraph::new(),
            trailheads: TrailheadLog::new(),
            focus_shifts: Vec::new(),
            journal: Journal::new(),
            six_fs: SixFs::new(),
            unburdening: UnburdeningPipeline::new(),
            history: ActivationHistory::new(),
            dialogue: None,
        }
    }

    /// A fresh session governed by `policy`.
    pub fn with_policy(policy: InteractionPolicy) -> Result<Self> {
        policy.validate()?;
        let mut session = Self::new();
        session.policy = policy;
        Ok(session)
    }

    /// Bind a dialogue provider, replacing any bound before.
    pub fn with_dialogue(mut self, provider: Arc<dyn DialogueProvider>) -> Self {
        self.bind_dialogue(provider);
        self
    }

    pub fn bind_dialogue(&mut self, provider: Arc<dyn DialogueProvider>) {
        self.dialogue = Some(PartDialogue::new(provider));
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn policy(&self) -> &InteractionPolicy {
        &self.policy
    }

    pub fn parts(&self) -> &PartRegistry {
        &self.parts
    }

    pub fn part(&self, id: PartId) -> Result<&Part> {
        self.parts.get(id)
    }

    pub fn self_model(&self) -> &SelfModel {
        &self.self_model
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn trailheads(&self) -> &TrailheadLog {
        &self.trailheads
    }

    pub fn focus_shifts(&self) -> &[FocusShift] {
        &self.focus_shifts
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn six_fs(&self) -> &SixFs {
        &self.six_fs
    }

    pub fn unburdening(&self) -> &UnburdeningPipeline {
        &self.unburdening
    }

    pub fn activation_history(&self) -> &ActivationHistory {
        &self.history
    }

    pub fn has_dialogue(&self) -> bool {
        self.dialogue.is_some()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            created_at: self.created_at,
            energy: self.self_model.energy(),
            energy_vector: *self.self_model.energy_vector(),
            is_self_led: self.is_self_led(),
            self_preservation_ratio: self.self_preservation_ratio(),
            part_count: self.parts.len(),
            edge_count: self.graph.len(),
            blend_count: self.self_model.active_blends().len(),
            six_fs_target: self.six_fs.target(),
            six_fs_step: self.six_fs.current_step(),
            journal_entries: self.journal.len(),
            dialogue: self.dialogue.as_ref().map(|d| d.provider_name().to_string()),
        }
    }

    // ========================================================================
    // Registry and graph
    // ========================================================================

    pub fn add_part(&mut self, part: Part) -> Result<PartId> {
        let description = format!("Added {}: {}", part.kind(), part.narrative);
        let id = self.parts.add(part)?;
        self.journal.record(JournalEvent::PartAdded, Some(id), description);
        Ok(id)
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        self.graph.add_edge(&self.parts, edge)?;
        self.journal.record(
            JournalEvent::EdgeAdded,
            Some(edge.source),
            format!("{} {} {}", edge.source, edge.kind.as_str(), edge.target),
        );
        Ok(())
    }

    pub fn protectors_of(&self, exile_id: PartId) -> Result<Vec<&Part>> {
        self.parts.get(exile_id)?;
        Ok(self.graph.protectors_of(&self.parts, exile_id))
    }

    /// Raise the tension of a declared polarization after an escalation.
    pub fn record_escalation(&mut self, a: PartId, b: PartId) -> Result<f64> {
        let tension = self.graph.record_escalation(a, b)?;
        self.journal.record(
            JournalEvent::Transition,
            Some(a),
            format!("Polarization {} / {} escalated to {:.2}", a, b, tension),
        );
        Ok(tension)
    }

    /// Append every Part's current activation to the history used for
    /// correlation-based polarization detection.
    pub fn record_activations(&mut self) {
        self.history.record(&self.parts);
    }

    /// Anti-correlated pairs at the policy threshold, excluding pairs
    /// already polarized. Never mutates the graph.
    pub fn detect_polarization(&self) -> Result<Vec<PolarizationSuggestion>> {
        self.graph
            .suggest_polarization(&self.history, self.policy.polarization_threshold)
    }

    pub fn suggest_structural_polarization(&self) -> Result<Vec<PolarizationSuggestion>> {
        suggest_structural_polarization(
            &self.parts,
            &self.graph,
            self.policy.structural_trust_threshold,
        )
    }

    pub fn parts_map(&self) -> PartsMap {
        self.graph.to_export(&self.parts)
    }

    // ========================================================================
    // Self Model
    // ========================================================================

    /// Blend a Part into Self and return the recomputed energy.
    pub fn blend(
        &mut self,
        part_id: PartId,
        blending_percentage: f64,
        occlusion_mask: BTreeMap<SelfQuality, f64>,
    ) -> Result<f64> {
        self.self_model
            .blend(&self.parts, part_id, blending_percentage, occlusion_mask)?;
        let energy = self.self_model.energy();
        self.journal.record(
            JournalEvent::Blend,
            Some(part_id),
            format!("Blended at {:.2}; energy {:.3}", blending_percentage, energy),
        );
        Ok(energy)
    }

    /// Unblend a Part. Returns whether anything changed.
    pub fn unblend(&mut self, part_id: PartId) -> bool {
        let removed = self.self_model.unblend(part_id);
        if removed {
            self.journal.record(
                JournalEvent::Unblend,
                Some(part_id),
                format!("Unblended; energy {:.3}", self.self_model.energy()),
            );
        }
        removed
    }

    pub fn energy(&self) -> f64 {
        self.self_model.energy()
    }

    /// Self-led at the policy's leadership threshold.
    pub fn is_self_led(&self) -> bool {
        self.policy.is_self_led(&self.self_model)
    }

    pub fn self_preservation_ratio(&self) -> f64 {
        self.self_model.self_preservation_ratio(&self.parts)
    }

    // ========================================================================
    // State machines
    // ========================================================================

    pub fn scan(&mut self, part_id: PartId, stimulus: &Stimulus) -> Result<ScanOutcome> {
        let outcome = self.parts.scan(part_id, stimulus)?;
        for hop in &outcome.transitions {
            self.journal_hop(part_id, hop.erase());
        }
        Ok(outcome)
    }

    pub fn resolve_threat(&mut self, part_id: PartId) -> Result<Transition<PartState>> {
        let hop = self.parts.resolve_threat(part_id)?;
        self.journal_hop(part_id, hop);
        Ok(hop)
    }

    pub fn firefighter_respond(
        &mut self,
        firefighter_id: PartId,
        exile_id: PartId,
        now: DateTime<Utc>,
    ) -> Result<Option<Transition<FirefighterState>>> {
        let hop = self.parts.firefighter_respond(firefighter_id, exile_id, now)?;
        if let Some(hop) = hop {
            self.journal_hop(firefighter_id, hop.erase());
        }
        Ok(hop)
    }

    /// Advance every Firefighter's refractory clock to `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<(PartId, Transition<FirefighterState>)> {
        let hops = self.parts.tick_all(now);
        for (id, hop) in &hops {
            self.journal_hop(*id, hop.erase());
        }
        hops
    }

    pub fn force_visible(&mut self, exile_id: PartId) -> Result<Option<Transition<ExileState>>> {
        let hop = self.parts.force_visible(exile_id)?;
        if let Some(hop) = hop {
            self.journal_hop(exile_id, hop.erase());
        }
        Ok(hop)
    }

    pub fn set_exile_charge(&mut self, exile_id: PartId, charge: f64) -> Result<()> {
        self.parts.set_exile_charge(exile_id, charge)
    }

    /// Check an Exile against the current Self energy and the policy's leak
    /// threshold.
    pub fn check_containment(&mut self, exile_id: PartId) -> Result<Option<Transition<ExileState>>> {
        let capacity = self.self_model.energy();
        let hop = self
            .parts
            .check_containment(exile_id, capacity, self.policy.leak_threshold)?;
        if let Some(hop) = hop {
            self.journal_hop(exile_id, hop.erase());
        }
        Ok(hop)
    }

    pub fn transition(
        &mut self,
        part_id: PartId,
        target: PartState,
        now: DateTime<Utc>,
    ) -> Result<Transition<PartState>> {
        let hop = self.parts.transition(part_id, target, now)?;
        self.journal_hop(part_id, hop);
        Ok(hop)
    }

    fn journal_hop(&mut self, part_id: PartId, hop: Transition<PartState>) {
        self.journal.record(
            JournalEvent::Transition,
            Some(part_id),
            format!("{} -> {}", hop.from, hop.to),
        );
    }

    // ========================================================================
    // Trailheads and focus
    // ========================================================================

    /// Log a trailhead observed outside the Six Fs.
    pub fn add_trailhead(&mut self, trailhead: Trailhead) -> Result<Uuid> {
        let id = trailhead.id;
        let description = format!("{:?} trailhead: {}", trailhead.kind, trailhead.description);
        let part_id = trailhead.associated_part_id;
        self.trailheads.add(trailhead)?;
        self.journal.record(JournalEvent::Trailhead, part_id, description);
        Ok(id)
    }

    pub fn shift_focus(&mut self, shift: FocusShift) {
        self.journal.record(
            JournalEvent::FocusShift,
            None,
            format!("Focus: '{}' -> '{}'", shift.from_subject, shift.to_subject),
        );
        self.focus_shifts.push(shift);
    }

    // ========================================================================
    // Six Fs
    // ========================================================================

    pub fn find(&mut self, part_id: PartId, trailhead: Trailhead) -> Result<SixFsResult> {
        let result = self
            .six_fs
            .find(&self.parts, &mut self.trailheads, part_id, trailhead)?;
        Ok(self.journal_step(result))
    }

    pub fn focus(&mut self, part_id: PartId) -> Result<SixFsResult> {
        let result = self.six_fs.focus(&self.parts, part_id)?;
        Ok(self.journal_step(result))
    }

    pub fn flesh_out(&mut self, part_id: PartId) -> Result<SixFsResult> {
        let result = self.six_fs.flesh_out(&self.parts, part_id)?;
        Ok(self.journal_step(result))
    }

    pub fn feel_toward(&mut self, part_id: PartId) -> Result<SixFsResult> {
        let result = self
            .six_fs
            .feel_toward(&self.parts, &self.self_model, &self.policy, part_id)?;
        Ok(self.journal_step(result))
    }

    pub fn befriend(&mut self, part_id: PartId) -> Result<SixFsResult> {
        let result = self.six_fs.befriend(&mut self.parts, &self.policy, part_id)?;
        Ok(self.journal_step(result))
    }

    pub fn fear(&mut self, part_id: PartId, predictions: Vec<String>) -> Result<SixFsResult> {
        let result = self
            .six_fs
            .fear(&self.parts, &self.graph, part_id, predictions)?;
        Ok(self.journal_step(result))
    }

    fn journal_step(&mut self, result: SixFsResult) -> SixFsResult {
        self.journal.record(
            JournalEvent::SixFs,
            Some(result.target_part_id),
            format!("{}: {}", result.step, result.notes),
        );
        result
    }

    // ========================================================================
    // Unburdening
    // ========================================================================

    pub fn witness(&mut self, exile_id: PartId) -> Result<UnburdeningResult> {
        let result = self
            .unburdening
            .witness(&self.parts, &self.self_model, &self.policy, exile_id)?;
        Ok(self.journal_stage(result))
    }

    pub fn retrieve(&mut self, exile_id: PartId) -> Result<UnburdeningResult> {
        let result = self
            .unburdening
            .retrieve(&self.parts, &self.self_model, &self.policy, exile_id)?;
        Ok(self.journal_stage(result))
    }

    pub fn reparent(&mut self, exile_id: PartId, needed: impl Into<String>) -> Result<UnburdeningResult> {
        let result = self.unburdening.reparent(
            &self.parts,
            &self.self_model,
            &self.policy,
            exile_id,
            needed,
        )?;
        Ok(self.journal_stage(result))
    }

    pub fn purge(&mut self, exile_id: PartId, element: Element) -> Result<UnburdeningResult> {
        let result = self.unburdening.purge(
            &mut self.parts,
            &self.self_model,
            &self.policy,
            exile_id,
            element,
        )?;
        if result.released_burden.is_some() {
            self.journal.record(
                JournalEvent::Transition,
                Some(exile_id),
                format!("-> {}", ExileState::Unburdened),
            );
        }
        Ok(self.journal_stage(result))
    }

    pub fn invite(&mut self, exile_id: PartId, qualities: Vec<String>) -> Result<UnburdeningResult> {
        let result = self.unburdening.invite(
            &mut self.parts,
            &self.self_model,
            &self.policy,
            exile_id,
            qualities,
        )?;
        Ok(self.journal_stage(result))
    }

    fn journal_stage(&mut self, result: UnburdeningResult) -> UnburdeningResult {
        self.journal.record(
            JournalEvent::Unburdening,
            Some(result.exile_id),
            format!("{}: {}", result.stage, result.notes),
        );
        result
    }

    // ========================================================================
    // Dialogue
    // ========================================================================

    /// Self speaks to a Part through the bound provider. Gated like
    /// Feel-Toward.
    pub fn speak_as(&mut self, part_id: PartId, message: &str) -> Result<String> {
        let current_step = match self.six_fs.target() {
            Some(target) if target == part_id => self.six_fs.current_step().map(|s| s.to_string()),
            _ => None,
        };
        let dialogue = self.dialogue.as_mut().ok_or(IfsError::DialogueUnavailable)?;
        let response = dialogue.speak_as(
            &self.parts,
            &self.self_model,
            &self.policy,
            part_id,
            message,
            current_step,
        )?;
        self.journal.record(
            JournalEvent::Dialogue,
            Some(part_id),
            format!("Self: '{}'", message),
        );
        Ok(response)
    }

    /// A therapist speaks to a Part directly, bypassing the gate.
    pub fn direct_access(&mut self, part_id: PartId, message: &str) -> Result<String> {
        let dialogue = self.dialogue.as_mut().ok_or(IfsError::DialogueUnavailable)?;
        let response = dialogue.direct_access(&self.parts, &self.self_model, part_id, message)?;
        self.journal.record(
            JournalEvent::DirectAccess,
            Some(part_id),
            format!("Therapist: '{}'", message),
        );
        Ok(response)
    }

    pub fn dialogue_history(&self, part_id: PartId) -> &[DialogueMessage] {
        match &self.dialogue {
            Some(dialogue) => dialogue.history(part_id),
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::TemplateProvider;
    use crate::error::ErrorKind;
    use crate::parts::{Burden, BurdenKind, Exile, Firefighter, Manager, ManagerState};
    use crate::unburdening::UnburdeningStage;
    use crate::workflow::TrailheadKind;

    fn assert_send<T: Send>() {}

    #[test]
    fn test_session_is_send() {
        assert_send::<Session>();
    }

    fn uniform(factor: f64) -> BTreeMap<SelfQuality, f64> {
        SelfQuality::ALL.iter().map(|q| (*q, factor)).collect()
    }

    #[test]
    fn test_blend_and_unblend_energy() {
        let mut session = Session::new();
        let p = session
            .add_part(Part::manager("critic", 12, "x", Manager::new(0.5)))
            .unwrap();
        let energy = session.blend(p, 0.7, uniform(0.7)).unwrap();
        assert!((energy - 0.3).abs() < 1e-9);
        assert!(!session.is_self_led());

        assert!(session.unblend(p));
        assert!(!session.unblend(p));
        assert_eq!(session.energy(), 1.0);
        assert_eq!(session.journal().of_type(JournalEvent::Unblend).count(), 1);
    }

    #[test]
    fn test_manager_scan_and_illegal_request() {
        let mut session = Session::new();
        let m = session
            .add_part(Part::manager(
                "critic",
                12,
                "x",
                Manager::new(0.7).with_triggers(["criticism"]),
            ))
            .unwrap();
        let outcome = session
            .scan(m, &Stimulus::new("harsh criticism at work", 0.8))
            .unwrap();
        assert_eq!(outcome.state, ManagerState::Blocking);
        assert_eq!(outcome.transitions.len(), 2);

        let err = session
            .transition(m, PartState::Manager(ManagerState::Scanning), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
        assert_eq!(session.journal().of_type(JournalEvent::Transition).count(), 2);
    }

    #[test]
    fn test_full_engagement_and_unburdening() {
        let mut session = Session::new();
        let critic = session
            .add_part(Part::manager("critic", 12, "keep me safe", Manager::new(0.7)))
            .unwrap();
        let numbing = session
            .add_part(Part::firefighter("numbing", 15, "stop the pain", Firefighter::new(0.6)))
            .unwrap();
        let child = session
            .add_part(Part::exile(
                "child",
                7,
                "hold the shame",
                Exile::new(0.8).with_burden(Burden::new(
                    BurdenKind::Personal,
                    "Age 7",
                    "I am not enough",
                    0.9,
                )),
            ))
            .unwrap();
        session.add_edge(Edge::protects(critic, child)).unwrap();
        session.add_edge(Edge::protects(numbing, child)).unwrap();

        session
            .find(critic, Trailhead::new(TrailheadKind::Somatic, 0.7, "tight jaw"))
            .unwrap();
        session.focus(critic).unwrap();
        session.flesh_out(critic).unwrap();
        let gate = session.feel_toward(critic).unwrap();
        assert_eq!(gate.next_step, Some(SixFsStep::Befriend));
        session.befriend(critic).unwrap();
        let fear = session
            .fear(critic, vec!["I'd be humiliated".into()])
            .unwrap();
        assert!(fear.notes.starts_with("Protects 1 Part(s)"));
        assert!(session.six_fs().is_complete());
        assert!((session.part(critic).unwrap().trust_level - 0.6).abs() < 1e-9);

        session.witness(child).unwrap();
        session.retrieve(child).unwrap();
        session.reparent(child, "to be told I was enough").unwrap();
        let purged = session.purge(child, Element::Light).unwrap();
        assert!(purged.released_burden.is_some());
        let done = session.invite(child, vec!["playfulness".into()]).unwrap();
        assert_eq!(done.next_stage, Some(UnburdeningStage::Complete));

        let exile = session.part(child).unwrap().as_exile().unwrap();
        assert_eq!(exile.state, ExileState::Unburdened);
        assert!(exile.burden.is_none());

        let err = session.witness(child).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PipelineAlreadyComplete);

        let map = session.parts_map();
        assert_eq!(map.nodes.len(), session.parts().len());
        assert_eq!(map.edges.len(), session.graph().len());
        assert_eq!(session.journal().of_type(JournalEvent::SixFs).count(), 6);
        assert_eq!(session.journal().of_type(JournalEvent::Unburdening).count(), 5);
    }

    #[test]
    fn test_feel_toward_gate_through_session() {
        let mut session = Session::new();
        let x = session
            .add_part(Part::manager("planner", 30, "x", Manager::new(0.5)))
            .unwrap();
        let y = session
            .add_part(Part::firefighter("rage", 16, "y", Firefighter::new(0.4)))
            .unwrap();
        session.blend(y, 0.9, uniform(0.8)).unwrap();
        assert!((session.energy() - 0.2).abs() < 1e-9);

        session
            .find(x, Trailhead::new(TrailheadKind::Cognitive, 0.5, "spiraling plans"))
            .unwrap();
        session.focus(x).unwrap();
        session.flesh_out(x).unwrap();
        let blocked = session.feel_toward(x).unwrap();
        assert_eq!(blocked.unblend_required, Some(y));
        assert_eq!(blocked.next_step, None);

        session.unblend(y);
        let passed = session.feel_toward(x).unwrap();
        assert_eq!(passed.next_step, Some(SixFsStep::Befriend));
    }

    #[test]
    fn test_purge_without_burden_leaves_state() {
        let mut session = Session::new();
        let e = session
            .add_part(Part::exile("child", 6, "x", Exile::new(0.6)))
            .unwrap();
        session.witness(e).unwrap();
        session.retrieve(e).unwrap();
        session.reparent(e, "safety").unwrap();
        let err = session.purge(e, Element::Water).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(
            session.part(e).unwrap().as_exile().unwrap().state,
            ExileState::Isolated
        );
    }

    #[test]
    fn test_dialogue_requires_provider() {
        let mut session = Session::new();
        let p = session
            .add_part(Part::manager("critic", 12, "keep me safe", Manager::new(0.5)))
            .unwrap();
        let err = session.speak_as(p, "hello").unwrap_err();
        assert_eq!(err, IfsError::DialogueUnavailable);
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(session.dialogue_history(p).is_empty());

        session.bind_dialogue(Arc::new(TemplateProvider));
        let reply = session.speak_as(p, "hello").unwrap();
        assert!(reply.contains("keep me safe"));
        session.direct_access(p, "and you?").unwrap();
        assert_eq!(session.dialogue_history(p).len(), 4);
        assert_eq!(session.journal().of_type(JournalEvent::DirectAccess).count(), 1);
        assert_eq!(session.summary().dialogue.as_deref(), Some("template"));
    }

    #[test]
    fn test_containment_uses_self_energy() {
        let mut session = Session::new();
        let blocker = session
            .add_part(Part::manager("critic", 12, "x", Manager::new(0.5)))
            .unwrap();
        let e = session
            .add_part(Part::exile("child", 6, "x", Exile::new(0.8)))
            .unwrap();
        session.blend(blocker, 0.5, BTreeMap::new()).unwrap();

        let hop = session.check_containment(e).unwrap().unwrap();
        assert_eq!(hop.to, ExileState::Leaking);
        assert!(session.part(e).unwrap().visible);
        let hop = session.check_containment(e).unwrap().unwrap();
        assert_eq!(hop.to, ExileState::Flooding);
    }
}
