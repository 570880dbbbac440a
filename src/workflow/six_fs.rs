//! The Six Fs: sequential engagement with one protector.
//!
//! ```text
//! FIND → FOCUS → FLESH_OUT → FEEL_TOWARD ──(gate passes)──▶ BEFRIEND → FEAR
//!                                 │
//!                                 └─(gate fails)─▶ unblend_required = P
//!                                    caller unblends P, then re-invokes
//! ```
//!
//! Each call names the target Part and must follow the previously completed
//! step; anything else is a precondition failure. Find (re)starts an
//! engagement at any time. The Feel-Toward gate never retries on its own: a
//! failing gate names the Part to unblend and leaves the workflow where it
//! was.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::trailhead::{Trailhead, TrailheadLog};
use crate::config::{GateReading, InteractionPolicy};
use crate::error::{IfsError, Result};
use crate::graph::RelationshipGraph;
use crate::parts::{PartId, PartRegistry};
use crate::self_model::SelfModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SixFsStep {
    Find,
    Focus,
    FleshOut,
    FeelToward,
    Befriend,
    Fear,
}

impl SixFsStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SixFsStep::Find => "find",
            SixFsStep::Focus => "focus",
            SixFsStep::FleshOut => "flesh_out",
            SixFsStep::FeelToward => "feel_toward",
            SixFsStep::Befriend => "befriend",
            SixFsStep::Fear => "fear",
        }
    }

    /// The step that follows this one; `None` after Fear.
    pub fn next(self) -> Option<SixFsStep> {
        match self {
            SixFsStep::Find => Some(SixFsStep::Focus),
            SixFsStep::Focus => Some(SixFsStep::FleshOut),
            SixFsStep::FleshOut => Some(SixFsStep::FeelToward),
            SixFsStep::FeelToward => Some(SixFsStep::Befriend),
            SixFsStep::Befriend => Some(SixFsStep::Fear),
            SixFsStep::Fear => None,
        }
    }
}

impl fmt::Display for SixFsStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SixFsResult {
    pub step: SixFsStep,
    pub target_part_id: PartId,
    /// The next legal step, or `None` when the caller must act first (failed
    /// gate) or the workflow is complete.
    pub next_step: Option<SixFsStep>,
    /// Set when the Feel-Toward gate fails: unblend this Part and retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unblend_required: Option<PartId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateReading>,
    pub notes: String,
}

impl SixFsResult {
    fn advanced(step: SixFsStep, target_part_id: PartId, notes: String) -> Self {
        Self {
            step,
            target_part_id,
            next_step: step.next(),
            unblend_required: None,
            gate: None,
            notes,
        }
    }
}

/// Workflow state: the Part being engaged and the last step it completed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SixFs {
    target: Option<PartId>,
    completed: Option<SixFsStep>,
    /// Worst-case predictions recorded by Fear, per Part.
    predictions: HashMap<PartId, Vec<String>>,
}

impl SixFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<PartId> {
        self.target
    }

    /// The last step completed in the current engagement.
    pub fn current_step(&self) -> Option<SixFsStep> {
        self.completed
    }

    /// The step the workflow will accept next.
    pub fn expected_step(&self) -> Option<SixFsStep> {
        match self.completed {
            None => Some(SixFsStep::Find),
            Some(step) => step.next(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed == Some(SixFsStep::Fear)
    }

    pub fn predictions(&self, part_id: PartId) -> &[String] {
        self.predictions
            .get(&part_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Step 1: locate the Part a trailhead points to. Starts a new
    /// engagement, discarding any in progress.
    pub fn find(
        &mut self,
        parts: &PartRegistry,
        log: &mut TrailheadLog,
        part_id: PartId,
        mut trailhead: Trailhead,
    ) -> Result<SixFsResult> {
        let part = parts.get(part_id)?;
        trailhead.associated_part_id = Some(part_id);
        let notes = format!(
            "Found {} via {:?} trailhead: {}",
            part.kind(),
            trailhead.kind,
            trailhead.description
        );
        log.add(trailhead)?;

        self.target = Some(part_id);
        self.completed = Some(SixFsStep::Find);
        log::info!("Six Fs started with part {}", part_id);
        Ok(SixFsResult::advanced(SixFsStep::Find, part_id, notes))
    }

    /// Step 2: direct attention to the Part.
    pub fn focus(&mut self, parts: &PartRegistry, part_id: PartId) -> Result<SixFsResult> {
        self.ensure_step(parts, part_id, SixFsStep::Focus)?;
        let part = parts.get(part_id)?;
        self.completed = Some(SixFsStep::Focus);
        Ok(SixFsResult::advanced(
            SixFsStep::Focus,
            part_id,
            format!("Focused on: {}", part.narrative),
        ))
    }

    /// Step 3: gather what the Part shares about itself.
    pub fn flesh_out(&mut self, parts: &PartRegistry, part_id: PartId) -> Result<SixFsResult> {
        self.ensure_step(parts, part_id, SixFsStep::FleshOut)?;
        let part = parts.get(part_id)?;
        self.completed = Some(SixFsStep::FleshOut);
        Ok(SixFsResult::advanced(
            SixFsStep::FleshOut,
            part_id,
            format!("Age: {}, Intent: {}", part.age, part.intent),
        ))
    }

    /// Step 4: the Self-led gate.
    ///
    /// If the policy's gate passes the workflow advances to Befriend.
    /// Otherwise whatever feels negatively toward the target is itself a
    /// blended Part: the result names the most blended Part other than the
    /// target (or the target, if it is the only blend) and the workflow
    /// stays at Flesh Out until the caller unblends and retries.
    pub fn feel_toward(
        &mut self,
        parts: &PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        part_id: PartId,
    ) -> Result<SixFsResult> {
        self.ensure_step(parts, part_id, SixFsStep::FeelToward)?;
        let reading = policy.gate(self_model);

        if reading.passed {
            self.completed = Some(SixFsStep::FeelToward);
            let mut result = SixFsResult::advanced(
                SixFsStep::FeelToward,
                part_id,
                format!(
                    "Self is present ({:.2} >= {:.2})",
                    reading.value, reading.threshold
                ),
            );
            result.gate = Some(reading);
            return Ok(result);
        }

        let interfering = self_model
            .most_blended(Some(part_id))
            .or_else(|| self_model.most_blended(None))
            .map(|b| b.part_id);
        log::info!(
            "Feel-toward gate failed for {} ({:.2} < {:.2}); unblend {:?}",
            part_id,
            reading.value,
            reading.threshold,
            interfering
        );
        Ok(SixFsResult {
            step: SixFsStep::FeelToward,
            target_part_id: part_id,
            next_step: None,
            unblend_required: interfering,
            gate: Some(reading),
            notes: format!(
                "Self-energy insufficient ({:.2} < {:.2}); another Part is blended",
                reading.value, reading.threshold
            ),
        })
    }

    /// Step 5: appreciate the Part and raise its trust in Self.
    pub fn befriend(
        &mut self,
        parts: &mut PartRegistry,
        policy: &InteractionPolicy,
        part_id: PartId,
    ) -> Result<SixFsResult> {
        self.ensure_step(parts, part_id, SixFsStep::Befriend)?;
        let trust = parts.get_mut(part_id)?.raise_trust(policy.befriend_increment());
        self.completed = Some(SixFsStep::Befriend);
        Ok(SixFsResult::advanced(
            SixFsStep::Befriend,
            part_id,
            format!("Trust updated to {:.2}", trust),
        ))
    }

    /// Step 6: record what the Part fears would happen if it stopped its
    /// job. Completes the workflow.
    pub fn fear(
        &mut self,
        parts: &PartRegistry,
        graph: &RelationshipGraph,
        part_id: PartId,
        predictions: Vec<String>,
    ) -> Result<SixFsResult> {
        self.ensure_step(parts, part_id, SixFsStep::Fear)?;
        let part = parts.get(part_id)?;
        let protected = graph.protected_by(part_id).len();

        let mut notes = format!("Protects {} Part(s). Part intent: '{}'", protected, part.intent);
        if !predictions.is_empty() {
            notes.push_str(&format!(". Fears: {}", predictions.join("; ")));
        }
        self.predictions
            .entry(part_id)
            .or_default()
            .extend(predictions);
        self.completed = Some(SixFsStep::Fear);
        log::info!("Six Fs complete for part {}", part_id);
        Ok(SixFsResult::advanced(SixFsStep::Fear, part_id, notes))
    }

    fn ensure_step(&self, parts: &PartRegistry, part_id: PartId, step: SixFsStep) -> Result<()> {
        parts.get(part_id)?;
        let operation = step.as_str();
        match self.target {
            None => Err(IfsError::precondition(operation, "no engagement in progress; call find first")),
            Some(target) if target != part_id => Err(IfsError::precondition(
                operation,
                format!("engagement in progress is with part {}", target),
            )),
            Some(_) if self.expected_step() != Some(step) => Err(IfsError::precondition(
                operation,
                match self.completed {
                    Some(done) => format!("last completed step is {}", done),
                    None => "no step completed".to_string(),
                },
            )),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::FivePs;
    use crate::error::ErrorKind;
    use crate::graph::Edge;
    use crate::parts::{Exile, Firefighter, Manager, Part};
    use crate::workflow::TrailheadKind;

    struct Fixture {
        parts: PartRegistry,
        graph: RelationshipGraph,
        self_model: SelfModel,
        log: TrailheadLog,
        policy: InteractionPolicy,
        x: PartId,
        y: PartId,
    }

    fn fixture() -> Fixture {
        let mut parts = PartRegistry::new();
        let x = parts
            .add(Part::manager("inner critic", 12, "keep me safe from rejection", Manager::new(0.7)))
            .unwrap();
        let y = parts
            .add(Part::firefighter("angry one", 15, "push people away", Firefighter::new(0.6)))
            .unwrap();
        let exile = parts.add(Part::exile("lonely child", 6, "x", Exile::new(0.6))).unwrap();
        let mut graph = RelationshipGraph::new();
        graph.add_edge(&parts, Edge::protects(x, exile)).unwrap();
        Fixture {
            parts,
            graph,
            self_model: SelfModel::new(),
            log: TrailheadLog::new(),
            policy: InteractionPolicy::default(),
            x,
            y,
        }
    }

    fn trailhead() -> Trailhead {
        Trailhead::new(TrailheadKind::Somatic, 0.7, "knot in the stomach")
    }

    fn walk_to_feel_toward(f: &mut Fixture, wf: &mut SixFs) {
        wf.find(&f.parts, &mut f.log, f.x, trailhead()).unwrap();
        wf.focus(&f.parts, f.x).unwrap();
        wf.flesh_out(&f.parts, f.x).unwrap();
    }

    #[test]
    fn test_full_run() {
        let mut f = fixture();
        let mut wf = SixFs::new();
        walk_to_feel_toward(&mut f, &mut wf);
        assert_eq!(f.log.by_part(f.x).len(), 1);

        let r = wf.feel_toward(&f.parts, &f.self_model, &f.policy, f.x).unwrap();
        assert_eq!(r.next_step, Some(SixFsStep::Befriend));

        let r = wf.befriend(&mut f.parts, &f.policy, f.x).unwrap();
        assert!((f.parts.get(f.x).unwrap().trust_level - 0.6).abs() < 1e-9);
        assert_eq!(r.next_step, Some(SixFsStep::Fear));

        let r = wf
            .fear(&f.parts, &f.graph, f.x, vec!["I'd be humiliated".into()])
            .unwrap();
        assert!(r.next_step.is_none());
        assert!(r.notes.starts_with("Protects 1 Part(s)"));
        assert!(wf.is_complete());
        assert_eq!(wf.predictions(f.x), ["I'd be humiliated".to_string()]);

        let err = wf.focus(&f.parts, f.x).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_gate_requires_unblend_then_advances() {
        let mut f = fixture();
        let mut wf = SixFs::new();
        walk_to_feel_toward(&mut f, &mut wf);

        let mask = crate::self_model::SelfQuality::ALL
            .into_iter()
            .map(|q| (q, 0.8))
            .collect();
        f.self_model.blend(&f.parts, f.y, 0.9, mask).unwrap();
        assert!((f.self_model.energy() - 0.2).abs() < 1e-9);

        let r = wf.feel_toward(&f.parts, &f.self_model, &f.policy, f.x).unwrap();
        assert_eq!(r.unblend_required, Some(f.y));
        assert!(r.next_step.is_none());
        assert!(!r.gate.unwrap().passed);

        // Still blocked until the caller unblends.
        let err = wf.befriend(&mut f.parts, &f.policy, f.x).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        f.self_model.unblend(f.y);
        let r = wf.feel_toward(&f.parts, &f.self_model, &f.policy, f.x).unwrap();
        assert_eq!(r.next_step, Some(SixFsStep::Befriend));
        assert!(r.unblend_required.is_none());
    }

    #[test]
    fn test_target_named_when_only_blend() {
        let mut f = fixture();
        let mut wf = SixFs::new();
        walk_to_feel_toward(&mut f, &mut wf);
        f.self_model.blend(&f.parts, f.x, 0.8, BTreeMap::new()).unwrap();
        let r = wf.feel_toward(&f.parts, &f.self_model, &f.policy, f.x).unwrap();
        assert_eq!(r.unblend_required, Some(f.x));
    }

    #[test]
    fn test_five_ps_lower_the_gate() {
        let mut f = fixture();
        f.policy = InteractionPolicy::default().with_five_ps(FivePs {
            presence: 1.0,
            patience: 1.0,
            ..FivePs::default()
        });
        let mut wf = SixFs::new();
        walk_to_feel_toward(&mut f, &mut wf);
        // energy 0.4 → effective 0.48 against threshold 0.35
        f.self_model.blend(&f.parts, f.y, 0.6, BTreeMap::new()).unwrap();
        let r = wf.feel_toward(&f.parts, &f.self_model, &f.policy, f.x).unwrap();
        assert_eq!(r.next_step, Some(SixFsStep::Befriend));
    }

    #[test]
    fn test_steps_enforce_order_and_target() {
        let mut f = fixture();
        let mut wf = SixFs::new();

        let err = wf.focus(&f.parts, f.x).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        wf.find(&f.parts, &mut f.log, f.x, trailhead()).unwrap();
        let err = wf
            .feel_toward(&f.parts, &f.self_model, &f.policy, f.x)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let err = wf.focus(&f.parts, f.y).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let err = wf.focus(&f.parts, PartId::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Find restarts with a new target.
        wf.find(&f.parts, &mut f.log, f.y, trailhead()).unwrap();
        assert_eq!(wf.target(), Some(f.y));
        wf.focus(&f.parts, f.y).unwrap();
        assert_eq!(wf.current_step(), Some(SixFsStep::Focus));
    }

    #[test]
    fn test_find_rejects_bad_trailhead() {
        let mut f = fixture();
        let mut wf = SixFs::new();
        let bad = Trailhead::new(TrailheadKind::Visual, 2.0, "x");
        assert!(wf.find(&f.parts, &mut f.log, f.x, bad).is_err());
        assert!(wf.target().is_none());
        assert!(f.log.is_empty());
    }
}
