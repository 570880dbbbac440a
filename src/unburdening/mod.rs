//! # Unburdening pipeline
//!
//! The ritual that permanently releases an Exile's burden:
//!
//! ```text
//! WITNESSING → RETRIEVAL → REPARENTING → PURGING → INVITATION → COMPLETE
//! ```
//!
//! Witnessing and retrieval are markers that make the pipeline auditable;
//! they change nothing. Reparenting records what the Exile needed back
//! then. Purging clears the burden, lowers the Exile's live charge to the
//! policy's residual and marks it unburdened. Invitation appends the
//! qualities the Exile takes in and completes the pipeline, after which
//! every further call for that Exile fails.
//!
//! Progress is tracked per Exile, so several Exiles can be mid-pipeline at
//! once. Sequencing against the Six Fs is the caller's business.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{GateReading, InteractionPolicy};
use crate::error::{IfsError, Result};
use crate::parts::{Burden, ExileState, PartId, PartKind, PartRegistry};
use crate::self_model::SelfModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnburdeningStage {
    Witnessing,
    Retrieval,
    Reparenting,
    Purging,
    Invitation,
    Complete,
}

impl UnburdeningStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnburdeningStage::Witnessing => "witnessing",
            UnburdeningStage::Retrieval => "retrieval",
            UnburdeningStage::Reparenting => "reparenting",
            UnburdeningStage::Purging => "purging",
            UnburdeningStage::Invitation => "invitation",
            UnburdeningStage::Complete => "complete",
        }
    }

    pub fn next(self) -> Option<UnburdeningStage> {
        use UnburdeningStage::*;
        match self {
            Witnessing => Some(Retrieval),
            Retrieval => Some(Reparenting),
            Reparenting => Some(Purging),
            Purging => Some(Invitation),
            Invitation => Some(Complete),
            Complete => None,
        }
    }
}

impl fmt::Display for UnburdeningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The medium that carries a burden away. Narrative only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Fire,
    Water,
    Wind,
    Earth,
    Light,
}

/// Outcome of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnburdeningResult {
    pub stage: UnburdeningStage,
    pub exile_id: PartId,
    /// Next legal stage, or `None` when the caller must unblend first.
    pub next_stage: Option<UnburdeningStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unblend_required: Option<PartId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateReading>,
    /// The burden released by purging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_burden: Option<Burden>,
    pub notes: String,
}

/// What the pipeline remembers about one Exile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExileProgress {
    /// Last stage completed.
    pub completed: Option<UnburdeningStage>,
    /// What the Exile needed and did not get, from reparenting.
    pub needed: Option<String>,
    pub element: Option<Element>,
}

impl ExileProgress {
    fn expected(&self) -> Option<UnburdeningStage> {
        match self.completed {
            None => Some(UnburdeningStage::Witnessing),
            Some(stage) => stage.next(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UnburdeningPipeline {
    progress: HashMap<PartId, ExileProgress>,
}

impl UnburdeningPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self, exile_id: PartId) -> Option<&ExileProgress> {
        self.progress.get(&exile_id)
    }

    pub fn is_complete(&self, exile_id: PartId) -> bool {
        self.progress(exile_id)
            .map(|p| p.completed == Some(UnburdeningStage::Complete))
            .unwrap_or(false)
    }

    /// Stage 1: Self sees and acknowledges what the Exile experienced.
    pub fn witness(
        &mut self,
        parts: &PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        exile_id: PartId,
    ) -> Result<UnburdeningResult> {
        if let Some(blocked) = self.enter(parts, self_model, policy, exile_id, UnburdeningStage::Witnessing)? {
            return Ok(blocked);
        }
        log::info!("Unburdening started for exile {}", exile_id);
        Ok(self.advance(exile_id, UnburdeningStage::Witnessing, "The Exile's story has been witnessed".into()))
    }

    /// Stage 2: Self goes to where the Exile is stuck in the past.
    pub fn retrieve(
        &mut self,
        parts: &PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        exile_id: PartId,
    ) -> Result<UnburdeningResult> {
        if let Some(blocked) = self.enter(parts, self_model, policy, exile_id, UnburdeningStage::Retrieval)? {
            return Ok(blocked);
        }
        Ok(self.advance(exile_id, UnburdeningStage::Retrieval, "The Exile has been retrieved".into()))
    }

    /// Stage 3: record what the Exile needed and did not receive.
    pub fn reparent(
        &mut self,
        parts: &PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        exile_id: PartId,
        needed: impl Into<String>,
    ) -> Result<UnburdeningResult> {
        let needed = needed.into();
        if needed.trim().is_empty() {
            return Err(IfsError::validation("needed", "must not be empty"));
        }
        if let Some(blocked) = self.enter(parts, self_model, policy, exile_id, UnburdeningStage::Reparenting)? {
            return Ok(blocked);
        }
        let notes = format!("Needed: {}", needed);
        self.progress.entry(exile_id).or_default().needed = Some(needed);
        Ok(self.advance(exile_id, UnburdeningStage::Reparenting, notes))
    }

    /// Stage 4: release the burden through `element`.
    ///
    /// Fails with a precondition error, leaving the Exile untouched, when it
    /// carries no burden.
    pub fn purge(
        &mut self,
        parts: &mut PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        exile_id: PartId,
        element: Element,
    ) -> Result<UnburdeningResult> {
        let has_burden = parts
            .get(exile_id)?
            .as_exile()
            .map(|e| e.burden.is_some())
            .unwrap_or(false);
        if let Some(blocked) = self.enter(parts, self_model, policy, exile_id, UnburdeningStage::Purging)? {
            return Ok(blocked);
        }
        if !has_burden {
            return Err(IfsError::NoBurdenToRelease(exile_id));
        }

        let exile = parts.get_mut(exile_id)?.exile_mut()?;
        let from = exile.state;
        let released = exile.release_burden(policy.residual_charge);
        log::info!(
            "Exile {} unburdened through {:?} ({} -> {})",
            exile_id,
            element,
            from,
            ExileState::Unburdened
        );

        self.progress.entry(exile_id).or_default().element = Some(element);
        let notes = match &released {
            Some(burden) => format!("Released '{}' to {:?}", burden.content, element),
            None => format!("Released to {:?}", element),
        };
        let mut result = self.advance(exile_id, UnburdeningStage::Purging, notes);
        result.released_burden = released;
        Ok(result)
    }

    /// Stage 5: the Exile takes in new qualities. Completes the pipeline.
    pub fn invite(
        &mut self,
        parts: &mut PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        exile_id: PartId,
        qualities: Vec<String>,
    ) -> Result<UnburdeningResult> {
        if let Some(blocked) = self.enter(parts, self_model, policy, exile_id, UnburdeningStage::Invitation)? {
            return Ok(blocked);
        }
        let notes = format!("Invited: {}", qualities.join(", "));
        parts
            .get_mut(exile_id)?
            .exile_mut()?
            .invited_qualities
            .extend(qualities);

        self.progress.entry(exile_id).or_default().completed = Some(UnburdeningStage::Complete);
        log::info!("Unburdening complete for exile {}", exile_id);
        Ok(UnburdeningResult {
            stage: UnburdeningStage::Invitation,
            exile_id,
            next_stage: Some(UnburdeningStage::Complete),
            unblend_required: None,
            gate: None,
            released_burden: None,
            notes,
        })
    }

    /// Shared checks for every stage. Returns `Some(result)` when the
    /// optional Self-led gate holds the pipeline back.
    fn enter(
        &self,
        parts: &PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        exile_id: PartId,
        stage: UnburdeningStage,
    ) -> Result<Option<UnburdeningResult>> {
        let part = parts.get(exile_id)?;
        if part.kind() != PartKind::Exile {
            return Err(IfsError::WrongPartKind {
                part_id: exile_id,
                expected: PartKind::Exile.to_string(),
                actual: part.kind().to_string(),
            });
        }
        if self.is_complete(exile_id) {
            return Err(IfsError::PipelineAlreadyComplete(exile_id));
        }
        let progress = self.progress.get(&exile_id).cloned().unwrap_or_default();
        if progress.expected() != Some(stage) {
            let reason = match progress.completed {
                Some(done) => format!("last completed stage is {}", done),
                None => "pipeline not started; witness first".to_string(),
            };
            return Err(IfsError::precondition(stage.as_str(), reason));
        }

        if !policy.unburdening_requires_self_led {
            return Ok(None);
        }
        let reading = policy.gate(self_model);
        if reading.passed {
            return Ok(None);
        }
        let interfering = self_model
            .most_blended(Some(exile_id))
            .or_else(|| self_model.most_blended(None))
            .map(|b| b.part_id);
        Ok(Some(UnburdeningResult {
            stage,
            exile_id,
            next_stage: None,
            unblend_required: interfering,
            gate: Some(reading),
            released_burden: None,
            notes: format!(
                "Self-energy insufficient ({:.2} < {:.2}); unblend before {}",
                reading.value, reading.threshold, stage
            ),
        }))
    }

    fn advance(&mut self, exile_id: PartId, stage: UnburdeningStage, notes: String) -> UnburdeningResult {
        self.progress.entry(exile_id).or_default().completed = Some(stage);
        UnburdeningResult {
            stage,
            exile_id,
            next_stage: stage.next(),
            unblend_required: None,
            gate: None,
            released_burden: None,
            notes,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::ErrorKind;
    use crate::parts::{BurdenKind, Exile, Manager, Part};

    struct Fixture {
        parts: PartRegistry,
        self_model: SelfModel,
        policy: InteractionPolicy,
        pipeline: UnburdeningPipeline,
    }

    fn fixture() -> Fixture {
        Fixture {
            parts: PartRegistry::new(),
            self_model: SelfModel::new(),
            policy: InteractionPolicy::default(),
            pipeline: UnburdeningPipeline::new(),
        }
    }

    fn burdened(f: &mut Fixture) -> PartId {
        f.parts
            .add(Part::exile(
                "wounded child",
                7,
                "hold the shame",
                Exile::new(0.8).with_burden(Burden::new(
                    BurdenKind::Personal,
                    "Age 7, school failure",
                    "I am not enough",
                    0.9,
                )),
            ))
            .unwrap()
    }

    fn through_reparenting(f: &mut Fixture, id: PartId) {
        f.pipeline.witness(&f.parts, &f.self_model, &f.policy, id).unwrap();
        f.pipeline.retrieve(&f.parts, &f.self_model, &f.policy, id).unwrap();
        f.pipeline
            .reparent(&f.parts, &f.self_model, &f.policy, id, "to be told I was enough")
            .unwrap();
    }

    #[test]
    fn test_full_pipeline() {
        let mut f = fixture();
        let id = burdened(&mut f);
        through_reparenting(&mut f, id);
        assert_eq!(
            f.pipeline.progress(id).unwrap().needed.as_deref(),
            Some("to be told I was enough")
        );
        // Markers change nothing on the Part.
        assert_eq!(f.parts.get(id).unwrap().as_exile().unwrap().state, ExileState::Isolated);

        let r = f
            .pipeline
            .purge(&mut f.parts, &f.self_model, &f.policy, id, Element::Water)
            .unwrap();
        assert_eq!(r.released_burden.unwrap().content, "I am not enough");
        let exile = f.parts.get(id).unwrap().as_exile().unwrap();
        assert!(exile.burden.is_none());
        assert_eq!(exile.state, ExileState::Unburdened);
        assert!((exile.emotional_charge - 0.1).abs() < 1e-12);

        let r = f
            .pipeline
            .invite(
                &mut f.parts,
                &f.self_model,
                &f.policy,
                id,
                vec!["playfulness".into(), "lightness".into()],
            )
            .unwrap();
        assert_eq!(r.next_stage, Some(UnburdeningStage::Complete));
        assert!(f.pipeline.is_complete(id));
        assert_eq!(
            f.parts.get(id).unwrap().as_exile().unwrap().invited_qualities,
            vec!["playfulness".to_string(), "lightness".to_string()]
        );

        let err = f
            .pipeline
            .purge(&mut f.parts, &f.self_model, &f.policy, id, Element::Fire)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PipelineAlreadyComplete);
        let err = f
            .pipeline
            .invite(&mut f.parts, &f.self_model, &f.policy, id, vec![])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PipelineAlreadyComplete);
    }

    #[test]
    fn test_purge_without_burden() {
        let mut f = fixture();
        let id = f
            .parts
            .add(Part::exile("quiet one", 5, "x", Exile::new(0.6)))
            .unwrap();

        let err = f
            .pipeline
            .purge(&mut f.parts, &f.self_model, &f.policy, id, Element::Fire)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        through_reparenting(&mut f, id);
        let err = f
            .pipeline
            .purge(&mut f.parts, &f.self_model, &f.policy, id, Element::Fire)
            .unwrap_err();
        assert!(matches!(err, IfsError::NoBurdenToRelease(_)));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        let exile = f.parts.get(id).unwrap().as_exile().unwrap();
        assert_eq!(exile.state, ExileState::Isolated);
        assert_eq!(exile.emotional_charge, 0.6);
        assert_eq!(
            f.pipeline.progress(id).unwrap().completed,
            Some(UnburdeningStage::Reparenting)
        );
    }

    #[test]
    fn test_order_and_kind_enforced() {
        let mut f = fixture();
        let id = burdened(&mut f);
        let err = f
            .pipeline
            .retrieve(&f.parts, &f.self_model, &f.policy, id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let mgr = f
            .parts
            .add(Part::manager("critic", 12, "x", Manager::new(0.5)))
            .unwrap();
        let err = f
            .pipeline
            .witness(&f.parts, &f.self_model, &f.policy, mgr)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let err = f
            .pipeline
            .witness(&f.parts, &f.self_model, &f.policy, PartId::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_optional_self_led_gate() {
        let mut f = fixture();
        f.policy.unburdening_requires_self_led = true;
        let id = burdened(&mut f);
        let mgr = f
            .parts
            .add(Part::manager("panicking protector", 10, "x", Manager::new(0.9)))
            .unwrap();
        f.self_model.blend(&f.parts, mgr, 0.8, BTreeMap::new()).unwrap();

        let r = f
            .pipeline
            .witness(&f.parts, &f.self_model, &f.policy, id)
            .unwrap();
        assert_eq!(r.unblend_required, Some(mgr));
        assert!(r.next_stage.is_none());
        assert!(f.pipeline.progress(id).is_none());

        f.self_model.unblend(mgr);
        let r = f
            .pipeline
            .witness(&f.parts, &f.self_model, &f.policy, id)
            .unwrap();
        assert_eq!(r.next_stage, Some(UnburdeningStage::Retrieval));
    }

    #[test]
    fn test_pipelines_are_per_exile() {
        let mut f = fixture();
        let a = burdened(&mut f);
        let b = burdened(&mut f);
        f.pipeline.witness(&f.parts, &f.self_model, &f.policy, a).unwrap();
        f.pipeline.witness(&f.parts, &f.self_model, &f.policy, b).unwrap();
        f.pipeline.retrieve(&f.parts, &f.self_model, &f.policy, b).unwrap();
        assert_eq!(
            f.pipeline.progress(a).unwrap().completed,
            Some(UnburdeningStage::Witnessing)
        );
    }
}
