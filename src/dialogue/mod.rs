//! Part dialogue: letting a Part speak through a text generator.
//!
//! The core never depends on a concrete generator. Anything implementing
//! [`DialogueProvider`] can be bound to a session; nothing else in the
//! crate requires one, and every state transition works without it.
//!
//! Two modes:
//!
//! - **Speak as**: Self addresses the Part. Gated like Feel-Toward: if the
//!   gate fails, another Part is blended and must be unblended first.
//! - **Direct access**: a therapist speaks to the Part directly, bypassing
//!   Self. No gate.
//!
//! System prompts are built from the Part's current fields at call time, so
//! they always reflect its present trust and charge.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::InteractionPolicy;
use crate::error::{IfsError, Result};
use crate::parts::{Part, PartId, PartRegistry, PartRole};
use crate::self_model::SelfModel;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueRole {
    Facilitator,
    Part,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueMessage {
    pub role: DialogueRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl DialogueMessage {
    pub fn new(role: DialogueRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything a provider gets besides the Part and the system prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogueContext {
    pub self_energy: f64,
    /// The Six Fs step in progress, if the exchange happens inside one.
    pub current_step: Option<String>,
    pub facilitator_message: String,
    pub conversation_history: Vec<DialogueMessage>,
    pub is_direct_access: bool,
}

// ============================================================================
// Provider
// ============================================================================

/// A text generator that can voice a Part.
///
/// Implementations render the Part's perspective into words; they must not
/// change any simulation state.
pub trait DialogueProvider: Send + Sync + fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &str {
        "provider"
    }

    fn generate_response(
        &self,
        part: &Part,
        context: &DialogueContext,
        system_prompt: &str,
    ) -> Result<String>;
}

/// Deterministic provider that answers from the Part's own fields.
///
/// Useful wherever a voice is wanted without a model behind it.
#[derive(Debug, Clone, Default)]
pub struct TemplateProvider;

impl DialogueProvider for TemplateProvider {
    fn name(&self) -> &str {
        "template"
    }

    fn generate_response(&self, part: &Part, context: &DialogueContext, _system_prompt: &str) -> Result<String> {
        let opener = if context.is_direct_access {
            "Since you're asking me directly:"
        } else {
            "I hear you."
        };
        let detail = match &part.role {
            PartRole::Exile(e) => match &e.burden {
                Some(burden) => format!("I still believe {}.", lowercase_first(&burden.content)),
                None => "I feel lighter now.".to_string(),
            },
            PartRole::Manager(m) => match m.strategies.first() {
                Some(strategy) => format!("That's why I rely on {}.", strategy),
                None => "That's why I stay on guard.".to_string(),
            },
            PartRole::Firefighter(f) => match f.extinguishing_behaviors.first() {
                Some(behavior) => format!("When it gets too much, I turn to {}.", behavior),
                None => "When it gets too much, I put the fire out.".to_string(),
            },
        };
        Ok(format!(
            "{} I'm {} years old and I'm trying to {}. {}",
            opener,
            part.age,
            lowercase_first(&part.intent),
            detail
        ))
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Build the system prompt that asks a generator to speak as `part`.
pub fn build_part_system_prompt(part: &Part, is_direct_access: bool) -> String {
    let mut lines = vec![
        format!(
            "You are a Part in an Internal Family System. You are {}.",
            part.narrative
        ),
        format!(
            "You were formed at age {}. You still see the world from that age.",
            part.age
        ),
        format!("Your protective intent: {}", part.intent),
        format!("Your trust in Self is currently {}.", percent(part.trust_level)),
    ];

    match &part.role {
        PartRole::Manager(m) => {
            if !m.strategies.is_empty() {
                lines.push(format!("Your strategies: {}", m.strategies.join(", ")));
            }
            lines.push(format!("Your rigidity: {}", percent(m.rigidity)));
        }
        PartRole::Firefighter(f) => {
            if !f.extinguishing_behaviors.is_empty() {
                lines.push(format!(
                    "Your emergency behaviors: {}",
                    f.extinguishing_behaviors.join(", ")
                ));
            }
        }
        PartRole::Exile(e) => {
            if let Some(burden) = &e.burden {
                lines.push(format!("You carry this burden: {}", burden.content));
            }
            lines.push(format!("Your emotional charge: {}", percent(e.emotional_charge)));
        }
    }

    lines.push(
        "Speak in first person. Express your feelings and needs authentically. \
         You have positive intent even if your behavior seems harmful."
            .to_string(),
    );
    if is_direct_access {
        lines.push(
            "A therapist is speaking directly to you. You may respond more openly \
             than you would through Self."
                .to_string(),
        );
    }
    lines.join("\n")
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

// ============================================================================
// Orchestrator
// ============================================================================

/// A bound provider plus per-Part conversation history.
#[derive(Debug, Clone)]
pub struct PartDialogue {
    provider: Arc<dyn DialogueProvider>,
    histories: HashMap<PartId, Vec<DialogueMessage>>,
}

impl PartDialogue {
    pub fn new(provider: Arc<dyn DialogueProvider>) -> Self {
        Self {
            provider,
            histories: HashMap::new(),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Self speaks to a Part and the Part answers. Requires the Self-led
    /// gate to pass.
    pub fn speak_as(
        &mut self,
        parts: &PartRegistry,
        self_model: &SelfModel,
        policy: &InteractionPolicy,
        part_id: PartId,
        message: &str,
        current_step: Option<String>,
    ) -> Result<String> {
        let part = parts.get(part_id)?;
        let reading = policy.gate(self_model);
        if !reading.passed {
            return Err(IfsError::precondition(
                "speak_as",
                format!(
                    "Self-energy too low for dialogue ({:.2} < {:.2}); unblend first",
                    reading.value, reading.threshold
                ),
            ));
        }
        self.exchange(part, self_model, message, current_step, false)
    }

    /// A therapist speaks to the Part directly. No gate.
    pub fn direct_access(
        &mut self,
        parts: &PartRegistry,
        self_model: &SelfModel,
        part_id: PartId,
        message: &str,
    ) -> Result<String> {
        let part = parts.get(part_id)?;
        self.exchange(part, self_model, message, None, true)
    }

    pub fn history(&self, part_id: PartId) -> &[DialogueMessage] {
        self.histories
            .get(&part_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn clear_history(&mut self, part_id: PartId) {
        self.histories.remove(&part_id);
    }

    fn exchange(
        &mut self,
        part: &Part,
        self_model: &SelfModel,
        message: &str,
        current_step: Option<String>,
        is_direct_access: bool,
    ) -> Result<String> {
        let system_prompt = build_part_system_prompt(part, is_direct_access);
        let context = DialogueContext {
            self_energy: self_model.energy(),
            current_step,
            facilitator_message: message.to_string(),
            conversation_history: self.history(part.id).to_vec(),
            is_direct_access,
        };
        let response = self
            .provider
            .generate_response(part, &context, &system_prompt)?;
        log::debug!(
            "{} voiced part {} ({} chars)",
            self.provider.name(),
            part.id,
            response.len()
        );

        let history = self.histories.entry(part.id).or_default();
        history.push(DialogueMessage::new(DialogueRole::Facilitator, message));
        history.push(DialogueMessage::new(DialogueRole::Part, response.clone()));
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::error::ErrorKind;
    use crate::parts::{Burden, BurdenKind, Exile, Manager};

    /// Records what it was asked and replies with a canned line.
    #[derive(Debug, Default)]
    struct Recording {
        seen: Mutex<Vec<(String, usize, bool)>>,
    }

    impl DialogueProvider for Recording {
        fn generate_response(&self, _part: &Part, context: &DialogueContext, system_prompt: &str) -> Result<String> {
            self.seen.lock().unwrap().push((
                system_prompt.to_string(),
                context.conversation_history.len(),
                context.is_direct_access,
            ));
            Ok("I keep you safe.".into())
        }
    }

    fn critic() -> Part {
        Part::manager(
            "the inner critic",
            12,
            "Keep me from being rejected",
            Manager::new(0.8).with_strategies(["perfectionism"]),
        )
    }

    #[test]
    fn test_system_prompt_reflects_part() {
        let prompt = build_part_system_prompt(&critic(), false);
        assert!(prompt.contains("You are the inner critic."));
        assert!(prompt.contains("formed at age 12"));
        assert!(prompt.contains("Your strategies: perfectionism"));
        assert!(prompt.contains("Your trust in Self is currently 50%."));
        assert!(prompt.contains("Your rigidity: 80%"));
        assert!(!prompt.contains("therapist"));

        let exile = Part::exile(
            "a lonely child",
            6,
            "hold the loneliness",
            Exile::new(0.7).with_burden(Burden::new(BurdenKind::Personal, "x", "Nobody wants me", 0.9)),
        );
        let prompt = build_part_system_prompt(&exile, true);
        assert!(prompt.contains("You carry this burden: Nobody wants me"));
        assert!(prompt.contains("Your emotional charge: 70%"));
        assert!(prompt.contains("A therapist is speaking directly to you."));
    }

    #[test]
    fn test_speak_as_tracks_history() {
        let mut parts = PartRegistry::new();
        let id = parts.add(critic()).unwrap();
        let provider = Arc::new(Recording::default());
        let mut dialogue = PartDialogue::new(provider.clone());
        let model = SelfModel::new();
        let policy = InteractionPolicy::default();

        dialogue
            .speak_as(&parts, &model, &policy, id, "What do you do for me?", Some("befriend".into()))
            .unwrap();
        dialogue
            .speak_as(&parts, &model, &policy, id, "Thank you.", None)
            .unwrap();

        let history = dialogue.history(id);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, DialogueRole::Facilitator);
        assert_eq!(history[1].content, "I keep you safe.");
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[1].1, 2);

        drop(seen);
        dialogue.clear_history(id);
        assert!(dialogue.history(id).is_empty());
    }

    #[test]
    fn test_speak_as_gated_direct_access_not() {
        let mut parts = PartRegistry::new();
        let id = parts.add(critic()).unwrap();
        let mut model = SelfModel::new();
        model.blend(&parts, id, 0.9, BTreeMap::new()).unwrap();
        let policy = InteractionPolicy::default();
        let mut dialogue = PartDialogue::new(Arc::new(TemplateProvider));

        let err = dialogue
            .speak_as(&parts, &model, &policy, id, "Hello", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(dialogue.history(id).is_empty());

        let reply = dialogue.direct_access(&parts, &model, id, "Hello").unwrap();
        assert!(reply.starts_with("Since you're asking me directly:"));
        assert!(reply.contains("keep me from being rejected"));
        assert!(reply.contains("perfectionism"));
    }

    #[test]
    fn test_unknown_part() {
        let parts = PartRegistry::new();
        let mut dialogue = PartDialogue::new(Arc::new(TemplateProvider));
        let err = dialogue
            .direct_access(&parts, &SelfModel::new(), PartId::new(), "hi")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
