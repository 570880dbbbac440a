//! Manager: proactive protector.
//!
//! Managers scan incoming stimuli for their trigger patterns and escalate
//! to blocking when the caller-assessed risk exceeds what their rigidity
//! tolerates:
//!
//! ```text
//! IDLE ──(trigger match)──▶ SCANNING ──(risk > 1 − rigidity)──▶ BLOCKING
//!   ▲                          │                                   │
//!   └──────(stand down)────────┘◀──────────(threat resolved)───────┘
//! ```

use std::fmt;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use super::{illegal, PartId, Transition};
use crate::error::{ensure_unit, Result};

/// Default rigidity for a Manager built without one.
pub const DEFAULT_RIGIDITY: f64 = 0.5;

/// Manager state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    #[default]
    Idle,
    Scanning,
    Blocking,
}

impl ManagerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerState::Idle => "idle",
            ManagerState::Scanning => "scanning",
            ManagerState::Blocking => "blocking",
        }
    }

    /// Whether `next` is adjacent to `self`.
    pub fn can_transition_to(self, next: ManagerState) -> bool {
        use ManagerState::*;
        matches!(
            (self, next),
            (Idle, Scanning) | (Scanning, Blocking) | (Scanning, Idle) | (Blocking, Idle)
        )
    }
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stimulus presented to a Manager's `scan`.
///
/// `risk` is assessed by the caller; the core never infers it from `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub text: String,
    #[serde(default)]
    pub risk: f64,
}

impl Stimulus {
    pub fn new(text: impl Into<String>, risk: f64) -> Self {
        Self {
            text: text.into(),
            risk,
        }
    }
}

/// What a single `scan` call did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// The first trigger pattern that matched the stimulus, if any.
    pub matched_trigger: Option<String>,
    /// Every hop performed, in order (at most two).
    pub transitions: Vec<Transition<ManagerState>>,
    /// State after the scan.
    pub state: ManagerState,
}

/// Proactive protector fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manager {
    /// Input patterns (case-insensitive regular expressions) that start scanning.
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Pre-emptive strategies, in order of preference.
    #[serde(default)]
    pub strategies: Vec<String>,
    /// Resistance to change (0.0–1.0). Higher rigidity blocks at lower risk.
    #[serde(default = "default_rigidity")]
    pub rigidity: f64,
    #[serde(default)]
    pub state: ManagerState,
}

fn default_rigidity() -> f64 {
    DEFAULT_RIGIDITY
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(DEFAULT_RIGIDITY)
    }
}

impl Manager {
    pub fn new(rigidity: f64) -> Self {
        Self {
            triggers: Vec::new(),
            strategies: Vec::new(),
            rigidity,
            state: ManagerState::Idle,
        }
    }

    pub fn with_triggers<I, S>(mut self, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers = triggers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strategies<I, S>(mut self, strategies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strategies = strategies.into_iter().map(Into::into).collect();
        self
    }

    /// Risk above which a scanning Manager starts blocking.
    pub fn block_threshold(&self) -> f64 {
        1.0 - self.rigidity
    }

    /// First trigger matching `text`. Patterns that are not valid regular
    /// expressions are matched literally.
    pub fn matching_trigger(&self, text: &str) -> Option<&str> {
        self.triggers
            .iter()
            .find(|pattern| {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .or_else(|_| {
                        RegexBuilder::new(&regex::escape(pattern))
                            .case_insensitive(true)
                            .build()
                    });
                regex.map(|r| r.is_match(text)).unwrap_or(false)
            })
            .map(String::as_str)
    }

    /// Present a stimulus.
    ///
    /// An idle Manager starts scanning when a trigger matches. A scanning
    /// Manager (including one that just started) blocks when
    /// `risk > 1 − rigidity`. A blocking Manager stays blocking until the
    /// threat is resolved.
    pub fn scan(&mut self, stimulus: &Stimulus) -> Result<ScanOutcome> {
        ensure_unit("risk", stimulus.risk)?;

        let matched_trigger = self.matching_trigger(&stimulus.text).map(str::to_string);
        let mut transitions = Vec::new();

        if self.state == ManagerState::Idle && matched_trigger.is_some() {
            transitions.push(Transition::new(ManagerState::Idle, ManagerState::Scanning));
            self.state = ManagerState::Scanning;
        }

        if self.state == ManagerState::Scanning && stimulus.risk > self.block_threshold() {
            transitions.push(Transition::new(ManagerState::Scanning, ManagerState::Blocking));
            self.state = ManagerState::Blocking;
        }

        Ok(ScanOutcome {
            matched_trigger,
            transitions,
            state: self.state,
        })
    }

    /// Explicitly request a state change.
    pub fn transition_to(&mut self, part_id: PartId, next: ManagerState) -> Result<Transition<ManagerState>> {
        if !self.state.can_transition_to(next) {
            return Err(illegal(part_id, self.state, next));
        }
        let hop = Transition::new(self.state, next);
        self.state = next;
        Ok(hop)
    }

    /// The threat has passed: return to idle from blocking (or scanning).
    pub fn resolve_threat(&mut self, part_id: PartId) -> Result<Transition<ManagerState>> {
        self.transition_to(part_id, ManagerState::Idle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
