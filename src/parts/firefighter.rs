//! Firefighter: reactive protector.
//!
//! Firefighters sleep until an Exile's activation breaks past their pain
//! threshold, act, then sit out a refractory period before they can fire
//! again. Time only advances when the caller passes `now`.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{duration_secs, illegal, PartId, Transition};
use crate::error::{ensure_unit, Result};

/// Default pain threshold.
pub const DEFAULT_PAIN_THRESHOLD: f64 = 0.7;

/// Default refractory period (30 minutes).
pub const DEFAULT_REFRACTORY_PERIOD: Duration = Duration::from_secs(30 * 60);

/// Firefighter state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirefighterState {
    #[default]
    Dormant,
    Active,
    Cooldown,
}

impl FirefighterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirefighterState::Dormant => "dormant",
            FirefighterState::Active => "active",
            FirefighterState::Cooldown => "cooldown",
        }
    }

    pub fn can_transition_to(self, next: FirefighterState) -> bool {
        use FirefighterState::*;
        matches!(
            (self, next),
            (Dormant, Active) | (Active, Cooldown) | (Cooldown, Dormant)
        )
    }
}

impl fmt::Display for FirefighterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reactive protector fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firefighter {
    /// Exile activation above which this Firefighter fires (0.0–1.0).
    #[serde(default = "default_pain_threshold")]
    pub pain_threshold: f64,
    /// Extinguishing behaviours, in order of escalation.
    #[serde(default)]
    pub extinguishing_behaviors: Vec<String>,
    /// Time spent active before cooling down, and cooling down before dormancy.
    #[serde(with = "duration_secs", default = "default_refractory")]
    pub refractory_period: Duration,
    #[serde(default)]
    pub state: FirefighterState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_started_at: Option<DateTime<Utc>>,
}

fn default_pain_threshold() -> f64 {
    DEFAULT_PAIN_THRESHOLD
}

fn default_refractory() -> Duration {
    DEFAULT_REFRACTORY_PERIOD
}

impl Default for Firefighter {
    fn default() -> Self {
        Self::new(DEFAULT_PAIN_THRESHOLD)
    }
}

impl Firefighter {
    pub fn new(pain_threshold: f64) -> Self {
        Self {
            pain_threshold,
            extinguishing_behaviors: Vec::new(),
            refractory_period: DEFAULT_REFRACTORY_PERIOD,
            state: FirefighterState::Dormant,
            activated_at: None,
            cooldown_started_at: None,
        }
    }

    pub fn with_behaviors<I, S>(mut self, behaviors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extinguishing_behaviors = behaviors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_refractory_period(mut self, period: Duration) -> Self {
        self.refractory_period = period;
        self
    }

    /// React to an Exile's current activation.
    ///
    /// A dormant Firefighter activates when `exile_charge` exceeds its pain
    /// threshold. In any other state the call is a no-op.
    pub fn respond(&mut self, exile_charge: f64, now: DateTime<Utc>) -> Result<Option<Transition<FirefighterState>>> {
        ensure_unit("exile_charge", exile_charge)?;
        if self.state != FirefighterState::Dormant || exile_charge <= self.pain_threshold {
            return Ok(None);
        }
        self.enter(FirefighterState::Active, now);
        Ok(Some(Transition::new(FirefighterState::Dormant, FirefighterState::Active)))
    }

    /// Advance the refractory clock to `now`.
    ///
    /// Active → cooldown once the refractory period has elapsed since
    /// activation; cooldown → dormant once it has elapsed again since the
    /// cooldown began. At most one hop per call. A state loaded without its
    /// timestamp starts its clock at the first tick that sees it.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Transition<FirefighterState>> {
        let (stamp, next) = match self.state {
            FirefighterState::Active => (&mut self.activated_at, FirefighterState::Cooldown),
            FirefighterState::Cooldown => (&mut self.cooldown_started_at, FirefighterState::Dormant),
            FirefighterState::Dormant => return None,
        };
        let since = *stamp.get_or_insert(now);
        let elapsed = (now - since).to_std().unwrap_or(Duration::ZERO);
        if elapsed < self.refractory_period {
            return None;
        }
        let from = self.state;
        self.enter(next, now);
        Some(Transition::new(from, next))
    }

    /// Explicitly request a state change.
    pub fn transition_to(
        &mut self,
        part_id: PartId,
        next: FirefighterState,
        now: DateTime<Utc>,
    ) -> Result<Transition<FirefighterState>> {
        if !self.state.can_transition_to(next) {
            return Err(illegal(part_id, self.state, next));
        }
        let from = self.state;
        self.enter(next, now);
        Ok(Transition::new(from, next))
    }

    fn enter(&mut self, next: FirefighterState, now: DateTime<Utc>) {
        match next {
            FirefighterState::Active => {
                self.activated_at = Some(now);
                self.cooldown_started_at = None;
            }
            FirefighterState::Cooldown => self.cooldown_started_at = Some(now),
            FirefighterState::Dormant => {
                self.activated_at = None;
                self.cooldown_started_at = None;
            }
        }
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
