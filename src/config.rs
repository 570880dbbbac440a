//! Interaction policy: the tunable thresholds and increments.
//!
//! Every field has a default, so an empty YAML document is a valid policy:
//!
//! ```yaml
//! leadership_threshold: 0.5
//! compassion_threshold: 0.5
//! gate_metric: energy        # or: compassion
//! trust_increment: 0.1
//! five_ps:
//!   presence: 0.8
//!   patience: 0.6
//! ```
//!
//! The Five Ps describe the facilitator rather than the system. They scale
//! the Feel-Toward gate and the Befriend increment deterministically;
//! `playfulness` is carried for the record only.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_unit, IfsError, Result};
use crate::self_model::{SelfModel, SelfQuality, DEFAULT_LEADERSHIP_THRESHOLD};

/// Smallest trust increment Befriend will ever apply.
pub const MIN_TRUST_INCREMENT: f64 = 0.01;

/// Which Self Model reading the Feel-Toward gate compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMetric {
    /// Mean energy across all qualities.
    #[default]
    Energy,
    /// The compassion component alone.
    Compassion,
}

/// Facilitator modifiers, each in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FivePs {
    pub presence: f64,
    pub patience: f64,
    pub perspective: f64,
    pub persistence: f64,
    pub playfulness: f64,
}

impl Default for FivePs {
    fn default() -> Self {
        Self {
            presence: 0.5,
            patience: 0.5,
            perspective: 0.5,
            persistence: 0.5,
            playfulness: 0.5,
        }
    }
}

impl FivePs {
    pub fn validate(&self) -> Result<()> {
        ensure_unit("five_ps.presence", self.presence)?;
        ensure_unit("five_ps.patience", self.patience)?;
        ensure_unit("five_ps.perspective", self.perspective)?;
        ensure_unit("five_ps.persistence", self.persistence)?;
        ensure_unit("five_ps.playfulness", self.playfulness)
    }

    /// Patience lowers the gate by up to 30%.
    pub fn effective_threshold(&self, base: f64) -> f64 {
        base * (1.0 - 0.3 * self.patience)
    }

    /// Presence amplifies available energy by up to 20%, capped at 1.0.
    pub fn effective_energy(&self, energy: f64) -> f64 {
        (energy * (1.0 + 0.2 * self.presence)).min(1.0)
    }

    /// Persistence scales the Befriend increment between 0.5× and 1.5×.
    pub fn trust_increment(&self, base: f64) -> f64 {
        (base * (0.5 + self.persistence)).max(MIN_TRUST_INCREMENT)
    }
}

/// One evaluation of the Self-led gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateReading {
    pub metric: GateMetric,
    /// Effective value compared, after Five Ps scaling.
    pub value: f64,
    /// Effective threshold, after Five Ps scaling.
    pub threshold: f64,
    pub passed: bool,
}

/// Thresholds and increments consulted by the workflow, the pipeline and
/// the Self Model's leadership query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionPolicy {
    /// Energy above which the system is Self-led.
    pub leadership_threshold: f64,
    /// Feel-Toward gate threshold.
    pub compassion_threshold: f64,
    pub gate_metric: GateMetric,
    /// Base trust gained per Befriend.
    pub trust_increment: f64,
    /// Charge above which an isolated Exile starts leaking.
    pub leak_threshold: f64,
    /// |r| at which anti-correlated Parts are suggested as polarized.
    pub polarization_threshold: f64,
    /// Trust below which protectors are candidates for structural polarization.
    pub structural_trust_threshold: f64,
    /// Live charge left on an Exile after purge.
    pub residual_charge: f64,
    /// Apply the Feel-Toward gate to every unburdening stage.
    pub unburdening_requires_self_led: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub five_ps: Option<FivePs>,
}

impl Default for InteractionPolicy {
    fn default() -> Self {
        Self {
            leadership_threshold: DEFAULT_LEADERSHIP_THRESHOLD,
            compassion_threshold: 0.5,
            gate_metric: GateMetric::Energy,
            trust_increment: 0.1,
            leak_threshold: 0.5,
            polarization_threshold: crate::graph::DEFAULT_POLARIZATION_THRESHOLD,
            structural_trust_threshold: crate::graph::DEFAULT_STRUCTURAL_TRUST_THRESHOLD,
            residual_charge: 0.1,
            unburdening_requires_self_led: false,
            five_ps: None,
        }
    }
}

impl InteractionPolicy {
    /// Parse and validate a policy from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let policy: Self =
            serde_yaml::from_str(yaml).map_err(|e| IfsError::Config(e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read, parse and validate a policy file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| IfsError::Config(format!("{}: {}", path.display(), e)))?;
        let policy = Self::from_yaml_str(&content)?;
        log::info!("Loaded interaction policy from {}", path.display());
        Ok(policy)
    }

    pub fn with_five_ps(mut self, five_ps: FivePs) -> Self {
        self.five_ps = Some(five_ps);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_unit("leadership_threshold", self.leadership_threshold)?;
        ensure_unit("compassion_threshold", self.compassion_threshold)?;
        ensure_unit("trust_increment", self.trust_increment)?;
        ensure_unit("leak_threshold", self.leak_threshold)?;
        ensure_unit("polarization_threshold", self.polarization_threshold)?;
        ensure_unit("structural_trust_threshold", self.structural_trust_threshold)?;
        ensure_unit("residual_charge", self.residual_charge)?;
        if let Some(five_ps) = &self.five_ps {
            five_ps.validate()?;
        }
        Ok(())
    }

    /// Evaluate the Feel-Toward gate against the current Self Model.
    ///
    /// Passes when the effective reading is at or above the effective
    /// threshold.
    pub fn gate(&self, self_model: &SelfModel) -> GateReading {
        let raw = match self.gate_metric {
            GateMetric::Energy => self_model.energy(),
            GateMetric::Compassion => self_model.energy_of(SelfQuality::Compassion),
        };
        let (value, threshold) = match &self.five_ps {
            Some(ps) => (
                ps.effective_energy(raw),
                ps.effective_threshold(self.compassion_threshold),
            ),
            None => (raw, self.compassion_threshold),
        };
        GateReading {
            metric: self.gate_metric,
            value,
            threshold,
            passed: value >= threshold,
        }
    }

    /// Trust gained by one Befriend.
    pub fn befriend_increment(&self) -> f64 {
        match &self.five_ps {
            Some(ps) => ps.trust_increment(self.trust_increment),
            None => self.trust_increment,
        }
    }

    pub fn is_self_led(&self, self_model: &SelfModel) -> bool {
        self_model.is_self_led_at(self.leadership_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_empty_yaml_is_default() {
        let policy = InteractionPolicy::from_yaml_str("{}").unwrap();
        assert_eq!(policy, InteractionPolicy::default());
        assert_eq!(policy.befriend_increment(), 0.1);
    }

    #[test]
    fn test_partial_yaml() {
        let policy = InteractionPolicy::from_yaml_str(
            "compassion_threshold: 0.4\ngate_metric: compassion\nfive_ps:\n  patience: 1.0\n",
        )
        .unwrap();
        assert_eq!(policy.gate_metric, GateMetric::Compassion);
        let ps = policy.five_ps.unwrap();
        assert_eq!(ps.patience, 1.0);
        assert_eq!(ps.presence, 0.5);
        assert_eq!(policy.trust_increment, 0.1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = InteractionPolicy::from_yaml_str("trust_increment: 2.0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = InteractionPolicy::from_yaml_str("five_ps:\n  presence: -1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(InteractionPolicy::from_yaml_str("gate_metric: vibes").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "residual_charge: 0.05").unwrap();
        writeln!(file, "unburdening_requires_self_led: true").unwrap();
        let policy = InteractionPolicy::from_yaml_file(file.path()).unwrap();
        assert_eq!(policy.residual_charge, 0.05);
        assert!(policy.unburdening_requires_self_led);

        let err = InteractionPolicy::from_yaml_file("/nonexistent/policy.yaml").unwrap_err();
        assert!(matches!(err, IfsError::Config(_)));
    }

    #[test]
    fn test_five_ps_formulas() {
        let ps = FivePs {
            presence: 1.0,
            patience: 1.0,
            perspective: 0.0,
            persistence: 1.0,
            playfulness: 1.0,
        };
        assert!((ps.effective_threshold(0.5) - 0.35).abs() < 1e-12);
        assert!((ps.effective_energy(0.5) - 0.6).abs() < 1e-12);
        assert_eq!(ps.effective_energy(0.95), 1.0);
        assert!((ps.trust_increment(0.1) - 0.15).abs() < 1e-12);

        let idle = FivePs {
            persistence: 0.0,
            ..FivePs::default()
        };
        assert_eq!(idle.trust_increment(0.01), MIN_TRUST_INCREMENT);
    }

    #[test]
    fn test_gate_boundary_passes() {
        let policy = InteractionPolicy {
            compassion_threshold: 1.0,
            ..InteractionPolicy::default()
        };
        let reading = policy.gate(&SelfModel::new());
        assert!(reading.passed);
        assert_eq!(reading.value, 1.0);
    }
}
