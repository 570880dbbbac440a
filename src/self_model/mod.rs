//! # Self Model
//!
//! The global coordination resource. `potential` is fixed at 1.0 for the life
//! of a session; what is *accessible* of it is reduced by blending.
//!
//! ```text
//! energy_vector[q] = potential × (1 − max over active blends of occlusion(q))
//! energy           = mean(energy_vector)
//! ```
//!
//! Occlusion takes the maximum across simultaneous blends, not the sum: the
//! most dominant Part governs each quality. A quality absent from a blend's
//! mask is occluded by that blend's `blending_percentage`, so a blend with an
//! empty mask is uniform.
//!
//! Energy is never assigned directly. Every mutation goes through
//! [`SelfModel::blend`] or [`SelfModel::unblend`], which recompute the vector.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IfsError, Result};
use crate::parts::{PartId, PartRegistry};

/// The constant Self potential.
pub const POTENTIAL: f64 = 1.0;

/// Energy above which the system counts as Self-led.
pub const DEFAULT_LEADERSHIP_THRESHOLD: f64 = 0.5;

/// Guards the preservation ratio against division by zero.
pub const PRESERVATION_EPSILON: f64 = 1e-6;

// ============================================================================
// Qualities
// ============================================================================

/// The eight qualities of Self.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfQuality {
    Calm,
    Curiosity,
    Compassion,
    Confidence,
    Courage,
    Creativity,
    Clarity,
    Connectedness,
}

impl SelfQuality {
    pub const ALL: [SelfQuality; 8] = [
        SelfQuality::Calm,
        SelfQuality::Curiosity,
        SelfQuality::Compassion,
        SelfQuality::Confidence,
        SelfQuality::Courage,
        SelfQuality::Creativity,
        SelfQuality::Clarity,
        SelfQuality::Connectedness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SelfQuality::Calm => "calm",
            SelfQuality::Curiosity => "curiosity",
            SelfQuality::Compassion => "compassion",
            SelfQuality::Confidence => "confidence",
            SelfQuality::Courage => "courage",
            SelfQuality::Creativity => "creativity",
            SelfQuality::Clarity => "clarity",
            SelfQuality::Connectedness => "connectedness",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SelfQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelfQuality {
    type Err = IfsError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        SelfQuality::ALL
            .into_iter()
            .find(|q| q.as_str() == lower)
            .ok_or_else(|| IfsError::validation("quality", format!("unknown Self quality '{}'", s)))
    }
}

/// Accessible energy per quality, each in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyVector([f64; 8]);

impl EnergyVector {
    fn full(potential: f64) -> Self {
        Self([potential; 8])
    }

    pub fn get(&self, quality: SelfQuality) -> f64 {
        self.0[quality.index()]
    }

    pub fn mean(&self) -> f64 {
        self.0.iter().sum::<f64>() / self.0.len() as f64
    }

    pub fn iter(&self) -> impl Iterator<Item = (SelfQuality, f64)> + '_ {
        SelfQuality::ALL.into_iter().map(move |q| (q, self.get(q)))
    }
}

impl Serialize for EnergyVector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (quality, value) in self.iter() {
            map.serialize_entry(quality.as_str(), &value)?;
        }
        map.end()
    }
}

// ============================================================================
// Blends
// ============================================================================

/// One Part's hold on Self. Exists only while the Part is blended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendState {
    pub part_id: PartId,
    pub blending_percentage: f64,
    /// Per-quality reduction factors. Missing qualities use `blending_percentage`.
    #[serde(default)]
    pub occlusion_mask: BTreeMap<SelfQuality, f64>,
}

impl BlendState {
    /// How much of `quality` this blend occludes.
    pub fn occlusion(&self, quality: SelfQuality) -> f64 {
        self.occlusion_mask
            .get(&quality)
            .copied()
            .unwrap_or(self.blending_percentage)
    }
}

// ============================================================================
// Self Model
// ============================================================================

/// Potential, active blends and the energy derived from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfModel {
    potential: f64,
    active_blends: Vec<BlendState>,
    energy_vector: EnergyVector,
}

impl Default for SelfModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SelfModel {
    pub fn new() -> Self {
        Self {
            potential: POTENTIAL,
            active_blends: Vec::new(),
            energy_vector: EnergyVector::full(POTENTIAL),
        }
    }

    pub fn potential(&self) -> f64 {
        self.potential
    }

    /// Mean accessible energy.
    pub fn energy(&self) -> f64 {
        self.energy_vector.mean()
    }

    pub fn energy_vector(&self) -> &EnergyVector {
        &self.energy_vector
    }

    pub fn energy_of(&self, quality: SelfQuality) -> f64 {
        self.energy_vector.get(quality)
    }

    /// Active blends in the order they were first blended.
    pub fn active_blends(&self) -> &[BlendState] {
        &self.active_blends
    }

    pub fn blend_of(&self, part_id: PartId) -> Option<&BlendState> {
        self.active_blends.iter().find(|b| b.part_id == part_id)
    }

    pub fn is_blended(&self, part_id: PartId) -> bool {
        self.blend_of(part_id).is_some()
    }

    /// Blend a registered Part into Self, or overwrite its existing blend.
    ///
    /// An overwritten blend keeps its original position in the blend order.
    pub fn blend(
        &mut self,
        parts: &PartRegistry,
        part_id: PartId,
        blending_percentage: f64,
        occlusion_mask: BTreeMap<SelfQuality, f64>,
    ) -> Result<()> {
        if !parts.contains(part_id) {
            return Err(IfsError::PartNotFound(part_id));
        }
        if !in_unit(blending_percentage) {
            return Err(IfsError::InvalidBlend {
                part_id,
                reason: format!("blending_percentage {} is outside [0.0, 1.0]", blending_percentage),
            });
        }
        if let Some((quality, factor)) = occlusion_mask.iter().find(|(_, f)| !in_unit(**f)) {
            return Err(IfsError::InvalidBlend {
                part_id,
                reason: format!("occlusion factor {} for {} is outside [0.0, 1.0]", factor, quality),
            });
        }

        let state = BlendState {
            part_id,
            blending_percentage,
            occlusion_mask,
        };
        match self.active_blends.iter_mut().find(|b| b.part_id == part_id) {
            Some(existing) => *existing = state,
            None => self.active_blends.push(state),
        }
        self.recompute();
        log::debug!(
            "Part {} blended at {:.2}; energy now {:.3}",
            part_id,
            blending_percentage,
            self.energy()
        );
        Ok(())
    }

    /// Remove a Part's blend. Returns whether a blend was removed; unblending
    /// a Part that is not blended changes nothing.
    pub fn unblend(&mut self, part_id: PartId) -> bool {
        let before = self.active_blends.len();
        self.active_blends.retain(|b| b.part_id != part_id);
        if self.active_blends.len() == before {
            return false;
        }
        self.recompute();
        log::debug!("Part {} unblended; energy now {:.3}", part_id, self.energy());
        true
    }

    /// Self-led at the default leadership threshold.
    pub fn is_self_led(&self) -> bool {
        self.is_self_led_at(DEFAULT_LEADERSHIP_THRESHOLD)
    }

    pub fn is_self_led_at(&self, threshold: f64) -> bool {
        self.energy() > threshold
    }

    /// Accessible energy relative to the total activation of every Part.
    pub fn self_preservation_ratio(&self, parts: &PartRegistry) -> f64 {
        self.energy() / parts.total_activation().max(PRESERVATION_EPSILON)
    }

    /// The blend with the highest percentage, skipping `excluding`. Ties go
    /// to the earliest blend.
    pub fn most_blended(&self, excluding: Option<PartId>) -> Option<&BlendState> {
        self.active_blends
            .iter()
            .filter(|b| Some(b.part_id) != excluding)
            .fold(None, |best: Option<&BlendState>, b| match best {
                Some(top) if top.blending_percentage >= b.blending_percentage => Some(top),
                _ => Some(b),
            })
    }

    fn recompute(&mut self) {
        let mut components = [self.potential; 8];
        for quality in SelfQuality::ALL {
            let occlusion = self
                .active_blends
                .iter()
                .map(|b| b.occlusion(quality))
                .fold(0.0_f64, f64::max);
            components[quality.index()] = (self.potential * (1.0 - occlusion)).clamp(0.0, 1.0);
        }
        self.energy_vector = EnergyVector(components);
    }
}

fn in_unit(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
