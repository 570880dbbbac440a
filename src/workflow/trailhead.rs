//! Trailheads and focus shifts.
//!
//! A trailhead is the sensation, image, sound or thought that signals a
//! Part is present and engageable. A focus shift (the "U-turn") marks the
//! pivot from an external trigger to the Part inside; it annotates the log
//! and controls nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ensure_unit, Result};
use crate::parts::PartId;

/// Sensory modality of a trailhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailheadKind {
    Somatic,
    Visual,
    Auditory,
    Cognitive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trailhead {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub kind: TrailheadKind,
    pub intensity: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub description: String,
    /// Filled in by the Find step.
    #[serde(default)]
    pub associated_part_id: Option<PartId>,
}

impl Trailhead {
    pub fn new(kind: TrailheadKind, intensity: f64, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            intensity,
            timestamp: Utc::now(),
            description: description.into(),
            associated_part_id: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_unit("intensity", self.intensity)
    }
}

/// Every trailhead observed in a session, in arrival order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrailheadLog {
    entries: Vec<Trailhead>,
}

impl TrailheadLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, trailhead: Trailhead) -> Result<()> {
        trailhead.validate()?;
        self.entries.push(trailhead);
        Ok(())
    }

    pub fn entries(&self) -> &[Trailhead] {
        &self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&Trailhead> {
        self.entries.iter().find(|t| t.id == id)
    }

    pub fn by_kind(&self, kind: TrailheadKind) -> Vec<&Trailhead> {
        self.entries.iter().filter(|t| t.kind == kind).collect()
    }

    pub fn by_part(&self, part_id: PartId) -> Vec<&Trailhead> {
        self.entries
            .iter()
            .filter(|t| t.associated_part_id == Some(part_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The U-turn from "what happened to me" to "what is happening in me".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusShift {
    /// The external trigger, e.g. "my boss".
    pub from_subject: String,
    /// The Part now in focus, e.g. "my anger".
    pub to_subject: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub trailhead_id: Option<Uuid>,
}

impl FocusShift {
    pub fn new(from_subject: impl Into<String>, to_subject: impl Into<String>) -> Self {
        Self {
            from_subject: from_subject.into(),
            to_subject: to_subject.into(),
            timestamp: Utc::now(),
            trailhead_id: None,
        }
    }

    pub fn with_trailhead(mut self, trailhead_id: Uuid) -> Self {
        self.trailhead_id = Some(trailhead_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filters() {
        let mut log = TrailheadLog::new();
        let part = PartId::new();
        let mut th = Trailhead::new(TrailheadKind::Somatic, 0.8, "tight chest");
        th.associated_part_id = Some(part);
        log.add(th).unwrap();
        log.add(Trailhead::new(TrailheadKind::Cognitive, 0.4, "I'll fail"))
            .unwrap();

        assert_eq!(log.by_kind(TrailheadKind::Somatic).len(), 1);
        assert_eq!(log.by_part(part).len(), 1);
        assert!(log.by_kind(TrailheadKind::Visual).is_empty());
    }

    #[test]
    fn test_intensity_validated() {
        let mut log = TrailheadLog::new();
        assert!(log
            .add(Trailhead::new(TrailheadKind::Visual, 1.3, "flash"))
            .is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let th: Trailhead = serde_json::from_value(serde_json::json!({
            "kind": "auditory",
            "intensity": 0.5,
            "description": "a critical voice",
        }))
        .unwrap();
        assert_eq!(th.kind, TrailheadKind::Auditory);
        assert!(th.associated_part_id.is_none());
    }
}
