//! # agentic-ifs
//!
//! Internal Family Systems as a deterministic, in-process simulation.
//!
//! Autonomous sub-personalities ("Parts") blend with Self and occlude its
//! eight qualities; the accessible portion of Self's constant potential is
//! the Self-energy that gates every engagement with a Part. Parts are driven
//! through per-kind state machines, related through a typed graph, engaged
//! through the Six Fs and, for Exiles, healed through the unburdening
//! pipeline.
//!
//! Every classification ("which Part is active", "how risky is this
//! stimulus") is supplied by the caller. Nothing runs in the background.
//!
//! The [`session::Session`] facade composes the components; the [`server`]
//! module exposes sessions over REST.

pub mod config;
pub mod dialogue;
pub mod error;
pub mod graph;
pub mod journal;
pub mod parts;
pub mod self_model;
pub mod server;
pub mod session;
pub mod unburdening;
pub mod workflow;

pub use config::{FivePs, GateMetric, GateReading, InteractionPolicy};
pub use dialogue::{DialogueContext, DialogueProvider, PartDialogue, TemplateProvider};
pub use error::{ErrorKind, IfsError, Result};
pub use graph::{Edge, EdgeKind, PartsMap, PolarizationSuggestion, RelationshipGraph};
pub use journal::{Journal, JournalEvent, LogEntry};
pub use parts::{
    Burden, BurdenKind, Exile, Firefighter, Manager, Part, PartId, PartKind, PartRegistry,
    PartState, Stimulus,
};
pub use self_model::{BlendState, SelfModel, SelfQuality};
pub use session::{Session, SessionSummary};
pub use unburdening::{Element, UnburdeningPipeline, UnburdeningStage};
pub use workflow::{FocusShift, SixFs, SixFsStep, Trailhead, TrailheadKind};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
