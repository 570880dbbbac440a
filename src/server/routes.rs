//! Axum route handlers for the agentic-ifs HTTP server.
//!
//! Every handler locks one session, makes one core call and returns its
//! result as JSON. Core errors map to statuses in [`super::error`].
//!
//! # Routes
//!
//! All session routes live under `/api/v1/sessions/:id`.
//!
//! - `GET  /health`
//! - `POST /api/v1/sessions` / `GET /api/v1/sessions`
//! - `GET | DELETE /sessions/:id`
//! - `POST | GET /parts`, `GET /parts/:part_id`
//! - `POST /parts/:part_id/{scan,resolve,respond,visible,containment,transition}`
//! - `PUT  /parts/:part_id/charge`
//! - `POST /tick`
//! - `POST | GET /edges`, `POST /escalations`
//! - `GET /self`, `POST /blends`, `DELETE /blends/:part_id`
//! - `POST /activations`, `GET /polarization`, `GET /parts-map`
//! - `POST | GET /trailheads`, `POST | GET /focus-shifts`
//! - `POST /six-fs/:step`, `GET /six-fs`
//! - `POST /unburdening/:stage`, `GET /unburdening/:exile_id`
//! - `POST | GET /dialogue/:part_id`
//! - `GET /journal`

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::error::ApiError;
use super::store::SessionStore;
use crate::config::InteractionPolicy;
use crate::dialogue::TemplateProvider;
use crate::error::{IfsError, Result as IfsResult};
use crate::graph::Edge;
use crate::parts::{Part, PartId, PartState, Stimulus};
use crate::self_model::SelfQuality;
use crate::session::Session;
use crate::unburdening::Element;
use crate::workflow::{FocusShift, Trailhead};

type ApiResult<T> = Result<T, ApiError>;

/// Shared application state for the HTTP server.
#[derive(Clone, Default)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Run `f` against one locked session.
    fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> IfsResult<T>) -> ApiResult<T> {
        let session = self.store.get(id).ok_or(ApiError::SessionNotFound(id))?;
        let mut guard = session.lock();
        Ok(f(&mut guard)?)
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    if parsed.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Parse a body that may be omitted. An empty body yields the defaults; a
/// body that is present must parse.
fn optional_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> ApiResult<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/", get(get_session).delete(delete_session))
        .route("/parts", post(add_part).get(list_parts))
        .route("/parts/:part_id", get(get_part))
        .route("/parts/:part_id/scan", post(scan))
        .route("/parts/:part_id/resolve", post(resolve_threat))
        .route("/parts/:part_id/respond", post(firefighter_respond))
        .route("/parts/:part_id/visible", post(force_visible))
        .route("/parts/:part_id/charge", put(set_charge))
        .route("/parts/:part_id/containment", post(check_containment))
        .route("/parts/:part_id/transition", post(transition))
        .route("/tick", post(tick))
        .route("/edges", post(add_edge).get(list_edges))
        .route("/escalations", post(record_escalation))
        .route("/self", get(get_self))
        .route("/blends", post(blend))
        .route("/blends/:part_id", delete(unblend))
        .route("/activations", post(record_activations))
        .route("/polarization", get(polarization))
        .route("/parts-map", get(parts_map))
        .route("/trailheads", post(add_trailhead).get(list_trailheads))
        .route("/focus-shifts", post(shift_focus).get(list_focus_shifts))
        .route("/six-fs", get(six_fs_status))
        .route("/six-fs/:step", post(six_fs_step))
        .route("/unburdening/:segment", post(unburdening_stage).get(unburdening_progress))
        .route("/dialogue/:part_id", post(dialogue).get(dialogue_history))
        .route("/journal", get(journal));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/sessions", post(create_session).get(list_sessions))
        .nest("/api/v1/sessions/:id", session_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.cors_origins))
        .with_state(state)
}

/// GET /health: liveness probe.
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "agentic-ifs",
        "sessions": state.store.len(),
    }))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    policy: Option<InteractionPolicy>,
    /// Either an inline policy or a YAML document.
    #[serde(default)]
    policy_yaml: Option<String>,
    /// Bind the built-in template voice.
    #[serde(default)]
    template_dialogue: bool,
}

async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request: CreateSessionRequest = optional_body(&body)?;
    let policy = match (request.policy, request.policy_yaml) {
        (Some(policy), _) => policy,
        (None, Some(yaml)) => InteractionPolicy::from_yaml_str(&yaml)?,
        (None, None) => InteractionPolicy::default(),
    };
    let mut session = Session::with_policy(policy)?;
    if request.template_dialogue {
        session.bind_dialogue(Arc::new(TemplateProvider));
    }
    let summary = session.summary();
    state.store.insert(session);
    Ok((StatusCode::CREATED, Json(json!(summary))))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "sessions": state.store.ids() }))
}

async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!(s.summary()))))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if state.store.remove(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

// ---------------------------------------------------------------------------
// Parts and state machines
// ---------------------------------------------------------------------------

async fn add_part(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(part): Json<Part>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.with_session(id, |s| {
        let part_id = s.add_part(part)?;
        Ok((StatusCode::CREATED, Json(json!(s.part(part_id)?))))
    })
}

async fn list_parts(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        Ok(Json(json!({ "parts": s.parts().iter().collect::<Vec<_>>() })))
    })
}

async fn get_part(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!(s.part(part_id)?))))
}

async fn scan(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
    Json(stimulus): Json<Stimulus>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!(s.scan(part_id, &stimulus)?))))
}

async fn resolve_threat(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!(s.resolve_threat(part_id)?))))
}

#[derive(Debug, Deserialize)]
struct RespondRequest {
    exile_id: PartId,
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

async fn firefighter_respond(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
    Json(request): Json<RespondRequest>,
) -> ApiResult<Json<Value>> {
    let now = request.now.unwrap_or_else(Utc::now);
    state.with_session(id, |s| {
        let hop = s.firefighter_respond(part_id, request.exile_id, now)?;
        Ok(Json(json!({ "transition": hop })))
    })
}

async fn force_visible(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        Ok(Json(json!({ "transition": s.force_visible(part_id)? })))
    })
}

#[derive(Debug, Deserialize)]
struct ChargeRequest {
    charge: f64,
}

async fn set_charge(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
    Json(request): Json<ChargeRequest>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        s.set_exile_charge(part_id, request.charge)?;
        Ok(Json(json!(s.part(part_id)?)))
    })
}

async fn check_containment(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        Ok(Json(json!({ "transition": s.check_containment(part_id)? })))
    })
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    state: PartState,
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

async fn transition(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
    Json(request): Json<TransitionRequest>,
) -> ApiResult<Json<Value>> {
    let now = request.now.unwrap_or_else(Utc::now);
    state.with_session(id, |s| Ok(Json(json!(s.transition(part_id, request.state, now)?))))
}

#[derive(Debug, Default, Deserialize)]
struct TickRequest {
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

async fn tick(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: TickRequest = optional_body(&body)?;
    let now = request.now.unwrap_or_else(Utc::now);
    state.with_session(id, |s| {
        let hops: Vec<Value> = s
            .tick(now)
            .into_iter()
            .map(|(part_id, hop)| json!({ "part_id": part_id, "from": hop.from, "to": hop.to }))
            .collect();
        Ok(Json(json!({ "transitions": hops })))
    })
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

async fn add_edge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(edge): Json<Edge>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.with_session(id, |s| {
        s.add_edge(edge)?;
        Ok((StatusCode::CREATED, Json(json!(edge))))
    })
}

async fn list_edges(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!({ "edges": s.graph().edges() }))))
}

#[derive(Debug, Deserialize)]
struct EscalationRequest {
    part_a: PartId,
    part_b: PartId,
}

async fn record_escalation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EscalationRequest>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        let tension = s.record_escalation(request.part_a, request.part_b)?;
        Ok(Json(json!({ "tension_level": tension })))
    })
}

async fn record_activations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        s.record_activations();
        Ok(Json(json!(s.activation_history())))
    })
}

async fn polarization(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        Ok(Json(json!({
            "declared": s.graph().polarized_pairs(),
            "correlation": s.detect_polarization()?,
            "structural": s.suggest_structural_polarization()?,
        })))
    })
}

async fn parts_map(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!(s.parts_map()))))
}

// ---------------------------------------------------------------------------
// Self Model
// ---------------------------------------------------------------------------

fn self_view(s: &Session) -> Value {
    json!({
        "energy": s.energy(),
        "energy_vector": s.self_model().energy_vector(),
        "active_blends": s.self_model().active_blends(),
        "is_self_led": s.is_self_led(),
        "self_preservation_ratio": s.self_preservation_ratio(),
    })
}

async fn get_self(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(self_view(s))))
}

#[derive(Debug, Deserialize)]
struct BlendRequest {
    part_id: PartId,
    blending_percentage: f64,
    #[serde(default)]
    occlusion_mask: BTreeMap<SelfQuality, f64>,
}

async fn blend(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<BlendRequest>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        s.blend(request.part_id, request.blending_percentage, request.occlusion_mask)?;
        Ok(Json(self_view(s)))
    })
}

async fn unblend(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        let removed = s.unblend(part_id);
        let mut view = self_view(s);
        view["removed"] = json!(removed);
        Ok(Json(view))
    })
}

// ---------------------------------------------------------------------------
// Trailheads and focus
// ---------------------------------------------------------------------------

async fn add_trailhead(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(trailhead): Json<Trailhead>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.with_session(id, |s| {
        let trailhead_id = s.add_trailhead(trailhead)?;
        Ok((StatusCode::CREATED, Json(json!(s.trailheads().get(trailhead_id)))))
    })
}

async fn list_trailheads(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!({ "trailheads": s.trailheads().entries() }))))
}

async fn shift_focus(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(shift): Json<FocusShift>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    state.with_session(id, |s| {
        s.shift_focus(shift.clone());
        Ok((StatusCode::CREATED, Json(json!(shift))))
    })
}

async fn list_focus_shifts(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!({ "focus_shifts": s.focus_shifts() }))))
}

// ---------------------------------------------------------------------------
// Six Fs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SixFsRequest {
    part_id: PartId,
    /// Required by `find`.
    #[serde(default)]
    trailhead: Option<Trailhead>,
    /// Used by `fear`.
    #[serde(default)]
    predictions: Vec<String>,
}

async fn six_fs_step(
    State(state): State<AppState>,
    Path((id, step)): Path<(Uuid, String)>,
    Json(request): Json<SixFsRequest>,
) -> ApiResult<Json<Value>> {
    let part_id = request.part_id;
    let result = match step.as_str() {
        "find" => {
            let trailhead = request
                .trailhead
                .ok_or_else(|| IfsError::validation("trailhead", "find requires a trailhead"))?;
            state.with_session(id, |s| s.find(part_id, trailhead))?
        }
        "focus" => state.with_session(id, |s| s.focus(part_id))?,
        "flesh_out" => state.with_session(id, |s| s.flesh_out(part_id))?,
        "feel_toward" => state.with_session(id, |s| s.feel_toward(part_id))?,
        "befriend" => state.with_session(id, |s| s.befriend(part_id))?,
        "fear" => state.with_session(id, |s| s.fear(part_id, request.predictions))?,
        other => return Err(ApiError::UnknownRoute(format!("Unknown Six Fs step: {}", other))),
    };
    Ok(Json(json!(result)))
}

async fn six_fs_status(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        let workflow = s.six_fs();
        Ok(Json(json!({
            "target": workflow.target(),
            "current_step": workflow.current_step(),
            "expected_step": workflow.expected_step(),
            "is_complete": workflow.is_complete(),
        })))
    })
}

// ---------------------------------------------------------------------------
// Unburdening
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UnburdeningRequest {
    exile_id: PartId,
    /// Used by `reparent`.
    #[serde(default)]
    needed: Option<String>,
    /// Used by `purge`.
    #[serde(default)]
    element: Option<Element>,
    /// Used by `invite`.
    #[serde(default)]
    qualities: Vec<String>,
}

async fn unburdening_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(Uuid, String)>,
    Json(request): Json<UnburdeningRequest>,
) -> ApiResult<Json<Value>> {
    let exile_id = request.exile_id;
    let result = match stage.as_str() {
        "witness" => state.with_session(id, |s| s.witness(exile_id))?,
        "retrieve" => state.with_session(id, |s| s.retrieve(exile_id))?,
        "reparent" => {
            let needed = request.needed.unwrap_or_default();
            state.with_session(id, |s| s.reparent(exile_id, needed))?
        }
        "purge" => {
            let element = request
                .element
                .ok_or_else(|| IfsError::validation("element", "purge requires an element"))?;
            state.with_session(id, |s| s.purge(exile_id, element))?
        }
        "invite" => state.with_session(id, |s| s.invite(exile_id, request.qualities))?,
        other => {
            return Err(ApiError::UnknownRoute(format!(
                "Unknown unburdening stage: {}",
                other
            )))
        }
    };
    Ok(Json(json!(result)))
}

async fn unburdening_progress(
    State(state): State<AppState>,
    Path((id, exile_id)): Path<(Uuid, PartId)>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        s.part(exile_id)?;
        Ok(Json(json!({
            "exile_id": exile_id,
            "progress": s.unburdening().progress(exile_id),
            "is_complete": s.unburdening().is_complete(exile_id),
        })))
    })
}

// ---------------------------------------------------------------------------
// Dialogue and journal
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DialogueRequest {
    message: String,
    /// Speak to the Part directly instead of through Self.
    #[serde(default)]
    direct_access: bool,
}

async fn dialogue(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
    Json(request): Json<DialogueRequest>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        let response = if request.direct_access {
            s.direct_access(part_id, &request.message)?
        } else {
            s.speak_as(part_id, &request.message)?
        };
        Ok(Json(json!({ "part_id": part_id, "response": response })))
    })
}

async fn dialogue_history(
    State(state): State<AppState>,
    Path((id, part_id)): Path<(Uuid, PartId)>,
) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| {
        s.part(part_id)?;
        Ok(Json(json!({ "history": s.dialogue_history(part_id) })))
    })
}

async fn journal(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    state.with_session(id, |s| Ok(Json(json!({ "entries": s.journal().entries() }))))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
