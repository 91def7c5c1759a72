//! REST API for the cargo fitting service.
//!
//! Exposes packing, live streaming, container comparison and the preset list.
//! Uses Axum as the web framework and supports CORS.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::error::ValidationError;
use crate::manifest::{ItemDraft, expand_drafts};
use crate::model::{Container, Item};
use crate::planner::{
    PackEvent, PackingConfig, PackingResult, PackingStrategy, pack_with_progress,
    pack_with_strategy,
};
use crate::presets::{PRESETS, find_preset};
use crate::types::{Dimensional, Vec3};
use crate::units::{LengthUnit, WeightUnit};

#[derive(Clone)]
struct ApiState {
    optimizer_config: OptimizerConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>cargo fitter API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Cargo space of a request: either a preset key or explicit dimensions.
///
/// A preset takes precedence over `dims`. Preset dimensions are always in
/// centimeters; `dims` use the request's length unit.
#[derive(Deserialize, Clone, Debug, Default, ToSchema)]
pub struct ContainerRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    #[schema(nullable = true, example = "sprinter")]
    pub preset: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Vec<f64>>, example = json!([400.0, 200.0, 200.0]))]
    pub dims: Option<(f64, f64, f64)>,
}

impl ContainerRequest {
    fn resolve(&self, units: LengthUnit) -> Result<(Option<String>, Container), ValidationError> {
        if let Some(key) = &self.preset {
            let preset = find_preset(key)?;
            let label = self.name.clone().or_else(|| Some(preset.name.to_string()));
            return Ok((label, preset.container));
        }

        let (length, width, height) = self.dims.ok_or_else(|| {
            ValidationError::InvalidConfiguration(
                "container needs either a preset or dims".to_string(),
            )
        })?;
        let container = Container::new(
            units.to_cm(length),
            units.to_cm(width),
            units.to_cm(height),
        )?;
        Ok((self.name.clone(), container))
    }
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "preset": "sprinter" },
        "items": [
            { "name": "Pallet", "length": 120.0, "width": 80.0, "height": 100.0, "weight": 250.0, "quantity": 2 }
        ],
        "strategy": "weight_aware"
    })
)]
pub struct PackRequest {
    pub container: ContainerRequest,
    pub items: Vec<ItemDraft>,
    #[serde(default)]
    pub units: LengthUnit,
    #[serde(default)]
    pub weight_units: WeightUnit,
    #[serde(default)]
    #[schema(nullable = true)]
    pub strategy: Option<PackingStrategy>,
    /// Grid step in `units`
    #[serde(default)]
    #[schema(nullable = true)]
    pub grid_step: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CompareRequest {
    pub containers: Vec<ContainerRequest>,
    pub items: Vec<ItemDraft>,
    #[serde(default)]
    pub units: LengthUnit,
    #[serde(default)]
    pub weight_units: WeightUnit,
    #[serde(default)]
    #[schema(nullable = true)]
    pub strategy: Option<PackingStrategy>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub grid_step: Option<f64>,
}

/// Request options shared by every endpoint, resolved to centimeters and kilograms.
#[derive(Clone, Copy, Debug)]
struct RequestUnits {
    length: LengthUnit,
    weight: WeightUnit,
}

impl RequestUnits {
    fn position(&self, value_cm: Vec3) -> (f64, f64, f64) {
        self.length.vec_from_cm(value_cm).as_tuple()
    }

    fn weight(&self, value_kg: Option<f64>) -> Option<f64> {
        value_kg.map(|kg| self.weight.from_kg(kg))
    }
}

#[derive(Debug)]
struct ValidatedPackRequest {
    label: Option<String>,
    container: Container,
    items: Vec<Item>,
    config: PackingConfig,
    units: RequestUnits,
}

fn items_in_base_units(drafts: &[ItemDraft], units: RequestUnits) -> Vec<Item> {
    expand_drafts(drafts)
        .into_iter()
        .map(|mut item| {
            let dims = units.length.vec_to_cm(item.dimensions());
            item.length = dims.x;
            item.width = dims.y;
            item.height = dims.z;
            item.weight = item.weight.map(|w| units.weight.to_kg(w));
            item
        })
        .collect()
}

/// Finest grid step a request may ask for, in centimeters.
const MIN_REQUEST_GRID_STEP_CM: f64 = 0.5;

fn request_config(
    defaults: &OptimizerConfig,
    strategy: Option<PackingStrategy>,
    grid_step: Option<f64>,
    units: LengthUnit,
) -> Result<PackingConfig, ValidationError> {
    let mut config = defaults.packing_config();
    if let Some(strategy) = strategy {
        config.strategy = strategy;
    }
    if let Some(step) = grid_step {
        let step_cm = units.to_cm(step);
        if step_cm < MIN_REQUEST_GRID_STEP_CM {
            return Err(ValidationError::InvalidConfiguration(format!(
                "grid step must be at least {} in the request units ({} cm), got: {}",
                units.from_cm(MIN_REQUEST_GRID_STEP_CM),
                MIN_REQUEST_GRID_STEP_CM,
                step
            )));
        }
        config.grid_step = step_cm;
    }
    config.validate()?;
    Ok(config)
}

impl PackRequest {
    fn into_validated(
        self,
        defaults: &OptimizerConfig,
    ) -> Result<ValidatedPackRequest, ValidationError> {
        let units = RequestUnits {
            length: self.units,
            weight: self.weight_units,
        };
        let (label, container) = self.container.resolve(units.length)?;
        let config = request_config(defaults, self.strategy, self.grid_step, units.length)?;

        Ok(ValidatedPackRequest {
            label,
            container,
            items: items_in_base_units(&self.items, units),
            config,
            units,
        })
    }
}

/// Packing outcome in the request's units.
#[derive(Serialize, ToSchema)]
pub struct PackResponse {
    pub label: Option<String>,
    #[schema(value_type = [f64; 3], example = json!([360.0, 170.0, 180.0]))]
    pub container_dims: (f64, f64, f64),
    pub units: LengthUnit,
    pub weight_units: WeightUnit,
    pub strategy: PackingStrategy,
    pub total_items: usize,
    pub fitted_count: usize,
    pub unfitted_count: usize,
    pub rejected_count: usize,
    /// Percent of the container volume filled
    pub efficiency: f64,
    /// In `units` cubed
    pub used_volume: f64,
    pub total_weight: f64,
    pub fitted_weight: f64,
    pub is_complete: bool,
    pub fitted: Vec<PackedItem>,
    pub unfitted: Vec<UnfittedEntry>,
    pub rejected: Vec<RejectedEntry>,
}

/// Single placed item in the response.
///
/// # Fields
/// * `pos` - Minimum corner (x, y, z) in the container
/// * `dims` - Dimensions (length, width, height)
#[derive(Serialize, ToSchema)]
pub struct PackedItem {
    pub id: String,
    pub name: String,
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub pos: (f64, f64, f64),
    #[schema(value_type = [f64; 3], example = json!([120.0, 80.0, 100.0]))]
    pub dims: (f64, f64, f64),
    pub weight: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct UnfittedEntry {
    pub id: String,
    pub name: String,
    #[schema(value_type = [f64; 3], example = json!([500.0, 80.0, 100.0]))]
    pub dims: (f64, f64, f64),
    pub weight: Option<f64>,
    pub reason_code: String,
    pub reason: String,
}

#[derive(Serialize, ToSchema)]
pub struct RejectedEntry {
    pub id: String,
    pub name: String,
    pub reason: String,
}

impl PackResponse {
    fn from_packing_result(
        label: Option<String>,
        result: PackingResult,
        units: RequestUnits,
    ) -> Self {
        let is_complete = result.is_complete();
        let PackingResult {
            container,
            strategy,
            total_items,
            fitted_count,
            unfitted_count,
            efficiency,
            used_volume,
            total_weight,
            fitted_weight,
            fitted,
            unfitted,
            rejected,
        } = result;

        Self {
            label,
            container_dims: units.position(container.dimensions()),
            units: units.length,
            weight_units: units.weight,
            strategy,
            total_items,
            fitted_count,
            unfitted_count,
            rejected_count: rejected.len(),
            efficiency,
            used_volume: units.length.volume_from_cm3(used_volume),
            total_weight: units.weight.from_kg(total_weight),
            fitted_weight: units.weight.from_kg(fitted_weight),
            is_complete,
            fitted: fitted
                .into_iter()
                .map(|item| PackedItem {
                    pos: units.position(item.position),
                    dims: units.position(item.dimensions()),
                    weight: units.weight(item.weight),
                    id: item.id,
                    name: item.name,
                })
                .collect(),
            unfitted: unfitted
                .into_iter()
                .map(|entry| UnfittedEntry {
                    dims: units.position(entry.item.dimensions()),
                    weight: units.weight(entry.item.weight),
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                    id: entry.item.id,
                    name: entry.item.name,
                })
                .collect(),
            rejected: rejected
                .into_iter()
                .map(|entry| RejectedEntry {
                    reason: entry.error.to_string(),
                    id: entry.item.id,
                    name: entry.item.name,
                })
                .collect(),
        }
    }
}

/// Converts the coordinates and weights of an event into the request's units.
fn event_in_units(event: &PackEvent, units: RequestUnits) -> PackEvent {
    match event {
        PackEvent::ItemPlaced {
            id,
            name,
            pos,
            dims,
            weight,
            fitted_count,
        } => PackEvent::ItemPlaced {
            id: id.clone(),
            name: name.clone(),
            pos: units.length.vec_from_cm(*pos),
            dims: units.length.vec_from_cm(*dims),
            weight: units.weight(*weight),
            fitted_count: *fitted_count,
        },
        PackEvent::ItemUnfitted {
            id,
            name,
            dims,
            reason_code,
            reason_text,
        } => PackEvent::ItemUnfitted {
            id: id.clone(),
            name: name.clone(),
            dims: units.length.vec_from_cm(*dims),
            reason_code: reason_code.clone(),
            reason_text: reason_text.clone(),
        },
        other => other.clone(),
    }
}

/// Per-container outcome of a comparison.
#[derive(Serialize, ToSchema)]
pub struct CandidateSummary {
    pub index: usize,
    pub label: Option<String>,
    #[schema(value_type = [f64; 3], example = json!([360.0, 170.0, 180.0]))]
    pub dims: (f64, f64, f64),
    pub fitted_count: usize,
    pub unfitted_count: usize,
    pub efficiency: f64,
    pub fitted_weight: f64,
    pub is_complete: bool,
}

#[derive(Serialize, ToSchema)]
pub struct CompareResponse {
    pub candidates: Vec<CandidateSummary>,
    /// Index of the container fitting the most items (ties: higher efficiency, then earlier)
    pub best_index: Option<usize>,
}

fn best_candidate(candidates: &[CandidateSummary]) -> Option<usize> {
    let mut best: Option<&CandidateSummary> = None;
    for candidate in candidates {
        let better = match best {
            None => true,
            Some(current) => {
                candidate.fitted_count > current.fitted_count
                    || (candidate.fitted_count == current.fitted_count
                        && candidate.efficiency > current.efficiency)
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best.map(|candidate| candidate.index)
}

#[derive(Serialize, ToSchema)]
pub struct PresetEntry {
    pub key: String,
    pub name: String,
    /// Dimensions in centimeters
    #[schema(value_type = [f64; 3], example = json!([360.0, 170.0, 180.0]))]
    pub dims: (f64, f64, f64),
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(err: ValidationError) -> Response {
    let error = match err {
        ValidationError::InvalidDimension { .. } | ValidationError::UnknownPreset(_) => {
            "Invalid container configuration"
        }
        _ => "Invalid input data",
    };
    error_response(StatusCode::UNPROCESSABLE_ENTITY, error, err.to_string())
}

fn parse_pack_request(
    payload: Result<Json<PackRequest>, JsonRejection>,
    defaults: &OptimizerConfig,
) -> Result<ValidatedPackRequest, Response> {
    let Json(payload) = payload.map_err(json_deserialize_error)?;
    payload.into_validated(defaults).map_err(validation_error)
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_pack, handle_pack_stream, handle_compare, handle_presets),
    components(
        schemas(
            PackRequest,
            CompareRequest,
            ContainerRequest,
            ItemDraft,
            LengthUnit,
            WeightUnit,
            PackingStrategy,
            PackResponse,
            PackedItem,
            UnfittedEntry,
            RejectedEntry,
            CompareResponse,
            CandidateSummary,
            PresetEntry,
            ErrorResponse
        )
    ),
    tags((name = "packing", description = "Endpoints for cargo fitting"))
)]
struct ApiDoc;

fn router(optimizer_config: OptimizerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState { optimizer_config };

    Router::new()
        .route("/pack", post(handle_pack))
        .route("/pack_stream", post(handle_pack_stream))
        .route("/compare", post(handle_compare))
        .route("/presets", get(handle_presets))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
///
/// # Errors
/// Returns the I/O error if the listener cannot be bound or the server fails.
pub async fn start_api_server(
    config: ApiConfig,
    optimizer_config: OptimizerConfig,
) -> std::io::Result<()> {
    let app = router(optimizer_config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        error!("❌ Could not bind API server to {}: {}", addr, err);
        err
    })?;

    info!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 API endpoints: POST /pack, POST /pack_stream, POST /compare, GET /presets");
    info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /pack endpoint.
///
/// Packs the items into the requested container and returns positions in the
/// request's units.
#[utoipa::path(
    post,
    path = "/pack",
    request_body = PackRequest,
    responses(
        (status = 200, description = "Packing outcome", body = PackResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_pack_request(payload, &state.optimizer_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        "📥 New pack request: {} items, strategy {}",
        request.items.len(),
        request.config.strategy
    );

    let ValidatedPackRequest {
        label,
        container,
        items,
        config,
        units,
    } = request;

    let packed =
        tokio::task::spawn_blocking(move || pack_with_strategy(&container, &items, &config)).await;
    let result = match packed {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid container configuration",
                err.to_string(),
            );
        }
        Err(err) => {
            error!("❌ Packing task failed: {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Packing failed",
                err.to_string(),
            );
        }
    };
    info!(
        "📦 Result: {} fitted, {} unfitted, {:.1}% filled",
        result.fitted_count, result.unfitted_count, result.efficiency
    );

    let response = PackResponse::from_packing_result(label, result, units);
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /pack_stream endpoint (SSE).
///
/// Streams pack events as Server-Sent Events (text/event-stream) so clients
/// can visualize the loading sequence live.
#[utoipa::path(
    post,
    path = "/pack_stream",
    request_body = PackRequest,
    responses(
        (
            status = 200,
            description = "Streams pack events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PackRequest>, JsonRejection>,
) -> impl IntoResponse {
    let ValidatedPackRequest {
        container,
        items,
        config,
        units,
        ..
    } = match parse_pack_request(payload, &state.optimizer_config) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let mut receiver_open = true;
        let _ = pack_with_progress(&container, &items, &config, |evt| {
            if !receiver_open {
                return;
            }
            if let Ok(json) = serde_json::to_string(&event_in_units(evt, units)) {
                // Receiver has closed the stream; remaining events are discarded.
                receiver_open = tx.blocking_send(json).is_ok();
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /compare endpoint.
///
/// Packs the same items into every listed container in parallel.
#[utoipa::path(
    post,
    path = "/compare",
    request_body = CompareRequest,
    responses(
        (status = 200, description = "Per-container summaries", body = CompareResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "packing"
)]
async fn handle_compare(
    State(state): State<ApiState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    if request.containers.is_empty() {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid input data",
            "At least one container must be specified",
        );
    }

    let units = RequestUnits {
        length: request.units,
        weight: request.weight_units,
    };
    let config = match request_config(
        &state.optimizer_config,
        request.strategy,
        request.grid_step,
        units.length,
    ) {
        Ok(config) => config,
        Err(err) => return validation_error(err),
    };
    let candidates = match request
        .containers
        .iter()
        .map(|entry| entry.resolve(units.length))
        .collect::<Result<Vec<_>, ValidationError>>()
    {
        Ok(candidates) => candidates,
        Err(err) => return validation_error(err),
    };

    let items = items_in_base_units(&request.items, units);
    info!(
        "📥 New compare request: {} items, {} containers",
        items.len(),
        candidates.len()
    );

    let tasks = candidates.into_iter().map(|(label, container)| {
        let items = items.clone();
        tokio::task::spawn_blocking(move || {
            pack_with_strategy(&container, &items, &config).map(|result| (label, result))
        })
    });

    let mut summaries = Vec::new();
    for (index, joined) in join_all(tasks).await.into_iter().enumerate() {
        let (label, result) = match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                return error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Invalid container configuration",
                    err.to_string(),
                );
            }
            Err(err) => {
                error!("❌ Packing task failed: {err}");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Packing failed",
                    err.to_string(),
                );
            }
        };
        summaries.push(CandidateSummary {
            index,
            label,
            dims: units.position(result.container.dimensions()),
            fitted_count: result.fitted_count,
            unfitted_count: result.unfitted_count,
            efficiency: result.efficiency,
            fitted_weight: units.weight.from_kg(result.fitted_weight),
            is_complete: result.is_complete(),
        });
    }

    let best_index = best_candidate(&summaries);
    let response = CompareResponse {
        candidates: summaries,
        best_index,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for GET /presets endpoint.
#[utoipa::path(
    get,
    path = "/presets",
    responses((status = 200, description = "Available container presets", body = [PresetEntry])),
    tag = "packing"
)]
async fn handle_presets() -> impl IntoResponse {
    let presets: Vec<PresetEntry> = PRESETS
        .iter()
        .map(|preset| PresetEntry {
            key: preset.key.to_string(),
            name: preset.name.to_string(),
            dims: preset.container.dimensions().as_tuple(),
        })
        .collect();
    Json(presets)
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn state() -> ApiState {
        ApiState {
            optimizer_config: OptimizerConfig::default(),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    fn pack_request(json: Value) -> PackRequest {
        serde_json::from_value(json).expect("request should parse")
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in ["/pack", "/pack_stream", "/compare", "/presets"] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {path} path"
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["PackRequest", "PackResponse", "CompareResponse", "ErrorResponse"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn pack_request_defaults_units_and_strategy() {
        let request = pack_request(json!({
            "container": { "dims": [10.0, 10.0, 10.0] },
            "items": [{ "length": 5.0, "width": 5.0, "height": 5.0 }]
        }));
        assert_eq!(request.units, LengthUnit::Cm);
        assert_eq!(request.weight_units, WeightUnit::Kg);
        assert_eq!(request.strategy, None);
        assert_eq!(request.items[0].quantity, 1);
    }

    #[test]
    fn unknown_units_are_refused_while_decoding() {
        let parsed = serde_json::from_value::<PackRequest>(json!({
            "container": { "dims": [10.0, 10.0, 10.0] },
            "items": [],
            "units": "yd"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn container_request_resolution() {
        let preset = ContainerRequest {
            preset: Some("48-truck".to_string()),
            ..Default::default()
        };
        let (label, container) = preset.resolve(LengthUnit::M).unwrap();
        assert_eq!(label.as_deref(), Some("48' Truck"));
        assert_eq!(container.length, 1455.0);

        let explicit = ContainerRequest {
            dims: Some((4.0, 2.0, 2.0)),
            ..Default::default()
        };
        let (_, container) = explicit.resolve(LengthUnit::M).unwrap();
        assert_eq!(container.dimensions(), Vec3::new(400.0, 200.0, 200.0));

        assert!(ContainerRequest::default().resolve(LengthUnit::Cm).is_err());
        let negative = ContainerRequest {
            dims: Some((4.0, -2.0, 2.0)),
            ..Default::default()
        };
        assert!(matches!(
            negative.resolve(LengthUnit::Cm),
            Err(ValidationError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn request_grid_step_is_converted_to_centimeters() {
        let config = request_config(
            &OptimizerConfig::default(),
            Some(PackingStrategy::WeightAware),
            Some(0.5),
            LengthUnit::M,
        )
        .unwrap();
        assert_eq!(config.grid_step, 50.0);
        assert_eq!(config.strategy, PackingStrategy::WeightAware);

        assert!(
            request_config(&OptimizerConfig::default(), None, Some(0.0), LengthUnit::Cm).is_err()
        );
    }

    #[test]
    fn request_grid_step_has_a_floor() {
        let defaults = OptimizerConfig::default();
        assert!(request_config(&defaults, None, Some(0.1), LengthUnit::Cm).is_err());
        assert!(request_config(&defaults, None, Some(0.004), LengthUnit::M).is_err());

        let config = request_config(&defaults, None, Some(0.5), LengthUnit::Cm).unwrap();
        assert_eq!(config.grid_step, 0.5);
        assert!(request_config(&defaults, None, Some(1.0), LengthUnit::In).is_ok());
    }

    #[test]
    fn requests_inherit_a_search_budget() {
        let config =
            request_config(&OptimizerConfig::default(), None, Some(2.0), LengthUnit::Cm).unwrap();
        assert_eq!(
            config.search_budget,
            Some(OptimizerConfig::DEFAULT_SEARCH_BUDGET)
        );
    }

    #[test]
    fn best_candidate_prefers_count_then_efficiency() {
        let summary = |index, fitted_count, efficiency| CandidateSummary {
            index,
            label: None,
            dims: (1.0, 1.0, 1.0),
            fitted_count,
            unfitted_count: 0,
            efficiency,
            fitted_weight: 0.0,
            is_complete: true,
        };
        assert_eq!(best_candidate(&[]), None);
        assert_eq!(
            best_candidate(&[summary(0, 3, 90.0), summary(1, 4, 20.0), summary(2, 4, 60.0)]),
            Some(2)
        );
        assert_eq!(
            best_candidate(&[summary(0, 2, 50.0), summary(1, 2, 50.0)]),
            Some(0)
        );
    }

    #[tokio::test]
    async fn pack_handler_reports_in_request_units() {
        let request = pack_request(json!({
            "container": { "name": "Box", "dims": [1.0, 1.0, 1.0] },
            "items": [
                { "id": "c", "name": "Cube", "length": 0.5, "width": 0.5, "height": 0.5,
                  "weight": 2000.0, "quantity": 2 }
            ],
            "units": "m",
            "weight_units": "g"
        }));

        let response = handle_pack(State(state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["label"], "Box");
        assert_eq!(body["fitted_count"], 2);
        assert_eq!(body["is_complete"], true);
        assert_eq!(body["efficiency"], 25.0);
        assert_eq!(body["fitted"][0]["name"], "Cube #1");
        assert_eq!(body["fitted"][1]["id"], "c-2");
        assert_eq!(body["fitted"][1]["pos"], json!([0.5, 0.0, 0.0]));
        assert_eq!(body["fitted"][0]["dims"], json!([0.5, 0.5, 0.5]));
        let weight = body["fitted"][0]["weight"].as_f64().unwrap();
        assert!((weight - 2000.0).abs() < 1e-6);
        let total = body["total_weight"].as_f64().unwrap();
        assert!((total - 4000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn pack_handler_lists_rejected_and_unfitted_items() {
        let request = pack_request(json!({
            "container": { "dims": [10.0, 10.0, 10.0] },
            "items": [
                { "name": "Broken", "length": -1.0, "width": 1.0, "height": 1.0 },
                { "name": "Long", "length": 20.0, "width": 1.0, "height": 1.0 }
            ]
        }));

        let response = handle_pack(State(state()), Ok(Json(request)))
            .await
            .into_response();
        let body = body_json(response).await;

        assert_eq!(body["rejected_count"], 1);
        assert_eq!(body["rejected"][0]["name"], "Broken");
        assert_eq!(body["total_items"], 1);
        assert_eq!(body["unfitted"][0]["reason_code"], "dimensions_exceed_container");
        assert_eq!(body["is_complete"], false);
    }

    #[tokio::test]
    async fn pack_handler_refuses_invalid_container() {
        let request = pack_request(json!({
            "container": { "dims": [0.0, 10.0, 10.0] },
            "items": []
        }));

        let response = handle_pack(State(state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid container configuration");
    }

    #[tokio::test]
    async fn pack_handler_refuses_too_fine_grid() {
        let request = pack_request(json!({
            "container": { "preset": "sprinter" },
            "items": [{ "length": 10.0, "width": 10.0, "height": 10.0 }],
            "grid_step": 0.01
        }));

        let response = handle_pack(State(state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid input data");
        assert!(body["details"].as_str().unwrap().contains("grid step"));
    }

    #[tokio::test]
    async fn pack_handler_keeps_shared_draft_ids_apart() {
        let request = pack_request(json!({
            "container": { "dims": [100.0, 100.0, 100.0] },
            "items": [
                { "id": "box", "length": 60.0, "width": 60.0, "height": 60.0 },
                { "id": "box", "length": 60.0, "width": 60.0, "height": 60.0 }
            ]
        }));

        let response = handle_pack(State(state()), Ok(Json(request)))
            .await
            .into_response();
        let body = body_json(response).await;
        assert_eq!(body["rejected_count"], 0);
        assert_eq!(body["fitted"][0]["id"], "box-1");
        assert_eq!(body["unfitted"][0]["id"], "box-2");
    }

    #[tokio::test]
    async fn pack_stream_emits_events_and_finishes() {
        let request = pack_request(json!({
            "container": { "dims": [10.0, 10.0, 10.0] },
            "items": [{ "name": "Cube", "length": 5.0, "width": 5.0, "height": 5.0 }]
        }));

        let response = handle_pack_stream(State(state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("\"type\":\"ItemPlaced\""));
        assert!(text.contains("\"type\":\"Finished\""));
    }

    #[tokio::test]
    async fn compare_handler_picks_the_container_fitting_most() {
        let request: CompareRequest = serde_json::from_value(json!({
            "containers": [
                { "name": "small", "dims": [10.0, 10.0, 10.0] },
                { "name": "large", "dims": [20.0, 10.0, 10.0] }
            ],
            "items": [{ "length": 10.0, "width": 10.0, "height": 10.0, "quantity": 2 }]
        }))
        .unwrap();

        let response = handle_compare(State(state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["best_index"], 1);
        assert_eq!(body["candidates"][0]["fitted_count"], 1);
        assert_eq!(body["candidates"][1]["label"], "large");
        assert_eq!(body["candidates"][1]["is_complete"], true);
    }

    #[tokio::test]
    async fn compare_handler_requires_containers() {
        let request: CompareRequest =
            serde_json::from_value(json!({ "containers": [], "items": [] })).unwrap();
        let response = handle_compare(State(state()), Ok(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn presets_handler_lists_all_presets() {
        let response = handle_presets().await.into_response();
        let body = body_json(response).await;
        let keys: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["53-truck", "48-truck", "sprinter"]);
        assert_eq!(body[2]["dims"], json!([360.0, 170.0, 180.0]));
    }
}
