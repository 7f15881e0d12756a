use actix::Addr;
use actix_web::http::StatusCode;
use actix_web::{delete, get, post, put, web, HttpResponse, ResponseError};
use serde::Deserialize;
use serde_json::json;

use crate::error::FleetError;
use crate::fleet_actor::message::{
    DespawnBot, GetHistory, GetMetrics, GetStatus, SetCapacity, SetPattern, SetSpawnRate,
    SpawnBot, StartFleet, StopFleet,
};
use crate::fleet_actor::FleetActor;
use crate::movement::MovementPattern;

#[derive(Clone)]
pub struct ControlState {
    pub fleet: Addr<FleetActor>,
    pub registry: prometheus::Registry,
}

impl ResponseError for FleetError {
    fn status_code(&self) -> StatusCode {
        match self {
            FleetError::Configuration(_) => StatusCode::BAD_REQUEST,
            FleetError::CapacityReached { .. } | FleetError::Cancelled { .. } => {
                StatusCode::CONFLICT
            }
            FleetError::Session(_) => StatusCode::BAD_GATEWAY,
            FleetError::Mailbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "status": "error",
            "error": self.to_string(),
        }))
    }
}

#[derive(Deserialize)]
pub struct PatternRequest {
    pub pattern: String,
}

#[derive(Deserialize)]
pub struct ValueRequest {
    pub value: i64,
}

#[post("/start")]
async fn start(state: web::Data<ControlState>) -> Result<HttpResponse, FleetError> {
    let started = state.fleet.send(StartFleet).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "started": started })))
}

#[post("/stop")]
async fn stop(state: web::Data<ControlState>) -> Result<HttpResponse, FleetError> {
    let removed = state.fleet.send(StopFleet).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "disconnected": removed })))
}

#[post("/bots")]
async fn spawn_bot(state: web::Data<ControlState>) -> Result<HttpResponse, FleetError> {
    let id = state.fleet.send(SpawnBot).await??;
    Ok(HttpResponse::Created().json(json!({ "status": "ok", "id": id })))
}

#[delete("/bots/{id}")]
async fn despawn_bot(
    state: web::Data<ControlState>,
    path: web::Path<String>,
) -> Result<HttpResponse, FleetError> {
    let id = path.into_inner();
    let removed = state.fleet.send(DespawnBot { id: id.clone() }).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "id": id, "removed": removed })))
}

#[put("/pattern")]
async fn set_pattern(
    state: web::Data<ControlState>,
    body: web::Json<PatternRequest>,
) -> Result<HttpResponse, FleetError> {
    let pattern = body
        .pattern
        .parse::<MovementPattern>()
        .map_err(FleetError::from)?;
    state.fleet.send(SetPattern(pattern)).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "pattern": pattern })))
}

#[put("/capacity")]
async fn set_capacity(
    state: web::Data<ControlState>,
    body: web::Json<ValueRequest>,
) -> Result<HttpResponse, FleetError> {
    state.fleet.send(SetCapacity(body.value)).await??;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "capacity": body.value })))
}

#[put("/spawn_rate")]
async fn set_spawn_rate(
    state: web::Data<ControlState>,
    body: web::Json<ValueRequest>,
) -> Result<HttpResponse, FleetError> {
    state.fleet.send(SetSpawnRate(body.value)).await??;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "spawn_rate": body.value })))
}

#[get("/metrics")]
async fn fleet_metrics_snapshot(
    state: web::Data<ControlState>,
) -> Result<HttpResponse, FleetError> {
    let metrics = state.fleet.send(GetMetrics).await?;
    Ok(HttpResponse::Ok().json(metrics))
}

#[get("/history")]
async fn history(state: web::Data<ControlState>) -> Result<HttpResponse, FleetError> {
    let history = state.fleet.send(GetHistory).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[get("/status")]
async fn status(state: web::Data<ControlState>) -> Result<HttpResponse, FleetError> {
    let status = state.fleet.send(GetStatus).await?;
    Ok(HttpResponse::Ok().json(status))
}

async fn prometheus_metrics(state: web::Data<ControlState>) -> HttpResponse {
    match fleet_metrics::encode_text(&state.registry) {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            HttpResponse::InternalServerError().body(format!("Metrics encode error: {}", e))
        }
    }
}

/// `/fleet/*` 제어 API 와 `/metrics` 를 등록한다
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/fleet")
            .service(start)
            .service(stop)
            .service(spawn_bot)
            .service(despawn_bot)
            .service(set_pattern)
            .service(set_capacity)
            .service(set_spawn_rate)
            .service(fleet_metrics_snapshot)
            .service(history)
            .service(status),
    )
    .route("/metrics", web::get().to(prometheus_metrics))
    .route("/health", web::get().to(|| async { HttpResponse::Ok().body("OK") }));
}
