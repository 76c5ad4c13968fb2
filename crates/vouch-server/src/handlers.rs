use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vouch_network::{Agent, AgentLookup, AgentSummary};
use vouch_types::PublicKey;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    // The demo front end is served from another origin and only reads.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/health", get(health))
        .route("/agents", get(list_agents))
        .route("/agents/{query}", get(get_agent))
        .route("/agents/{query}/rank", get(get_agent_rank))
        .route("/audit", get(run_audit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn short_id(key: &PublicKey) -> String {
    key.to_hex()[..12].to_string()
}

/// Map a lookup result onto the matched agent or an HTTP error.
fn found<'a>(query: &str, lookup: AgentLookup<'a>) -> Result<&'a Agent, (StatusCode, String)> {
    match lookup {
        AgentLookup::Found(agent) => Ok(agent),
        AgentLookup::NotFound => Err((
            StatusCode::NOT_FOUND,
            format!("no agent matches {query:?}"),
        )),
        AgentLookup::Ambiguous(candidates) => {
            let ids: Vec<String> = candidates
                .iter()
                .map(|agent| short_id(&agent.public_key()))
                .collect();
            Err((
                StatusCode::MULTIPLE_CHOICES,
                format!("{query:?} matches {} agents: {}", ids.len(), ids.join(", ")),
            ))
        }
    }
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<String>> {
    let network = state.network.read().await;
    Json(network.list_agents().iter().map(short_id).collect())
}

async fn get_agent(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<AgentSummary>, (StatusCode, String)> {
    let network = state.network.read().await;
    let agent = found(&query, network.find_agent(&query))?;
    Ok(Json(agent.summary()))
}

async fn get_agent_rank(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<HashMap<PublicKey, f64>>, (StatusCode, String)> {
    let network = state.network.read().await;
    let agent = found(&query, network.find_agent(&query))?;
    Ok(Json(agent.calculate_ranking(network.rank_config())))
}

#[derive(serde::Deserialize)]
struct AuditParams {
    node1: String,
    #[serde(default)]
    node2: Option<String>,
    #[serde(default)]
    hops: Option<usize>,
}

#[derive(serde::Serialize)]
struct AuditResponse {
    initiator: AgentSummary,
    responder: AgentSummary,
}

async fn run_audit(
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
) -> Result<Json<AuditResponse>, (StatusCode, String)> {
    let mut network = state.network.write().await;
    let initiator = found(&params.node1, network.find_agent(&params.node1))?.public_key();
    let responder = match &params.node2 {
        Some(query) => Some(found(query, network.find_agent(query))?.public_key()),
        None => None,
    };

    let max_hops = params.hops.unwrap_or(state.max_audit_hops);
    let audited = network
        .pairwise_audit(&initiator, responder.as_ref(), max_hops)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let summary_of = |key: &PublicKey| {
        network
            .get_agent(key)
            .map(Agent::summary)
            .ok_or((StatusCode::NOT_FOUND, format!("no agent matches {key}")))
    };
    Ok(Json(AuditResponse {
        initiator: summary_of(&initiator)?,
        responder: summary_of(&audited)?,
    }))
}
