use std::str::FromStr;

use alloy::primitives::Address;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::storage;
use crate::storage::QueryOptions;
use crate::types::{AllowlistError, AllowlistEvent, DecisionPath, EntryRecord};

pub async fn health() -> &'static str {
    "OK"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub address: Address,
    pub allowed: bool,
    pub path: DecisionPath,
}

/// Route for evaluating the allowlist predicate against one address
pub async fn check(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<CheckResponse>, (StatusCode, Json<APIResponse>)> {
    let address = Address::from_str(&address).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(APIResponse::Error {
                message: format!("Invalid address: {}", address),
            }),
        )
    })?;

    match state.controller.check(address).await {
        Ok(decision) => Ok(Json(CheckResponse {
            address,
            allowed: decision.allowed,
            path: decision.path,
        })),
        Err(e) => {
            tracing::warn!("Failed to check address: {:?}", e);
            Err(error_response(&e))
        }
    }
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<QueryOptions>,
) -> Result<Json<Vec<EntryRecord>>, (StatusCode, String)> {
    match storage::list_entries(&state.db, &params).await {
        Ok(entries) => Ok(Json(entries)),
        Err(_e) => {
            tracing::warn!("Failed to list entries: {:?}", _e);

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list entries".to_string(),
            ))
        }
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<QueryOptions>,
) -> Result<Json<Vec<AllowlistEvent>>, (StatusCode, String)> {
    match storage::list_events(&state.db, &params).await {
        Ok(events) => Ok(Json(events)),
        Err(_e) => {
            tracing::warn!("Failed to list events: {:?}", _e);

            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list events".to_string(),
            ))
        }
    }
}

pub fn error_response(e: &eyre::Report) -> (StatusCode, Json<APIResponse>) {
    let status = match e.downcast_ref::<AllowlistError>() {
        Some(AllowlistError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
        Some(
            AllowlistError::InvalidAddress
            | AllowlistError::AlreadyRegistered(_)
            | AllowlistError::NotRegistered(_),
        ) => StatusCode::BAD_REQUEST,
        Some(AllowlistError::ClassifierUnavailable(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(APIResponse::Error {
            message: e.to_string(),
        }),
    )
}

#[derive(Serialize)]
pub enum APIResponse {
    Error { message: String },
    Success { message: String },
}
