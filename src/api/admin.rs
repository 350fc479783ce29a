use alloy::primitives::{Address, B256};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::routes::{error_response, APIResponse};
use crate::api::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let secret = match state.api_secret {
        Some(s) => s,
        None => {
            return Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body(Body::new("Unauthorized".to_string()))
                .expect("Invalid response");
        }
    };

    match request.headers().get("Authorization") {
        Some(auth) => {
            if auth.to_str().unwrap_or_default() != secret.as_str() {
                return Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .body(Body::new("Unauthorized. Invalid secret".to_string()))
                    .expect("Invalid response");
            }
        }
        None => {
            return Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body(Body::new(
                    "Unauthorized. Set Header Authorization: <secret>".to_string(),
                ))
                .expect("Invalid response");
        }
    };
    next.run(request).await
}

pub async fn node_info(State(state): State<AppState>) -> Response {
    match state.controller.node_info().await {
        Ok(info) => Json(info).into_response(),
        Err(e) => {
            let (status, body) = error_response(&e);
            (status, body).into_response()
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBatchRequest {
    pub registrar: Address,
    pub addresses: Vec<Address>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRequest {
    pub registrar: Address,
    pub wallet: Address,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytecodeEntryRequest {
    pub registrar: Address,
    pub code_hash: B256,
    pub implementation: Address,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeHashRequest {
    pub registrar: Address,
    pub code_hash: B256,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub admin: Address,
    pub principal: Address,
}

pub async fn add_addresses(
    State(state): State<AppState>,
    Json(request): Json<AddressBatchRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .add_addresses(request.registrar, request.addresses)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: "Addresses added to allowlist".into(),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn remove_addresses(
    State(state): State<AppState>,
    Json(request): Json<AddressBatchRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .remove_addresses(request.registrar, request.addresses)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: "Addresses removed from allowlist".into(),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn add_wallet(
    State(state): State<AppState>,
    Json(request): Json<WalletRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .add_wallet(request.registrar, request.wallet)
        .await
    {
        Ok(code_hash) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: format!("Wallet added to allowlist under codehash {}", code_hash),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn remove_wallet(
    State(state): State<AppState>,
    Json(request): Json<WalletRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .remove_wallet(request.registrar, request.wallet)
        .await
    {
        Ok(code_hash) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: format!("Wallet removed from allowlist under codehash {}", code_hash),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn add_bytecode_entry(
    State(state): State<AppState>,
    Json(request): Json<BytecodeEntryRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .add_bytecode_entry(request.registrar, request.code_hash, request.implementation)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: "Bytecode entry added to allowlist".into(),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn remove_bytecode_entry(
    State(state): State<AppState>,
    Json(request): Json<CodeHashRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .remove_bytecode_entry(request.registrar, request.code_hash)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: "Bytecode entry removed from allowlist".into(),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn grant_registrar(
    State(state): State<AppState>,
    Json(request): Json<RoleRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .grant_registrar(request.admin, request.principal)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: "Registrar capability granted".into(),
            }),
        ),
        Err(e) => error_response(&e),
    }
}

pub async fn revoke_registrar(
    State(state): State<AppState>,
    Json(request): Json<RoleRequest>,
) -> (StatusCode, Json<APIResponse>) {
    match state
        .controller
        .revoke_registrar(request.admin, request.principal)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(APIResponse::Success {
                message: "Registrar capability revoked".into(),
            }),
        ),
        Err(e) => error_response(&e),
    }
}
