//! REST API Server Module
//!
//! HTTP surface over the bridge registry. Every response uses the same
//! `ApiResponse` envelope; caller mistakes map to 4xx statuses, chain and store
//! trouble to 5xx.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::config::ApiConfig;
use crate::engine::BridgeEngine;
use crate::error::BridgeError;
use crate::registry::BridgeRegistry;
use crate::transfer::TransferDetails;

// ============================================================================
// REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

/// Validator signature posted by a remote validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub validator_id: String,
    /// Base64 Ed25519 signature over the transfer digest
    pub signature: String,
}

/// Body of cancel and dispute requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: String,
}

// ============================================================================
// REPLY HELPERS
// ============================================================================

fn status_for(e: &BridgeError) -> StatusCode {
    match e {
        BridgeError::InvalidRequest(_) | BridgeError::ValidationRejected(_) => StatusCode::BAD_REQUEST,
        BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
        BridgeError::InvalidTransition { .. } | BridgeError::AlreadyCompleted(_) => StatusCode::CONFLICT,
        BridgeError::Chain(_) => StatusCode::BAD_GATEWAY,
        BridgeError::Configuration(_) | BridgeError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn success<T: Serialize>(data: T) -> Response {
    warp::reply::with_status(
        warp::reply::json(&ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
        StatusCode::OK,
    )
    .into_response()
}

fn failure(status: StatusCode, message: String) -> Response {
    warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
        status,
    )
    .into_response()
}

fn reply<T: Serialize>(result: Result<T, BridgeError>) -> Response {
    match result {
        Ok(data) => success(data),
        Err(e) => {
            if !e.is_caller_error() {
                error!("Request failed: {}", e);
            }
            failure(status_for(&e), e.to_string())
        }
    }
}

async fn engine_for(registry: &BridgeRegistry, bridge_id: &str) -> Result<Arc<BridgeEngine>, Response> {
    registry
        .get(bridge_id)
        .await
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, format!("Unknown bridge: {}", bridge_id)))
}

// ============================================================================
// HANDLERS
// ============================================================================

pub async fn list_bridges_handler(registry: Arc<BridgeRegistry>) -> Result<Response, Rejection> {
    Ok(success(registry.bridge_ids().await))
}

/// Handler for `POST /bridges/{id}/transfers`.
///
/// # Arguments
///
/// * `bridge_id` - Bridge to transfer through
/// * `details` - Transfer request
/// * `registry` - Bridge registry
///
/// # Returns
///
/// * `Ok(Response)` - Transfer snapshot, or 400 when the request is invalid
pub async fn initiate_transfer_handler(
    bridge_id: String,
    details: TransferDetails,
    registry: Arc<BridgeRegistry>,
) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.initiate_transfer(&details).await),
        Err(response) => response,
    })
}

pub async fn transfer_status_handler(
    bridge_id: String,
    transfer_id: String,
    registry: Arc<BridgeRegistry>,
) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.get_transaction_status(&transfer_id).await),
        Err(response) => response,
    })
}

pub async fn estimate_fee_handler(
    bridge_id: String,
    details: TransferDetails,
    registry: Arc<BridgeRegistry>,
) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.estimate_fee(&details).await),
        Err(response) => response,
    })
}

pub async fn bridge_health_handler(bridge_id: String, registry: Arc<BridgeRegistry>) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.get_health().await),
        Err(response) => response,
    })
}

pub async fn tokens_handler(bridge_id: String, registry: Arc<BridgeRegistry>) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.get_supported_tokens().await),
        Err(response) => response,
    })
}

pub async fn validators_handler(bridge_id: String, registry: Arc<BridgeRegistry>) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.get_validators().await),
        Err(response) => response,
    })
}

/// Handler for `POST /bridges/{id}/transfers/{tid}/validations`.
///
/// Rejected signatures (unregistered validator, bad signature) answer 400 and
/// leave the transfer untouched.
pub async fn submit_validation_handler(
    bridge_id: String,
    transfer_id: String,
    request: ValidationRequest,
    registry: Arc<BridgeRegistry>,
) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(
            engine
                .submit_validation(&transfer_id, &request.validator_id, &request.signature)
                .await,
        ),
        Err(response) => response,
    })
}

pub async fn cancel_transfer_handler(
    bridge_id: String,
    transfer_id: String,
    request: ReasonRequest,
    registry: Arc<BridgeRegistry>,
) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.cancel_transfer(&transfer_id, &request.reason).await),
        Err(response) => response,
    })
}

pub async fn dispute_transfer_handler(
    bridge_id: String,
    transfer_id: String,
    request: ReasonRequest,
    registry: Arc<BridgeRegistry>,
) -> Result<Response, Rejection> {
    Ok(match engine_for(&registry, &bridge_id).await {
        Ok(engine) => reply(engine.dispute_transfer(&transfer_id, &request.reason).await),
        Err(response) => response,
    })
}

// ============================================================================
// FILTERS AND REJECTIONS
// ============================================================================

pub fn with_registry(
    registry: Arc<BridgeRegistry>,
) -> impl Filter<Extract = (Arc<BridgeRegistry>,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

/// Global rejection handler for all API routes.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(err) = rej.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", err))
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };
    Ok(failure(status, message))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

pub struct ApiServer {
    config: ApiConfig,
    registry: Arc<BridgeRegistry>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, registry: Arc<BridgeRegistry>) -> Self {
        Self { config, registry }
    }

    /// Serves the API until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| {
                format!("invalid API address {}:{}", self.config.host, self.config.port)
            })?;
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .with_context(|| format!("binding API server to {}", addr))?;
        info!("API server listening on {}", bound);
        server.await;
        Ok(())
    }

    /// All API routes with the rejection handler attached.
    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
        let registry = self.registry.clone();

        let health = warp::path!("health").and(warp::get()).map(|| {
            warp::reply::json(&ApiResponse::<String> {
                success: true,
                data: Some("ok".to_string()),
                error: None,
            })
        });

        let bridges = warp::path!("bridges")
            .and(warp::get())
            .and(with_registry(registry.clone()))
            .and_then(list_bridges_handler);

        let initiate = warp::path!("bridges" / String / "transfers")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_registry(registry.clone()))
            .and_then(initiate_transfer_handler);

        let status = warp::path!("bridges" / String / "transfers" / String)
            .and(warp::get())
            .and(with_registry(registry.clone()))
            .and_then(transfer_status_handler);

        let fees = warp::path!("bridges" / String / "fees")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_registry(registry.clone()))
            .and_then(estimate_fee_handler);

        let bridge_health = warp::path!("bridges" / String / "health")
            .and(warp::get())
            .and(with_registry(registry.clone()))
            .and_then(bridge_health_handler);

        let tokens = warp::path!("bridges" / String / "tokens")
            .and(warp::get())
            .and(with_registry(registry.clone()))
            .and_then(tokens_handler);

        let validators = warp::path!("bridges" / String / "validators")
            .and(warp::get())
            .and(with_registry(registry.clone()))
            .and_then(validators_handler);

        let validations = warp::path!("bridges" / String / "transfers" / String / "validations")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_registry(registry.clone()))
            .and_then(submit_validation_handler);

        let cancel = warp::path!("bridges" / String / "transfers" / String / "cancel")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_registry(registry.clone()))
            .and_then(cancel_transfer_handler);

        let dispute = warp::path!("bridges" / String / "transfers" / String / "dispute")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_registry(registry))
            .and_then(dispute_transfer_handler);

        health
            .or(bridges)
            .or(initiate)
            .or(status)
            .or(fees)
            .or(bridge_health)
            .or(tokens)
            .or(validators)
            .or(validations)
            .or(cancel)
            .or(dispute)
            .recover(handle_rejection)
    }
}
