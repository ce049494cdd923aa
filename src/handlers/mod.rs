//! # API Handlers
//!
//! HTTP endpoint handlers for the Dealflow API: service info, database
//! health, and on-demand deal suggestion.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::ai::AiError;
use crate::db;
use crate::error::{ApiError, upstream_error};
use crate::models::ServiceInfo;
use crate::server::AppState;
use crate::suggestion::{EventContext, GeneratedSuggestion, InventoryContext, SuggestionError};

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Database health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    db::health_check(&state.db).await.map_err(|err| {
        warn!(error = ?err, "Health check failed");
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Database service unavailable",
        )
    })?;

    Ok(Json(json!({"status": "ok"})))
}

/// Request body for the on-demand suggestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuggestDealsRequest {
    pub event_data: EventContext,
    pub inventory_items: Vec<InventoryContext>,
}

/// Generate a deal suggestion for the supplied event and inventory context.
///
/// Runs the suggestion generator without persisting anything; callers that
/// want durable suggestions go through the event pipeline instead.
#[utoipa::path(
    post,
    path = "/deals/suggest",
    request_body = SuggestDealsRequest,
    responses(
        (status = 200, description = "Generated suggestions", body = [GeneratedSuggestion]),
        (status = 400, description = "AI output failed validation or generation was blocked", body = ApiError),
        (status = 502, description = "AI provider failure", body = ApiError),
        (status = 503, description = "AI provider not configured", body = ApiError)
    ),
    tag = "deals"
)]
pub async fn suggest_deals(
    State(state): State<AppState>,
    Json(request): Json<SuggestDealsRequest>,
) -> Result<Json<Vec<GeneratedSuggestion>>, ApiError> {
    let Some(generator) = &state.generator else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "AI provider is not configured on this server",
        ));
    };

    match generator
        .generate(&request.event_data, &request.inventory_items)
        .await
    {
        Ok(suggestion) => {
            info!(
                vendor_id = %request.event_data.vendor_id,
                sku = %suggestion.suggested_product_sku,
                "Generated deal suggestion"
            );
            Ok(Json(vec![suggestion]))
        }
        Err(SuggestionError::Validation(message)) => {
            warn!(%message, "Suggestion validation failed");
            Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                &message,
            ))
        }
        Err(SuggestionError::Ai(AiError::Blocked { reason })) => {
            warn!(%reason, "AI generation blocked");
            Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "AI_GENERATION_BLOCKED",
                &format!("AI model response empty/blocked: {}", reason),
            ))
        }
        Err(SuggestionError::Ai(AiError::MissingApiKey)) => Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "AI provider is not configured on this server",
        )),
        Err(SuggestionError::Ai(AiError::Http { status, body })) => {
            Err(upstream_error("gemini", status, Some(body)))
        }
        Err(SuggestionError::Ai(err)) => {
            warn!(error = %err, "AI provider failure");
            Err(ApiError::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                &format!("AI provider failure: {}", err),
            ))
        }
    }
}
