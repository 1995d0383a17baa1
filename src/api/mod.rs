use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    AqiError,
    models::CoordinateQuery,
    providers::ProviderKind,
    resolver::{Resolver, StepDecision},
};

/// Where [`router`] is mounted; redirects are built against it
pub const BASE_PATH: &str = "/api";

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/aqi", get(resolve_aqi))
        .route("/aqi/{provider}", get(provider_aqi))
        .with_state(resolver)
}

fn status_response(status: StatusCode, message: String) -> Response {
    (status, Json(StatusBody { status: message })).into_response()
}

fn error_response(error: &AqiError) -> Response {
    let status = match error {
        AqiError::MissingCoordinate { .. } | AqiError::InvalidCoordinate { .. } => {
            StatusCode::BAD_REQUEST
        }
        AqiError::AllProvidersExhausted { .. } => StatusCode::NOT_FOUND,
        AqiError::Config { .. } | AqiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    status_response(status, error.user_message())
}

/// Full fail-over inside one request
async fn resolve_aqi(
    State(resolver): State<Arc<Resolver>>,
    Query(query): Query<CoordinateQuery>,
) -> Response {
    match resolver.resolve(&query).await {
        Ok(resolution) => Json(resolution.result).into_response(),
        Err(e) => error_response(&e),
    }
}

/// One provider per request; failure answers with a 301 to the next one
async fn provider_aqi(
    State(resolver): State<Arc<Resolver>>,
    Path(slug): Path<String>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<CoordinateQuery>,
) -> Response {
    let Ok(kind) = slug.parse::<ProviderKind>() else {
        return status_response(StatusCode::NOT_FOUND, format!("Unknown provider '{slug}'"));
    };

    let coordinate = match resolver.validate(&query) {
        Ok(coordinate) => coordinate,
        Err(e) => return error_response(&e),
    };

    match resolver.step(kind, &coordinate, query.device.clone()).await {
        StepDecision::Resolved(resolution) => Json(resolution.result).into_response(),
        StepDecision::HandOff {
            failed,
            next: Some(next),
        } => {
            let location = next_location(next, raw_query.as_deref());
            info!("{} had no usable data, redirecting to {}", failed, location);
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
        }
        StepDecision::HandOff { next: None, .. } => {
            error_response(&AqiError::AllProvidersExhausted {
                attempts: resolver.chain().len(),
            })
        }
    }
}

/// Next provider's endpoint, carrying the caller's query string unchanged
fn next_location(next: ProviderKind, raw_query: Option<&str>) -> String {
    match raw_query {
        Some(query) if !query.is_empty() => format!("{BASE_PATH}/aqi/{next}?{query}"),
        _ => format!("{BASE_PATH}/aqi/{next}"),
    }
}
