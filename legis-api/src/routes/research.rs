//! Research API endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use legis_core::{ResearchError, ResearchRequest, SectionKey, SectionSearchConfig};
use serde::Serialize;
use tracing::{error, info};

use crate::AppState;

/// Create research routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/research", post(run_research))
        .route("/research/sections", get(list_sections))
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SectionInfo {
    key: SectionKey,
    display_name: &'static str,
    providers: Vec<String>,
    target: usize,
}

fn status_for(error: &ResearchError) -> StatusCode {
    match error {
        ResearchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ResearchError::Api(_) | ResearchError::Network(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run the research pipeline and return the finished report
async fn run_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> impl IntoResponse {
    info!("Research requested: {}", request.query);

    let research_service = match &state.research_service {
        Some(service) => service,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "Research service not available. Check OPENAI_API_KEY environment variable.".to_string(),
                }),
            )
                .into_response();
        }
    };

    match research_service.run(&request, None).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Research failed: {}", e);
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Section table in effect, in report order
async fn list_sections(State(state): State<AppState>) -> Json<Vec<SectionInfo>> {
    let defaults = SectionSearchConfig::default();
    let sections = state
        .research_service
        .as_ref()
        .map(|service| &service.config().sections)
        .unwrap_or(&defaults);

    Json(
        sections
            .iter()
            .map(|(key, target)| SectionInfo {
                key,
                display_name: key.display_name(),
                providers: target.providers.clone(),
                target: target.target,
            })
            .collect(),
    )
}
