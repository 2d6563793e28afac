//! joblens-api - HTTP search API for joblens.
//!
//! Read-only query surface over the search index: free-text search with
//! structured filters, and per-job detail lookups. Writes happen in the
//! pipeline; this process never touches the relational store.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use joblens_core::{
    defaults, Error, ExperienceLevel, SearchRequest, SortMode,
};
use joblens_search::{EsClient, SearchPlanner};

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    planner: Arc<SearchPlanner>,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Wrapper mapping core errors onto HTTP responses.
enum ApiError {
    Core(Error),
    RateLimited,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, description) = match &self {
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                "Too many requests. Please wait before retrying.".to_string(),
            ),
            ApiError::Core(e) => {
                let (status, code) = match e {
                    Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
                    Error::NotFound(_) | Error::JobNotFound(_) => {
                        (StatusCode::NOT_FOUND, "not_found")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    warn!(error = %e, "Request failed");
                }
                (status, code, e.to_string())
            }
        };
        (
            status,
            Json(serde_json::json!({
                "error": code,
                "error_description": description,
            })),
        )
            .into_response()
    }
}

// =============================================================================
// SEARCH
// =============================================================================

/// Query-string shape of a search request.
#[derive(Debug, Default, Deserialize)]
struct SearchQueryParams {
    q: Option<String>,
    location: Option<String>,
    /// Comma-separated employment-type codes.
    employment_type: Option<String>,
    /// Comma-separated experience levels.
    experience_level: Option<String>,
    /// Comma-separated company ids.
    company_ids: Option<String>,
    is_remote: Option<bool>,
    /// `relevance` (default) or `date`.
    sort: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

fn split_csv(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

impl SearchQueryParams {
    /// Validate and convert into the planner's request shape.
    fn into_request(self) -> Result<SearchRequest, Error> {
        let sort = match self.sort.as_deref() {
            None | Some("relevance") => SortMode::Relevance,
            Some("date") => SortMode::Date,
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "sort must be 'relevance' or 'date', got {other:?}"
                )))
            }
        };

        let experience_levels = match &self.experience_level {
            None => Vec::new(),
            Some(raw) => split_csv(raw)
                .map(|level| {
                    ExperienceLevel::parse(level).ok_or_else(|| {
                        Error::InvalidInput(format!("unknown experience level: {level:?}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let company_ids = match &self.company_ids {
            None => Vec::new(),
            Some(raw) => split_csv(raw)
                .map(|id| {
                    Uuid::parse_str(id)
                        .map_err(|_| Error::InvalidInput(format!("invalid company id: {id:?}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let employment_types = self
            .employment_type
            .as_deref()
            .map(|raw| split_csv(raw).map(String::from).collect())
            .unwrap_or_default();

        Ok(SearchRequest {
            q: self.q,
            location: self.location,
            employment_types,
            experience_levels,
            company_ids,
            is_remote: self.is_remote,
            sort,
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(defaults::SEARCH_PER_PAGE),
        })
    }
}

async fn search_jobs(
    State(state): State<AppState>,
    Query(params): Query<SearchQueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    check_rate_limit(&state)?;
    let request = params.into_request()?;
    let response = state.planner.search_jobs(&request).await?;
    Ok(Json(response))
}

async fn job_detail(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    check_rate_limit(&state)?;
    let document = state.planner.job_detail(job_id).await?;
    Ok(Json(document))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn check_rate_limit(state: &AppState) -> Result<(), ApiError> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            warn!("Rate limit exceeded");
            return Err(ApiError::RateLimited);
        }
    }
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/jobs/search", get(search_jobs))
        .route("/api/v1/jobs/:id", get(job_detail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    // Rate limiting configuration.
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled { "enabled" } else { "disabled" },
        rate_limit_requests,
        rate_limit_period_secs
    );

    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    let engine = Arc::new(EsClient::from_env()?);
    let planner = Arc::new(SearchPlanner::new(engine));

    let state = AppState {
        planner,
        rate_limiter,
    };

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default_to_relevance_first_page() {
        let request = SearchQueryParams {
            q: Some("rust".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.sort, SortMode::Relevance);
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, defaults::SEARCH_PER_PAGE);
    }

    #[test]
    fn test_params_parse_csv_lists() {
        let company = Uuid::new_v4();
        let request = SearchQueryParams {
            q: Some("rust".to_string()),
            employment_type: Some("FULL_TIME, CONTRACT".to_string()),
            experience_level: Some("senior,LEAD".to_string()),
            company_ids: Some(company.to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.employment_types, vec!["FULL_TIME", "CONTRACT"]);
        assert_eq!(
            request.experience_levels,
            vec![ExperienceLevel::Senior, ExperienceLevel::Lead]
        );
        assert_eq!(request.company_ids, vec![company]);
    }

    #[test]
    fn test_params_reject_unknown_sort() {
        let err = SearchQueryParams {
            sort: Some("salary".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_params_reject_unknown_experience_level() {
        let err = SearchQueryParams {
            experience_level: Some("NINJA".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_params_reject_malformed_company_id() {
        let err = SearchQueryParams {
            company_ids: Some("not-a-uuid".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_params_date_sort() {
        let request = SearchQueryParams {
            sort: Some("date".to_string()),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert_eq!(request.sort, SortMode::Date);
    }
}
