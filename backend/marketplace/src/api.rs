//! Axum REST API consumed by the web front-end.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db;
use crate::errors::{MarketError, Result};
use crate::models::{Category, CreateReviewBody, Post, Review, TeamMember};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/posts", get(list_posts))
        .route("/api/team", get(list_team))
        .route(
            "/api/posts/:post_id/reviews",
            get(list_reviews).post(create_review),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `GET /api/posts?type={hiring|for_hire}`
///
/// Approved posts only, newest first.
pub async fn list_posts(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Post>>> {
    let category = match params.get("type").map(String::as_str) {
        None | Some("") => None,
        Some(raw) => Some(Category::parse(raw).ok_or_else(|| {
            MarketError::validation("type", "type must be one of hiring, for_hire")
        })?),
    };
    Ok(Json(db::list_approved_posts(&state.pool, category).await?))
}

/// `GET /api/team`
pub async fn list_team(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<TeamMember>>> {
    Ok(Json(db::list_team_members(&state.pool).await?))
}

/// `GET /api/posts/:postId/reviews`
pub async fn list_reviews(
    State(state): State<Arc<ApiState>>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Review>>> {
    require_post(&state.pool, post_id).await?;
    Ok(Json(db::list_reviews(&state.pool, post_id).await?))
}

/// `POST /api/posts/:postId/reviews`
pub async fn create_review(
    State(state): State<Arc<ApiState>>,
    Path(post_id): Path<i64>,
    body: std::result::Result<Json<CreateReviewBody>, JsonRejection>,
) -> Result<impl IntoResponse> {
    // Malformed JSON gets the same error body as any other validation failure.
    let Json(body) = body.map_err(|e| MarketError::validation("body", e.body_text()))?;
    let review = body.validate(post_id)?;
    require_post(&state.pool, post_id).await?;
    let created = db::create_review(&state.pool, &review).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn require_post(pool: &SqlitePool, post_id: i64) -> Result<()> {
    match db::get_post(pool, post_id).await? {
        Some(_) => Ok(()),
        None => Err(MarketError::NotFound(format!("Post {post_id}"))),
    }
}
