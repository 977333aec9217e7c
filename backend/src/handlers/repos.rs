use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::errors::ServiceError;
use crate::models::daily_metric;
use crate::services::analytics::AnalyticsService;
use crate::services::repo_data::{self, ActivityTimeline};

#[derive(Debug, Serialize)]
struct MetricsResponse {
    metrics: Vec<daily_metric::Model>,
    timeline: ActivityTimeline,
}

/// GET /api/repos
pub async fn list_repositories(
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ServiceError> {
    let repos = repo_data::list_repositories(&db).await?;
    Ok(HttpResponse::Ok().json(repos))
}

/// GET /api/repos/{id}
pub async fn get_overview(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let overview = repo_data::repository_overview(&db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(overview))
}

/// GET /api/repos/{id}/analytics
/// Always answers with data once the repository exists, narrative or not
pub async fn get_analytics(
    analytics: web::Data<AnalyticsService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let full = analytics.full_analytics(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(full))
}

/// GET /api/repos/{id}/metrics
pub async fn get_metrics(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let repo_id = path.into_inner();
    repo_data::find_repository(&db, repo_id).await?;

    let metrics = repo_data::daily_metrics(&db, repo_id).await?;
    let timeline = repo_data::activity_timeline(&metrics);
    Ok(HttpResponse::Ok().json(MetricsResponse { metrics, timeline }))
}
