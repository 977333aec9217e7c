use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::errors::ServiceError;
use crate::services::insights::InsightService;
use crate::services::repo_data::{self, ListQuery};

/// GET /api/repos/{id}/prs?state=&page=&limit=
pub async fn list_pull_requests(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i64>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let page = repo_data::list_pull_requests(&db, path.into_inner(), &query).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /api/repos/{id}/prs/{number}
pub async fn get_pull_request(
    db: web::Data<DatabaseConnection>,
    path: web::Path<(i64, i32)>,
) -> Result<HttpResponse, ServiceError> {
    let (repo_id, number) = path.into_inner();
    let detail = repo_data::pull_request_detail(&db, repo_id, number).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// POST /api/repos/{id}/prs/{number}/summarize
/// Generate (or regenerate) the stored summary of one PR
pub async fn summarize_pull_request(
    insights: web::Data<InsightService>,
    path: web::Path<(i64, i32)>,
) -> Result<HttpResponse, ServiceError> {
    let (repo_id, number) = path.into_inner();
    let summary = insights.summarize_pull_request(repo_id, number).await?;
    Ok(HttpResponse::Ok().json(summary))
}
