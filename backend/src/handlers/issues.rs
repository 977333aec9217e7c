use actix_web::{web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::errors::ServiceError;
use crate::services::repo_data::{self, ListQuery};

/// GET /api/repos/{id}/issues?state=&page=&limit=
pub async fn list_issues(
    db: web::Data<DatabaseConnection>,
    path: web::Path<i64>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let page = repo_data::list_issues(&db, path.into_inner(), &query).await?;
    Ok(HttpResponse::Ok().json(page))
}
