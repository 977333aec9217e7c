use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::errors::ServiceError;
use crate::services::repo_sync::RepoSyncService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub repo_url: String,
}

/// POST /api/sync
/// Run a full sync of the repository behind a GitHub URL
pub async fn sync_repository(
    sync: web::Data<RepoSyncService>,
    payload: web::Json<SyncRequest>,
) -> Result<HttpResponse, ServiceError> {
    let result = sync.sync_repository_url(&payload.repo_url).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_db, FakePlatform, REPO_ID};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::json;
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_sync_route() {
        let db = test_db().await;
        let service = RepoSyncService::new(db, Arc::new(FakePlatform::demo()), 2);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .route("/api/sync", web::post().to(sync_repository)),
        )
        .await;

        let synced: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/api/sync")
                .set_json(json!({"repoUrl": "https://github.com/octo/demo"}))
                .to_request(),
        )
        .await;
        assert_eq!(synced["repoId"], REPO_ID);
        assert_eq!(synced["fullName"], "octo/demo");
        assert_eq!(synced["pullRequests"], 2);
        assert_eq!(synced["issues"], 2);

        let rejected = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/sync")
                .set_json(json!({"repoUrl": "not a url"}))
                .to_request(),
        )
        .await;
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(rejected).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid URL format"));
    }
}
