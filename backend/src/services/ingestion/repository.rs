use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

use crate::errors::{ServiceError, ServiceResult};
use crate::models::repository;
use crate::services::git_platforms::SourcePlatform;

/// Create the repository row on first sync, refresh it on every later one.
/// `created_at` and `last_synced_at` are left untouched on update.
pub async fn ingest_repository(
    db: &DatabaseConnection,
    platform: &dyn SourcePlatform,
    owner: &str,
    name: &str,
) -> ServiceResult<repository::Model> {
    let meta = platform.fetch_repository(owner, name).await?;
    let languages = platform.fetch_languages(owner, name).await?;

    let now = Utc::now();
    let languages = serde_json::to_value(&languages)
        .map_err(|e| ServiceError::InvalidInput(format!("Unserializable languages: {}", e)))?;

    let model = repository::ActiveModel {
        github_id: Set(meta.github_id),
        owner: Set(meta.owner),
        name: Set(meta.name),
        full_name: Set(meta.full_name),
        html_url: Set(meta.html_url),
        default_branch: Set(meta.default_branch),
        languages: Set(languages),
        created_at: Set(now),
        updated_at: Set(now),
        last_synced_at: Set(None),
    };

    repository::Entity::insert(model)
        .on_conflict(
            OnConflict::column(repository::Column::GithubId)
                .update_columns([
                    repository::Column::Owner,
                    repository::Column::Name,
                    repository::Column::FullName,
                    repository::Column::HtmlUrl,
                    repository::Column::DefaultBranch,
                    repository::Column::Languages,
                    repository::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    repository::Entity::find_by_id(meta.github_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Repository", meta.github_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_db, FakePlatform};

    #[tokio::test]
    async fn test_repository_created_then_updated() {
        let db = test_db().await;
        let mut platform = FakePlatform::demo();

        let first = ingest_repository(&db, &platform, "octo", "demo").await.unwrap();
        assert_eq!(first.full_name, "octo/demo");
        assert_eq!(first.languages["Rust"], 1200);

        platform.repo.default_branch = Some("trunk".to_string());
        let second = ingest_repository(&db, &platform, "octo", "demo").await.unwrap();

        assert_eq!(second.github_id, first.github_id);
        assert_eq!(second.default_branch.as_deref(), Some("trunk"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(repository::Entity::find().all(&db).await.unwrap().len(), 1);
    }
}
