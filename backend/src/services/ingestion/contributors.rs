use futures_util::stream::{self, StreamExt, TryStreamExt};
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};

use super::IngestionContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::{contributor, contributor_repo};
use crate::services::git_platforms::RemoteContributor;

/// Upsert every repository contributor and make sure it is linked to the
/// repository. Returns the number of contributors touched.
pub async fn ingest_contributors(ctx: &IngestionContext<'_>) -> ServiceResult<usize> {
    let contributors = ctx.platform.fetch_contributors(ctx.owner, ctx.name).await?;

    log::info!(
        "👥 Ingesting {} contributors for {}/{}",
        contributors.len(),
        ctx.owner,
        ctx.name
    );

    stream::iter(contributors)
        .map(|c| async move {
            upsert_contributor(ctx, c).await?;
            Ok::<_, ServiceError>(())
        })
        .buffer_unordered(ctx.concurrency)
        .try_fold(0usize, |count, ()| async move { Ok(count + 1) })
        .await
}

async fn upsert_contributor(ctx: &IngestionContext<'_>, c: RemoteContributor) -> ServiceResult<()> {
    let contributor_id = c.github_id;

    let model = contributor::ActiveModel {
        github_id: Set(c.github_id),
        login: Set(c.login),
        avatar_url: Set(c.avatar_url),
        html_url: Set(c.html_url),
    };

    contributor::Entity::insert(model)
        .on_conflict(
            OnConflict::column(contributor::Column::GithubId)
                .update_columns([
                    contributor::Column::Login,
                    contributor::Column::AvatarUrl,
                    contributor::Column::HtmlUrl,
                ])
                .to_owned(),
        )
        .exec_without_returning(ctx.db)
        .await?;

    // Create-if-absent: an existing link is never rewritten
    let link = contributor_repo::ActiveModel {
        contributor_id: Set(contributor_id),
        repo_id: Set(ctx.repo_id),
    };

    contributor_repo::Entity::insert(link)
        .on_conflict(
            OnConflict::columns([
                contributor_repo::Column::ContributorId,
                contributor_repo::Column::RepoId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .do_nothing()
        .exec(ctx.db)
        .await?;

    Ok(())
}
