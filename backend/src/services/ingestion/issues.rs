use futures_util::stream::{self, StreamExt, TryStreamExt};
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};

use super::{AuthorResolver, IngestionContext};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::issue;
use crate::services::git_platforms::RemoteIssue;

/// Ingest all issues regardless of state. Pull requests were already
/// filtered out by the platform.
pub async fn ingest_issues(ctx: &IngestionContext<'_>) -> ServiceResult<usize> {
    let issues = ctx.platform.fetch_issues(ctx.owner, ctx.name).await?;
    let resolver = AuthorResolver::load(ctx.db, ctx.repo_id).await?;

    log::info!(
        "🐛 Ingesting {} issues for {}/{}",
        issues.len(),
        ctx.owner,
        ctx.name
    );

    let resolver = &resolver;
    stream::iter(issues)
        .map(|i| async move {
            upsert_issue(ctx, resolver, i).await?;
            Ok::<_, ServiceError>(())
        })
        .buffer_unordered(ctx.concurrency)
        .try_fold(0usize, |count, ()| async move { Ok(count + 1) })
        .await
}

async fn upsert_issue(
    ctx: &IngestionContext<'_>,
    resolver: &AuthorResolver,
    i: RemoteIssue,
) -> ServiceResult<()> {
    let model = issue::ActiveModel {
        repo_id: Set(ctx.repo_id),
        number: Set(i.number),
        contributor_id: Set(resolver.resolve(i.author_id)),
        title: Set(i.title),
        body: Set(i.body),
        state: Set(i.state),
        created_at: Set(i.created_at),
        closed_at: Set(i.closed_at),
    };

    issue::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([issue::Column::RepoId, issue::Column::Number])
                .update_columns([
                    issue::Column::ContributorId,
                    issue::Column::Title,
                    issue::Column::Body,
                    issue::Column::State,
                    issue::Column::CreatedAt,
                    issue::Column::ClosedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(ctx.db)
        .await?;

    Ok(())
}
