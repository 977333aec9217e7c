use futures_util::stream::{self, StreamExt, TryStreamExt};
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};

use super::{AuthorResolver, IngestionContext};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::pull_request;
use crate::services::git_platforms::RemotePullRequest;

/// Ingest all pull requests regardless of state. The list endpoint omits
/// diff stats, so a detail request fills them in when missing.
pub async fn ingest_pull_requests(ctx: &IngestionContext<'_>) -> ServiceResult<usize> {
    let pulls = ctx.platform.fetch_pull_requests(ctx.owner, ctx.name).await?;
    let resolver = AuthorResolver::load(ctx.db, ctx.repo_id).await?;

    log::info!(
        "🔀 Ingesting {} pull requests for {}/{}",
        pulls.len(),
        ctx.owner,
        ctx.name
    );

    let resolver = &resolver;
    stream::iter(pulls)
        .map(|pr| async move {
            upsert_pull_request(ctx, resolver, pr).await?;
            Ok::<_, ServiceError>(())
        })
        .buffer_unordered(ctx.concurrency)
        .try_fold(0usize, |count, ()| async move { Ok(count + 1) })
        .await
}

async fn upsert_pull_request(
    ctx: &IngestionContext<'_>,
    resolver: &AuthorResolver,
    pr: RemotePullRequest,
) -> ServiceResult<()> {
    let pr = if pr.has_diff_stats() {
        pr
    } else {
        ctx.platform
            .fetch_pull_request(ctx.owner, ctx.name, pr.number)
            .await?
    };

    let model = pull_request::ActiveModel {
        repo_id: Set(ctx.repo_id),
        number: Set(pr.number),
        contributor_id: Set(resolver.resolve(pr.author_id)),
        title: Set(pr.title),
        body: Set(pr.body),
        state: Set(pr.state),
        additions: Set(pr.additions.unwrap_or(0)),
        deletions: Set(pr.deletions.unwrap_or(0)),
        changed_files: Set(pr.changed_files.unwrap_or(0)),
        created_at: Set(pr.created_at),
        merged_at: Set(pr.merged_at),
        closed_at: Set(pr.closed_at),
    };

    pull_request::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([pull_request::Column::RepoId, pull_request::Column::Number])
                .update_columns([
                    pull_request::Column::ContributorId,
                    pull_request::Column::Title,
                    pull_request::Column::Body,
                    pull_request::Column::State,
                    pull_request::Column::Additions,
                    pull_request::Column::Deletions,
                    pull_request::Column::ChangedFiles,
                    pull_request::Column::CreatedAt,
                    pull_request::Column::MergedAt,
                    pull_request::Column::ClosedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(ctx.db)
        .await?;

    Ok(())
}
