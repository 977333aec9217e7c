use futures_util::stream::{self, StreamExt, TryStreamExt};
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};

use super::{AuthorResolver, IngestionContext};
use crate::errors::{ServiceError, ServiceResult};
use crate::models::commit;
use crate::services::git_platforms::RemoteCommit;

/// Ingest the default-branch history. Each commit needs its own stats
/// request, so those run with bounded concurrency.
pub async fn ingest_commits(ctx: &IngestionContext<'_>) -> ServiceResult<usize> {
    let commits = ctx
        .platform
        .fetch_commits(ctx.owner, ctx.name, ctx.default_branch)
        .await?;
    let resolver = AuthorResolver::load(ctx.db, ctx.repo_id).await?;

    log::info!(
        "📝 Ingesting {} commits for {}/{}",
        commits.len(),
        ctx.owner,
        ctx.name
    );

    let resolver = &resolver;
    stream::iter(commits)
        .map(|c| async move {
            upsert_commit(ctx, resolver, c).await?;
            Ok::<_, ServiceError>(())
        })
        .buffer_unordered(ctx.concurrency)
        .try_fold(0usize, |count, ()| async move { Ok(count + 1) })
        .await
}

async fn upsert_commit(
    ctx: &IngestionContext<'_>,
    resolver: &AuthorResolver,
    c: RemoteCommit,
) -> ServiceResult<()> {
    let stats = ctx
        .platform
        .fetch_commit_stats(ctx.owner, ctx.name, &c.sha)
        .await?;

    let model = commit::ActiveModel {
        sha: Set(c.sha),
        repo_id: Set(ctx.repo_id),
        contributor_id: Set(resolver.resolve(c.author_id)),
        message: Set(c.message),
        additions: Set(stats.additions),
        deletions: Set(stats.deletions),
        total_changes: Set(stats.total),
        committed_at: Set(c.committed_at),
    };

    commit::Entity::insert(model)
        .on_conflict(
            OnConflict::column(commit::Column::Sha)
                .update_columns([
                    commit::Column::RepoId,
                    commit::Column::ContributorId,
                    commit::Column::Message,
                    commit::Column::Additions,
                    commit::Column::Deletions,
                    commit::Column::TotalChanges,
                    commit::Column::CommittedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(ctx.db)
        .await?;

    Ok(())
}
