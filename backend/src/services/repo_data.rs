use chrono::NaiveDate;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select,
};
use sea_orm::JoinType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::insight::{self, InsightKind};
use crate::models::pull_request::ItemState;
use crate::models::{commit, contributor, contributor_repo, daily_metric, issue, pull_request, repository};

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub state: Option<ItemState>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    /// 1-based page and a limit clamped to 1..=MAX_PAGE_SIZE
    pub fn page_and_limit(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoTotals {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub contributors: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoOverview {
    #[serde(flatten)]
    pub repository: repository::Model,
    pub totals: RepoTotals,
    pub latest_analysis: Option<insight::Model>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestDetail {
    #[serde(flatten)]
    pub pull_request: pull_request::Model,
    pub author: Option<contributor::Model>,
    pub summary: Option<insight::Model>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitDay {
    pub day: NaiveDate,
    pub commits: i32,
    pub additions: i64,
    pub deletions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestDay {
    pub day: NaiveDate,
    pub opened: i32,
    pub merged: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDay {
    pub day: NaiveDate,
    pub opened: i32,
    pub closed: i32,
}

/// Per-kind day series derived from the stored buckets
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityTimeline {
    pub commits: Vec<CommitDay>,
    pub prs: Vec<PullRequestDay>,
    pub issues: Vec<IssueDay>,
}

/// Number of commits, PRs and issues per linked contributor
#[derive(Debug, Clone, Default)]
pub struct ContributorCounts {
    pub commits: HashMap<i64, u64>,
    pub pull_requests: HashMap<i64, u64>,
    pub issues: HashMap<i64, u64>,
}

pub async fn list_repositories(db: &DatabaseConnection) -> ServiceResult<Vec<repository::Model>> {
    Ok(repository::Entity::find()
        .order_by_asc(repository::Column::FullName)
        .all(db)
        .await?)
}

pub async fn find_repository(db: &DatabaseConnection, repo_id: i64) -> ServiceResult<repository::Model> {
    repository::Entity::find_by_id(repo_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Repository", repo_id))
}

pub async fn repository_totals(db: &DatabaseConnection, repo_id: i64) -> ServiceResult<RepoTotals> {
    Ok(RepoTotals {
        commits: commit::Entity::find()
            .filter(commit::Column::RepoId.eq(repo_id))
            .count(db)
            .await?,
        pull_requests: pull_request::Entity::find()
            .filter(pull_request::Column::RepoId.eq(repo_id))
            .count(db)
            .await?,
        issues: issue::Entity::find()
            .filter(issue::Column::RepoId.eq(repo_id))
            .count(db)
            .await?,
        contributors: contributor_repo::Entity::find()
            .filter(contributor_repo::Column::RepoId.eq(repo_id))
            .count(db)
            .await?,
    })
}

pub async fn repository_overview(db: &DatabaseConnection, repo_id: i64) -> ServiceResult<RepoOverview> {
    let repository = find_repository(db, repo_id).await?;
    let totals = repository_totals(db, repo_id).await?;
    let latest_analysis = latest_insight(db, repo_id, InsightKind::Repo, None).await?;

    Ok(RepoOverview {
        repository,
        totals,
        latest_analysis,
    })
}

/// Stored day buckets, oldest first
pub async fn daily_metrics(
    db: &DatabaseConnection,
    repo_id: i64,
) -> ServiceResult<Vec<daily_metric::Model>> {
    Ok(daily_metric::Entity::find()
        .filter(daily_metric::Column::RepoId.eq(repo_id))
        .order_by_asc(daily_metric::Column::Day)
        .all(db)
        .await?)
}

/// Stored day buckets from `since` onwards, oldest first
pub async fn daily_metrics_since(
    db: &DatabaseConnection,
    repo_id: i64,
    since: NaiveDate,
) -> ServiceResult<Vec<daily_metric::Model>> {
    Ok(daily_metric::Entity::find()
        .filter(daily_metric::Column::RepoId.eq(repo_id))
        .filter(daily_metric::Column::Day.gte(since))
        .order_by_asc(daily_metric::Column::Day)
        .all(db)
        .await?)
}

pub fn activity_timeline(metrics: &[daily_metric::Model]) -> ActivityTimeline {
    ActivityTimeline {
        commits: metrics
            .iter()
            .map(|m| CommitDay {
                day: m.day,
                commits: m.commits_count,
                additions: m.lines_added,
                deletions: m.lines_deleted,
            })
            .collect(),
        prs: metrics
            .iter()
            .map(|m| PullRequestDay {
                day: m.day,
                opened: m.prs_opened,
                merged: m.prs_merged,
            })
            .collect(),
        issues: metrics
            .iter()
            .map(|m| IssueDay {
                day: m.day,
                opened: m.issues_opened,
                closed: m.issues_closed,
            })
            .collect(),
    }
}

/// Contributors linked to the repository, ordered by login
pub async fn linked_contributors(
    db: &DatabaseConnection,
    repo_id: i64,
) -> ServiceResult<Vec<contributor::Model>> {
    Ok(contributor::Entity::find()
        .join(JoinType::InnerJoin, contributor::Relation::ContributorRepo.def())
        .filter(contributor_repo::Column::RepoId.eq(repo_id))
        .order_by_asc(contributor::Column::Login)
        .all(db)
        .await?)
}

pub async fn contributor_counts(
    db: &DatabaseConnection,
    repo_id: i64,
) -> ServiceResult<ContributorCounts> {
    Ok(ContributorCounts {
        commits: count_by_contributor(
            commit::Entity::find().filter(commit::Column::RepoId.eq(repo_id)),
            commit::Column::ContributorId,
            db,
        )
        .await?,
        pull_requests: count_by_contributor(
            pull_request::Entity::find().filter(pull_request::Column::RepoId.eq(repo_id)),
            pull_request::Column::ContributorId,
            db,
        )
        .await?,
        issues: count_by_contributor(
            issue::Entity::find().filter(issue::Column::RepoId.eq(repo_id)),
            issue::Column::ContributorId,
            db,
        )
        .await?,
    })
}

pub(crate) async fn count_by_contributor<E: EntityTrait>(
    query: Select<E>,
    contributor_column: E::Column,
    db: &DatabaseConnection,
) -> Result<HashMap<i64, u64>, DbErr> {
    let rows: Vec<(Option<i64>, i64)> = query
        .select_only()
        .column(contributor_column)
        .column_as(Expr::col(contributor_column).count(), "count")
        .group_by(contributor_column)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, count)| Some((id?, count.max(0) as u64)))
        .collect())
}

/// All PRs of the repository, largest additions first, then largest deletions
pub async fn pull_requests_by_size(
    db: &DatabaseConnection,
    repo_id: i64,
) -> ServiceResult<Vec<pull_request::Model>> {
    Ok(pull_request::Entity::find()
        .filter(pull_request::Column::RepoId.eq(repo_id))
        .order_by_desc(pull_request::Column::Additions)
        .order_by_desc(pull_request::Column::Deletions)
        .order_by_desc(pull_request::Column::CreatedAt)
        .order_by_desc(pull_request::Column::Number)
        .all(db)
        .await?)
}

pub async fn list_pull_requests(
    db: &DatabaseConnection,
    repo_id: i64,
    query: &ListQuery,
) -> ServiceResult<Page<pull_request::Model>> {
    find_repository(db, repo_id).await?;

    let mut select = pull_request::Entity::find()
        .filter(pull_request::Column::RepoId.eq(repo_id))
        .order_by_desc(pull_request::Column::CreatedAt)
        .order_by_desc(pull_request::Column::Number);
    if let Some(state) = query.state {
        select = select.filter(pull_request::Column::State.eq(state));
    }

    paginate(db, select, query).await
}

pub async fn list_issues(
    db: &DatabaseConnection,
    repo_id: i64,
    query: &ListQuery,
) -> ServiceResult<Page<issue::Model>> {
    find_repository(db, repo_id).await?;

    let mut select = issue::Entity::find()
        .filter(issue::Column::RepoId.eq(repo_id))
        .order_by_desc(issue::Column::CreatedAt)
        .order_by_desc(issue::Column::Number);
    if let Some(state) = query.state {
        select = select.filter(issue::Column::State.eq(state));
    }

    paginate(db, select, query).await
}

async fn paginate<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    query: &ListQuery,
) -> ServiceResult<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let (page, limit) = query.page_and_limit();
    let paginator = select.paginate(db, limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items,
        total,
        page,
        limit,
    })
}

pub async fn find_pull_request(
    db: &DatabaseConnection,
    repo_id: i64,
    number: i32,
) -> ServiceResult<pull_request::Model> {
    pull_request::Entity::find_by_id((repo_id, number))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Pull request", format!("{}#{}", repo_id, number)))
}

pub async fn pull_request_detail(
    db: &DatabaseConnection,
    repo_id: i64,
    number: i32,
) -> ServiceResult<PullRequestDetail> {
    let pull_request = find_pull_request(db, repo_id, number).await?;

    let author = match pull_request.contributor_id {
        Some(id) => contributor::Entity::find_by_id(id).one(db).await?,
        None => None,
    };
    let summary = latest_insight(db, repo_id, InsightKind::PullRequest, Some(number)).await?;

    Ok(PullRequestDetail {
        pull_request,
        author,
        summary,
    })
}

/// Most recently updated insight of a kind. `pr_number` selects PR
/// summaries; repository-level insights have none.
pub async fn latest_insight(
    db: &DatabaseConnection,
    repo_id: i64,
    kind: InsightKind,
    pr_number: Option<i32>,
) -> Result<Option<insight::Model>, DbErr> {
    let mut select = insight::Entity::find()
        .filter(insight::Column::RepoId.eq(repo_id))
        .filter(insight::Column::Kind.eq(kind));
    select = match pr_number {
        Some(number) => select.filter(insight::Column::PrNumber.eq(number)),
        None => select.filter(insight::Column::PrNumber.is_null()),
    };

    select
        .order_by_desc(insight::Column::UpdatedAt)
        .one(db)
        .await
}
