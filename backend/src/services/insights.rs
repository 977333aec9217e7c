use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{NarrativeError, ServiceResult};
use crate::models::insight::{self, InsightKind};
use crate::models::pull_request::ItemState;
use crate::models::{commit, contributor, daily_metric, issue, pull_request, repository};
use crate::services::analytics::{window_start, Hotspot, RepoAnalysisContext};
use crate::services::metrics_aggregation::DayBucket;
use crate::services::narrative::{
    generate_structured, prompts, NarrativeGenerator, PrSummary, RepoAnalysis, WeeklyReport,
};
use crate::services::repo_data;

const WEEK_DAYS: u64 = 7;
const RECENT_ITEMS: u64 = 10;
const ACTIVE_CONTRIBUTORS: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecentPullRequest {
    number: i32,
    title: String,
    state: ItemState,
    merged: bool,
    total_changes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecentIssue {
    number: i32,
    title: String,
    state: ItemState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WeeklyContext<'a> {
    repository: &'a str,
    since: NaiveDate,
    totals: DayBucket,
    daily: Vec<daily_metric::Model>,
    active_contributors: Vec<String>,
    recent_pull_requests: Vec<RecentPullRequest>,
    recent_issues: Vec<RecentIssue>,
    hotspots: &'a [Hotspot],
}

/// Generates narratives and keeps them as insight records.
///
/// PR summaries and repository analyses are replaced in place, weekly
/// reports accumulate as history.
pub struct InsightService {
    db: DatabaseConnection,
    generator: Arc<dyn NarrativeGenerator>,
}

impl InsightService {
    pub fn new(db: DatabaseConnection, generator: Arc<dyn NarrativeGenerator>) -> Self {
        Self { db, generator }
    }

    pub async fn summarize_pull_request(&self, repo_id: i64, number: i32) -> ServiceResult<PrSummary> {
        let repo = repo_data::find_repository(&self.db, repo_id).await?;
        let pr = repo_data::find_pull_request(&self.db, repo_id, number).await?;
        let author = match pr.contributor_id {
            Some(id) => contributor::Entity::find_by_id(id)
                .one(&self.db)
                .await?
                .map(|c| c.login),
            None => None,
        };

        let user = prompts::pr_summary(&repo.full_name, &pr, author.as_deref());
        let summary: PrSummary =
            generate_structured(self.generator.as_ref(), prompts::PR_SUMMARY_SYSTEM, &user).await?;

        self.upsert(InsightKind::PullRequest, repo_id, Some(number), &summary.summary, &summary)
            .await?;

        log::info!("🤖 Summarized PR #{} of {}", number, repo.full_name);
        Ok(summary)
    }

    pub async fn analyze_repository(
        &self,
        repo: &repository::Model,
        context: &RepoAnalysisContext<'_>,
    ) -> ServiceResult<RepoAnalysis> {
        let user = prompts::repo_analysis(context)?;
        let analysis: RepoAnalysis =
            generate_structured(self.generator.as_ref(), prompts::REPO_ANALYSIS_SYSTEM, &user).await?;

        self.upsert(InsightKind::Repo, repo.github_id, None, &analysis.summary, &analysis)
            .await?;

        Ok(analysis)
    }

    /// Report on the seven days up to `today`. Each report is stored as a new record.
    pub async fn weekly_report(
        &self,
        repo: &repository::Model,
        hotspots: &[Hotspot],
        today: NaiveDate,
    ) -> ServiceResult<WeeklyReport> {
        let since = window_start(today, WEEK_DAYS);
        let context = self.weekly_context(repo, hotspots, since).await?;

        let user = prompts::weekly_report(&context)?;
        let report: WeeklyReport =
            generate_structured(self.generator.as_ref(), prompts::WEEKLY_REPORT_SYSTEM, &user).await?;

        self.append(InsightKind::Weekly, repo.github_id, &report.velocity_summary, &report)
            .await?;

        Ok(report)
    }

    async fn weekly_context<'a>(
        &self,
        repo: &'a repository::Model,
        hotspots: &'a [Hotspot],
        since: NaiveDate,
    ) -> ServiceResult<WeeklyContext<'a>> {
        let since_ts = since.and_time(chrono::NaiveTime::MIN).and_utc();
        let repo_id = repo.github_id;

        let daily = repo_data::daily_metrics_since(&self.db, repo_id, since).await?;

        let recent_pull_requests = pull_request::Entity::find()
            .filter(pull_request::Column::RepoId.eq(repo_id))
            .filter(pull_request::Column::CreatedAt.gte(since_ts))
            .order_by_desc(pull_request::Column::CreatedAt)
            .limit(RECENT_ITEMS)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|pr| RecentPullRequest {
                number: pr.number,
                merged: pr.merged_at.is_some(),
                total_changes: i64::from(pr.additions) + i64::from(pr.deletions),
                title: pr.title,
                state: pr.state,
            })
            .collect();

        let recent_issues = issue::Entity::find()
            .filter(issue::Column::RepoId.eq(repo_id))
            .filter(issue::Column::CreatedAt.gte(since_ts))
            .order_by_desc(issue::Column::CreatedAt)
            .limit(RECENT_ITEMS)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|i| RecentIssue {
                number: i.number,
                title: i.title,
                state: i.state,
            })
            .collect();

        let commit_counts = repo_data::count_by_contributor(
            commit::Entity::find()
                .filter(commit::Column::RepoId.eq(repo_id))
                .filter(commit::Column::CommittedAt.gte(since_ts)),
            commit::Column::ContributorId,
            &self.db,
        )
        .await?;

        let committers = if commit_counts.is_empty() {
            Vec::new()
        } else {
            contributor::Entity::find()
                .filter(contributor::Column::GithubId.is_in(commit_counts.keys().copied()))
                .order_by_asc(contributor::Column::Login)
                .all(&self.db)
                .await?
        };
        let mut active: Vec<(String, u64)> = committers
            .into_iter()
            .map(|c| {
                let count = commit_counts.get(&c.github_id).copied().unwrap_or(0);
                (c.login, count)
            })
            .collect();
        active.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(WeeklyContext {
            repository: &repo.full_name,
            since,
            totals: DayBucket::total(&daily),
            daily,
            active_contributors: active
                .into_iter()
                .take(ACTIVE_CONTRIBUTORS)
                .map(|(login, _)| login)
                .collect(),
            recent_pull_requests,
            recent_issues,
            hotspots,
        })
    }

    /// Write one insight per entity. Regenerating replaces summary and payload
    /// in place, atomically on the (kind, repo, scope) key.
    async fn upsert<T: Serialize>(
        &self,
        kind: InsightKind,
        repo_id: i64,
        pr_number: Option<i32>,
        summary: &str,
        payload: &T,
    ) -> ServiceResult<()> {
        let metadata = serde_json::to_value(payload).map_err(NarrativeError::from)?;

        insight::Entity::insert(new_record(kind, repo_id, pr_number, summary, metadata))
            .on_conflict(
                OnConflict::columns([
                    insight::Column::Kind,
                    insight::Column::RepoId,
                    insight::Column::Scope,
                ])
                .update_columns([
                    insight::Column::Summary,
                    insight::Column::Metadata,
                    insight::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn append<T: Serialize>(
        &self,
        kind: InsightKind,
        repo_id: i64,
        summary: &str,
        payload: &T,
    ) -> ServiceResult<()> {
        let metadata = serde_json::to_value(payload).map_err(NarrativeError::from)?;
        new_record(kind, repo_id, None, summary, metadata)
            .insert(&self.db)
            .await?;
        Ok(())
    }
}

fn new_record(
    kind: InsightKind,
    repo_id: i64,
    pr_number: Option<i32>,
    summary: &str,
    metadata: serde_json::Value,
) -> insight::ActiveModel {
    let id = Uuid::new_v4();
    let now = Utc::now();
    insight::ActiveModel {
        id: Set(id),
        kind: Set(kind),
        repo_id: Set(repo_id),
        pr_number: Set(pr_number),
        scope: Set(insight::scope_for(kind, pr_number, id)),
        summary: Set(summary.to_string()),
        metadata: Set(metadata),
        created_at: Set(now),
        updated_at: Set(now),
    }
}
