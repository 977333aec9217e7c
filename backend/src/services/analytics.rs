use chrono::{DateTime, Days, NaiveDate, Utc};
use futures_util::future;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

use crate::errors::ServiceResult;
use crate::models::{contributor, daily_metric, pull_request, repository};
use crate::services::insights::InsightService;
use crate::services::metrics_aggregation::DayBucket;
use crate::services::narrative::{NarrativeGenerator, RepoAnalysis, WeeklyReport};
use crate::services::repo_data::{self, ActivityTimeline, ContributorCounts};

const CONTEXT_HOTSPOTS: usize = 10;
const CONTEXT_CONTRIBUTORS: usize = 5;
const CONTEXT_DAYS: u64 = 30;
pub const WEEKLY_HOTSPOTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIndicators {
    pub total_commits: i32,
    pub total_prs_opened: i32,
    pub total_prs_merged: i32,
    /// Percentage, one decimal
    pub pr_merge_rate: f64,
    pub total_issues_opened: i32,
    pub total_issues_closed: i32,
    /// Percentage, one decimal
    pub issue_close_rate: f64,
    pub active_days: usize,
    pub total_contributors: usize,
}

/// A pull request ranked by line churn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub number: i32,
    pub title: String,
    pub additions: i32,
    pub deletions: i32,
    pub total_changes: i64,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorStats {
    pub id: i64,
    pub login: String,
    pub avatar_url: Option<String>,
    pub total_commits: u64,
    pub total_prs: u64,
    pub total_issues: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeInsights {
    pub repo_analysis: RepoAnalysis,
    pub weekly_report: WeeklyReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullAnalytics {
    pub repo: repository::Model,
    pub metrics: Vec<daily_metric::Model>,
    pub contributors: Vec<ContributorStats>,
    pub timeline: ActivityTimeline,
    pub hotspots: Vec<Hotspot>,
    pub quality: QualityIndicators,
    pub ai: NarrativeInsights,
}

/// Payload handed to the narrative generator for a repository analysis
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoAnalysisContext<'a> {
    pub repository: &'a str,
    pub languages: &'a serde_json::Value,
    pub quality: &'a QualityIndicators,
    pub hotspots: &'a [Hotspot],
    pub recent_activity: &'a [daily_metric::Model],
    pub top_contributors: &'a [ContributorStats],
}

/// First day of the `days`-long window ending on `today`, both ends inclusive.
pub fn window_start(today: NaiveDate, days: u64) -> NaiveDate {
    today
        .checked_sub_days(Days::new(days.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN)
}

/// `numerator / denominator` as a percentage rounded to one decimal, 0 when
/// there is nothing to divide by.
pub fn percentage(numerator: i32, denominator: i32) -> f64 {
    if denominator <= 0 {
        return 0.0;
    }
    let pct = f64::from(numerator.max(0)) / f64::from(denominator) * 100.0;
    ((pct * 10.0).round() / 10.0).min(100.0)
}

pub fn quality_indicators(
    metrics: &[daily_metric::Model],
    total_contributors: usize,
) -> QualityIndicators {
    let totals = DayBucket::total(metrics);

    QualityIndicators {
        total_commits: totals.commits_count,
        total_prs_opened: totals.prs_opened,
        total_prs_merged: totals.prs_merged,
        pr_merge_rate: percentage(totals.prs_merged, totals.prs_opened),
        total_issues_opened: totals.issues_opened,
        total_issues_closed: totals.issues_closed,
        issue_close_rate: percentage(totals.issues_closed, totals.issues_opened),
        active_days: metrics.iter().filter(|m| m.commits_count > 0).count(),
        total_contributors,
    }
}

/// Rank by churn, highest first. Equal churn keeps input order.
pub fn rank_hotspots(pulls: &[pull_request::Model]) -> Vec<Hotspot> {
    let mut hotspots: Vec<Hotspot> = pulls
        .iter()
        .map(|pr| Hotspot {
            number: pr.number,
            title: pr.title.clone(),
            additions: pr.additions,
            deletions: pr.deletions,
            total_changes: i64::from(pr.additions) + i64::from(pr.deletions),
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        })
        .collect();

    // sort_by is stable
    hotspots.sort_by(|a, b| b.total_changes.cmp(&a.total_changes));
    hotspots
}

/// Per-contributor activity, most commits first
pub fn contributor_stats(
    contributors: Vec<contributor::Model>,
    counts: &ContributorCounts,
) -> Vec<ContributorStats> {
    let count = |map: &std::collections::HashMap<i64, u64>, id: i64| map.get(&id).copied().unwrap_or(0);

    let mut stats: Vec<ContributorStats> = contributors
        .into_iter()
        .map(|c| ContributorStats {
            id: c.github_id,
            total_commits: count(&counts.commits, c.github_id),
            total_prs: count(&counts.pull_requests, c.github_id),
            total_issues: count(&counts.issues, c.github_id),
            login: c.login,
            avatar_url: c.avatar_url,
        })
        .collect();

    stats.sort_by(|a, b| b.total_commits.cmp(&a.total_commits));
    stats
}

pub struct AnalyticsService {
    db: DatabaseConnection,
    insights: InsightService,
}

impl AnalyticsService {
    pub fn new(db: DatabaseConnection, generator: Arc<dyn NarrativeGenerator>) -> Self {
        Self {
            insights: InsightService::new(db.clone(), generator),
            db,
        }
    }

    /// Everything known about a repository plus generated narrative.
    ///
    /// Narrative failures never fail the call: each narrative falls back to
    /// its "(analysis unavailable)" form independently.
    pub async fn full_analytics(&self, repo_id: i64) -> ServiceResult<FullAnalytics> {
        self.full_analytics_at(repo_id, Utc::now().date_naive()).await
    }

    pub async fn full_analytics_at(
        &self,
        repo_id: i64,
        today: NaiveDate,
    ) -> ServiceResult<FullAnalytics> {
        let repo = repo_data::find_repository(&self.db, repo_id).await?;
        let metrics = repo_data::daily_metrics(&self.db, repo_id).await?;
        let contributors = repo_data::linked_contributors(&self.db, repo_id).await?;
        let counts = repo_data::contributor_counts(&self.db, repo_id).await?;
        let pulls = repo_data::pull_requests_by_size(&self.db, repo_id).await?;

        let contributors = contributor_stats(contributors, &counts);
        let hotspots = rank_hotspots(&pulls);
        let quality = quality_indicators(&metrics, contributors.len());
        let timeline = repo_data::activity_timeline(&metrics);

        let recent_start = window_start(today, CONTEXT_DAYS);
        let recent_from = metrics.partition_point(|m| m.day < recent_start);

        let context = RepoAnalysisContext {
            repository: &repo.full_name,
            languages: &repo.languages,
            quality: &quality,
            hotspots: &hotspots[..hotspots.len().min(CONTEXT_HOTSPOTS)],
            recent_activity: &metrics[recent_from..],
            top_contributors: &contributors[..contributors.len().min(CONTEXT_CONTRIBUTORS)],
        };

        let (analysis, weekly) = future::join(
            self.insights.analyze_repository(&repo, &context),
            self.insights.weekly_report(
                &repo,
                &hotspots[..hotspots.len().min(WEEKLY_HOTSPOTS)],
                today,
            ),
        )
        .await;

        let repo_analysis = analysis.unwrap_or_else(|e| {
            log::warn!("⚠️  Repo analysis unavailable for {}: {}", repo.full_name, e);
            RepoAnalysis::unavailable()
        });
        let weekly_report = weekly.unwrap_or_else(|e| {
            log::warn!("⚠️  Weekly report unavailable for {}: {}", repo.full_name, e);
            WeeklyReport::unavailable()
        });

        Ok(FullAnalytics {
            repo,
            metrics,
            contributors,
            timeline,
            hotspots,
            quality,
            ai: NarrativeInsights {
                repo_analysis,
                weekly_report,
            },
        })
    }
}
