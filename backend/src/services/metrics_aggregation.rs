use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::ServiceResult;
use crate::models::{commit, daily_metric, issue, pull_request};

/// Counters for one calendar day (UTC) of repository activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub commits_count: i32,
    pub prs_opened: i32,
    pub prs_merged: i32,
    pub issues_opened: i32,
    pub issues_closed: i32,
    pub lines_added: i64,
    pub lines_deleted: i64,
}

impl DayBucket {
    /// Field-wise sum of stored buckets
    pub fn total<'a>(metrics: impl IntoIterator<Item = &'a daily_metric::Model>) -> Self {
        metrics.into_iter().fold(Self::default(), |mut acc, m| {
            acc.commits_count += m.commits_count;
            acc.prs_opened += m.prs_opened;
            acc.prs_merged += m.prs_merged;
            acc.issues_opened += m.issues_opened;
            acc.issues_closed += m.issues_closed;
            acc.lines_added += m.lines_added;
            acc.lines_deleted += m.lines_deleted;
            acc
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// Days written by this run
    pub updated_days: usize,
    /// Previously stored days no longer backed by any entity
    pub pruned_days: u64,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct CommitActivity {
    pub committed_at: DateTime<Utc>,
    pub additions: i32,
    pub deletions: i32,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct PullRequestActivity {
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct IssueActivity {
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

fn day_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Fold the complete entity history into day buckets.
///
/// Pure: identical input always yields identical buckets, whatever the order
/// of the slices.
pub fn build_buckets(
    commits: &[CommitActivity],
    pulls: &[PullRequestActivity],
    issues: &[IssueActivity],
) -> BTreeMap<NaiveDate, DayBucket> {
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for c in commits {
        let bucket = buckets.entry(day_of(c.committed_at)).or_default();
        bucket.commits_count += 1;
        bucket.lines_added += i64::from(c.additions);
        bucket.lines_deleted += i64::from(c.deletions);
    }

    for pr in pulls {
        buckets.entry(day_of(pr.created_at)).or_default().prs_opened += 1;
        if let Some(merged_at) = pr.merged_at {
            buckets.entry(day_of(merged_at)).or_default().prs_merged += 1;
        }
    }

    for i in issues {
        buckets.entry(day_of(i.created_at)).or_default().issues_opened += 1;
        if let Some(closed_at) = i.closed_at {
            buckets.entry(day_of(closed_at)).or_default().issues_closed += 1;
        }
    }

    buckets
}

/// Recompute every day bucket of a repository from its full history and
/// replace the stored set with the result.
pub async fn aggregate_daily_metrics(
    db: &DatabaseConnection,
    repo_id: i64,
) -> ServiceResult<AggregationResult> {
    let commits = commit::Entity::find()
        .select_only()
        .columns([
            commit::Column::CommittedAt,
            commit::Column::Additions,
            commit::Column::Deletions,
        ])
        .filter(commit::Column::RepoId.eq(repo_id))
        .into_model::<CommitActivity>()
        .all(db)
        .await?;

    let pulls = pull_request::Entity::find()
        .select_only()
        .columns([pull_request::Column::CreatedAt, pull_request::Column::MergedAt])
        .filter(pull_request::Column::RepoId.eq(repo_id))
        .into_model::<PullRequestActivity>()
        .all(db)
        .await?;

    let issues = issue::Entity::find()
        .select_only()
        .columns([issue::Column::CreatedAt, issue::Column::ClosedAt])
        .filter(issue::Column::RepoId.eq(repo_id))
        .into_model::<IssueActivity>()
        .all(db)
        .await?;

    let buckets = build_buckets(&commits, &pulls, &issues);

    log::info!(
        "📊 Aggregating {} commits, {} PRs, {} issues into {} days for repo {}",
        commits.len(),
        pulls.len(),
        issues.len(),
        buckets.len(),
        repo_id
    );

    let txn = db.begin().await?;

    for (day, bucket) in &buckets {
        upsert_bucket(&txn, repo_id, *day, bucket).await?;
    }

    let days: Vec<NaiveDate> = buckets.keys().copied().collect();
    let mut stale = daily_metric::Entity::delete_many()
        .filter(daily_metric::Column::RepoId.eq(repo_id));
    if !days.is_empty() {
        stale = stale.filter(daily_metric::Column::Day.is_not_in(days));
    }
    let pruned = stale.exec(&txn).await?.rows_affected;

    txn.commit().await?;

    Ok(AggregationResult {
        updated_days: buckets.len(),
        pruned_days: pruned,
    })
}

async fn upsert_bucket<C: ConnectionTrait>(
    db: &C,
    repo_id: i64,
    day: NaiveDate,
    bucket: &DayBucket,
) -> ServiceResult<()> {
    let model = daily_metric::ActiveModel {
        repo_id: Set(repo_id),
        day: Set(day),
        commits_count: Set(bucket.commits_count),
        prs_opened: Set(bucket.prs_opened),
        prs_merged: Set(bucket.prs_merged),
        issues_opened: Set(bucket.issues_opened),
        issues_closed: Set(bucket.issues_closed),
        lines_added: Set(bucket.lines_added),
        lines_deleted: Set(bucket.lines_deleted),
    };

    daily_metric::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([daily_metric::Column::RepoId, daily_metric::Column::Day])
                .update_columns([
                    daily_metric::Column::CommitsCount,
                    daily_metric::Column::PrsOpened,
                    daily_metric::Column::PrsMerged,
                    daily_metric::Column::IssuesOpened,
                    daily_metric::Column::IssuesClosed,
                    daily_metric::Column::LinesAdded,
                    daily_metric::Column::LinesDeleted,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_repository, test_db, ts, REPO_ID};
    use sea_orm::QueryOrder;

    fn commit_at(at: &str, additions: i32, deletions: i32) -> CommitActivity {
        CommitActivity {
            committed_at: ts(at),
            additions,
            deletions,
        }
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_commits_bucketed_per_day() {
        let commits = vec![
            commit_at("2024-01-01T09:00:00Z", 10, 2),
            commit_at("2024-01-01T23:59:59Z", 5, 1),
            commit_at("2024-01-02T00:00:00Z", 3, 0),
        ];

        let buckets = build_buckets(&commits, &[], &[]);

        assert_eq!(buckets.len(), 2);
        let day1 = buckets[&date("2024-01-01")];
        assert_eq!((day1.commits_count, day1.lines_added, day1.lines_deleted), (2, 15, 3));
        let day2 = buckets[&date("2024-01-02")];
        assert_eq!((day2.commits_count, day2.lines_added, day2.lines_deleted), (1, 3, 0));
    }

    #[test]
    fn test_merge_counted_on_merge_day() {
        let pulls = vec![PullRequestActivity {
            created_at: ts("2024-01-01T12:00:00Z"),
            merged_at: Some(ts("2024-01-03T08:00:00Z")),
        }];

        let buckets = build_buckets(&[], &pulls, &[]);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[&date("2024-01-01")].prs_opened, 1);
        assert_eq!(buckets[&date("2024-01-01")].prs_merged, 0);
        assert_eq!(buckets[&date("2024-01-03")].prs_opened, 0);
        assert_eq!(buckets[&date("2024-01-03")].prs_merged, 1);
    }

    #[test]
    fn test_issue_close_counted_on_close_day() {
        let issues = vec![
            IssueActivity {
                created_at: ts("2024-02-01T12:00:00Z"),
                closed_at: Some(ts("2024-02-04T08:00:00Z")),
            },
            IssueActivity {
                created_at: ts("2024-02-01T13:00:00Z"),
                closed_at: None,
            },
        ];

        let buckets = build_buckets(&[], &[], &issues);

        assert_eq!(buckets[&date("2024-02-01")].issues_opened, 2);
        assert_eq!(buckets[&date("2024-02-04")].issues_closed, 1);
    }

    async fn insert_commit(db: &DatabaseConnection, sha: &str, at: &str, additions: i32, deletions: i32) {
        commit::Entity::insert(commit::ActiveModel {
            sha: Set(sha.to_string()),
            repo_id: Set(REPO_ID),
            contributor_id: Set(None),
            message: Set(String::new()),
            additions: Set(additions),
            deletions: Set(deletions),
            total_changes: Set(additions + deletions),
            committed_at: Set(ts(at)),
        })
        .exec_without_returning(db)
        .await
        .unwrap();
    }

    async fn stored(db: &DatabaseConnection) -> Vec<daily_metric::Model> {
        daily_metric::Entity::find()
            .order_by_asc(daily_metric::Column::Day)
            .all(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_aggregation_rerun_is_identical() {
        let db = test_db().await;
        seed_repository(&db, REPO_ID).await;
        insert_commit(&db, "a", "2024-01-01T09:00:00Z", 10, 2).await;
        insert_commit(&db, "b", "2024-01-01T10:00:00Z", 5, 1).await;
        insert_commit(&db, "c", "2024-01-02T10:00:00Z", 3, 0).await;

        let first = aggregate_daily_metrics(&db, REPO_ID).await.unwrap();
        let rows = stored(&db).await;
        let second = aggregate_daily_metrics(&db, REPO_ID).await.unwrap();

        assert_eq!(first.updated_days, 2);
        assert_eq!(second.updated_days, 2);
        assert_eq!(second.pruned_days, 0);
        assert_eq!(rows, stored(&db).await);
        assert_eq!(rows[0].commits_count, 2);
        assert_eq!((rows[0].lines_added, rows[0].lines_deleted), (15, 3));
    }

    #[tokio::test]
    async fn test_days_without_activity_are_pruned() {
        let db = test_db().await;
        seed_repository(&db, REPO_ID).await;
        insert_commit(&db, "a", "2024-01-01T09:00:00Z", 1, 1).await;
        insert_commit(&db, "b", "2024-01-05T09:00:00Z", 1, 1).await;
        aggregate_daily_metrics(&db, REPO_ID).await.unwrap();

        commit::Entity::delete_by_id("b").exec(&db).await.unwrap();
        let result = aggregate_daily_metrics(&db, REPO_ID).await.unwrap();

        assert_eq!(result.pruned_days, 1);
        let rows = stored(&db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].day, date("2024-01-01"));
    }
}
