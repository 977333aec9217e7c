use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, IntoActiveModel, Set};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::errors::ServiceResult;
use crate::models::repository;
use crate::services::git_platforms::SourcePlatform;
use crate::services::ingestion::commits::ingest_commits;
use crate::services::ingestion::contributors::ingest_contributors;
use crate::services::ingestion::issues::ingest_issues;
use crate::services::ingestion::pull_requests::ingest_pull_requests;
use crate::services::ingestion::repository::ingest_repository;
use crate::services::ingestion::IngestionContext;
use crate::services::metrics_aggregation::{aggregate_daily_metrics, AggregationResult};
use crate::utils::validators::parse_repo_url;

/// Stages of one sync run, in the only order they may execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ResolveRepository,
    IngestContributors,
    IngestCommits,
    IngestPullRequests,
    IngestIssues,
    AggregateMetrics,
    Done,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStage::ResolveRepository => "resolve-repository",
            SyncStage::IngestContributors => "ingest-contributors",
            SyncStage::IngestCommits => "ingest-commits",
            SyncStage::IngestPullRequests => "ingest-pull-requests",
            SyncStage::IngestIssues => "ingest-issues",
            SyncStage::AggregateMetrics => "aggregate-metrics",
            SyncStage::Done => "done",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub repo_id: i64,
    pub full_name: String,
    pub contributors: usize,
    pub commits: usize,
    pub pull_requests: usize,
    pub issues: usize,
    pub metrics: AggregationResult,
}

pub struct RepoSyncService {
    db: DatabaseConnection,
    platform: Arc<dyn SourcePlatform>,
    concurrency: usize,
}

impl RepoSyncService {
    pub fn new(db: DatabaseConnection, platform: Arc<dyn SourcePlatform>, concurrency: usize) -> Self {
        Self {
            db,
            platform,
            concurrency: concurrency.max(1),
        }
    }

    /// Full sync of the repository behind a GitHub URL
    pub async fn sync_repository_url(&self, repo_url: &str) -> ServiceResult<SyncResult> {
        let (owner, name) = parse_repo_url(repo_url)?;
        self.sync_repository(&owner, &name).await
    }

    /// Run every stage in order. The first failing stage aborts the run;
    /// whatever earlier stages wrote stays, and a re-run converges.
    pub async fn sync_repository(&self, owner: &str, name: &str) -> ServiceResult<SyncResult> {
        log::info!("🔄 Starting sync for {}/{}", owner, name);

        let repo = self
            .run_stage(
                SyncStage::ResolveRepository,
                ingest_repository(&self.db, self.platform.as_ref(), owner, name),
            )
            .await?;

        let ctx = IngestionContext {
            db: &self.db,
            platform: self.platform.as_ref(),
            repo_id: repo.github_id,
            owner: &repo.owner,
            name: &repo.name,
            default_branch: repo.default_branch.as_deref(),
            concurrency: self.concurrency,
        };

        // Author resolution in later stages reads the links written here
        let contributors = self
            .run_stage(SyncStage::IngestContributors, ingest_contributors(&ctx))
            .await?;
        let commits = self
            .run_stage(SyncStage::IngestCommits, ingest_commits(&ctx))
            .await?;
        let pull_requests = self
            .run_stage(SyncStage::IngestPullRequests, ingest_pull_requests(&ctx))
            .await?;
        let issues = self
            .run_stage(SyncStage::IngestIssues, ingest_issues(&ctx))
            .await?;

        // Barrier: every ingestion stage has completed before the recompute reads history
        let metrics = self
            .run_stage(
                SyncStage::AggregateMetrics,
                aggregate_daily_metrics(&self.db, repo.github_id),
            )
            .await?;

        let full_name = repo.full_name.clone();
        let repo_id = repo.github_id;
        let mut active = repo.into_active_model();
        active.last_synced_at = Set(Some(Utc::now()));
        active.update(&self.db).await?;

        log::info!(
            "✅ Sync {} for {}: {} contributors, {} commits, {} PRs, {} issues, {} days",
            SyncStage::Done,
            full_name,
            contributors,
            commits,
            pull_requests,
            issues,
            metrics.updated_days
        );

        Ok(SyncResult {
            repo_id,
            full_name,
            contributors,
            commits,
            pull_requests,
            issues,
            metrics,
        })
    }

    async fn run_stage<T, F>(&self, stage: SyncStage, work: F) -> ServiceResult<T>
    where
        F: std::future::Future<Output = ServiceResult<T>>,
    {
        log::info!("▶️  Stage {}", stage);
        match work.await {
            Ok(value) => Ok(value),
            Err(e) => {
                log::error!("❌ Stage {} failed: {}", stage, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ServiceError, SourceError};
    use crate::models::pull_request::ItemState;
    use crate::models::{commit, contributor, contributor_repo, daily_metric, issue, pull_request};
    use crate::test_support::{test_db, ts, FakePlatform, REPO_ID};
    use sea_orm::{EntityTrait, QueryOrder};

    fn service(db: &DatabaseConnection, platform: FakePlatform) -> RepoSyncService {
        RepoSyncService::new(db.clone(), Arc::new(platform), 4)
    }

    async fn snapshot(
        db: &DatabaseConnection,
    ) -> (
        Vec<contributor::Model>,
        Vec<contributor_repo::Model>,
        Vec<commit::Model>,
        Vec<pull_request::Model>,
        Vec<issue::Model>,
        Vec<daily_metric::Model>,
    ) {
        (
            contributor::Entity::find().order_by_asc(contributor::Column::GithubId).all(db).await.unwrap(),
            contributor_repo::Entity::find()
                .order_by_asc(contributor_repo::Column::ContributorId)
                .all(db)
                .await
                .unwrap(),
            commit::Entity::find().order_by_asc(commit::Column::Sha).all(db).await.unwrap(),
            pull_request::Entity::find().order_by_asc(pull_request::Column::Number).all(db).await.unwrap(),
            issue::Entity::find().order_by_asc(issue::Column::Number).all(db).await.unwrap(),
            daily_metric::Entity::find().order_by_asc(daily_metric::Column::Day).all(db).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_full_sync_counts_and_buckets() {
        let db = test_db().await;
        let result = service(&db, FakePlatform::demo())
            .sync_repository_url("https://github.com/octo/demo")
            .await
            .unwrap();

        assert_eq!(result.repo_id, REPO_ID);
        assert_eq!(result.contributors, 2);
        assert_eq!(result.commits, 3);
        assert_eq!(result.pull_requests, 2);
        assert_eq!(result.issues, 2);
        // 2024-01-01, 2024-01-02 and the issue close on 2024-01-03
        assert_eq!(result.metrics.updated_days, 3);

        let repo = repository::Entity::find_by_id(REPO_ID).one(&db).await.unwrap().unwrap();
        assert!(repo.last_synced_at.is_some());

        let (_, _, commits, _, _, days) = snapshot(&db).await;
        let unlinked = commits.iter().find(|c| c.sha == "c3").unwrap();
        assert_eq!(unlinked.contributor_id, None);

        assert_eq!(days[0].commits_count, 2);
        assert_eq!(days[0].prs_opened, 1);
        assert_eq!(days[0].issues_opened, 1);
        assert_eq!(days[1].prs_merged, 1);
        assert_eq!(days[1].prs_opened, 1);
        assert_eq!(days[2].issues_closed, 1);
    }

    #[tokio::test]
    async fn test_resync_of_unchanged_upstream_is_identical() {
        let db = test_db().await;
        let sync = service(&db, FakePlatform::demo());

        sync.sync_repository("octo", "demo").await.unwrap();
        let first = snapshot(&db).await;
        sync.sync_repository("octo", "demo").await.unwrap();
        let second = snapshot(&db).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_retroactive_merge_moves_bucket() {
        let db = test_db().await;
        let mut platform = FakePlatform::demo();
        service(&db, platform.clone()).sync_repository("octo", "demo").await.unwrap();

        let open = platform.pulls.iter_mut().find(|p| p.number == 2).unwrap();
        open.state = ItemState::Closed;
        open.merged_at = Some(ts("2024-01-04T10:00:00Z"));
        open.closed_at = open.merged_at;
        let result = service(&db, platform).sync_repository("octo", "demo").await.unwrap();

        assert_eq!(result.metrics.updated_days, 4);
        let (_, _, _, pulls, _, days) = snapshot(&db).await;
        assert_eq!(pulls.len(), 2);
        assert_eq!(days.last().unwrap().prs_merged, 1);
    }

    #[tokio::test]
    async fn test_failing_stage_aborts_before_aggregation() {
        let db = test_db().await;
        let mut platform = FakePlatform::demo();
        platform.fail_issues = true;

        let err = service(&db, platform).sync_repository("octo", "demo").await.unwrap_err();

        assert!(matches!(err, ServiceError::Source(SourceError::Upstream { status: 500, .. })));
        let (_, _, commits, _, _, days) = snapshot(&db).await;
        assert_eq!(commits.len(), 3);
        assert!(days.is_empty());
        let repo = repository::Entity::find_by_id(REPO_ID).one(&db).await.unwrap().unwrap();
        assert!(repo.last_synced_at.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_any_fetch() {
        let db = test_db().await;
        let err = service(&db, FakePlatform::demo())
            .sync_repository_url("https://gitlab.com/octo/demo")
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(repository::Entity::find().all(&db).await.unwrap().is_empty());
    }

    mod over_http {
        use super::*;
        use crate::services::git_platforms::{GitHubClient, SourceClient};
        use crate::utils::http_client::create_http_client;
        use serde_json::json;
        use std::time::Duration;
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }

        async fn mount_pages(server: &MockServer, route: &str, body: serde_json::Value) {
            Mock::given(method("GET"))
                .and(path(route))
                .and(query_param("page", "1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
            Mock::given(method("GET"))
                .and(path(route))
                .and(query_param("page", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .mount(server)
                .await;
        }

        async fn github_fixture() -> MockServer {
            let server = MockServer::start().await;
            mount_json(
                &server,
                "/repos/octo/demo",
                json!({
                    "id": 1001, "name": "demo", "full_name": "octo/demo",
                    "html_url": "https://github.com/octo/demo", "description": null,
                    "default_branch": "main", "owner": {"id": 1, "login": "octo"}
                }),
            )
            .await;
            mount_json(&server, "/repos/octo/demo/languages", json!({"Rust": 500})).await;
            mount_pages(
                &server,
                "/repos/octo/demo/contributors",
                json!([{"id": 7, "login": "alice", "avatar_url": null, "html_url": null, "contributions": 2}]),
            )
            .await;
            mount_pages(
                &server,
                "/repos/octo/demo/commits",
                json!([
                    {"sha": "s1", "commit": {"message": "one", "author": {"date": "2024-01-01T10:00:00Z"}}, "author": {"id": 7, "login": "alice"}},
                    {"sha": "s2", "commit": {"message": "two", "author": {"date": "2024-01-01T12:00:00Z"}}, "author": {"id": 55, "login": "ghost"}}
                ]),
            )
            .await;
            mount_json(
                &server,
                "/repos/octo/demo/commits/s1",
                json!({"sha": "s1", "stats": {"additions": 10, "deletions": 2, "total": 12}, "files": []}),
            )
            .await;
            mount_json(
                &server,
                "/repos/octo/demo/commits/s2",
                json!({"sha": "s2", "stats": {"additions": 5, "deletions": 1, "total": 6}, "files": []}),
            )
            .await;
            let pr = json!({
                "number": 3, "title": "feat", "body": null, "state": "closed",
                "created_at": "2024-01-01T09:00:00Z", "merged_at": "2024-01-03T09:00:00Z",
                "closed_at": "2024-01-03T09:00:00Z", "user": {"id": 7, "login": "alice"}
            });
            mount_pages(&server, "/repos/octo/demo/pulls", json!([pr.clone()])).await;
            let mut detail = pr;
            detail["additions"] = json!(30);
            detail["deletions"] = json!(4);
            detail["changed_files"] = json!(2);
            mount_json(&server, "/repos/octo/demo/pulls/3", detail).await;
            mount_pages(&server, "/repos/octo/demo/issues", json!([])).await;
            server
        }

        #[tokio::test]
        async fn test_sync_against_github_api() {
            let server = github_fixture().await;
            let http = create_http_client(Duration::from_secs(5)).unwrap();
            let github = GitHubClient::new(SourceClient::new(http, server.uri(), Some("t0ken".to_string())));
            let db = test_db().await;
            let sync = RepoSyncService::new(db.clone(), Arc::new(github), 2);

            let result = sync.sync_repository_url("https://github.com/octo/demo.git").await.unwrap();
            assert_eq!((result.contributors, result.commits, result.pull_requests, result.issues), (1, 2, 1, 0));
            let first = snapshot(&db).await;

            sync.sync_repository("octo", "demo").await.unwrap();
            assert_eq!(first, snapshot(&db).await);

            let (_, _, commits, pulls, _, days) = first;
            assert_eq!(commits[0].contributor_id, Some(7));
            assert_eq!(commits[1].contributor_id, None);
            assert_eq!(pulls[0].additions, 30);
            assert_eq!(days.len(), 2);
            assert_eq!((days[0].commits_count, days[0].lines_added, days[0].lines_deleted), (2, 15, 3));
            assert_eq!(days[1].prs_merged, 1);
        }
    }
}
