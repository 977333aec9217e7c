//! Shared fixtures for unit tests: an in-memory database and a canned
//! source platform.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use std::collections::{BTreeMap, HashMap};

use crate::errors::SourceError;
use crate::models::pull_request::ItemState;
use crate::models::repository;
use crate::services::git_platforms::{
    CommitStats, RemoteCommit, RemoteContributor, RemoteIssue, RemotePullRequest, RepoMeta,
    SourcePlatform,
};
use crate::services::ingestion::IngestionContext;
use crate::utils::db::create_schema;

pub const REPO_ID: i64 = 1001;

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

pub async fn test_db() -> DatabaseConnection {
    // One connection, otherwise every pooled connection sees its own empty database
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(opts).await.unwrap();
    create_schema(&db).await.unwrap();
    db
}

pub async fn seed_repository(db: &DatabaseConnection, github_id: i64) -> repository::Model {
    let now = Utc::now();
    let model = repository::ActiveModel {
        github_id: Set(github_id),
        owner: Set("octo".to_string()),
        name: Set("demo".to_string()),
        full_name: Set("octo/demo".to_string()),
        html_url: Set("https://github.com/octo/demo".to_string()),
        default_branch: Set(Some("main".to_string())),
        languages: Set(serde_json::json!({})),
        created_at: Set(now),
        updated_at: Set(now),
        last_synced_at: Set(None),
    };
    repository::Entity::insert(model)
        .exec_without_returning(db)
        .await
        .unwrap();

    repository::Entity::find_by_id(github_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

pub fn context_for<'a>(db: &'a DatabaseConnection, platform: &'a FakePlatform) -> IngestionContext<'a> {
    IngestionContext {
        db,
        platform,
        repo_id: platform.repo.github_id,
        owner: &platform.repo.owner,
        name: &platform.repo.name,
        default_branch: platform.repo.default_branch.as_deref(),
        concurrency: 4,
    }
}

/// In-memory platform serving a small fixed repository.
#[derive(Clone, Debug)]
pub struct FakePlatform {
    pub repo: RepoMeta,
    pub languages: BTreeMap<String, i64>,
    pub contributors: Vec<RemoteContributor>,
    pub commits: Vec<RemoteCommit>,
    pub commit_stats: HashMap<String, CommitStats>,
    /// List view; entries without diff stats are completed from `pull_details`
    pub pulls: Vec<RemotePullRequest>,
    pub pull_details: HashMap<i32, RemotePullRequest>,
    pub issues: Vec<RemoteIssue>,
    pub fail_commit_stats: bool,
    pub fail_issues: bool,
}

fn stats(additions: i32, deletions: i32) -> CommitStats {
    CommitStats {
        additions,
        deletions,
        total: additions + deletions,
    }
}

fn contributor(github_id: i64, login: &str) -> RemoteContributor {
    RemoteContributor {
        github_id,
        login: login.to_string(),
        avatar_url: None,
        html_url: Some(format!("https://github.com/{}", login)),
    }
}

fn commit(sha: &str, at: &str, author_id: Option<i64>) -> RemoteCommit {
    RemoteCommit {
        sha: sha.to_string(),
        message: format!("commit {}", sha),
        committed_at: ts(at),
        author_id,
    }
}

impl FakePlatform {
    /// Two linked contributors (7 and 8), one unlinked author (404), activity
    /// spread over 2024-01-01 .. 2024-01-03.
    pub fn demo() -> Self {
        let merged_pr = RemotePullRequest {
            number: 1,
            title: "Add parser".to_string(),
            body: Some("Implements the parser".to_string()),
            state: ItemState::Closed,
            additions: None,
            deletions: None,
            changed_files: None,
            created_at: ts("2024-01-01T08:00:00Z"),
            merged_at: Some(ts("2024-01-02T12:00:00Z")),
            closed_at: Some(ts("2024-01-02T12:00:00Z")),
            author_id: Some(7),
        };
        let merged_detail = RemotePullRequest {
            additions: Some(40),
            deletions: Some(10),
            changed_files: Some(3),
            ..merged_pr.clone()
        };
        let open_pr = RemotePullRequest {
            number: 2,
            title: "Tweak docs".to_string(),
            body: None,
            state: ItemState::Open,
            additions: Some(3),
            deletions: Some(1),
            changed_files: Some(1),
            created_at: ts("2024-01-02T10:00:00Z"),
            merged_at: None,
            closed_at: None,
            author_id: Some(8),
        };

        Self {
            repo: RepoMeta {
                github_id: REPO_ID,
                owner: "octo".to_string(),
                name: "demo".to_string(),
                full_name: "octo/demo".to_string(),
                html_url: "https://github.com/octo/demo".to_string(),
                default_branch: Some("main".to_string()),
            },
            languages: [("Rust".to_string(), 1200), ("Shell".to_string(), 40)]
                .into_iter()
                .collect(),
            contributors: vec![contributor(7, "alice"), contributor(8, "bob")],
            commits: vec![
                commit("c1", "2024-01-01T10:00:00Z", Some(7)),
                commit("c2", "2024-01-01T15:00:00Z", Some(8)),
                commit("c3", "2024-01-02T09:00:00Z", Some(404)),
            ],
            commit_stats: [
                ("c1".to_string(), stats(10, 2)),
                ("c2".to_string(), stats(5, 5)),
                ("c3".to_string(), stats(1, 0)),
            ]
            .into_iter()
            .collect(),
            pulls: vec![merged_pr, open_pr],
            pull_details: [(1, merged_detail)].into_iter().collect(),
            issues: vec![
                RemoteIssue {
                    number: 10,
                    title: "Crash on empty input".to_string(),
                    body: None,
                    state: ItemState::Open,
                    created_at: ts("2024-01-01T11:00:00Z"),
                    closed_at: None,
                    author_id: Some(8),
                },
                RemoteIssue {
                    number: 11,
                    title: "Typo in README".to_string(),
                    body: Some("Second paragraph".to_string()),
                    state: ItemState::Closed,
                    created_at: ts("2024-01-02T07:00:00Z"),
                    closed_at: Some(ts("2024-01-03T07:00:00Z")),
                    author_id: Some(404),
                },
            ],
            fail_commit_stats: false,
            fail_issues: false,
        }
    }
}

#[async_trait]
impl SourcePlatform for FakePlatform {
    async fn fetch_repository(&self, _owner: &str, _name: &str) -> Result<RepoMeta, SourceError> {
        Ok(self.repo.clone())
    }

    async fn fetch_languages(
        &self,
        _owner: &str,
        _name: &str,
    ) -> Result<BTreeMap<String, i64>, SourceError> {
        Ok(self.languages.clone())
    }

    async fn fetch_contributors(
        &self,
        _owner: &str,
        _name: &str,
    ) -> Result<Vec<RemoteContributor>, SourceError> {
        Ok(self.contributors.clone())
    }

    async fn fetch_commits(
        &self,
        _owner: &str,
        _name: &str,
        _branch: Option<&str>,
    ) -> Result<Vec<RemoteCommit>, SourceError> {
        Ok(self.commits.clone())
    }

    async fn fetch_commit_stats(
        &self,
        _owner: &str,
        _name: &str,
        sha: &str,
    ) -> Result<CommitStats, SourceError> {
        if self.fail_commit_stats {
            return Err(SourceError::RateLimited);
        }
        Ok(self.commit_stats.get(sha).cloned().unwrap_or_default())
    }

    async fn fetch_pull_requests(
        &self,
        _owner: &str,
        _name: &str,
    ) -> Result<Vec<RemotePullRequest>, SourceError> {
        Ok(self.pulls.clone())
    }

    async fn fetch_pull_request(
        &self,
        _owner: &str,
        _name: &str,
        number: i32,
    ) -> Result<RemotePullRequest, SourceError> {
        let listed = self.pulls.iter().find(|p| p.number == number);
        match (self.pull_details.get(&number), listed) {
            // Keep list-view state so tests can mutate `pulls` alone
            (Some(detail), Some(listed)) => Ok(RemotePullRequest {
                additions: detail.additions,
                deletions: detail.deletions,
                changed_files: detail.changed_files,
                ..listed.clone()
            }),
            (None, Some(listed)) => Ok(listed.clone()),
            (_, None) => Err(SourceError::NotFound(format!("/pulls/{}", number))),
        }
    }

    async fn fetch_issues(&self, _owner: &str, _name: &str) -> Result<Vec<RemoteIssue>, SourceError> {
        if self.fail_issues {
            return Err(SourceError::Upstream {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(self.issues.clone())
    }
}
