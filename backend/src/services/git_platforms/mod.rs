pub mod client;
pub mod github;

pub use client::SourceClient;
pub use github::GitHubClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::SourceError;
use crate::models::pull_request::ItemState;

/// Repository metadata as reported by the platform
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepoMeta {
    pub github_id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub default_branch: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteContributor {
    pub github_id: i64,
    pub login: String,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteCommit {
    pub sha: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    /// Platform account of the author, absent when the commit email is not
    /// tied to any account
    pub author_id: Option<i64>,
}

/// Per-commit diff statistics. Missing counters default to 0.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: i32,
    pub deletions: i32,
    pub total: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemotePullRequest {
    pub number: i32,
    pub title: String,
    pub body: Option<String>,
    pub state: ItemState,
    /// Diff stats are only present on the single-PR endpoint; list responses
    /// leave them as None
    pub additions: Option<i32>,
    pub deletions: Option<i32>,
    pub changed_files: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub author_id: Option<i64>,
}

impl RemotePullRequest {
    pub fn has_diff_stats(&self) -> bool {
        self.additions.is_some() && self.deletions.is_some() && self.changed_files.is_some()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteIssue {
    pub number: i32,
    pub title: String,
    pub body: Option<String>,
    pub state: ItemState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub author_id: Option<i64>,
}

/// Typed retrieval of every entity kind the sync pipeline ingests.
/// Implementations hold no state and have no side effects beyond HTTP calls.
#[async_trait]
pub trait SourcePlatform: Send + Sync {
    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RepoMeta, SourceError>;

    /// Language name -> bytes of code
    async fn fetch_languages(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<BTreeMap<String, i64>, SourceError>;

    async fn fetch_contributors(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RemoteContributor>, SourceError>;

    /// Commits reachable from `branch` (the default branch when None)
    async fn fetch_commits(
        &self,
        owner: &str,
        name: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RemoteCommit>, SourceError>;

    async fn fetch_commit_stats(
        &self,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> Result<CommitStats, SourceError>;

    /// All pull requests, open and closed
    async fn fetch_pull_requests(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RemotePullRequest>, SourceError>;

    async fn fetch_pull_request(
        &self,
        owner: &str,
        name: &str,
        number: i32,
    ) -> Result<RemotePullRequest, SourceError>;

    /// All issues, open and closed, excluding pull requests
    async fn fetch_issues(&self, owner: &str, name: &str) -> Result<Vec<RemoteIssue>, SourceError>;
}
