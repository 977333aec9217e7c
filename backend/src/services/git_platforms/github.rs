use super::{
    CommitStats, RemoteCommit, RemoteContributor, RemoteIssue, RemotePullRequest,
    RepoMeta, SourceClient, SourcePlatform,
};
use crate::errors::SourceError;
use crate::models::pull_request::ItemState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// GitHub REST v3 implementation of [`SourcePlatform`].
#[derive(Clone, Debug)]
pub struct GitHubClient {
    source: SourceClient,
}

impl GitHubClient {
    pub fn new(source: SourceClient) -> Self {
        Self { source }
    }
}

#[async_trait]
impl SourcePlatform for GitHubClient {
    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RepoMeta, SourceError> {
        let repo: GitHubRepo = self
            .source
            .get(&format!("/repos/{}/{}", owner, name), &[])
            .await?;

        Ok(RepoMeta {
            github_id: repo.id,
            owner: repo.owner.login,
            name: repo.name,
            full_name: repo.full_name,
            html_url: repo.html_url,
            default_branch: repo.default_branch,
        })
    }

    async fn fetch_languages(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<BTreeMap<String, i64>, SourceError> {
        self.source
            .get(&format!("/repos/{}/{}/languages", owner, name), &[])
            .await
    }

    async fn fetch_contributors(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RemoteContributor>, SourceError> {
        let contributors: Vec<GitHubContributor> = self
            .source
            .fetch_all(&format!("/repos/{}/{}/contributors", owner, name), &[])
            .await?;

        Ok(contributors
            .into_iter()
            .map(|c| RemoteContributor {
                github_id: c.id,
                login: c.login,
                avatar_url: c.avatar_url,
                html_url: c.html_url,
            })
            .collect())
    }

    async fn fetch_commits(
        &self,
        owner: &str,
        name: &str,
        branch: Option<&str>,
    ) -> Result<Vec<RemoteCommit>, SourceError> {
        let params: Vec<(&str, String)> = branch
            .map(|b| vec![("sha", b.to_string())])
            .unwrap_or_default();

        let commits: Vec<GitHubCommitListItem> = self
            .source
            .fetch_all(&format!("/repos/{}/{}/commits", owner, name), &params)
            .await?;

        Ok(commits
            .into_iter()
            .map(|c| RemoteCommit {
                sha: c.sha,
                message: c.commit.message,
                committed_at: c.commit.author.date,
                author_id: c.author.map(|a| a.id),
            })
            .collect())
    }

    async fn fetch_commit_stats(
        &self,
        owner: &str,
        name: &str,
        sha: &str,
    ) -> Result<CommitStats, SourceError> {
        let details: GitHubCommitDetails = self
            .source
            .get(&format!("/repos/{}/{}/commits/{}", owner, name, sha), &[])
            .await?;

        let stats = details.stats.unwrap_or_default();

        Ok(CommitStats {
            additions: stats.additions,
            deletions: stats.deletions,
            total: stats.total,
        })
    }

    async fn fetch_pull_requests(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RemotePullRequest>, SourceError> {
        let prs: Vec<GitHubPullRequest> = self
            .source
            .fetch_all(
                &format!("/repos/{}/{}/pulls", owner, name),
                &[("state", "all".to_string())],
            )
            .await?;

        Ok(prs.into_iter().map(RemotePullRequest::from).collect())
    }

    async fn fetch_pull_request(
        &self,
        owner: &str,
        name: &str,
        number: i32,
    ) -> Result<RemotePullRequest, SourceError> {
        let pr: GitHubPullRequest = self
            .source
            .get(&format!("/repos/{}/{}/pulls/{}", owner, name, number), &[])
            .await?;

        Ok(pr.into())
    }

    async fn fetch_issues(&self, owner: &str, name: &str) -> Result<Vec<RemoteIssue>, SourceError> {
        let issues: Vec<GitHubIssue> = self
            .source
            .fetch_all(
                &format!("/repos/{}/{}/issues", owner, name),
                &[("state", "all".to_string())],
            )
            .await?;

        // The issues endpoint also lists pull requests; those carry a `pull_request` key
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(|i| RemoteIssue {
                number: i.number,
                title: i.title,
                body: i.body,
                state: i.state,
                created_at: i.created_at,
                closed_at: i.closed_at,
                author_id: i.user.map(|u| u.id),
            })
            .collect())
    }
}

impl From<GitHubPullRequest> for RemotePullRequest {
    fn from(pr: GitHubPullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title,
            body: pr.body,
            state: pr.state,
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
            created_at: pr.created_at,
            merged_at: pr.merged_at,
            closed_at: pr.closed_at,
            author_id: pr.user.map(|u| u.id),
        }
    }
}

// GitHub API response types

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    id: i64,
    name: String,
    full_name: String,
    html_url: String,
    default_branch: Option<String>,
    owner: GitHubUserRef,
}

#[derive(Debug, Deserialize)]
struct GitHubUserRef {
    id: i64,
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubContributor {
    id: i64,
    login: String,
    avatar_url: Option<String>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitListItem {
    sha: String,
    commit: GitHubCommitData,
    author: Option<GitHubUserRef>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitData {
    message: String,
    author: GitHubGitActor,
}

#[derive(Debug, Deserialize)]
struct GitHubGitActor {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetails {
    stats: Option<GitHubCommitStats>,
}

#[derive(Debug, Default, Deserialize)]
struct GitHubCommitStats {
    #[serde(default)]
    additions: i32,
    #[serde(default)]
    deletions: i32,
    #[serde(default)]
    total: i32,
}

#[derive(Debug, Deserialize)]
struct GitHubPullRequest {
    number: i32,
    title: String,
    body: Option<String>,
    state: ItemState,
    additions: Option<i32>,
    deletions: Option<i32>,
    changed_files: Option<i32>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    user: Option<GitHubUserRef>,
}

#[derive(Debug, Deserialize)]
struct GitHubIssue {
    number: i32,
    title: String,
    body: Option<String>,
    state: ItemState,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    user: Option<GitHubUserRef>,
    pull_request: Option<serde_json::Value>,
}
