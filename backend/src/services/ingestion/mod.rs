pub mod commits;
pub mod contributors;
pub mod issues;
pub mod pull_requests;
pub mod repository;

use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect};
use std::collections::HashSet;

use crate::models::contributor_repo;
use crate::services::git_platforms::SourcePlatform;

/// Everything a coordinator needs to ingest one entity kind for one repository.
#[derive(Clone, Copy)]
pub struct IngestionContext<'a> {
    pub db: &'a DatabaseConnection,
    pub platform: &'a dyn SourcePlatform,
    pub repo_id: i64,
    pub owner: &'a str,
    pub name: &'a str,
    pub default_branch: Option<&'a str>,
    /// Upper bound on per-item fetch/upsert work in flight at once
    pub concurrency: usize,
}

/// Maps platform author ids to contributor references for one repository.
///
/// An author resolves only when it is linked to the repository, so every
/// stored contributor reference points at a linked contributor. Anything else
/// degrades to `None`.
#[derive(Debug, Default)]
pub struct AuthorResolver {
    linked: HashSet<i64>,
}

impl AuthorResolver {
    pub async fn load(db: &DatabaseConnection, repo_id: i64) -> Result<Self, DbErr> {
        let linked: Vec<i64> = contributor_repo::Entity::find()
            .select_only()
            .column(contributor_repo::Column::ContributorId)
            .filter(contributor_repo::Column::RepoId.eq(repo_id))
            .into_tuple()
            .all(db)
            .await?;

        Ok(Self {
            linked: linked.into_iter().collect(),
        })
    }

    pub fn resolve(&self, author_id: Option<i64>) -> Option<i64> {
        let id = author_id?;
        if self.linked.contains(&id) {
            Some(id)
        } else {
            log::debug!("Author {} is not a linked contributor, storing null reference", id);
            None
        }
    }
}
