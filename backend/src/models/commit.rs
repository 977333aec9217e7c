use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commits")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub sha: String,
    pub repo_id: i64,
    /// None when the author could not be matched to a linked contributor
    pub contributor_id: Option<i64>,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub additions: i32,
    pub deletions: i32,
    pub total_changes: i32,
    pub committed_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepoId",
        to = "super::repository::Column::GithubId"
    )]
    Repository,
    #[sea_orm(
        belongs_to = "super::contributor::Entity",
        from = "Column::ContributorId",
        to = "super::contributor::Column::GithubId"
    )]
    Contributor,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl Related<super::contributor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contributor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
