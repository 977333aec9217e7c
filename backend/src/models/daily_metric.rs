use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One day-bucket of repository activity. Rows are overwritten wholesale by
/// every aggregation run.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_metrics")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub repo_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub day: ChronoDate,
    pub commits_count: i32,
    pub prs_opened: i32,
    pub prs_merged: i32,
    pub issues_opened: i32,
    pub issues_closed: i32,
    pub lines_added: i64,
    pub lines_deleted: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repository::Entity",
        from = "Column::RepoId",
        to = "super::repository::Column::GithubId"
    )]
    Repository,
}

impl Related<super::repository::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repository.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
