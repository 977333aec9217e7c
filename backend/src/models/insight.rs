use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    #[sea_orm(string_value = "repo")]
    Repo,
    #[sea_orm(string_value = "pull_request")]
    PullRequest,
    #[sea_orm(string_value = "weekly")]
    Weekly,
}

/// Narrative output generated for a repository, a single PR, or a week of activity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "insights")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: InsightKind,
    pub repo_id: i64,
    pub pr_number: Option<i32>,
    /// Entity the insight describes: `repo`, `pr:<number>`, or the record id
    /// for weekly reports. Unique together with `kind` and `repo_id`.
    #[serde(skip)]
    pub scope: String,
    #[sea_orm(column_type = "Text")]
    pub summary: String,
    pub metadata: JsonValue,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
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

pub const SCOPE_INDEX: &str = "idx_insights_kind_repo_scope";

pub fn scope_for(kind: InsightKind, pr_number: Option<i32>, id: Uuid) -> String {
    match (kind, pr_number) {
        (InsightKind::Weekly, _) => id.to_string(),
        (_, Some(number)) => format!("pr:{}", number),
        (_, None) => "repo".to_string(),
    }
}
