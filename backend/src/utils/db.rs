use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema};

use crate::models::{
    commit, contributor, contributor_repo, daily_metric, insight, issue, pull_request, repository,
};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Create every table the pipeline writes to, skipping the ones that already
/// exist. Parents come before the tables holding foreign keys to them.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, repository::Entity).await?;
    create_table(db, contributor::Entity).await?;
    create_table(db, contributor_repo::Entity).await?;
    create_table(db, commit::Entity).await?;
    create_table(db, pull_request::Entity).await?;
    create_table(db, issue::Entity).await?;
    create_table(db, daily_metric::Entity).await?;
    create_table(db, insight::Entity).await?;

    let backend = db.get_database_backend();
    let scope_index = Index::create()
        .if_not_exists()
        .name(insight::SCOPE_INDEX)
        .table(insight::Entity)
        .col(insight::Column::Kind)
        .col(insight::Column::RepoId)
        .col(insight::Column::Scope)
        .unique()
        .to_owned();
    db.execute(backend.build(&scope_index)).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}
