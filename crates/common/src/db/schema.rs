//! Schema bootstrap
//!
//! Creates every table from the SeaORM entities (parents before children so the
//! foreign keys resolve) plus the unique indexes that close the numbering and
//! membership races.

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Schema};
use tracing::info;

fn table<E: EntityTrait>(schema: &Schema, entity: E) -> TableCreateStatement {
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    stmt
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![Index::create()
        .name("ux_article_versions_article_number")
        .table(ArticleVersionEntity)
        .col(ArticleVersionColumn::ArticleId)
        .col(ArticleVersionColumn::VersionNumber)
        .unique()
        .if_not_exists()
        .to_owned()]
}

/// Create missing tables and indexes
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = vec![
        table(&schema, ProfileEntity),
        table(&schema, ArticleEntity),
        table(&schema, ArticleVersionEntity),
        table(&schema, ArticleAuthorEntity),
        table(&schema, CommentEntity),
        table(&schema, BoardPostEntity),
        table(&schema, BoardCommentEntity),
        table(&schema, QnaQuestionEntity),
        table(&schema, QnaReplyEntity),
        table(&schema, IssueEntity),
        table(&schema, IssueArticleEntity),
        table(&schema, VolumeEntity),
        table(&schema, VolumeIssueEntity),
    ];

    for stmt in &tables {
        db.execute(backend.build(stmt)).await?;
    }

    for stmt in &unique_indexes() {
        db.execute(backend.build(stmt)).await?;
    }

    info!(tables = tables.len(), "Schema ensured");
    Ok(())
}
