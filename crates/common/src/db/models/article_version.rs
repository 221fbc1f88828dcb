//! Article version entity (append-only)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "article_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub article_id: Uuid,

    /// 1-based, gap-free per article; unique together with `article_id`
    pub version_number: i32,

    #[sea_orm(column_type = "Text")]
    pub storage_path: String,

    #[sea_orm(column_type = "Text")]
    pub file_name: String,

    pub file_size: Option<i64>,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub uploaded_by: Uuid,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article::Entity",
        from = "Column::ArticleId",
        to = "super::article::Column::Id",
        on_delete = "Cascade"
    )]
    Article,
}

impl Related<super::article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Article.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
