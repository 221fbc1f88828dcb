//! Issue entity: a curated bundle of published papers

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Release state shared by issues and volumes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "released")]
    Released,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub status: ReleaseStatus,

    pub release_date: Option<Date>,

    #[sea_orm(column_type = "Text", nullable)]
    pub cover_url: Option<String>,

    /// Object path of the cover, kept so the file can be removed with the issue
    #[sea_orm(column_type = "Text", nullable)]
    pub cover_path: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::issue_article::Entity")]
    IssueArticles,
}

impl Related<super::issue_article::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IssueArticles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
