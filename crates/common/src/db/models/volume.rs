//! Volume entity: a curated bundle of released issues

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::issue::ReleaseStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "volumes")]
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

    #[sea_orm(column_type = "Text", nullable)]
    pub cover_path: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::volume_issue::Entity")]
    VolumeIssues,
}

impl Related<super::volume_issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VolumeIssues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
