//! Ordered volume → issue mapping

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "volume_issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub volume_id: Uuid,

    /// An issue belongs to at most one volume
    #[sea_orm(primary_key, auto_increment = false, unique)]
    pub issue_id: Uuid,

    pub position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::volume::Entity",
        from = "Column::VolumeId",
        to = "super::volume::Column::Id",
        on_delete = "Cascade"
    )]
    Volume,

    #[sea_orm(
        belongs_to = "super::issue::Entity",
        from = "Column::IssueId",
        to = "super::issue::Column::Id",
        on_delete = "Cascade"
    )]
    Issue,
}

impl Related<super::volume::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Volume.def()
    }
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issue.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
