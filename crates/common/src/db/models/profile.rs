//! Profile entity
//!
//! One row per authenticated identity. Rows are created by the identity
//! provider's signup flow; the app only edits them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership role of a profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "mentee")]
    Mentee,
    #[sea_orm(string_value = "mentor")]
    Mentor,
    #[sea_orm(string_value = "prof")]
    Prof,
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// Separate privilege flag carried next to the role
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AdminType {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text")]
    pub full_name: String,

    pub role_type: Role,

    pub admin_type: AdminType,

    #[sea_orm(column_type = "Text", nullable)]
    pub intro: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
