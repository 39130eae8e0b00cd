use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Index row for one stored chunk. The payload bytes themselves live in the
/// chunk storage backend keyed by (upload_id, sequence), not in this table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub upload_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub sequence: i32,
    pub size_bytes: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::upload_sessions::Entity",
        from = "Column::UploadId",
        to = "super::upload_sessions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    UploadSessions,
}

impl Related<super::upload_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
