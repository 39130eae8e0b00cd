use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub total_chunks: i32,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub last_activity_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::upload_chunks::Entity")]
    UploadChunks,
}

impl Related<super::upload_chunks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadChunks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
