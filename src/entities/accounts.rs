use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub user_agent: Option<String>,
    #[sea_orm(unique)]
    pub file_path: Option<String>,
    pub is_active: bool,
    pub last_seen_mtime: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_profiles::Entity")]
    DeliveryProfiles,
    #[sea_orm(has_many = "super::feeds::Entity")]
    Feeds,
}

impl Related<super::delivery_profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryProfiles.def()
    }
}

impl Related<super::feeds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Feeds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
