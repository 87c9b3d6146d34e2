use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub active_feed_id: Option<Uuid>,
    pub active_profile_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::channel_feeds::Entity")]
    ChannelFeeds,
}

impl Related<super::channel_feeds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChannelFeeds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
