use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tables in order of dependencies
        self.create_accounts_table(manager).await?;
        self.create_delivery_profiles_table(manager).await?;
        self.create_feeds_table(manager).await?;
        self.create_channels_table(manager).await?;
        self.create_channel_feeds_table(manager).await?;
        self.create_guide_sources_table(manager).await?;
        self.create_kv_entries_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(KvEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GuideSources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChannelFeeds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Channels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Feeds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DeliveryProfiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;

        Ok(())
    }
}

impl Migration {
    fn create_id_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn create_nullable_uuid_column(
        &self,
        manager: &SchemaManager,
        column: impl IntoIden,
    ) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid(),
            _ => col.string(),
        };
        col
    }

    fn create_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    async fn create_accounts_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, Accounts::Id).primary_key())
                    .col(ColumnDef::new(Accounts::Name).string().not_null())
                    .col(ColumnDef::new(Accounts::UserAgent).string())
                    .col(ColumnDef::new(Accounts::FilePath).string().unique_key())
                    .col(
                        ColumnDef::new(Accounts::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Accounts::LastSeenMtime).big_integer())
                    .col(self.create_timestamp_column(manager, Accounts::CreatedAt))
                    .col(self.create_timestamp_column(manager, Accounts::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_delivery_profiles_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DeliveryProfiles::Table)
                    .if_not_exists()
                    .col(
                        self.create_id_column(manager, DeliveryProfiles::Id)
                            .primary_key(),
                    )
                    .col(self.create_id_column(manager, DeliveryProfiles::AccountId))
                    .col(ColumnDef::new(DeliveryProfiles::Name).string().not_null())
                    .col(
                        ColumnDef::new(DeliveryProfiles::SearchPattern)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryProfiles::ReplacePattern)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeliveryProfiles::DeliveryMode)
                            .string()
                            .not_null()
                            .default("proxy"),
                    )
                    .col(
                        ColumnDef::new(DeliveryProfiles::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(DeliveryProfiles::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_delivery_profiles_account_id")
                            .from(DeliveryProfiles::Table, DeliveryProfiles::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_feeds_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Feeds::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, Feeds::Id).primary_key())
                    .col(self.create_id_column(manager, Feeds::AccountId))
                    .col(ColumnDef::new(Feeds::Name).string().not_null())
                    .col(ColumnDef::new(Feeds::Url).string().not_null())
                    .col(ColumnDef::new(Feeds::GuideId).string())
                    .col(ColumnDef::new(Feeds::IdentityHash).string().not_null())
                    .col(self.create_timestamp_column(manager, Feeds::CreatedAt))
                    .col(self.create_timestamp_column(manager, Feeds::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_feeds_account_id")
                            .from(Feeds::Table, Feeds::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_channels_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Channels::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, Channels::Id).primary_key())
                    .col(ColumnDef::new(Channels::Name).string().not_null())
                    .col(self.create_nullable_uuid_column(manager, Channels::ActiveFeedId))
                    .col(self.create_nullable_uuid_column(manager, Channels::ActiveProfileId))
                    .col(self.create_timestamp_column(manager, Channels::CreatedAt))
                    .col(self.create_timestamp_column(manager, Channels::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_channel_feeds_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ChannelFeeds::Table)
                    .if_not_exists()
                    .col(self.create_id_column(manager, ChannelFeeds::ChannelId))
                    .col(self.create_id_column(manager, ChannelFeeds::FeedId))
                    .col(ColumnDef::new(ChannelFeeds::Position).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(ChannelFeeds::ChannelId)
                            .col(ChannelFeeds::FeedId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_feeds_channel_id")
                            .from(ChannelFeeds::Table, ChannelFeeds::ChannelId)
                            .to(Channels::Table, Channels::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_feeds_feed_id")
                            .from(ChannelFeeds::Table, ChannelFeeds::FeedId)
                            .to(Feeds::Table, Feeds::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn create_guide_sources_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GuideSources::Table)
                    .if_not_exists()
                    .col(
                        self.create_id_column(manager, GuideSources::Id)
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GuideSources::Name).string().not_null())
                    .col(ColumnDef::new(GuideSources::FilePath).string().unique_key())
                    .col(
                        ColumnDef::new(GuideSources::SourceType)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GuideSources::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(GuideSources::LastSeenMtime).big_integer())
                    .col(self.create_timestamp_column(manager, GuideSources::CreatedAt))
                    .col(self.create_timestamp_column(manager, GuideSources::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_kv_entries_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(KvEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(KvEntries::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(KvEntries::Value).text().not_null())
                    .col(ColumnDef::new(KvEntries::ExpiresAt).big_integer())
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_profiles_account_id")
                    .table(DeliveryProfiles::Table)
                    .col(DeliveryProfiles::AccountId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_feeds_account_id")
                    .table(Feeds::Table)
                    .col(Feeds::AccountId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_feeds_identity_hash")
                    .table(Feeds::Table)
                    .col(Feeds::IdentityHash)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_channel_feeds_channel_position")
                    .table(ChannelFeeds::Table)
                    .col(ChannelFeeds::ChannelId)
                    .col(ChannelFeeds::Position)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_channel_feeds_feed_id")
                    .table(ChannelFeeds::Table)
                    .col(ChannelFeeds::FeedId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_kv_entries_expires_at")
                    .table(KvEntries::Table)
                    .col(KvEntries::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    Name,
    UserAgent,
    FilePath,
    IsActive,
    LastSeenMtime,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DeliveryProfiles {
    Table,
    Id,
    AccountId,
    Name,
    SearchPattern,
    ReplacePattern,
    DeliveryMode,
    IsDefault,
    IsActive,
}

#[derive(DeriveIden)]
enum Feeds {
    Table,
    Id,
    AccountId,
    Name,
    Url,
    GuideId,
    IdentityHash,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Channels {
    Table,
    Id,
    Name,
    ActiveFeedId,
    ActiveProfileId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ChannelFeeds {
    Table,
    ChannelId,
    FeedId,
    Position,
}

#[derive(DeriveIden)]
enum GuideSources {
    Table,
    Id,
    Name,
    FilePath,
    SourceType,
    IsActive,
    LastSeenMtime,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum KvEntries {
    Table,
    Key,
    Value,
    ExpiresAt,
}
