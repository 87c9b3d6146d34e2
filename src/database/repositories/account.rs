//! SeaORM-based Account and DeliveryProfile repository
//!
//! Accounts and their delivery profiles are always read together by the
//! resolver, so both live in one repository.

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{
    accounts, delivery_profiles,
    prelude::{Accounts, DeliveryProfiles},
};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{
    Account, AccountCreateRequest, DeliveryMode, DeliveryProfile, DeliveryProfileCreateRequest,
};

/// Search/replace pair of the passthrough profile every new account receives
pub const PASSTHROUGH_SEARCH_PATTERN: &str = "^(.*)$";
pub const PASSTHROUGH_REPLACE_PATTERN: &str = "$1";

/// SeaORM-based repository for Account operations
#[derive(Clone)]
pub struct AccountSeaOrmRepository {
    connection: Arc<DatabaseConnection>,
}

impl AccountSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// Create an account together with its default passthrough profile
    pub async fn create(&self, request: AccountCreateRequest) -> RepositoryResult<Account> {
        let now = chrono::Utc::now();
        let account_id = Uuid::new_v4();

        let txn = self.connection.begin().await?;

        let model = accounts::ActiveModel {
            id: Set(account_id),
            name: Set(request.name.clone()),
            user_agent: Set(request.user_agent.clone()),
            file_path: Set(request.file_path.clone()),
            is_active: Set(request.is_active),
            last_seen_mtime: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        delivery_profiles::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account_id),
            name: Set("Default".to_string()),
            search_pattern: Set(PASSTHROUGH_SEARCH_PATTERN.to_string()),
            replace_pattern: Set(PASSTHROUGH_REPLACE_PATTERN.to_string()),
            delivery_mode: Set(DeliveryMode::Proxy.to_string()),
            is_default: Set(true),
            is_active: Set(true),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        debug!("Created account '{}' ({})", model.name, model.id);
        Ok(Self::account_to_domain(model))
    }

    pub async fn find_by_id(&self, id: &Uuid) -> RepositoryResult<Option<Account>> {
        let model = Accounts::find_by_id(*id).one(&*self.connection).await?;
        Ok(model.map(Self::account_to_domain))
    }

    pub async fn find_by_file_path(&self, file_path: &str) -> RepositoryResult<Option<Account>> {
        let model = Accounts::find()
            .filter(accounts::Column::FilePath.eq(file_path))
            .one(&*self.connection)
            .await?;
        Ok(model.map(Self::account_to_domain))
    }

    pub async fn find_all(&self) -> RepositoryResult<Vec<Account>> {
        let models = Accounts::find()
            .order_by_asc(accounts::Column::Name)
            .all(&*self.connection)
            .await?;
        Ok(models.into_iter().map(Self::account_to_domain).collect())
    }

    /// Idempotent creation keyed by hot-folder path. Returns the account and
    /// whether this call created it.
    pub async fn get_or_create_by_file_path(
        &self,
        file_path: &str,
        name: &str,
        is_active: bool,
    ) -> RepositoryResult<(Account, bool)> {
        if let Some(existing) = self.find_by_file_path(file_path).await? {
            return Ok((existing, false));
        }

        let request = AccountCreateRequest {
            name: name.to_string(),
            user_agent: None,
            file_path: Some(file_path.to_string()),
            is_active,
        };

        match self.create(request).await {
            Ok(account) => {
                info!("Created account '{}' for {}", account.name, file_path);
                Ok((account, true))
            }
            // Another worker won the unique file_path race
            Err(err) => match self.find_by_file_path(file_path).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(err),
            },
        }
    }

    /// Remember the modification time of the file version last imported
    pub async fn update_last_seen_mtime(&self, id: &Uuid, mtime: i64) -> RepositoryResult<()> {
        let model = Accounts::find_by_id(*id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("accounts", "id", id))?;

        let mut active_model: accounts::ActiveModel = model.into();
        active_model.last_seen_mtime = Set(Some(mtime));
        active_model.updated_at = Set(chrono::Utc::now());
        active_model.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn set_user_agent(
        &self,
        id: &Uuid,
        user_agent: Option<String>,
    ) -> RepositoryResult<()> {
        let model = Accounts::find_by_id(*id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("accounts", "id", id))?;

        let mut active_model: accounts::ActiveModel = model.into();
        active_model.user_agent = Set(user_agent);
        active_model.updated_at = Set(chrono::Utc::now());
        active_model.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn create_profile(
        &self,
        request: DeliveryProfileCreateRequest,
    ) -> RepositoryResult<DeliveryProfile> {
        let model = delivery_profiles::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(request.account_id),
            name: Set(request.name),
            search_pattern: Set(request.search_pattern),
            replace_pattern: Set(request.replace_pattern),
            delivery_mode: Set(request.mode.to_string()),
            is_default: Set(request.is_default),
            is_active: Set(request.is_active),
        }
        .insert(&*self.connection)
        .await?;
        Self::profile_to_domain(model)
    }

    pub async fn find_profile(&self, id: &Uuid) -> RepositoryResult<Option<DeliveryProfile>> {
        DeliveryProfiles::find_by_id(*id)
            .one(&*self.connection)
            .await?
            .map(Self::profile_to_domain)
            .transpose()
    }

    /// Every profile of an account, ordered by id
    pub async fn profiles_for_account(
        &self,
        account_id: &Uuid,
    ) -> RepositoryResult<Vec<DeliveryProfile>> {
        let models = DeliveryProfiles::find()
            .filter(delivery_profiles::Column::AccountId.eq(*account_id))
            .order_by_asc(delivery_profiles::Column::Id)
            .all(&*self.connection)
            .await?;
        models.into_iter().map(Self::profile_to_domain).collect()
    }

    pub async fn set_profile_active(&self, id: &Uuid, is_active: bool) -> RepositoryResult<()> {
        let model = DeliveryProfiles::find_by_id(*id)
            .one(&*self.connection)
            .await?
            .ok_or_else(|| RepositoryError::not_found("delivery_profiles", "id", id))?;

        let mut active_model: delivery_profiles::ActiveModel = model.into();
        active_model.is_active = Set(is_active);
        active_model.update(&*self.connection).await?;
        Ok(())
    }

    pub async fn delete_profile(&self, id: &Uuid) -> RepositoryResult<bool> {
        let result = DeliveryProfiles::delete_by_id(*id)
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected > 0)
    }

    fn account_to_domain(model: accounts::Model) -> Account {
        Account {
            id: model.id,
            name: model.name,
            user_agent: model.user_agent,
            file_path: model.file_path,
            is_active: model.is_active,
            last_seen_mtime: model.last_seen_mtime,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    fn profile_to_domain(model: delivery_profiles::Model) -> RepositoryResult<DeliveryProfile> {
        let mode = model.delivery_mode.parse::<DeliveryMode>().map_err(|_| {
            RepositoryError::invalid_value("delivery_profiles", "delivery_mode", &model.delivery_mode)
        })?;

        Ok(DeliveryProfile {
            id: model.id,
            account_id: model.account_id,
            name: model.name,
            search_pattern: model.search_pattern,
            replace_pattern: model.replace_pattern,
            mode,
            is_default: model.is_default,
            is_active: model.is_active,
        })
    }
}
