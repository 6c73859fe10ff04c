use crate::{
    auth::{AuthService, IssuedToken},
    entities::{profile, user, Profile, ProfileModel, User, UserModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Account service handling registration, login and profile management.
///
/// Registration creates the user and their profile in one transaction; the
/// profile row always exists for a registered account.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    auth: Arc<AuthService>,
}

/// Registration parameters
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Profile update parameters; `None` fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// User together with their profile, as returned by `get_profile`
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub user: UserModel,
    pub profile: ProfileModel,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            auth,
        }
    }

    /// Registers a new buyer account and issues a token.
    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<IssuedToken, ServiceError> {
        if input.password != input.password2 {
            return Err(ServiceError::ValidationError(
                "Passwords do not match".to_string(),
            ));
        }

        let email = input.email.trim().to_lowercase();

        let txn = self.db.begin().await?;

        let existing = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Email {} is already registered",
                email
            )));
        }

        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let account = user::ActiveModel {
            id: Set(user_id),
            email: Set(email),
            password_hash: Set(self.auth.hash_password(&input.password)),
            first_name: Set(input.first_name),
            last_name: Set(input.last_name),
            is_staff: Set(false),
            is_active: Set(true),
            date_joined: Set(now),
        };
        let account = account.insert(&txn).await?;

        let profile = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            phone: Set(input.phone),
            address: Set(input.address),
            is_vendor: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        profile.insert(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::UserRegistered(user_id))
            .await;

        info!("Registered user {}", user_id);

        self.auth
            .generate_token(&account)
            .map_err(|e| ServiceError::InternalError(e.to_string()))
    }

    /// Verifies credentials and issues a token. Inactive accounts are
    /// rejected even with the right password.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, ServiceError> {
        let email = email.trim().to_lowercase();

        let account = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        if !self.auth.verify_password(password, &account.password_hash) {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }

        if !account.is_active {
            return Err(ServiceError::Unauthorized(
                "Account is deactivated".to_string(),
            ));
        }

        info!("User {} logged in", account.id);

        self.auth
            .generate_token(&account)
            .map_err(|e| ServiceError::InternalError(e.to_string()))
    }

    /// Fetches the caller's account together with their profile.
    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<AccountView, ServiceError> {
        let account = User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let profile = Profile::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Profile for user {} not found", user_id))
            })?;

        Ok(AccountView {
            user: account,
            profile,
        })
    }

    /// Partially updates the caller's name and contact details.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<AccountView, ServiceError> {
        let txn = self.db.begin().await?;

        let account = User::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let profile = Profile::find()
            .filter(profile::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Profile for user {} not found", user_id))
            })?;

        let mut account: user::ActiveModel = account.into();
        if let Some(first_name) = input.first_name {
            account.first_name = Set(first_name);
        }
        if let Some(last_name) = input.last_name {
            account.last_name = Set(last_name);
        }
        let account = account.update(&txn).await?;

        let mut profile: profile::ActiveModel = profile.into();
        if let Some(phone) = input.phone {
            profile.phone = Set(Some(phone));
        }
        if let Some(address) = input.address {
            profile.address = Set(Some(address));
        }
        profile.updated_at = Set(Utc::now());
        let profile = profile.update(&txn).await?;

        txn.commit().await?;

        Ok(AccountView {
            user: account,
            profile,
        })
    }
}
