use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use super::hasher::CredentialHasher;
use super::token::TokenIssuer;
use super::validation::validate_registration;
use crate::db::{storage_precision, Database, NewUser, User, UserConflict};
use crate::error::AccountError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// A successful login: the account plus a bearer token for later calls.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AccountService {
    hasher: Arc<dyn CredentialHasher>,
    tokens: TokenIssuer,
}

impl AccountService {
    pub fn new(hasher: Arc<dyn CredentialHasher>, tokens: TokenIssuer) -> Self {
        Self { hasher, tokens }
    }

    pub async fn register(&self, db: &Database, form: RegistrationForm) -> Result<User, AccountError> {
        let username = form.username.trim();
        let email = form.email.trim();
        validate_registration(username, email, &form.password, &form.confirm_password)?;

        if db.get_user_by_username(username).await?.is_some() {
            return Err(AccountError::UsernameTaken);
        }
        if db.get_user_by_email(email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = self.hash_password(form.password).await?;
        // A concurrent registration can still claim the name between the
        // lookups above and this insert.
        let created = db
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await;
        let user = match created {
            Ok(user) => user,
            Err(err) => {
                return Err(match err.downcast_ref::<UserConflict>() {
                    Some(UserConflict::Username) => AccountError::UsernameTaken,
                    Some(UserConflict::Email) => AccountError::EmailTaken,
                    None => err.into(),
                })
            }
        };

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check credentials, stamp `last_login` and issue an access token.
    pub async fn login(
        &self,
        db: &Database,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, AccountError> {
        let Some(mut user) = db.get_user_by_username(username.trim()).await? else {
            return Err(AccountError::InvalidCredentials);
        };
        if !self
            .verify_password(password.to_string(), user.password_hash.clone())
            .await?
        {
            return Err(AccountError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AccountError::Inactive);
        }

        let now = storage_precision(now);
        db.update_user_login(user.id, now).await?;
        user.last_login = Some(now);

        let (access_token, claims) = self.tokens.issue(&user, now)?;
        Ok(AuthSession {
            user,
            access_token,
            expires_at: claims.expires_at(),
        })
    }

    /// Resolve a bearer token to the active account it was issued for.
    pub async fn authenticate(&self, db: &Database, token: &str) -> Result<User, AccountError> {
        let claims = self.tokens.decode(token)?;
        let Some(user) = db.get_user_by_id(claims.user_id).await? else {
            return Err(AccountError::InvalidToken);
        };
        if !user.is_active {
            return Err(AccountError::Inactive);
        }
        Ok(user)
    }

    pub fn is_token_valid(&self, token: &str) -> bool {
        self.tokens.is_valid(token)
    }

    async fn hash_password(&self, password: String) -> Result<String, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AccountError::Hashing(e.to_string()))?
    }

    async fn verify_password(&self, password: String, stored: String) -> Result<bool, AccountError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| AccountError::Hashing(e.to_string()))
    }
}

pub async fn set_webcam_consent(
    db: &Database,
    user_id: i64,
    consent: bool,
) -> Result<User, AccountError> {
    let Some(mut user) = db.get_user_by_id(user_id).await? else {
        return Err(AccountError::UnknownUser(user_id));
    };

    db.update_user_consent(user_id, consent).await?;
    user.consent_webcam = consent;
    info!("User {user_id} webcam consent set to {consent}");
    Ok(user)
}

/// The user, provided they exist, are active and have agreed to webcam use.
pub async fn require_webcam_consent(db: &Database, user_id: i64) -> Result<User, AccountError> {
    let Some(user) = db.get_user_by_id(user_id).await? else {
        return Err(AccountError::UnknownUser(user_id));
    };
    if !user.is_active {
        return Err(AccountError::Inactive);
    }
    if !user.consent_webcam {
        return Err(AccountError::ConsentRequired);
    }
    Ok(user)
}
