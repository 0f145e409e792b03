//! Account registration, authentication and profile service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::UsersConfig,
    error::{AppError, AppResult},
    models::user::{RegisterUser, UpdateProfile, User, UserClaims, UserQuery, UserShort},
    repository::{users::NewUser, Repository},
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: UsersConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: UsersConfig) -> Self {
        Self { repository, config }
    }

    /// Register a reader account (with its reader profile)
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        let password_hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&NewUser {
                username: request.username.trim(),
                email: request.email.as_deref(),
                password_hash: &password_hash,
                phone_number: request.phone_number.as_deref(),
                is_staff: false,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Reader registered");
        Ok(user)
    }

    /// Authenticate by username and password, returning a JWT token
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !verify_password(&user.password_hash, password)? {
            tracing::warn!(username, "Failed login attempt");
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        Ok((token, user))
    }

    /// Create JWT token for a user
    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Token lifetime in seconds
    pub fn token_lifetime(&self) -> i64 {
        self.config.jwt_expiration_hours as i64 * 3600
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Current staff flag of an account; unknown accounts are not staff
    pub async fn is_staff(&self, id: i32) -> AppResult<bool> {
        match self.repository.users.get_by_id(id).await {
            Ok(user) => Ok(user.is_staff),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Update own profile; changing the password requires the current one
    pub async fn update_profile(&self, user_id: i32, profile: UpdateProfile) -> AppResult<User> {
        let new_hash = match profile.new_password.as_deref() {
            Some(new_password) => {
                let current = profile.current_password.as_deref().ok_or_else(|| {
                    AppError::Validation("Current password is required to change password".to_string())
                })?;
                let user = self.repository.users.get_by_id(user_id).await?;
                if !verify_password(&user.password_hash, current)? {
                    return Err(AppError::Authentication("Current password is incorrect".to_string()));
                }
                Some(hash_password(new_password)?)
            }
            None => None,
        };

        self.repository
            .users
            .update_profile(
                user_id,
                profile.email.as_deref(),
                profile.phone_number.as_deref(),
                new_hash.as_deref(),
            )
            .await
    }

    /// Search users
    pub async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<UserShort>, i64)> {
        self.repository.users.search(query).await
    }

    /// Grant or revoke the staff tier
    pub async fn set_staff(&self, acting_user_id: i32, id: i32, is_staff: bool) -> AppResult<User> {
        if acting_user_id == id && !is_staff {
            return Err(AppError::BadRequest(
                "Administrators cannot revoke their own staff access".to_string(),
            ));
        }
        let user = self.repository.users.set_staff(id, is_staff).await?;
        tracing::info!(user_id = id, is_staff, by = acting_user_id, "Staff access changed");
        Ok(user)
    }

    /// Make sure the configured administrator account exists with the configured password
    pub async fn ensure_admin(&self) -> AppResult<()> {
        let (Some(username), Some(password)) = (
            self.config.admin_username.as_deref(),
            self.config.admin_password.as_deref(),
        ) else {
            return Ok(());
        };

        let password_hash = hash_password(password)?;

        match self.repository.users.get_by_username(username).await? {
            Some(user) => {
                self.repository
                    .users
                    .promote_with_password(user.id, &password_hash)
                    .await?;
                tracing::info!(username, "Administrator account updated");
            }
            None => {
                self.repository
                    .users
                    .create(&NewUser {
                        username,
                        email: None,
                        password_hash: &password_hash,
                        phone_number: None,
                        is_staff: true,
                    })
                    .await?;
                tracing::info!(username, "Administrator account created");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "battery staple").unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_hash_is_internal_error() {
        assert!(matches!(
            verify_password("not-a-hash", "pw"),
            Err(AppError::Internal(_))
        ));
    }
}
