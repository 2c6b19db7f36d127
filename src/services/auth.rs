//! Authentication service: registration, login and token validation

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{Credentials, User, UserClaims},
    repository::Repository,
};

/// Issued bearer token with its lifetime in seconds
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new user with a hashed password
    pub async fn register(&self, credentials: Credentials) -> AppResult<User> {
        credentials.validate()?;

        if self
            .repository
            .users
            .find_by_username(&credentials.username)
            .await?
            .is_some()
        {
            return Err(AppError::Validation(format!(
                "Username '{}' already exists",
                credentials.username
            )));
        }

        let hash = self.hash_password(&credentials.password)?;
        let user = self.repository.users.insert(&credentials.username, &hash).await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Authenticate by username and password and issue a JWT token
    pub async fn login(&self, credentials: &Credentials) -> AppResult<IssuedToken> {
        let user = self
            .repository
            .users
            .find_by_username(&credentials.username)
            .await?
            .ok_or_else(|| {
                tracing::warn!(username = %credentials.username, "Login attempt for unknown user");
                AppError::Authentication("Invalid username or password".to_string())
            })?;

        if !self.verify_password(&user, &credentials.password)? {
            tracing::warn!(username = %user.username, "Login attempt with wrong password");
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;
        let token = UserClaims::new(&user.username, expires_in)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::info!(username = %user.username, "User logged in");
        Ok(IssuedToken { token, expires_in })
    }

    /// Check a bearer token and return the username it was issued for
    pub fn validate(&self, token: &str) -> AppResult<String> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map(|claims| claims.sub)
            .map_err(|e| AppError::Authentication(e.to_string()))
    }

    /// Tokens are not tracked server-side; the client drops its copy
    pub fn logout(&self) {}

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
