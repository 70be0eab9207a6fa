//! User service.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use pollbox_common::{AppError, AppResult};
use pollbox_db::{entities::user, repositories::UserRepository};
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    user_repo: UserRepository,
}

/// Username and password, as submitted to signup and login.
#[derive(Debug, Deserialize, Validate)]
pub struct CredentialsInput {
    #[validate(length(min = 1, max = 64))]
    pub username: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
}

impl From<user::Model> for UserSummary {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, user_repo: UserRepository) -> Self {
        Self { db, user_repo }
    }

    /// Register a new user.
    pub async fn signup(&self, input: CredentialsInput) -> AppResult<user::Model> {
        input.validate()?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(&input.password)?;

        let model = user::ActiveModel {
            username: Set(input.username),
            password_hash: Set(password_hash),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let user = self.user_repo.create(self.db.as_ref(), model).await?;
        tracing::info!(user_id = user.id, username = %user.username, "User signed up");
        Ok(user)
    }

    /// Authenticate a user by username and password.
    pub async fn login(&self, input: CredentialsInput) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// List all users ordered by ID.
    pub async fn list(&self) -> AppResult<Vec<UserSummary>> {
        let users = self.user_repo.find_all().await?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    /// Number of registered users.
    pub async fn count(&self) -> AppResult<u64> {
        self.user_repo.count().await
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_user(id: i32, username: &str, password: &str) -> user::Model {
        user::Model {
            id,
            username: username.to_string(),
            password_hash: hash_password(password).unwrap(),
            created_at: Utc::now().into(),
        }
    }

    fn create_test_service(db: DatabaseConnection) -> UserService {
        let db = Arc::new(db);
        UserService::new(Arc::clone(&db), UserRepository::new(db))
    }

    fn credentials(username: &str, password: &str) -> CredentialsInput {
        CredentialsInput {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("test_password_123").unwrap();
        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("test", "invalid_hash").is_err());
    }

    #[tokio::test]
    async fn test_signup_rejects_empty_username() {
        let service =
            create_test_service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let result = service.signup(credentials("", "secret")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_signup_taken_username_is_conflict() {
        let existing = create_test_user(1, "alice", "secret");
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );

        let result = service.signup(credentials("alice", "other")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_signup_creates_user() {
        let created = create_test_user(7, "bob", "secret");
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[created]])
                .into_connection(),
        );

        let user = service.signup(credentials("bob", "secret")).await.unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.username, "bob");
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_unauthorized() {
        let existing = create_test_user(1, "alice", "secret");
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .into_connection(),
        );

        let result = service.login(credentials("alice", "guess")).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_unauthorized() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let result = service.login(credentials("nobody", "secret")).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_list_hides_password_hash() {
        let service = create_test_service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_user(1, "alice", "a"),
                    create_test_user(2, "bob", "b"),
                ]])
                .into_connection(),
        );

        let users = service.list().await.unwrap();
        let json = serde_json::to_value(&users).unwrap();

        assert_eq!(users[1].username, "bob");
        assert!(json[0].get("password_hash").is_none());
    }
}
