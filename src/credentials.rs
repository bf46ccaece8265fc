//! User accounts in a SQLite database with bcrypt password hashes.

use crate::config::CredentialConfig;
use crate::error::{CredentialError, Result, SignlabError};
use crate::events::{EventBus, PipelineEvent};
use rand::Rng;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// `sqlite::memory:` databases exist per connection, so the pool keeps exactly one
const MAX_CONNECTIONS: u32 = 1;

const CREATE_USERS_TABLE: &str = "CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    salt TEXT NOT NULL
)";

/// Result of a login attempt that reached the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    WrongPassword,
    UnknownUser,
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, LoginOutcome::Authenticated)
    }

    pub fn message(&self) -> &'static str {
        match self {
            LoginOutcome::Authenticated => "Login successful",
            LoginOutcome::WrongPassword => "Incorrect password",
            LoginOutcome::UnknownUser => "User does not exist",
        }
    }
}

/// Check a registration form; returns the trimmed username and password
pub fn validate_registration(
    username: &str,
    password: &str,
    confirm_password: &str,
) -> std::result::Result<(String, String), CredentialError> {
    let (username, password, confirm_password) =
        (username.trim(), password.trim(), confirm_password.trim());

    if username.is_empty() || password.is_empty() || confirm_password.is_empty() {
        return Err(CredentialError::EmptyField);
    }
    if password != confirm_password {
        return Err(CredentialError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CredentialError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }

    Ok((username.to_string(), password.to_string()))
}

/// Registration and login against the `users` table
pub struct CredentialStore {
    pool: SqlitePool,
    bcrypt_cost: u32,
    event_bus: Option<EventBus>,
}

impl CredentialStore {
    /// Open (creating if needed) the database named by the config
    pub async fn connect(config: &CredentialConfig) -> Result<Self> {
        info!("Opening credential store at {}", config.database_url);

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(CredentialError::from)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(CredentialError::from)?;

        Self::with_pool(pool, config.bcrypt_cost).await
    }

    /// Wrap an existing pool and make sure the schema exists
    pub async fn with_pool(pool: SqlitePool, bcrypt_cost: u32) -> Result<Self> {
        sqlx::query(CREATE_USERS_TABLE)
            .execute(&pool)
            .await
            .map_err(CredentialError::from)?;
        debug!("Users table ready");

        Ok(Self {
            pool,
            bcrypt_cost,
            event_bus: None,
        })
    }

    /// Publish `UserRegistered` on successful registrations
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Validate the form, hash the password and insert the user
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        let (username, password) = validate_registration(username, password, confirm_password)?;

        let cost = self.bcrypt_cost;
        let (password_hash, salt) =
            tokio::task::spawn_blocking(move || hash_password(&password, cost))
                .await
                .map_err(|e| SignlabError::system(format!("password hashing task failed: {}", e)))??;

        let inserted = sqlx::query("INSERT INTO users (username, password_hash, salt) VALUES (?, ?, ?)")
            .bind(&username)
            .bind(&password_hash)
            .bind(&salt)
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(_) => {
                info!("Registered user '{}'", username);
                if let Some(event_bus) = &self.event_bus {
                    event_bus.publish(PipelineEvent::UserRegistered { username });
                }
                Ok(())
            }
            Err(sqlx::Error::Database(db_error)) if db_error.is_unique_violation() => {
                warn!("Registration refused, user '{}' already exists", username);
                Err(CredentialError::UserExists { username }.into())
            }
            Err(e) => Err(CredentialError::from(e).into()),
        }
    }

    /// Check a username/password pair
    pub async fn verify(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            return Err(CredentialError::EmptyField.into());
        }

        let row = sqlx::query("SELECT password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(CredentialError::from)?;

        let Some(row) = row else {
            debug!("Login for unknown user '{}'", username);
            return Ok(LoginOutcome::UnknownUser);
        };
        let stored_hash: String = row.try_get("password_hash").map_err(CredentialError::from)?;

        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored_hash))
            .await
            .map_err(|e| SignlabError::system(format!("password check task failed: {}", e)))?
            .map_err(CredentialError::from)?;

        if matches {
            info!("User '{}' authenticated", username);
            Ok(LoginOutcome::Authenticated)
        } else {
            warn!("Wrong password for user '{}'", username);
            Ok(LoginOutcome::WrongPassword)
        }
    }

    pub async fn user_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS users FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(CredentialError::from)?;
        Ok(row.try_get("users").map_err(CredentialError::from)?)
    }

    /// Stored salt for a user, as written at registration
    pub async fn salt_for(&self, username: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT salt FROM users WHERE username = ?")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(CredentialError::from)?;
        row.map(|row| row.try_get("salt"))
            .transpose()
            .map_err(|e| CredentialError::from(e).into())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// bcrypt hash string plus the encoded salt it embeds
fn hash_password(password: &str, cost: u32) -> std::result::Result<(String, String), CredentialError> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);
    let parts = bcrypt::hash_with_salt(password, cost, salt)?;
    Ok((parts.to_string(), parts.get_salt()))
}
