//! Account lifecycle: signup, login, cookie-session authentication.
//!
//! A session cookie carries `"{session_id}.{secret}"`. Only a SHA-256 of
//! the secret is persisted, so a leaked sessions table cannot be replayed.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{NewUserParams, RepoError, SessionsRepo, UsersRepo};
use crate::domain::entities::{SessionRecord, UserRecord};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 150;

/// Field-level validation outcome for the signup form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupFieldErrors {
    pub username: Option<&'static str>,
    pub email: Option<&'static str>,
    pub password: Option<&'static str>,
}

impl SignupFieldErrors {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("signup validation failed")]
    Invalid(SignupFieldErrors),
    #[error("username already taken")]
    UsernameTaken,
    #[error("invalid credentials")]
    BadCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The cookie-ready token handed out at login. The secret only exists here
/// and in the client's cookie jar.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub session_id: Uuid,
    secret: String,
}

impl SessionToken {
    pub fn cookie_value(&self) -> String {
        format!("{}.{}", self.session_id.simple(), self.secret)
    }
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            session_ttl,
        }
    }

    /// Register a new user and open a session for them in one step.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(UserRecord, SessionToken), AccountError> {
        let errors = validate_signup(username, email, password);
        if !errors.is_empty() {
            return Err(AccountError::Invalid(errors));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create_user(NewUserParams {
                username: username.trim().to_string(),
                email: email.trim().to_string(),
                password_hash,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => AccountError::UsernameTaken,
                other => AccountError::Repo(other),
            })?;

        debug!(target = "foglio::accounts", username = %user.username, "signup");
        let token = self.open_session(&user).await?;
        Ok((user, token))
    }

    /// Verify credentials and open a fresh session.
    ///
    /// Unknown username and wrong password collapse into the same error so
    /// the login form cannot be used to discover which usernames exist.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(UserRecord, SessionToken), AccountError> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AccountError::BadCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AccountError::BadCredentials);
        }

        debug!(target = "foglio::accounts", username = %user.username, "login");
        let token = self.open_session(&user).await?;
        Ok((user, token))
    }

    /// Resolve a cookie value to its user, or `None` for anything stale,
    /// malformed, or forged. Authentication never errors outward; a broken
    /// cookie is just an anonymous request.
    pub async fn authenticate(&self, cookie_value: &str) -> Option<UserRecord> {
        let (session_id, secret) = parse_cookie(cookie_value)?;

        let record = match self.sessions.find_session(session_id).await {
            Ok(found) => found?,
            Err(err) => {
                warn!(
                    target = "foglio::accounts",
                    error = %err,
                    "session lookup failed",
                );
                return None;
            }
        };

        if record.expires_at <= OffsetDateTime::now_utc() {
            return None;
        }

        let hashed_input = hash_secret(secret);
        if record
            .secret_hash
            .as_bytes()
            .ct_eq(hashed_input.as_bytes())
            .unwrap_u8()
            == 0
        {
            return None;
        }

        match self.users.find_by_id(record.user_id).await {
            Ok(user) => user,
            Err(err) => {
                warn!(
                    target = "foglio::accounts",
                    error = %err,
                    "user lookup failed during authentication",
                );
                None
            }
        }
    }

    /// Drop the session named by the cookie. Bad cookies are ignored.
    pub async fn logout(&self, cookie_value: &str) -> Result<(), RepoError> {
        if let Some((session_id, _)) = parse_cookie(cookie_value) {
            self.sessions.delete_session(session_id).await?;
        }
        Ok(())
    }

    /// Delete sessions past their expiry. Returns how many were removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64, RepoError> {
        self.sessions.purge_expired(OffsetDateTime::now_utc()).await
    }

    async fn open_session(&self, user: &UserRecord) -> Result<SessionToken, AccountError> {
        let secret = generate_secret();
        let now = OffsetDateTime::now_utc();
        let session = SessionRecord {
            id: Uuid::new_v4(),
            secret_hash: hash_secret(&secret),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.session_ttl,
        };
        let session_id = session.id;
        self.sessions.insert_session(session).await?;

        Ok(SessionToken { session_id, secret })
    }
}

pub fn validate_signup(username: &str, email: &str, password: &str) -> SignupFieldErrors {
    let mut errors = SignupFieldErrors::default();

    let username = username.trim();
    if username.is_empty() {
        errors.username = Some("Username must not be empty");
    } else if username.len() > MAX_USERNAME_LEN {
        errors.username = Some("Username is too long");
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        errors.username = Some("Username may only contain letters, digits, and _ - .");
    }

    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        errors.email = Some("Enter a valid email address");
    }

    if password.len() < MIN_PASSWORD_LEN {
        errors.password = Some("Password must be at least 8 characters");
    }

    errors
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn parse_cookie(value: &str) -> Option<(Uuid, &str)> {
    let (id, secret) = value.split_once('.')?;
    if secret.is_empty() {
        return None;
    }
    let session_id = Uuid::parse_str(id).ok()?;
    Some((session_id, secret))
}
