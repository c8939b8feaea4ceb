//! Accounts and cookie sessions.
//!
//! Passwords are stored as Argon2id PHC strings. A session token has the
//! shape `ses_<prefix>_<secret>`: the prefix is stored in clear for lookup,
//! the secret only as a SHA-256 digest compared in constant time.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordVerifier,
    password_hash::{PasswordHasher, SaltString},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::clock::Clock;
use crate::application::forms::{
    FormErrors, LoginInput, NON_FIELD, PasswordChangeInput, SignupInput,
};
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::users::{
    validate_email, validate_name, validate_new_password, validate_username,
};

pub const SESSION_COOKIE: &str = "sessionid";
const TOKEN_PREFIX: &str = "ses";
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("session lifetime overflows the calendar")]
    SessionLifetime,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid session token")]
    Invalid,
    #[error("session expired")]
    Expired,
}

pub enum SignupOutcome {
    Registered(UserRecord),
    Rejected(FormErrors),
}

pub enum LoginOutcome {
    LoggedIn { user: UserRecord, token: String },
    Rejected(FormErrors),
}

pub enum PasswordChangeOutcome {
    Changed,
    Rejected(FormErrors),
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            clock,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub async fn signup(&self, input: &SignupInput) -> Result<SignupOutcome, AccountError> {
        let mut errors = FormErrors::new();

        let username = collect(&mut errors, validate_username(&input.username));
        let first_name = collect(&mut errors, validate_name("first_name", &input.first_name));
        let last_name = collect(&mut errors, validate_name("last_name", &input.last_name));
        let email = collect(&mut errors, validate_email(&input.email));
        collect(
            &mut errors,
            validate_new_password("password2", &input.password1, &input.password2),
        );

        if let Some(username) = &username
            && self.users.find_by_username(username).await?.is_some()
        {
            errors.add("username", "A user with that username already exists.");
        }

        let (Some(username), Some(first_name), Some(last_name), Some(email), true) =
            (username, first_name, last_name, email, errors.is_empty())
        else {
            return Ok(SignupOutcome::Rejected(errors));
        };

        let password_hash = hash_password(&input.password1)?;
        let created = self
            .users
            .create_user(CreateUserParams {
                username,
                first_name,
                last_name,
                email,
                password_hash,
                date_joined: self.clock.now(),
            })
            .await;

        match created {
            Ok(user) => {
                info!(target = "yatube::accounts", username = %user.username, "user registered");
                Ok(SignupOutcome::Registered(user))
            }
            // Lost a race with a concurrent signup for the same name.
            Err(RepoError::Duplicate { .. }) => {
                let mut errors = FormErrors::new();
                errors.add("username", "A user with that username already exists.");
                Ok(SignupOutcome::Rejected(errors))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn login(&self, input: &LoginInput) -> Result<LoginOutcome, AccountError> {
        let mut errors = FormErrors::new();
        if input.username.trim().is_empty() {
            errors.add("username", "This field is required.");
        }
        if input.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        if !errors.is_empty() {
            return Ok(LoginOutcome::Rejected(errors));
        }

        let user = self.users.find_by_username(input.username.trim()).await?;
        let Some(user) = user.filter(|user| verify_password(&input.password, &user.password_hash))
        else {
            debug!(target = "yatube::accounts", username = %input.username.trim(), "login rejected");
            errors.add(
                NON_FIELD,
                "Please enter a correct username and password. Note that both fields may be case-sensitive.",
            );
            return Ok(LoginOutcome::Rejected(errors));
        };

        let now = self.clock.now();
        let expires_at = session_expiry(now, self.session_ttl)?;
        let removed = self.sessions.delete_expired(now).await?;
        if removed > 0 {
            debug!(target = "yatube::accounts", removed, "expired sessions purged");
        }

        let prefix = generate_prefix();
        let secret = generate_secret();
        self.sessions
            .create_session(CreateSessionParams {
                user_id: user.id,
                prefix: prefix.clone(),
                hashed_secret: hash_secret(&secret),
                created_at: now,
                expires_at,
            })
            .await?;

        info!(target = "yatube::accounts", username = %user.username, "user logged in");
        let token = format!("{TOKEN_PREFIX}_{prefix}_{secret}");
        Ok(LoginOutcome::LoggedIn { user, token })
    }

    /// Resolve a session cookie to its user.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, SessionError> {
        let parsed = parse_token(token).ok_or(SessionError::Invalid)?;
        let session = self
            .sessions
            .find_by_prefix(&parsed.prefix)
            .await
            .map_err(|err| {
                warn!(target = "yatube::accounts", error = %err, "session lookup failed");
                SessionError::Invalid
            })?
            .ok_or(SessionError::Invalid)?;

        let hashed_input = hash_secret(&parsed.secret);
        if session.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(SessionError::Invalid);
        }
        if session.expires_at <= self.clock.now() {
            return Err(SessionError::Expired);
        }

        self.users
            .find_user(session.user_id)
            .await
            .map_err(|_| SessionError::Invalid)?
            .ok_or(SessionError::Invalid)
    }

    /// Drop the session behind `token`. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AccountError> {
        if let Some(parsed) = parse_token(token) {
            self.sessions.delete_session(&parsed.prefix).await?;
        }
        Ok(())
    }

    pub async fn change_password(
        &self,
        user: &UserRecord,
        input: &PasswordChangeInput,
    ) -> Result<PasswordChangeOutcome, AccountError> {
        let mut errors = FormErrors::new();
        if !verify_password(&input.old_password, &user.password_hash) {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        collect(
            &mut errors,
            validate_new_password("new_password2", &input.new_password1, &input.new_password2),
        );
        if !errors.is_empty() {
            return Ok(PasswordChangeOutcome::Rejected(errors));
        }

        let password_hash = hash_password(&input.new_password1)?;
        self.users.update_password(user.id, &password_hash).await?;
        info!(target = "yatube::accounts", username = %user.username, "password changed");
        Ok(PasswordChangeOutcome::Changed)
    }
}

fn collect<T>(
    errors: &mut FormErrors,
    result: Result<T, crate::domain::error::DomainError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            errors.add_domain(err);
            None
        }
    }
}

fn session_expiry(now: OffsetDateTime, ttl: Duration) -> Result<OffsetDateTime, AccountError> {
    now.checked_add(ttl).ok_or(AccountError::SessionLifetime)
}

pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AccountError::Hashing(err.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    if parts.next()? != TOKEN_PREFIX {
        return None;
    }
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn token_parsing_requires_tag_and_long_secret() {
        let secret = generate_secret();
        let token = format!("ses_abcdef123456_{secret}");
        let parsed = parse_token(&token).expect("parsed");
        assert_eq!(parsed.prefix, "abcdef123456");
        assert_eq!(parsed.secret, secret);

        assert!(parse_token(&format!("sk_abcdef123456_{secret}")).is_none());
        assert!(parse_token("ses_abcdef123456_short").is_none());
        assert!(parse_token("ses__").is_none());
        assert!(parse_token("garbage").is_none());
    }

    #[test]
    fn session_expiry_rejects_overflow() {
        let now = time::macros::datetime!(2024-03-05 10:30 UTC);
        assert_eq!(
            session_expiry(now, Duration::days(14)).expect("fits"),
            time::macros::datetime!(2024-03-19 10:30 UTC)
        );
        assert!(matches!(
            session_expiry(now, Duration::MAX),
            Err(AccountError::SessionLifetime)
        ));
    }

    #[test]
    fn secret_hash_is_sha256() {
        assert_eq!(hash_secret("abc").len(), 32);
        assert_ne!(hash_secret("abc"), hash_secret("abd"));
    }
}
