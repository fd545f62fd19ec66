//! Identity store: credential verification, token authentication and
//! credential lifecycle.
//!
//! Hashing is CPU-bound and runs on the blocking pool; the database guard is
//! always released before the hash starts.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::core_state::{CoreError, CoreState};
use crate::crypto::{self, CryptoError};
use crate::db::{self, DatabaseError};
use crate::models::enums::{Lifecycle, Locale};
use crate::models::{Identity, NewIdentity};
use crate::token::{Claims, TokenError};

#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown username, wrong secret or ambiguous tenant. Deliberately
    /// indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Credential changed after token was issued")]
    StaleCredential,

    #[error("Identity is inactive")]
    Inactive,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<DatabaseError> for AuthError {
    fn from(err: DatabaseError) -> Self {
        AuthError::Core(CoreError::Database(err))
    }
}

impl From<CryptoError> for AuthError {
    fn from(err: CryptoError) -> Self {
        AuthError::Core(CoreError::Crypto(err))
    }
}

/// Outcome of a login attempt. A rejection keeps the matched identity, when
/// there was exactly one, so the caller can audit the failure against it.
#[derive(Debug)]
pub enum LoginAttempt {
    Verified(Identity),
    Rejected(Option<Identity>),
}

/// Check a username/secret pair, optionally within one tenant.
pub async fn check_login(
    core: &CoreState,
    username: &str,
    secret: &str,
    tenant_key: Option<&str>,
) -> Result<LoginAttempt, AuthError> {
    let tenant_key = tenant_key.map(str::to_uppercase);
    let mut candidates = {
        let conn = core.db()?;
        db::find_login_candidates(&conn, username.trim(), tenant_key.as_deref())?
    };

    let iterations = core.config().hash_iterations;
    let secret = secret.to_string();

    if candidates.len() != 1 {
        if candidates.len() > 1 {
            tracing::debug!("Login username matches several tenants; tenant required");
        }
        run_blocking(move || crypto::verify_against_nothing(&secret, iterations)).await?;
        return Ok(LoginAttempt::Rejected(None));
    }

    let (identity, stored) = candidates.remove(0);
    let matches = run_blocking(move || crypto::verify_secret(&secret, &stored)).await??;
    if matches {
        Ok(LoginAttempt::Verified(identity))
    } else {
        Ok(LoginAttempt::Rejected(Some(identity)))
    }
}

/// `check_login`, collapsed to the generic error on any rejection.
pub async fn verify_credential(
    core: &CoreState,
    username: &str,
    secret: &str,
    tenant_key: Option<&str>,
) -> Result<Identity, AuthError> {
    match check_login(core, username, secret, tenant_key).await? {
        LoginAttempt::Verified(identity) => Ok(identity),
        LoginAttempt::Rejected(_) => Err(AuthError::InvalidCredentials),
    }
}

pub fn record_login(core: &CoreState, id: &Uuid) -> Result<(), AuthError> {
    let conn = core.db()?;
    db::record_login(&conn, id, Utc::now())?;
    Ok(())
}

/// Resolve a bearer token to the live identity it was issued for.
///
/// Fails when the token does not verify, the identity is gone or inactive,
/// the tenant no longer matches, or the credential changed after issuance.
pub fn authenticate_token(core: &CoreState, token: &str) -> Result<(Identity, Claims), AuthError> {
    let claims = core.tokens().verify(token)?;
    let identity = {
        let conn = core.db()?;
        db::get_identity(&conn, &claims.sub)?
    };
    let identity = identity.ok_or(AuthError::Inactive)?;
    if !identity.is_active() {
        return Err(AuthError::Inactive);
    }
    if identity.tenant_key != claims.tenant || identity.role != claims.role {
        return Err(AuthError::InvalidCredentials);
    }
    if claims.iat < identity.credential_changed_at.timestamp() {
        return Err(AuthError::StaleCredential);
    }
    Ok((identity, claims))
}

/// Hash the secret and store a new identity.
pub async fn create_identity(core: &CoreState, new: NewIdentity) -> Result<Identity, AuthError> {
    let prepared = prepare_identity(core, new).await?;
    let conn = core.db()?;
    Ok(store_identity(&conn, prepared)?)
}

/// A new identity with its credential already hashed, ready to insert.
pub struct PreparedIdentity {
    identity: Identity,
    hash: String,
}

impl PreparedIdentity {
    pub fn tenant_key(&self) -> &str {
        &self.identity.tenant_key
    }
}

/// Hash the credential and build the row. No database access, so callers can
/// run their own checks and the insert under a single guard afterwards.
pub async fn prepare_identity(
    core: &CoreState,
    new: NewIdentity,
) -> Result<PreparedIdentity, AuthError> {
    let iterations = core.config().hash_iterations;
    let secret = new.secret.clone();
    let hash = run_blocking(move || crypto::hash_secret(&secret, iterations)).await??;

    let now = Utc::now();
    let identity = Identity {
        id: Uuid::new_v4(),
        tenant_key: new.tenant_key.to_uppercase(),
        username: new.username.trim().to_lowercase(),
        email: new.email.trim().to_lowercase(),
        role: new.role,
        full_name: new.full_name,
        phone: new.phone,
        specialization: new.specialization,
        language: Locale::En,
        last_login: None,
        credential_changed_at: now - Duration::seconds(1),
        lifecycle: Lifecycle::Active,
        created_at: now,
    };
    Ok(PreparedIdentity { identity, hash })
}

pub fn store_identity(
    conn: &Connection,
    prepared: PreparedIdentity,
) -> Result<Identity, DatabaseError> {
    db::insert_identity(conn, &prepared.identity, &prepared.hash)?;
    Ok(prepared.identity)
}

/// Replace the credential after checking the current one. Tokens issued
/// before the change stop authenticating.
pub async fn change_credential(
    core: &CoreState,
    identity: &Identity,
    current: &str,
    replacement: &str,
) -> Result<(), AuthError> {
    let stored = {
        let conn = core.db()?;
        db::get_credential_hash(&conn, &identity.id)?
    };
    let stored = stored.ok_or(AuthError::Inactive)?;

    let iterations = core.config().hash_iterations;
    let current = current.to_string();
    let replacement = replacement.to_string();
    let hash = run_blocking(move || -> Result<Option<String>, CryptoError> {
        if !crypto::verify_secret(&current, &stored)? {
            return Ok(None);
        }
        crypto::hash_secret(&replacement, iterations).map(Some)
    })
    .await??;
    let hash = hash.ok_or(AuthError::InvalidCredentials)?;

    let conn = core.db()?;
    if !db::update_credential(&conn, &identity.id, &hash, Utc::now() - Duration::seconds(1))? {
        return Err(AuthError::Inactive);
    }
    tracing::info!(user = %identity.id, "Credential changed");
    Ok(())
}

pub fn update_language(core: &CoreState, identity: &Identity, language: Locale) -> Result<(), AuthError> {
    let conn = core.db()?;
    if !db::update_language(&conn, &identity.id, language)? {
        return Err(AuthError::Inactive);
    }
    Ok(())
}

async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Core(CoreError::Task(e.to_string())))
}
