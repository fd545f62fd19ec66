use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{enum_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::enums::Locale;
use crate::models::*;

/// Columns returned on every read path. `credential_hash` is excluded and
/// must be requested explicitly.
const IDENTITY_COLUMNS: &str = "id, tenant_key, username, email, role, full_name, phone,
     specialization, language, last_login, credential_changed_at, lifecycle, created_at";

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: uuid_col(row, 0)?,
        tenant_key: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        role: enum_col(row, 4)?,
        full_name: row.get(5)?,
        phone: row.get(6)?,
        specialization: row.get(7)?,
        language: enum_col(row, 8)?,
        last_login: row.get(9)?,
        credential_changed_at: row.get(10)?,
        lifecycle: enum_col(row, 11)?,
        created_at: row.get(12)?,
    })
}

pub fn insert_identity(
    conn: &Connection,
    identity: &Identity,
    credential_hash: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, tenant_key, username, email, credential_hash, role, full_name,
             phone, specialization, language, last_login, credential_changed_at, lifecycle, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            identity.id.to_string(),
            identity.tenant_key,
            identity.username.to_lowercase(),
            identity.email.to_lowercase(),
            credential_hash,
            identity.role.as_str(),
            identity.full_name,
            identity.phone,
            identity.specialization,
            identity.language.as_str(),
            identity.last_login,
            identity.credential_changed_at,
            identity.lifecycle.as_str(),
            identity.created_at,
        ],
    )?;
    Ok(())
}

/// Fetch an active identity by id.
pub fn get_identity(conn: &Connection, id: &Uuid) -> Result<Option<Identity>, DatabaseError> {
    let identity = conn
        .query_row(
            &format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = ?1 AND lifecycle = 'active'"),
            params![id.to_string()],
            identity_from_row,
        )
        .optional()?;
    Ok(identity)
}

/// Active identities matching a username, optionally restricted to one tenant,
/// together with their stored credential hash.
pub fn find_login_candidates(
    conn: &Connection,
    username: &str,
    tenant_key: Option<&str>,
) -> Result<Vec<(Identity, String)>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {IDENTITY_COLUMNS}, credential_hash FROM users
         WHERE username = ?1 AND (?2 IS NULL OR tenant_key = ?2) AND lifecycle = 'active'"
    ))?;
    let rows = stmt
        .query_map(params![username.to_lowercase(), tenant_key], |row| {
            Ok((identity_from_row(row)?, row.get::<_, String>(13)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_credential_hash(conn: &Connection, id: &Uuid) -> Result<Option<String>, DatabaseError> {
    let hash = conn
        .query_row(
            "SELECT credential_hash FROM users WHERE id = ?1 AND lifecycle = 'active'",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hash)
}

pub fn record_login(conn: &Connection, id: &Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET last_login = ?2 WHERE id = ?1",
        params![id.to_string(), at],
    )?;
    Ok(())
}

/// Store a new credential hash and move `credential_changed_at`, which
/// invalidates every token issued before `changed_at`.
pub fn update_credential(
    conn: &Connection,
    id: &Uuid,
    credential_hash: &str,
    changed_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET credential_hash = ?2, credential_changed_at = ?3
         WHERE id = ?1 AND lifecycle = 'active'",
        params![id.to_string(), credential_hash, changed_at],
    )?;
    Ok(changed == 1)
}

pub fn update_language(conn: &Connection, id: &Uuid, language: Locale) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET language = ?2 WHERE id = ?1 AND lifecycle = 'active'",
        params![id.to_string(), language.as_str()],
    )?;
    Ok(changed == 1)
}

pub fn count_active_identities(conn: &Connection, tenant_key: &str) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE tenant_key = ?1 AND lifecycle = 'active'",
        params![tenant_key],
        |row| row.get(0),
    )?;
    Ok(count)
}
