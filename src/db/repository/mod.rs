//! Repository layer: entity-scoped database operations.
//!
//! Every read filters on `lifecycle = 'active'` and, for tenant-owned
//! entities, on the caller's `TenantScope`. Row decoding helpers live here.

mod analytics;
mod audit;
mod identity;
mod lab;
mod nursing_order;
mod order_event;
mod patient;
mod record;
mod sequence;
mod tenant;

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::DatabaseError;

pub use analytics::*;
pub use audit::*;
pub use identity::*;
pub use lab::*;
pub use nursing_order::*;
pub use order_event::*;
pub use patient::*;
pub use record::*;
pub use sequence::*;
pub use tenant::*;

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Decode a `str_enum!` column.
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| T::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_json_col<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn opt_json<T: serde::Serialize>(
    value: &Option<T>,
) -> Result<Option<String>, DatabaseError> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(DatabaseError::from)
}
