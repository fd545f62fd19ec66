use rusqlite::{params, Connection};

use super::{enum_col, uuid_col};
use crate::db::DatabaseError;
use crate::models::enums::OrderKind;
use crate::models::*;

/// Append one execution event. Events are never updated or removed.
pub fn insert_order_event(
    conn: &Connection,
    kind: OrderKind,
    order_id: &uuid::Uuid,
    event: &ExecutionEvent,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO order_events (order_kind, order_id, action, timestamp, performed_by, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            kind.as_str(),
            order_id.to_string(),
            event.action.as_str(),
            event.timestamp,
            event.performed_by.to_string(),
            event.notes,
        ],
    )?;
    Ok(())
}

/// An order's events in the order they were appended.
pub fn list_order_events(
    conn: &Connection,
    kind: OrderKind,
    order_id: &uuid::Uuid,
) -> Result<Vec<ExecutionEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT action, timestamp, performed_by, notes FROM order_events
         WHERE order_kind = ?1 AND order_id = ?2 ORDER BY id ASC",
    )?;
    let events = stmt
        .query_map(params![kind.as_str(), order_id.to_string()], |row| {
            Ok(ExecutionEvent {
                action: enum_col(row, 0)?,
                timestamp: row.get(1)?,
                performed_by: uuid_col(row, 2)?,
                notes: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}
