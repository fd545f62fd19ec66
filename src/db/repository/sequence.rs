use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// Atomically bump the counter for `(prefix, year)` and return the new value.
///
/// A single upsert statement, so concurrent callers can never observe the
/// same value. The first call for a pair yields 1.
pub fn next_sequence(conn: &Connection, prefix: &str, year: i32) -> Result<u32, DatabaseError> {
    let value = conn.query_row(
        "INSERT INTO sequence_counters (prefix, year, value) VALUES (?1, ?2, 1)
         ON CONFLICT (prefix, year) DO UPDATE SET value = value + 1
         RETURNING value",
        params![prefix, year],
        |row| row.get(0),
    )?;
    Ok(value)
}

/// Lift the counter for `(prefix, year)` to at least `value`, so an
/// identifier stored with that sequence is never handed out again.
pub fn raise_sequence(
    conn: &Connection,
    prefix: &str,
    year: i32,
    value: u32,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sequence_counters (prefix, year, value) VALUES (?1, ?2, ?3)
         ON CONFLICT (prefix, year) DO UPDATE SET value = MAX(value, excluded.value)",
        params![prefix, year, value],
    )?;
    Ok(())
}

/// Current counter value, 0 when nothing has been issued yet.
pub fn current_sequence(conn: &Connection, prefix: &str, year: i32) -> Result<u32, DatabaseError> {
    let value = conn
        .query_row(
            "SELECT value FROM sequence_counters WHERE prefix = ?1 AND year = ?2",
            params![prefix, year],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn first_value_is_one_then_increments() {
        let conn = open_memory_database().unwrap();
        assert_eq!(current_sequence(&conn, "REF", 2026).unwrap(), 0);
        assert_eq!(next_sequence(&conn, "REF", 2026).unwrap(), 1);
        assert_eq!(next_sequence(&conn, "REF", 2026).unwrap(), 2);
        assert_eq!(current_sequence(&conn, "REF", 2026).unwrap(), 2);
    }

    #[test]
    fn raising_never_lowers_the_counter() {
        let conn = open_memory_database().unwrap();
        raise_sequence(&conn, "REF", 2026, 5).unwrap();
        assert_eq!(next_sequence(&conn, "REF", 2026).unwrap(), 6);
        raise_sequence(&conn, "REF", 2026, 2).unwrap();
        assert_eq!(current_sequence(&conn, "REF", 2026).unwrap(), 6);
    }

    #[test]
    fn prefixes_and_years_are_independent() {
        let conn = open_memory_database().unwrap();
        next_sequence(&conn, "REF", 2026).unwrap();
        next_sequence(&conn, "REF", 2026).unwrap();
        assert_eq!(next_sequence(&conn, "NO", 2026).unwrap(), 1);
        assert_eq!(next_sequence(&conn, "REF", 2027).unwrap(), 1);
    }
}
