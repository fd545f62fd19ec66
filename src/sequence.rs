//! Human-readable sequential identifiers: `<PREFIX>-<year>-<seq>`.
//!
//! Counters are global per (prefix, year), shared by every tenant, and
//! advanced with one atomic upsert so concurrent creations never collide.
//! A supplied identifier lifts its counter, so the next generated value is
//! always the highest stored sequence plus one.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use rusqlite::Connection;

use crate::db::{self, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPrefix {
    /// Patient MRN
    Patient,
    NursingOrder,
    LabOrder,
}

impl EntityPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityPrefix::Patient => "REF",
            EntityPrefix::NursingOrder => "NO",
            EntityPrefix::LabOrder => "LAB",
        }
    }
}

pub fn format_identifier(prefix: EntityPrefix, year: i32, sequence: u32) -> String {
    format!("{}-{year}-{sequence:04}", prefix.as_str())
}

/// Next identifier for `prefix` in `year`.
pub fn next_identifier_for_year(
    conn: &Connection,
    prefix: EntityPrefix,
    year: i32,
) -> Result<String, DatabaseError> {
    let sequence = db::next_sequence(conn, prefix.as_str(), year)?;
    Ok(format_identifier(prefix, year, sequence))
}

/// Next identifier for `prefix` in the current UTC year.
pub fn next_identifier(conn: &Connection, prefix: EntityPrefix) -> Result<String, DatabaseError> {
    next_identifier_for_year(conn, prefix, Utc::now().year())
}

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)-(\d{4})-(\d{4,})$").unwrap());

/// A caller-supplied identifier that already passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppliedIdentifier {
    pub value: String,
    year: i32,
    sequence: u32,
}

/// Normalise a caller-supplied identifier: trimmed, upper-cased, shaped like
/// a generated one and carrying `prefix`. `None` when it does not fit.
pub fn normalize_supplied(raw: &str, prefix: EntityPrefix) -> Option<SuppliedIdentifier> {
    let candidate = raw.trim().to_uppercase();
    let caps = IDENTIFIER_PATTERN.captures(&candidate)?;
    if &caps[1] != prefix.as_str() {
        return None;
    }
    let year = caps[2].parse().ok()?;
    let sequence = caps[3].parse().ok()?;
    Some(SuppliedIdentifier {
        value: candidate,
        year,
        sequence,
    })
}

/// Identifier for a new entity: the supplied one, with the counter lifted
/// past it, or the next generated one. Call under the same connection guard
/// as the insert.
pub fn assign(
    conn: &Connection,
    prefix: EntityPrefix,
    supplied: Option<SuppliedIdentifier>,
) -> Result<String, DatabaseError> {
    match supplied {
        Some(id) => {
            db::raise_sequence(conn, prefix.as_str(), id.year, id.sequence)?;
            Ok(id.value)
        }
        None => next_identifier(conn, prefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn sequential_within_year() {
        let conn = open_memory_database().unwrap();
        let ids: Vec<String> = (0..3)
            .map(|_| next_identifier_for_year(&conn, EntityPrefix::Patient, 2026).unwrap())
            .collect();
        assert_eq!(ids, vec!["REF-2026-0001", "REF-2026-0002", "REF-2026-0003"]);
    }

    #[test]
    fn new_year_restarts_at_one() {
        let conn = open_memory_database().unwrap();
        next_identifier_for_year(&conn, EntityPrefix::NursingOrder, 2026).unwrap();
        next_identifier_for_year(&conn, EntityPrefix::NursingOrder, 2026).unwrap();
        assert_eq!(
            next_identifier_for_year(&conn, EntityPrefix::NursingOrder, 2027).unwrap(),
            "NO-2027-0001"
        );
    }

    #[test]
    fn prefixes_do_not_share_counters() {
        let conn = open_memory_database().unwrap();
        next_identifier_for_year(&conn, EntityPrefix::Patient, 2026).unwrap();
        assert_eq!(
            next_identifier_for_year(&conn, EntityPrefix::LabOrder, 2026).unwrap(),
            "LAB-2026-0001"
        );
    }

    #[test]
    fn padding_grows_past_four_digits() {
        assert_eq!(format_identifier(EntityPrefix::Patient, 2026, 7), "REF-2026-0007");
        assert_eq!(format_identifier(EntityPrefix::Patient, 2026, 12345), "REF-2026-12345");
    }

    #[test]
    fn current_year_is_used_by_default() {
        let conn = open_memory_database().unwrap();
        let id = next_identifier(&conn, EntityPrefix::Patient).unwrap();
        assert_eq!(id, format!("REF-{}-0001", Utc::now().year()));
    }

    fn supplied(raw: &str, prefix: EntityPrefix) -> Option<String> {
        normalize_supplied(raw, prefix).map(|id| id.value)
    }

    #[test]
    fn supplied_identifiers_are_normalised() {
        let p = EntityPrefix::Patient;
        assert_eq!(supplied(" ref-2026-0042 ", p).as_deref(), Some("REF-2026-0042"));
        assert_eq!(supplied("REF-2026-12345", p).as_deref(), Some("REF-2026-12345"));
        assert_eq!(supplied("REF-26-0042", p), None);
        assert_eq!(supplied("REF-2026-42", p), None);
        assert_eq!(supplied("2026-0042", p), None);
        assert_eq!(supplied("", p), None);
        assert_eq!(supplied("REF-2026-99999999999", p), None);
    }

    #[test]
    fn supplied_prefix_must_match_the_entity() {
        assert_eq!(supplied("LAB-2026-0001", EntityPrefix::Patient), None);
        assert_eq!(supplied("REF-2026-0001", EntityPrefix::NursingOrder), None);
        assert_eq!(
            supplied("no-2026-0001", EntityPrefix::NursingOrder).as_deref(),
            Some("NO-2026-0001")
        );
    }

    #[test]
    fn generation_continues_after_a_supplied_identifier() {
        let conn = open_memory_database().unwrap();
        let year = Utc::now().year();
        let given = normalize_supplied(&format!("REF-{year}-0002"), EntityPrefix::Patient);
        assert_eq!(
            assign(&conn, EntityPrefix::Patient, given).unwrap(),
            format!("REF-{year}-0002")
        );
        assert_eq!(
            assign(&conn, EntityPrefix::Patient, None).unwrap(),
            format!("REF-{year}-0003")
        );
        assert_eq!(
            assign(&conn, EntityPrefix::Patient, None).unwrap(),
            format!("REF-{year}-0004")
        );
    }

    #[test]
    fn a_lower_supplied_identifier_does_not_rewind() {
        let conn = open_memory_database().unwrap();
        for _ in 0..3 {
            next_identifier_for_year(&conn, EntityPrefix::LabOrder, 2026).unwrap();
        }
        let given = normalize_supplied("LAB-2026-0001", EntityPrefix::LabOrder);
        assign(&conn, EntityPrefix::LabOrder, given).unwrap();
        assert_eq!(
            next_identifier_for_year(&conn, EntityPrefix::LabOrder, 2026).unwrap(),
            "LAB-2026-0004"
        );
    }
}
