//! Shared encode/decode helpers for SQLite ↔ domain type conversions.
//!
//! SQLite has no unsigned 64-bit integer, so timestamps and counters are
//! cast through `i64`. Lists and nested values are stored as JSON text.

use serde::{de::DeserializeOwned, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::persistence::PersistenceError;

// ── JSON columns ───────────────────────────────────────────────────────

pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, PersistenceError> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode_json_opt<T: Serialize>(value: Option<&T>) -> Result<Option<String>, PersistenceError> {
    value.map(encode_json).transpose()
}

pub fn decode_json_opt<T: DeserializeOwned>(
    text: Option<&str>,
) -> Result<Option<T>, PersistenceError> {
    text.map(decode_json).transpose()
}

// ── integer columns ────────────────────────────────────────────────────

pub fn to_db(value: u64) -> i64 {
    value as i64
}

pub fn from_db(value: i64) -> u64 {
    value.max(0) as u64
}

pub fn from_db_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

// ── dynamic IN lists ───────────────────────────────────────────────────

/// Append `(?, ?, ...)` with one bind per value. Callers must not pass an
/// empty slice; `IN ()` is a syntax error in SQLite.
pub fn push_in_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, values: &'a [String]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for value in values {
        separated.push_bind(value.as_str());
    }
    separated.push_unseparated(")");
}
