//! Identity reconciliation
//!
//! The record API does not return identifiers on create or update. After a
//! mutation is acknowledged, the domain's record set is listed and the
//! record is located again by its natural key `(name, content)`.
//!
//! Matching is a linear scan in listing order and the first match wins.
//! Further matches are reported in [`Resolution::duplicates`] so callers can
//! flag them; they never cause a failure.

use crate::error::{Error, Result};
use crate::model::{NaturalKey, Record, RecordId};

/// Outcome of a natural-key lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// First record carrying the key
    pub record: &'a Record,
    /// Identifiers of later records carrying the same key, in listing order
    pub duplicates: Vec<RecordId>,
}

impl Resolution<'_> {
    /// Identifier of the resolved record
    pub fn id(&self) -> &RecordId {
        &self.record.id
    }

    /// Whether the key was ambiguous in the record set
    pub fn is_ambiguous(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

/// Resolve `key` against `records`
///
/// # Errors
///
/// [`Error::RecordNotFound`] if no record carries the key. For update and
/// delete flows this is unrecoverable: without an identifier the record can
/// no longer be addressed.
pub fn resolve<'a>(key: &NaturalKey, records: &'a [Record]) -> Result<Resolution<'a>> {
    let mut matches = records.iter().filter(|record| key.matches(record));

    let record = matches
        .next()
        .ok_or_else(|| Error::record_not_found(key.to_string()))?;
    let duplicates: Vec<RecordId> = matches.map(|record| record.id.clone()).collect();

    Ok(Resolution { record, duplicates })
}

/// Find the record with identifier `id` (import flows)
///
/// # Errors
///
/// [`Error::RecordNotFound`] if no record has the identifier.
pub fn find_by_id<'a>(id: &RecordId, records: &'a [Record]) -> Result<&'a Record> {
    records
        .iter()
        .find(|record| &record.id == id)
        .ok_or_else(|| Error::record_not_found(format!("id={}", id)))
}
