//! Composite record import identifiers (`domainId:recordId`)

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::model::{DomainId, RecordId};

/// Identifier of an existing record to bring under management
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordImportId {
    pub domain_id: DomainId,
    pub record_id: RecordId,
}

impl FromStr for RecordImportId {
    type Err = Error;

    /// Parse `domainId:recordId`
    ///
    /// Exactly two segments, both non-empty, and a numeric domain id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [domain, record] = parts.as_slice() else {
            return Err(Error::InvalidImportId(s.to_string()));
        };
        if domain.is_empty() || record.is_empty() {
            return Err(Error::InvalidImportId(s.to_string()));
        }
        let domain_id = domain
            .parse::<u64>()
            .map(DomainId)
            .map_err(|_| Error::InvalidImportId(s.to_string()))?;

        Ok(Self {
            domain_id,
            record_id: RecordId::new(*record),
        })
    }
}

impl fmt::Display for RecordImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain_id, self.record_id)
    }
}
