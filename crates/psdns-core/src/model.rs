//! Domain model shared by the typed operations and the orchestrator

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Nameserver pair assigned to new domains unless another is requested
pub const DEFAULT_NAMESERVER_PAIR: &str = "ns1.plusserver.com";

/// TTL of new records unless another is requested (seconds)
pub const DEFAULT_TTL: u32 = 300;

/// Server-assigned numeric domain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub u64);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DomainId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(DomainId)
            .map_err(|_| Error::invalid_input(format!("domain id must be numeric, got '{}'", s)))
    }
}

impl From<u64> for DomainId {
    fn from(id: u64) -> Self {
        DomainId(id)
    }
}

/// Server-assigned opaque record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a record identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// DNS resource record type
///
/// Types outside the known set survive a listing as [`RecordType::Other`];
/// [`FromStr`] only accepts the known set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    #[default]
    A,
    Aaaa,
    Caa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Srv,
    Txt,
    Soa,
    /// A type this client does not know about
    Other(String),
}

impl RecordType {
    /// Every type accepted as input
    pub const KNOWN: [RecordType; 10] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Caa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Ptr,
        RecordType::Srv,
        RecordType::Txt,
        RecordType::Soa,
    ];

    /// Wire name of the type
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
            RecordType::Soa => "SOA",
            RecordType::Other(other) => other,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RecordType {
    fn from(value: String) -> Self {
        RecordType::KNOWN
            .into_iter()
            .find(|known| known.as_str() == value)
            .unwrap_or(RecordType::Other(value))
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match RecordType::from(s.to_string()) {
            RecordType::Other(other) => Err(Error::invalid_input(format!(
                "record type '{}' is not supported. Supported types: A, AAAA, CAA, CNAME, MX, NS, PTR, SRV, TXT, SOA",
                other
            ))),
            known => Ok(known),
        }
    }
}

/// Domain replication mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReplicationType {
    Master,
    Slave,
    Native,
    None,
    /// A mode this client does not know about
    Other(String),
}

impl ReplicationType {
    /// Wire name of the mode
    pub fn as_str(&self) -> &str {
        match self {
            ReplicationType::Master => "Master",
            ReplicationType::Slave => "Slave",
            ReplicationType::Native => "Native",
            ReplicationType::None => "None",
            ReplicationType::Other(other) => other,
        }
    }
}

impl fmt::Display for ReplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ReplicationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Master" => ReplicationType::Master,
            "Slave" => ReplicationType::Slave,
            "Native" => ReplicationType::Native,
            "None" => ReplicationType::None,
            _ => ReplicationType::Other(value),
        }
    }
}

impl From<ReplicationType> for String {
    fn from(value: ReplicationType) -> Self {
        value.as_str().to_string()
    }
}

impl FromStr for ReplicationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match ReplicationType::from(s.to_string()) {
            ReplicationType::Other(other) => Err(Error::invalid_input(format!(
                "replication type '{}' is not supported. Can be either Master, Slave, Native or None",
                other
            ))),
            known => Ok(known),
        }
    }
}

/// A DNS domain as the server reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Server-assigned identifier
    pub id: DomainId,
    /// Name in unicode
    pub unicode_name: String,
    /// Name in ASCII (punycode)
    pub name: String,
    /// Protection against accidental deletion
    pub protected: bool,
    /// Replication mode
    pub replication_type: ReplicationType,
    /// Replication peers
    pub replication_master_ips: Vec<String>,
    /// Nameserver pair
    pub nameserver_pair_name: String,
    /// Company metadata
    pub company_id: String,
    /// Contract metadata
    pub contract_id: String,
    /// Creation time, when reported
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for domain creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSpec {
    pub unicode_name: String,
    #[serde(default)]
    pub company_id: String,
    #[serde(default = "default_nameserver_pair")]
    pub nameserver_pair_name: String,
    #[serde(default)]
    pub protected: bool,
    pub replication_type: ReplicationType,
    pub replication_master_ips: Vec<String>,
    #[serde(default)]
    pub contract_id: String,
}

impl DomainSpec {
    /// Create a spec with default nameserver pair, unprotected and without
    /// metadata
    pub fn new(unicode_name: impl Into<String>, replication_type: ReplicationType) -> Self {
        Self {
            unicode_name: unicode_name.into(),
            company_id: String::new(),
            nameserver_pair_name: default_nameserver_pair(),
            protected: false,
            replication_type,
            replication_master_ips: Vec::new(),
            contract_id: String::new(),
        }
    }

    /// Check required fields before submission
    pub fn validate(&self) -> Result<(), Error> {
        if self.unicode_name.trim().is_empty() {
            return Err(Error::invalid_input("domain name cannot be empty"));
        }
        if let ReplicationType::Other(ref other) = self.replication_type {
            return Err(Error::invalid_input(format!(
                "replication type '{}' is not supported. Can be either Master, Slave, Native or None",
                other
            )));
        }
        Ok(())
    }
}

/// Partial domain update
///
/// Only replication peers, protection and metadata can change after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainPatch {
    pub replication_master_ips: Vec<String>,
    pub protected: bool,
    pub company_id: String,
    pub contract_id: String,
}

impl From<&Domain> for DomainPatch {
    fn from(domain: &Domain) -> Self {
        Self {
            replication_master_ips: domain.replication_master_ips.clone(),
            protected: domain.protected,
            company_id: domain.company_id.clone(),
            contract_id: domain.contract_id.clone(),
        }
    }
}

/// A resource record as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub domain_id: DomainId,
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub content: String,
}

impl Record {
    /// Natural key of the record
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.name.clone(), self.content.clone())
    }
}

/// Input for record creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSpec {
    pub domain_id: DomainId,
    /// Name without the domain part
    pub name: String,
    #[serde(default)]
    pub record_type: RecordType,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    pub content: String,
}

impl RecordSpec {
    /// Create an `A` record spec with the default TTL
    pub fn new(domain_id: DomainId, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            domain_id,
            name: name.into(),
            record_type: RecordType::default(),
            ttl: DEFAULT_TTL,
            content: content.into(),
        }
    }

    /// Set the record type
    pub fn with_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Natural key the record will be reconciled by
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.name.clone(), self.content.clone())
    }

    /// Check required fields before submission
    pub fn validate(&self) -> Result<(), Error> {
        if self.content.is_empty() {
            return Err(Error::invalid_input("record content cannot be empty"));
        }
        if let RecordType::Other(ref other) = self.record_type {
            return Err(Error::invalid_input(format!(
                "record type '{}' is not supported",
                other
            )));
        }
        Ok(())
    }
}

/// Mutable part of a record: content and TTL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub content: String,
    pub ttl: u32,
}

/// Client-known correlator of a record before its identifier is known
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub name: String,
    pub content: String,
}

impl NaturalKey {
    /// Create a natural key
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Whether `record` carries this key
    pub fn matches(&self, record: &Record) -> bool {
        record.name == self.name && record.content == self.content
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name={} content={}", self.name, self.content)
    }
}

/// Deserialize an optional timestamp that the server may send as `null` or
/// `""`
///
/// Besides RFC 3339 the gateway's Java-style layouts are accepted
/// (`2021-03-04T05:06:07.000+0000`, and zone-less values taken as UTC).
/// Anything else is treated as absent rather than failing the whole
/// response.
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            let parsed = parse_timestamp(value);
            if parsed.is_none() {
                tracing::debug!("Ignoring unrecognized timestamp '{}'", value);
            }
            Ok(parsed)
        }
    }
}

/// Parse a server timestamp in any of the layouts the gateway emits
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    const ZONED: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
    const NAIVE: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(parsed) = ZONED
        .iter()
        .find_map(|layout| DateTime::parse_from_str(value, layout).ok())
    {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .map(|naive| naive.and_utc())
}

fn default_nameserver_pair() -> String {
    DEFAULT_NAMESERVER_PAIR.to_string()
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}
