//! Domain wire types
//!
//! The entity API wraps a single domain in `{"dnsDomain": {...}}` and a
//! search result in `{"dnsDomainList": [...]}`.

use chrono::{DateTime, Utc};
use psdns_core::model::{
    Domain, DomainId, DomainPatch, DomainSpec, ReplicationType, deserialize_optional_timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::null_as_default;

/// `POST dnsDomains/search` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchRequest<'a> {
    dns_domain_search_list: Vec<SearchCriteria<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchCriteria<'a> {
    name_list: Vec<&'a str>,
}

impl<'a> SearchRequest<'a> {
    pub(crate) fn by_name(name: &'a str) -> Self {
        Self {
            dns_domain_search_list: vec![SearchCriteria {
                name_list: vec![name],
            }],
        }
    }
}

/// `POST dnsDomains/search` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) dns_domain_list: Vec<WireDomain>,
}

/// Single-domain response of get, create and update
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DomainResponse {
    pub(crate) dns_domain: WireDomain,
}

/// A domain as the API serializes it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireDomain {
    dns_domain_id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    unicode_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    protected: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    replication_type: String,
    // The update response is loosely typed here
    #[serde(default, deserialize_with = "null_as_default")]
    replication_master_ip_address_list: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    dns_nameserver_pair_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    company_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    contract_id: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    create_date_time: Option<DateTime<Utc>>,
}

impl From<WireDomain> for Domain {
    fn from(wire: WireDomain) -> Self {
        let replication_master_ips = wire
            .replication_master_ip_address_list
            .into_iter()
            .map(|ip| match ip {
                Value::String(ip) => ip,
                other => other.to_string(),
            })
            .collect();

        Self {
            id: DomainId(wire.dns_domain_id),
            unicode_name: wire.unicode_name,
            name: wire.name,
            protected: wire.protected,
            replication_type: ReplicationType::from(wire.replication_type),
            replication_master_ips,
            nameserver_pair_name: wire.dns_nameserver_pair_name,
            company_id: wire.company_id,
            contract_id: wire.contract_id,
            created_at: wire.create_date_time,
        }
    }
}

/// `POST dnsDomains` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRequest<'a> {
    dns_domain: NewDomain<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewDomain<'a> {
    unicode_name: &'a str,
    company_id: &'a str,
    dns_nameserver_pair_name: &'a str,
    protected: bool,
    replication_type: &'a str,
    replication_master_ip_address_list: &'a [String],
    contract_id: &'a str,
}

impl<'a> From<&'a DomainSpec> for CreateRequest<'a> {
    fn from(spec: &'a DomainSpec) -> Self {
        Self {
            dns_domain: NewDomain {
                unicode_name: &spec.unicode_name,
                company_id: &spec.company_id,
                dns_nameserver_pair_name: &spec.nameserver_pair_name,
                protected: spec.protected,
                replication_type: spec.replication_type.as_str(),
                replication_master_ip_address_list: &spec.replication_master_ips,
                contract_id: &spec.contract_id,
            },
        }
    }
}

/// `PUT dnsDomains/{id}` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateRequest<'a> {
    dns_domain: DomainChanges<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DomainChanges<'a> {
    replication_master_ip_address_list: &'a [String],
    protected: bool,
    company_id: &'a str,
    contract_id: &'a str,
}

impl<'a> From<&'a DomainPatch> for UpdateRequest<'a> {
    fn from(patch: &'a DomainPatch) -> Self {
        Self {
            dns_domain: DomainChanges {
                replication_master_ip_address_list: &patch.replication_master_ips,
                protected: patch.protected,
                company_id: &patch.company_id,
                contract_id: &patch.contract_id,
            },
        }
    }
}
