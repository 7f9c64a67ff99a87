//! Resource record wire types

use psdns_core::model::{DomainId, Record, RecordId, RecordSpec, RecordType, RecordUpdate};
use serde::{Deserialize, Serialize};

use crate::null_as_default;

/// `GET dnsDomains/{id}/dnsResourceRecords` response, also returned by
/// `POST dnsResourceRecords`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) dns_resource_record_list: Vec<WireRecord>,
}

/// A record as the API serializes it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireRecord {
    dns_resource_record_id: String,
    dns_domain_id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    record_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    ttl: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    content: String,
}

impl From<WireRecord> for Record {
    fn from(wire: WireRecord) -> Self {
        Self {
            id: RecordId(wire.dns_resource_record_id),
            domain_id: DomainId(wire.dns_domain_id),
            name: wire.name,
            record_type: RecordType::from(wire.record_type),
            ttl: wire.ttl,
            content: wire.content,
        }
    }
}

/// `POST dnsResourceRecords` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRequest<'a> {
    dns_resource_record_list: Vec<NewRecord<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewRecord<'a> {
    content: &'a str,
    dns_domain_id: u64,
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    ttl: u32,
}

impl<'a> From<&'a [RecordSpec]> for CreateRequest<'a> {
    fn from(specs: &'a [RecordSpec]) -> Self {
        Self {
            dns_resource_record_list: specs
                .iter()
                .map(|spec| NewRecord {
                    content: &spec.content,
                    dns_domain_id: spec.domain_id.0,
                    record_type: spec.record_type.as_str(),
                    name: &spec.name,
                    ttl: spec.ttl,
                })
                .collect(),
        }
    }
}

/// `PUT dnsResourceRecords/{domainId}/{recordId}` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateRequest<'a> {
    dns_resource_record: RecordChanges<'a>,
}

#[derive(Debug, Serialize)]
struct RecordChanges<'a> {
    content: &'a str,
    ttl: u32,
}

impl<'a> From<&'a RecordUpdate> for UpdateRequest<'a> {
    fn from(update: &'a RecordUpdate) -> Self {
        Self {
            dns_resource_record: RecordChanges {
                content: &update.content,
                ttl: update.ttl,
            },
        }
    }
}
