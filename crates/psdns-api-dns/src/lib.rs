// # PlusServer DNS Entity API
//
// Typed domain and record operations for the `dnsEntityService` API family.
//
// Every operation is a single call through the authenticated executor in
// `psdns-core`: marshal the named request struct, execute, unmarshal the
// named response struct, convert into the core model.
//
// - ❌ NO reconciliation (owned by SyncEngine)
// - ❌ NO retry logic (the caller decides)
// - ❌ NO caching
//
// ## API Reference
//
// - Search domains: POST `dnsDomains/search`
// - Domain: GET / PUT / DELETE `dnsDomains/{id}`, POST `dnsDomains`
// - List records: GET `dnsDomains/{id}/dnsResourceRecords`
// - Create records: POST `dnsResourceRecords`
// - Record: PUT / DELETE `dnsResourceRecords/{domainId}/{recordId}`

pub mod domain;
pub mod record;

use async_trait::async_trait;
use psdns_core::client::Client;
use psdns_core::config::ApiConfig;
use psdns_core::model::{
    Domain, DomainId, DomainPatch, DomainSpec, Record, RecordId, RecordSpec, RecordUpdate,
};
use psdns_core::traits::DnsApi;
use psdns_core::{Error, Result};
use reqwest::Method;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use tokio_util::sync::CancellationToken;

/// API family segment of the entity gateway
pub const API_SEGMENT: &str = "dnsEntityService";

/// Client for the DNS entity API
#[derive(Debug, Clone)]
pub struct DnsClient {
    client: Client,
}

impl DnsClient {
    /// Wrap an executor bound to [`API_SEGMENT`]
    pub fn new(client: Client) -> Result<Self> {
        if client.api_segment() != API_SEGMENT {
            return Err(Error::config(format!(
                "DNS client requires the '{}' API segment, got '{}'",
                API_SEGMENT,
                client.api_segment()
            )));
        }
        Ok(Self { client })
    }

    /// Authenticate with `config` and build a client
    ///
    /// # Errors
    ///
    /// Configuration errors, [`Error::Auth`] and [`Error::Cancelled`].
    pub async fn connect(config: &ApiConfig, cancel: &CancellationToken) -> Result<Self> {
        let client = Client::connect(config, API_SEGMENT, cancel).await?;
        tracing::debug!("DNS client ready at {}", client.url(""));
        Ok(Self { client })
    }

    /// The underlying executor
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Execute a call whose response body only acknowledges the request
    async fn acknowledge<B>(
        &self,
        method: Method,
        path: &str,
        request: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        B: serde::Serialize + ?Sized,
    {
        let _: IgnoredAny = self.client.call(method, path, request, cancel).await?;
        Ok(())
    }
}

#[async_trait]
impl DnsApi for DnsClient {
    /// # API Call
    ///
    /// ```http
    /// POST dnsDomains/search
    /// {"dnsDomainSearchList":[{"nameList":["example.com"]}]}
    /// ```
    async fn search_domains(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<Domain>> {
        tracing::debug!("Searching domains by name: {}", name);
        let request = domain::SearchRequest::by_name(name);
        let response: domain::SearchResponse = self
            .client
            .call(Method::POST, "dnsDomains/search", Some(&request), cancel)
            .await?;

        Ok(response
            .dns_domain_list
            .into_iter()
            .map(Domain::from)
            .collect())
    }

    async fn get_domain(&self, id: DomainId, cancel: &CancellationToken) -> Result<Domain> {
        let response: domain::DomainResponse = self
            .client
            .call::<(), _>(Method::GET, &format!("dnsDomains/{}", id), None, cancel)
            .await?;
        Ok(response.dns_domain.into())
    }

    async fn create_domain(&self, spec: &DomainSpec, cancel: &CancellationToken) -> Result<Domain> {
        let request = domain::CreateRequest::from(spec);
        let response: domain::DomainResponse = self
            .client
            .call(Method::POST, "dnsDomains", Some(&request), cancel)
            .await?;
        Ok(response.dns_domain.into())
    }

    async fn update_domain(
        &self,
        id: DomainId,
        patch: &DomainPatch,
        cancel: &CancellationToken,
    ) -> Result<Domain> {
        let request = domain::UpdateRequest::from(patch);
        let response: domain::DomainResponse = self
            .client
            .call(Method::PUT, &format!("dnsDomains/{}", id), Some(&request), cancel)
            .await?;
        Ok(response.dns_domain.into())
    }

    async fn delete_domain(&self, id: DomainId, cancel: &CancellationToken) -> Result<()> {
        self.acknowledge::<()>(Method::DELETE, &format!("dnsDomains/{}", id), None, cancel)
            .await
    }

    /// # API Call
    ///
    /// ```http
    /// GET dnsDomains/{id}/dnsResourceRecords
    /// ```
    async fn list_records(&self, domain_id: DomainId, cancel: &CancellationToken) -> Result<Vec<Record>> {
        let response: record::RecordListResponse = self
            .client
            .call::<(), _>(
                Method::GET,
                &format!("dnsDomains/{}/dnsResourceRecords", domain_id),
                None,
                cancel,
            )
            .await?;

        let records: Vec<Record> = response
            .dns_resource_record_list
            .into_iter()
            .map(Record::from)
            .collect();
        tracing::debug!("Domain {} lists {} record(s)", domain_id, records.len());
        Ok(records)
    }

    /// # API Call
    ///
    /// ```http
    /// POST dnsResourceRecords
    /// {"dnsResourceRecordList":[{"content":"1.2.3.4","dnsDomainId":42,"type":"A","name":"www","ttl":300}]}
    /// ```
    ///
    /// The response may echo the records without identifiers, so only its
    /// JSON well-formedness is checked.
    async fn create_records(&self, specs: &[RecordSpec], cancel: &CancellationToken) -> Result<()> {
        let request = record::CreateRequest::from(specs);
        self.acknowledge(Method::POST, "dnsResourceRecords", Some(&request), cancel)
            .await
    }

    async fn update_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        update: &RecordUpdate,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = record::UpdateRequest::from(update);
        self.acknowledge(
            Method::PUT,
            &format!("dnsResourceRecords/{}/{}", domain_id, record_id),
            Some(&request),
            cancel,
        )
        .await
    }

    async fn delete_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.acknowledge::<()>(
            Method::DELETE,
            &format!("dnsResourceRecords/{}/{}", domain_id, record_id),
            None,
            cancel,
        )
        .await
    }

    fn api_name(&self) -> &'static str {
        API_SEGMENT
    }
}

/// Deserialize `null` as the type's default value
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
