// # DNS API Trait
//
// Defines the typed operation set the orchestrator drives.
//
// ## Implementations
//
// - PlusServer DNS entity service: `psdns-api-dns` crate
//
// ## Usage
//
// ```rust,ignore
// use psdns_core::traits::DnsApi;
// use tokio_util::sync::CancellationToken;
//
// async fn show(api: &dyn DnsApi) -> psdns_core::Result<()> {
//     let cancel = CancellationToken::new();
//     for domain in api.search_domains("example.com", &cancel).await? {
//         println!("{} {}", domain.id, domain.name);
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::model::{Domain, DomainId, DomainPatch, DomainSpec, Record, RecordId, RecordSpec, RecordUpdate};

/// Typed domain and record operations
///
/// Each method is a single API call: marshal the typed request, execute it,
/// unmarshal the typed response. Implementations never reconcile, retry or
/// cache; sequencing belongs to [`crate::SyncEngine`].
///
/// # Thread Safety
///
/// Implementations must be usable concurrently from many tasks.
///
/// # Cancellation
///
/// Every method takes a token; once it fires the in-flight call is aborted
/// and the method returns [`crate::Error::Cancelled`].
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// Search domains by name. May return zero, one or many matches.
    async fn search_domains(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Domain>, crate::Error>;

    /// Get a domain by identifier
    async fn get_domain(
        &self,
        id: DomainId,
        cancel: &CancellationToken,
    ) -> Result<Domain, crate::Error>;

    /// Create a domain. The response carries the assigned identifier.
    async fn create_domain(
        &self,
        spec: &DomainSpec,
        cancel: &CancellationToken,
    ) -> Result<Domain, crate::Error>;

    /// Update the mutable part of a domain
    async fn update_domain(
        &self,
        id: DomainId,
        patch: &DomainPatch,
        cancel: &CancellationToken,
    ) -> Result<Domain, crate::Error>;

    /// Delete a domain
    async fn delete_domain(
        &self,
        id: DomainId,
        cancel: &CancellationToken,
    ) -> Result<(), crate::Error>;

    /// List every record of a domain, in server order
    async fn list_records(
        &self,
        domain_id: DomainId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, crate::Error>;

    /// Create one or more records in a single call
    ///
    /// Reports success without a payload: the server does not reliably
    /// return identifiers here, so they are recovered by reconciliation.
    async fn create_records(
        &self,
        specs: &[RecordSpec],
        cancel: &CancellationToken,
    ) -> Result<(), crate::Error>;

    /// Change a record's content and TTL
    ///
    /// The server may rotate the identifier; reconcile afterwards.
    async fn update_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        update: &RecordUpdate,
        cancel: &CancellationToken,
    ) -> Result<(), crate::Error>;

    /// Delete a record
    async fn delete_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        cancel: &CancellationToken,
    ) -> Result<(), crate::Error>;

    /// Name of the API family (for logging)
    fn api_name(&self) -> &'static str;
}
