//! Synchronization orchestrator
//!
//! The record API does not hand back identifiers on mutation, so every
//! record write is followed by a listing and a reconciliation:
//!
//! ```text
//!            ┌────────┐  ack   ┌───────────┐  resolved  ┌───────┐
//! request ──▶│ Submit │───────▶│ Reconcile │───────────▶│ Bound │
//!            └────────┘        └───────────┘            └───────┘
//!                                    │ not found / failed
//!                                    ▼
//!                             ┌───────────────┐
//!                             │ UnboundFailed │
//!                             └───────────────┘
//! ```
//!
//! `UnboundFailed` means the write was acknowledged but the record could not
//! be located afterwards. It exists server-side yet is untracked; this is
//! returned as a hard error and never healed automatically.
//!
//! Domain writes return their identifier directly and go straight from
//! `Submit` to `Bound`. Record deletes use the tracked identifier and need
//! no reconciliation.
//!
//! Every phase transition is traced and emitted as a [`SyncEvent`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result, SelectionError};
use crate::import::RecordImportId;
use crate::model::{
    Domain, DomainId, DomainPatch, DomainSpec, NaturalKey, Record, RecordId, RecordSpec,
    RecordUpdate,
};
use crate::reconcile;
use crate::traits::DnsApi;

/// Default capacity of the event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Logical operation driven by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    CreateRecord,
    UpdateRecord,
    DeleteRecord,
    ReadRecord,
    ImportRecord,
    CreateDomain,
    UpdateDomain,
    ReadDomain,
    DeleteDomain,
    SelectDomain,
}

/// Phase of a logical operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// The mutating call is in flight
    Submit,
    /// Listing and resolving the record set
    Reconcile,
    /// Identifier known
    Bound,
    /// Write acknowledged but the record could not be located
    UnboundFailed,
}

/// Events emitted by the [`SyncEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// An operation entered a phase
    PhaseChanged {
        operation: SyncOperation,
        domain_id: Option<DomainId>,
        phase: SyncPhase,
    },

    /// Several records share a natural key; the first one was used
    DuplicateNaturalKey {
        domain_id: DomainId,
        key: NaturalKey,
        chosen: RecordId,
        duplicates: Vec<RecordId>,
    },

    /// A record exists server-side but is no longer tracked
    Unbound {
        operation: SyncOperation,
        domain_id: DomainId,
        key: NaturalKey,
        error: String,
    },
}

/// Orchestrates typed operations and identity reconciliation
///
/// The engine holds no per-entity state; one instance can serve many
/// concurrent operations on independent entities. Within one operation the
/// reconciling listing is only issued after the write was acknowledged.
pub struct SyncEngine {
    api: Arc<dyn DnsApi>,
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create an engine with the default event channel capacity
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver). Dropping the receiver is fine;
    /// events are then discarded.
    pub fn new(api: Arc<dyn DnsApi>) -> (Self, mpsc::Receiver<SyncEvent>) {
        Self::with_event_capacity(api, DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    /// Create an engine whose event channel holds `capacity` events
    pub fn with_event_capacity(
        api: Arc<dyn DnsApi>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (event_tx, event_rx) = mpsc::channel(capacity.max(1));
        (Self { api, event_tx }, event_rx)
    }

    /// The typed operation set this engine drives
    pub fn api(&self) -> &Arc<dyn DnsApi> {
        &self.api
    }

    /// Create a record and recover its identifier
    ///
    /// `Submit` → `Reconcile` → `Bound`. Returns the record as listed,
    /// identifier included.
    ///
    /// # Errors
    ///
    /// Validation errors before anything is sent, the typed operation's
    /// errors during `Submit`, and [`Error::RecordNotFound`] (or the
    /// listing's error) when reconciliation fails.
    pub async fn create_record(&self, spec: &RecordSpec, cancel: &CancellationToken) -> Result<Record> {
        let mut records = self
            .create_records(std::slice::from_ref(spec), cancel)
            .await?;
        records
            .pop()
            .ok_or_else(|| Error::record_not_found(spec.natural_key().to_string()))
    }

    /// Create several records in one call and recover every identifier
    ///
    /// Each affected domain is listed once. Records are returned in the
    /// order of `specs`. Specs sharing a natural key are bound to distinct
    /// listed records in listing order; a listed record is bound at most
    /// once per batch.
    pub async fn create_records(
        &self,
        specs: &[RecordSpec],
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }
        for spec in specs {
            spec.validate()?;
        }

        let operation = SyncOperation::CreateRecord;
        for spec in specs {
            self.enter(operation, Some(spec.domain_id), SyncPhase::Submit);
        }
        match self.api.create_records(specs, cancel).await {
            Ok(()) => {}
            // A 200 with an unexpected body still means the write happened
            Err(Error::Decode { path, source }) => {
                warn!(
                    "Create response from {} at {} could not be decoded ({}); reconciling anyway",
                    self.api.api_name(),
                    path,
                    source
                );
            }
            Err(e) => return Err(e),
        }
        debug!(
            "{} acknowledged create of {} record(s)",
            self.api.api_name(),
            specs.len()
        );

        let mut listings: HashMap<DomainId, Vec<Record>> = HashMap::new();
        let mut claimed: HashSet<(DomainId, RecordId)> = HashSet::new();
        let mut bound = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let key = spec.natural_key();
            self.enter(operation, Some(spec.domain_id), SyncPhase::Reconcile);

            if !listings.contains_key(&spec.domain_id) {
                let listed = self.api.list_records(spec.domain_id, cancel).await;
                let listed = self.unbound_on_error(operation, spec.domain_id, &key, listed)?;
                listings.insert(spec.domain_id, listed);
            }
            let available: Vec<Record> = listings
                .get(&spec.domain_id)
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .filter(|record| !claimed.contains(&(spec.domain_id, record.id.clone())))
                .cloned()
                .collect();
            let siblings = specs[index + 1..]
                .iter()
                .filter(|other| other.domain_id == spec.domain_id && other.natural_key() == key)
                .count();

            let record =
                self.bind_expecting(operation, spec.domain_id, &key, &available, siblings)?;
            claimed.insert((spec.domain_id, record.id.clone()));
            info!(
                "Created record {} in domain {} -> {}",
                key, spec.domain_id, record.id
            );
            bound.push(record);
        }

        Ok(bound)
    }

    /// Update a record's content and TTL and recover its (possibly rotated)
    /// identifier
    ///
    /// Reconciliation matches the **new** content. A listing that still
    /// shows the old content fails with [`Error::RecordNotFound`].
    pub async fn update_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        name: &str,
        update: &RecordUpdate,
        cancel: &CancellationToken,
    ) -> Result<Record> {
        if update.content.is_empty() {
            return Err(Error::invalid_input("record content cannot be empty"));
        }

        let operation = SyncOperation::UpdateRecord;
        let key = NaturalKey::new(name, update.content.clone());

        self.enter(operation, Some(domain_id), SyncPhase::Submit);
        self.api
            .update_record(domain_id, record_id, update, cancel)
            .await?;
        debug!("Update of record {} in domain {} acknowledged", record_id, domain_id);

        self.enter(operation, Some(domain_id), SyncPhase::Reconcile);
        let listed = self.api.list_records(domain_id, cancel).await;
        let records = self.unbound_on_error(operation, domain_id, &key, listed)?;
        let record = self.bind(operation, domain_id, &key, &records)?;

        if &record.id != record_id {
            info!(
                "Record {} in domain {} was re-identified as {}",
                record_id, domain_id, record.id
            );
        }
        info!("Updated record {} in domain {}", key, domain_id);
        Ok(record)
    }

    /// Delete a record by its tracked identifier
    pub async fn delete_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.enter(SyncOperation::DeleteRecord, Some(domain_id), SyncPhase::Submit);
        self.api.delete_record(domain_id, record_id, cancel).await?;
        info!("Deleted record {} in domain {}", record_id, domain_id);
        Ok(())
    }

    /// Locate a tracked record by natural key
    ///
    /// # Errors
    ///
    /// [`Error::RecordNotFound`] when the record disappeared or drifted.
    pub async fn read_record(
        &self,
        domain_id: DomainId,
        key: &NaturalKey,
        cancel: &CancellationToken,
    ) -> Result<Record> {
        let operation = SyncOperation::ReadRecord;
        self.enter(operation, Some(domain_id), SyncPhase::Reconcile);
        let records = self.api.list_records(domain_id, cancel).await?;
        let resolution = reconcile::resolve(key, &records)?;
        self.report_duplicates(domain_id, key, &resolution);
        self.enter(operation, Some(domain_id), SyncPhase::Bound);
        Ok(resolution.record.clone())
    }

    /// Bring an existing record under management from `domainId:recordId`
    ///
    /// The identifier is parsed before any call is made.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidImportId`] for malformed input, and
    /// [`Error::RecordNotFound`] when the domain has no such record.
    pub async fn import_record(&self, import_id: &str, cancel: &CancellationToken) -> Result<Record> {
        let RecordImportId {
            domain_id,
            record_id,
        } = import_id.parse()?;

        let operation = SyncOperation::ImportRecord;
        self.enter(operation, Some(domain_id), SyncPhase::Reconcile);
        let records = self.api.list_records(domain_id, cancel).await?;
        let record = reconcile::find_by_id(&record_id, &records)?.clone();
        self.enter(operation, Some(domain_id), SyncPhase::Bound);
        info!("Imported record {} ({})", import_id, record.natural_key());
        Ok(record)
    }

    /// Create a domain
    pub async fn create_domain(&self, spec: &DomainSpec, cancel: &CancellationToken) -> Result<Domain> {
        spec.validate()?;

        let operation = SyncOperation::CreateDomain;
        self.enter(operation, None, SyncPhase::Submit);
        let domain = self.api.create_domain(spec, cancel).await?;
        self.enter(operation, Some(domain.id), SyncPhase::Bound);
        info!("Created domain {} -> {}", spec.unicode_name, domain.id);
        Ok(domain)
    }

    /// Update the mutable part of a domain
    pub async fn update_domain(
        &self,
        id: DomainId,
        patch: &DomainPatch,
        cancel: &CancellationToken,
    ) -> Result<Domain> {
        let operation = SyncOperation::UpdateDomain;
        self.enter(operation, Some(id), SyncPhase::Submit);
        let domain = self.api.update_domain(id, patch, cancel).await?;
        self.enter(operation, Some(domain.id), SyncPhase::Bound);
        info!("Updated domain {}", domain.id);
        Ok(domain)
    }

    /// Read a domain by identifier
    pub async fn read_domain(&self, id: DomainId, cancel: &CancellationToken) -> Result<Domain> {
        let domain = self.api.get_domain(id, cancel).await?;
        self.enter(SyncOperation::ReadDomain, Some(domain.id), SyncPhase::Bound);
        Ok(domain)
    }

    /// Delete a domain
    pub async fn delete_domain(&self, id: DomainId, cancel: &CancellationToken) -> Result<()> {
        self.enter(SyncOperation::DeleteDomain, Some(id), SyncPhase::Submit);
        self.api.delete_domain(id, cancel).await?;
        info!("Deleted domain {}", id);
        Ok(())
    }

    /// Resolve a human-provided domain name to exactly one domain
    ///
    /// # Errors
    ///
    /// [`SelectionError::Empty`] for zero matches and
    /// [`SelectionError::Ambiguous`] for more than one; there is no further
    /// signal to disambiguate with.
    pub async fn select_domain(&self, name: &str, cancel: &CancellationToken) -> Result<Domain> {
        let operation = SyncOperation::SelectDomain;
        self.enter(operation, None, SyncPhase::Reconcile);

        let mut domains = self.api.search_domains(name, cancel).await?;
        debug!("Domain search for {} returned {} match(es)", name, domains.len());

        match domains.len() {
            0 => Err(SelectionError::Empty {
                name: name.to_string(),
            }
            .into()),
            1 => {
                let domain = domains.remove(0);
                self.enter(operation, Some(domain.id), SyncPhase::Bound);
                Ok(domain)
            }
            count => Err(SelectionError::Ambiguous {
                name: name.to_string(),
                count,
            }
            .into()),
        }
    }

    /// Resolve `key` in `records` and finish the operation as `Bound` or
    /// `UnboundFailed`
    fn bind(
        &self,
        operation: SyncOperation,
        domain_id: DomainId,
        key: &NaturalKey,
        records: &[Record],
    ) -> Result<Record> {
        self.bind_expecting(operation, domain_id, key, records, 0)
    }

    /// Like [`Self::bind`], with `siblings` further matches expected because
    /// later specs in the same batch carry the same key
    fn bind_expecting(
        &self,
        operation: SyncOperation,
        domain_id: DomainId,
        key: &NaturalKey,
        records: &[Record],
        siblings: usize,
    ) -> Result<Record> {
        let resolved = reconcile::resolve(key, records);
        let resolution = self.unbound_on_error(operation, domain_id, key, resolved)?;
        if resolution.duplicates.len() > siblings {
            self.report_duplicates(domain_id, key, &resolution);
        }
        self.enter(operation, Some(domain_id), SyncPhase::Bound);
        Ok(resolution.record.clone())
    }

    /// Mark the operation `UnboundFailed` if `result` is an error
    ///
    /// Only used after the write was acknowledged: from then on any failure
    /// leaves an untracked record behind.
    fn unbound_on_error<T>(
        &self,
        operation: SyncOperation,
        domain_id: DomainId,
        key: &NaturalKey,
        result: Result<T>,
    ) -> Result<T> {
        result.map_err(|e| {
            error!(
                "Record ({}) in domain {} was written but could not be located: {}. \
                 It exists server-side and is no longer tracked",
                key, domain_id, e
            );
            self.enter(operation, Some(domain_id), SyncPhase::UnboundFailed);
            self.emit_event(SyncEvent::Unbound {
                operation,
                domain_id,
                key: key.clone(),
                error: e.to_string(),
            });
            e
        })
    }

    fn report_duplicates(
        &self,
        domain_id: DomainId,
        key: &NaturalKey,
        resolution: &reconcile::Resolution<'_>,
    ) {
        if resolution.is_ambiguous() {
            warn!(
                "Natural key ({}) matches {} records in domain {}; using {} and ignoring {:?}",
                key,
                resolution.duplicates.len() + 1,
                domain_id,
                resolution.id(),
                resolution.duplicates
            );
            self.emit_event(SyncEvent::DuplicateNaturalKey {
                domain_id,
                key: key.clone(),
                chosen: resolution.id().clone(),
                duplicates: resolution.duplicates.clone(),
            });
        }
    }

    fn enter(&self, operation: SyncOperation, domain_id: Option<DomainId>, phase: SyncPhase) {
        debug!(?operation, ?domain_id, ?phase, "Sync phase");
        self.emit_event(SyncEvent::PhaseChanged {
            operation,
            domain_id,
            phase,
        });
    }

    /// Emit an event without blocking
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing the event channel capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, discarding event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_event_equality() {
        let event = SyncEvent::PhaseChanged {
            operation: SyncOperation::CreateRecord,
            domain_id: Some(DomainId(42)),
            phase: SyncPhase::Submit,
        };
        assert_eq!(event.clone(), event);
    }
}
