//! Test doubles and common utilities for contract tests
//!
//! `MockDnsApi` is an in-memory record store behind the `DnsApi` trait. Its
//! knobs reproduce the server behaviors the orchestrator has to survive:
//! acknowledged-but-not-applied writes, identifier rotation, failing
//! listings and undecodable create responses. The token helpers mount an OAuth2 endpoint on a wiremock server.

#![allow(dead_code)]

use std::sync::Mutex;

use psdns_core::config::{ApiConfig, Credentials, SessionSettings};
use psdns_core::error::{Error, Result};
use psdns_core::model::{
    Domain, DomainId, DomainPatch, DomainSpec, Record, RecordId, RecordSpec, RecordType,
    RecordUpdate, ReplicationType,
};
use psdns_core::traits::DnsApi;
use psdns_core::sync::SyncEvent;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A call received by [`MockDnsApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SearchDomains(String),
    GetDomain(DomainId),
    CreateDomain(String),
    UpdateDomain(DomainId),
    DeleteDomain(DomainId),
    ListRecords(DomainId),
    CreateRecords(usize),
    UpdateRecord(DomainId, RecordId),
    DeleteRecord(DomainId, RecordId),
}

#[derive(Default)]
struct MockState {
    domains: Vec<Domain>,
    records: Vec<Record>,
    next_record: usize,
    next_domain: u64,
    /// Acknowledge record writes without applying them
    drop_writes: bool,
    /// Assign a new identifier on every record update
    rotate_ids: bool,
    /// Fail every listing with a 500
    fail_listing: bool,
    /// Apply record creates but answer with a body that cannot be decoded
    garble_create_response: bool,
}

/// An in-memory `DnsApi` that records every call
#[derive(Default)]
pub struct MockDnsApi {
    state: Mutex<MockState>,
    calls: Mutex<Vec<Call>>,
}

impl MockDnsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a domain
    pub fn with_domain(self, domain: Domain) -> Self {
        self.state.lock().unwrap().domains.push(domain);
        self
    }

    /// Seed a record
    pub fn with_record(self, record: Record) -> Self {
        self.state.lock().unwrap().records.push(record);
        self
    }

    /// Acknowledge record creates and updates without applying them
    pub fn dropping_writes(self) -> Self {
        self.state.lock().unwrap().drop_writes = true;
        self
    }

    /// Rotate record identifiers on update
    pub fn rotating_ids(self) -> Self {
        self.state.lock().unwrap().rotate_ids = true;
        self
    }

    /// Fail every record listing
    pub fn failing_listing(self) -> Self {
        self.state.lock().unwrap().fail_listing = true;
        self
    }

    /// Apply record creates, then fail them with a decode error
    pub fn garbling_create_response(self) -> Self {
        self.state.lock().unwrap().garble_create_response = true;
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Records currently stored for `domain_id`
    pub fn records(&self, domain_id: DomainId) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|record| record.domain_id == domain_id)
            .cloned()
            .collect()
    }

    fn record_call(&self, call: Call, cancel: &CancellationToken) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn next_record_id(state: &mut MockState) -> RecordId {
        state.next_record += 1;
        RecordId::new(format!("r{}", state.next_record))
    }
}

#[async_trait::async_trait]
impl DnsApi for MockDnsApi {
    async fn search_domains(&self, name: &str, cancel: &CancellationToken) -> Result<Vec<Domain>> {
        self.record_call(Call::SearchDomains(name.to_string()), cancel)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .domains
            .iter()
            .filter(|domain| domain.name == name || domain.unicode_name == name)
            .cloned()
            .collect())
    }

    async fn get_domain(&self, id: DomainId, cancel: &CancellationToken) -> Result<Domain> {
        self.record_call(Call::GetDomain(id), cancel)?;
        let state = self.state.lock().unwrap();
        state
            .domains
            .iter()
            .find(|domain| domain.id == id)
            .cloned()
            .ok_or_else(|| Error::non_ok(404, format!("mock://dnsDomains/{}", id), None))
    }

    async fn create_domain(&self, spec: &DomainSpec, cancel: &CancellationToken) -> Result<Domain> {
        self.record_call(Call::CreateDomain(spec.unicode_name.clone()), cancel)?;
        let mut state = self.state.lock().unwrap();
        state.next_domain += 1;
        let created = Domain {
            id: DomainId(1000 + state.next_domain),
            unicode_name: spec.unicode_name.clone(),
            name: spec.unicode_name.clone(),
            protected: spec.protected,
            replication_type: spec.replication_type.clone(),
            replication_master_ips: spec.replication_master_ips.clone(),
            nameserver_pair_name: spec.nameserver_pair_name.clone(),
            company_id: spec.company_id.clone(),
            contract_id: spec.contract_id.clone(),
            created_at: None,
        };
        state.domains.push(created.clone());
        Ok(created)
    }

    async fn update_domain(
        &self,
        id: DomainId,
        patch: &DomainPatch,
        cancel: &CancellationToken,
    ) -> Result<Domain> {
        self.record_call(Call::UpdateDomain(id), cancel)?;
        let mut state = self.state.lock().unwrap();
        let domain = state
            .domains
            .iter_mut()
            .find(|domain| domain.id == id)
            .ok_or_else(|| Error::non_ok(404, format!("mock://dnsDomains/{}", id), None))?;
        domain.protected = patch.protected;
        domain.replication_master_ips = patch.replication_master_ips.clone();
        domain.company_id = patch.company_id.clone();
        domain.contract_id = patch.contract_id.clone();
        Ok(domain.clone())
    }

    async fn delete_domain(&self, id: DomainId, cancel: &CancellationToken) -> Result<()> {
        self.record_call(Call::DeleteDomain(id), cancel)?;
        let mut state = self.state.lock().unwrap();
        state.domains.retain(|domain| domain.id != id);
        state.records.retain(|record| record.domain_id != id);
        Ok(())
    }

    async fn list_records(&self, domain_id: DomainId, cancel: &CancellationToken) -> Result<Vec<Record>> {
        self.record_call(Call::ListRecords(domain_id), cancel)?;
        if self.state.lock().unwrap().fail_listing {
            return Err(Error::non_ok(
                500,
                format!("mock://dnsDomains/{}/dnsResourceRecords", domain_id),
                Some("internal error".to_string()),
            ));
        }
        Ok(self.records(domain_id))
    }

    async fn create_records(&self, specs: &[RecordSpec], cancel: &CancellationToken) -> Result<()> {
        self.record_call(Call::CreateRecords(specs.len()), cancel)?;
        let mut state = self.state.lock().unwrap();
        if state.drop_writes {
            return Ok(());
        }
        for spec in specs {
            let id = Self::next_record_id(&mut state);
            state.records.push(Record {
                id,
                domain_id: spec.domain_id,
                name: spec.name.clone(),
                record_type: spec.record_type.clone(),
                ttl: spec.ttl,
                content: spec.content.clone(),
            });
        }
        if state.garble_create_response {
            let source = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
            return Err(Error::decode("dnsResourceRecords", source));
        }
        Ok(())
    }

    async fn update_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        update: &RecordUpdate,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.record_call(Call::UpdateRecord(domain_id, record_id.clone()), cancel)?;
        let mut state = self.state.lock().unwrap();
        if state.drop_writes {
            return Ok(());
        }
        let rotated = if state.rotate_ids {
            Some(Self::next_record_id(&mut state))
        } else {
            None
        };
        let record = state
            .records
            .iter_mut()
            .find(|record| record.domain_id == domain_id && &record.id == record_id)
            .ok_or_else(|| {
                Error::non_ok(
                    404,
                    format!("mock://dnsResourceRecords/{}/{}", domain_id, record_id),
                    None,
                )
            })?;
        record.content = update.content.clone();
        record.ttl = update.ttl;
        if let Some(id) = rotated {
            record.id = id;
        }
        Ok(())
    }

    async fn delete_record(
        &self,
        domain_id: DomainId,
        record_id: &RecordId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.record_call(Call::DeleteRecord(domain_id, record_id.clone()), cancel)?;
        let mut state = self.state.lock().unwrap();
        state
            .records
            .retain(|record| !(record.domain_id == domain_id && &record.id == record_id));
        Ok(())
    }

    fn api_name(&self) -> &'static str {
        "mock"
    }
}

/// A domain with the given identifier and name
pub fn domain(id: u64, name: &str) -> Domain {
    Domain {
        id: DomainId(id),
        unicode_name: name.to_string(),
        name: name.to_string(),
        protected: false,
        replication_type: ReplicationType::None,
        replication_master_ips: Vec::new(),
        nameserver_pair_name: "ns1.plusserver.com".to_string(),
        company_id: String::new(),
        contract_id: String::new(),
        created_at: None,
    }
}

/// An `A` record
pub fn record(id: &str, domain_id: u64, name: &str, content: &str) -> Record {
    Record {
        id: RecordId::new(id),
        domain_id: DomainId(domain_id),
        name: name.to_string(),
        record_type: RecordType::A,
        ttl: 300,
        content: content.to_string(),
    }
}

/// Drain every event currently buffered in `rx`
pub fn drain_events(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Credentials pointing at `{server}/token`
pub fn credentials(server: &MockServer) -> Credentials {
    Credentials {
        client_id: "psdns-client".to_string(),
        client_secret: "client-secret".to_string(),
        username: "operator".to_string(),
        password: "hunter2".to_string(),
        token_url: format!("{}/token", server.uri()),
    }
}

/// Configuration whose token endpoint and API both live on `server`
pub fn config(server: &MockServer) -> ApiConfig {
    ApiConfig::new(credentials(server))
        .with_base_url(server.uri())
        .with_session(SessionSettings {
            token_timeout_secs: 5,
            request_timeout_secs: 5,
            refresh_threshold_secs: 10,
        })
}

/// Mount a token endpoint answering every password grant with
/// `access_token`
pub async fn mount_password_grant(server: &MockServer, access_token: &str, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
            "refresh_token": format!("{}-refresh", access_token),
        })))
        .mount(server)
        .await;
}
