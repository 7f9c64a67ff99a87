// # psdns-core
//
// Core library for the PlusServer DNS client.
//
// ## Architecture Overview
//
// - **Session**: OAuth2 password-grant session that keeps a bearer token fresh
// - **Client**: Authenticated request executor bound to one API family
// - **DnsApi**: Trait for the typed domain and record operations
// - **reconcile**: Recovers record identifiers by natural key after a write
// - **SyncEngine**: Orchestrates write → list → reconcile for every entity
//
// ## Design Principles
//
// 1. **Typed failures**: every error is a variant of `Error`, nothing is
//    logged and swallowed
// 2. **No hidden retries**: the executor sends each call once
// 3. **Cancellable**: every network operation takes a `CancellationToken`
// 4. **Library-First**: the binary is a thin shell over this crate

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod import;
pub mod model;
pub mod reconcile;
pub mod sync;
pub mod traits;

// Re-export core types for convenience
pub use auth::Session;
pub use client::Client;
pub use config::{ApiConfig, Credentials, SessionSettings};
pub use error::{Error, Result, SelectionError};
pub use import::RecordImportId;
pub use model::{
    Domain, DomainId, DomainPatch, DomainSpec, NaturalKey, Record, RecordId, RecordSpec,
    RecordType, RecordUpdate, ReplicationType,
};
pub use sync::{SyncEngine, SyncEvent, SyncOperation, SyncPhase};
pub use traits::DnsApi;
