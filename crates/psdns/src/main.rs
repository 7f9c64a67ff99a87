// # psdns - PlusServer DNS CLI
//
// A thin host over `psdns-core` and `psdns-api-dns`:
// 1. Reading configuration from environment variables
// 2. Parsing the command line
// 3. Authenticating and building the DNS client
// 4. Running one operation through the SyncEngine and printing the result
//
// No DNS or reconciliation logic lives here.
//
// ## Configuration
//
// ### Credentials
// - `PSDNS_CLIENT_ID`, `PSDNS_CLIENT_SECRET`: OAuth client
// - `PSDNS_USERNAME`, `PSDNS_PASSWORD`: resource owner
// - `PSDNS_TOKEN_URL`: token endpoint
//
// ### Endpoint
// - `PSDNS_API_ENV`: environment tag (default `test`, `prod` for production)
// - `PSDNS_BASE_URL`: explicit gateway URL, overrides `PSDNS_API_ENV`
//
// ### Timeouts
// - `PSDNS_TOKEN_TIMEOUT_SECS` (default 10)
// - `PSDNS_REQUEST_TIMEOUT_SECS` (default 30)
//
// ### Logging
// - `PSDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export PSDNS_CLIENT_ID=psdns
// export PSDNS_CLIENT_SECRET=...
// export PSDNS_USERNAME=operator
// export PSDNS_PASSWORD=...
// export PSDNS_TOKEN_URL=https://auth.example.net/token
//
// psdns domain search example.com
// psdns record create 42 --name www --content 1.2.3.4
// ```

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use psdns_api_dns::DnsClient;
use psdns_core::model::{
    DEFAULT_NAMESERVER_PAIR, DEFAULT_TTL, DomainId, DomainPatch, DomainSpec, NaturalKey, RecordId,
    RecordSpec, RecordType, RecordUpdate, ReplicationType,
};
use psdns_core::{ApiConfig, DnsApi, SyncEngine};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes
///
/// - 0: Success
/// - 1: Configuration or usage error
/// - 2: Runtime error (authentication, API, reconciliation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PsdnsExitCode {
    Success = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<PsdnsExitCode> for ExitCode {
    fn from(code: PsdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Manage PlusServer DNS domains and records
#[derive(Debug, Parser)]
#[command(name = "psdns", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Domain operations
    #[command(subcommand)]
    Domain(DomainCommand),
    /// Resource record operations
    #[command(subcommand)]
    Record(RecordCommand),
}

#[derive(Debug, Subcommand)]
enum DomainCommand {
    /// Find exactly one domain by name
    Search { name: String },
    /// Show a domain
    Get { id: DomainId },
    /// Create a domain
    Create(CreateDomainArgs),
    /// Change replication peers, protection or metadata of a domain
    Update(UpdateDomainArgs),
    /// Delete a domain
    Delete { id: DomainId },
}

#[derive(Debug, Args)]
struct CreateDomainArgs {
    /// Domain name (unicode)
    name: String,
    /// Master, Slave, Native or None
    #[arg(long, default_value = "None")]
    replication_type: ReplicationType,
    /// Replication master address (repeatable)
    #[arg(long = "master-ip", value_name = "IP")]
    master_ips: Vec<String>,
    /// Protect against deletion
    #[arg(long)]
    protected: bool,
    #[arg(long, default_value = DEFAULT_NAMESERVER_PAIR)]
    nameserver_pair: String,
    #[arg(long, default_value = "")]
    company_id: String,
    #[arg(long, default_value = "")]
    contract_id: String,
}

#[derive(Debug, Args)]
struct UpdateDomainArgs {
    id: DomainId,
    /// Replace the replication masters (repeatable)
    #[arg(long = "master-ip", value_name = "IP")]
    master_ips: Option<Vec<String>>,
    /// Clear the replication masters
    #[arg(long, conflicts_with = "master_ips")]
    clear_master_ips: bool,
    #[arg(long)]
    protected: Option<bool>,
    #[arg(long)]
    company_id: Option<String>,
    #[arg(long)]
    contract_id: Option<String>,
}

#[derive(Debug, Subcommand)]
enum RecordCommand {
    /// List every record of a domain
    List { domain_id: DomainId },
    /// Create a record and print it with its identifier
    Create(CreateRecordArgs),
    /// Change content and TTL of a record
    Update(UpdateRecordArgs),
    /// Delete a record
    Delete {
        domain_id: DomainId,
        record_id: String,
    },
    /// Locate a record by name and content
    Read {
        domain_id: DomainId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        content: String,
    },
    /// Show an existing record by `domainId:recordId`
    Import { id: String },
}

#[derive(Debug, Args)]
struct CreateRecordArgs {
    domain_id: DomainId,
    /// Name without the domain part
    #[arg(long)]
    name: String,
    #[arg(long)]
    content: String,
    #[arg(long = "type", default_value = "A")]
    record_type: RecordType,
    #[arg(long, default_value_t = DEFAULT_TTL)]
    ttl: u32,
}

#[derive(Debug, Args)]
struct UpdateRecordArgs {
    domain_id: DomainId,
    record_id: String,
    /// Current record name, used to locate the record afterwards
    #[arg(long)]
    name: String,
    #[arg(long)]
    content: String,
    #[arg(long, default_value_t = DEFAULT_TTL)]
    ttl: u32,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                PsdnsExitCode::ConfigError.into()
            } else {
                PsdnsExitCode::Success.into()
            };
        }
    };

    let log_level = match parse_log_level(env::var("PSDNS_LOG_LEVEL").ok().as_deref()) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return PsdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PsdnsExitCode::ConfigError.into();
    }

    let config = match ApiConfig::from_lookup(|key| env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return PsdnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PsdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(cli.command, config).await {
            Ok(output) => match serde_json::to_string_pretty(&output) {
                Ok(text) => {
                    println!("{}", text);
                    PsdnsExitCode::Success
                }
                Err(e) => {
                    error!("Failed to render output: {}", e);
                    PsdnsExitCode::RuntimeError
                }
            },
            Err(e) => {
                error!("{:#}", e);
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Run one command to completion or until Ctrl-C
async fn run(command: Command, config: ApiConfig) -> Result<Value> {
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the in-flight operation");
            trigger.cancel();
        }
    });

    info!("Connecting to {}", config.base_url());
    let client = DnsClient::connect(&config, &cancel)
        .await
        .context("failed to connect to the DNS API")?;
    debug!(
        "Authenticated against {}",
        client.client().session().token_url()
    );

    let (engine, mut events) = SyncEngine::new(Arc::new(client));
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Sync event");
        }
    });

    match command {
        Command::Domain(command) => run_domain(&engine, command, &cancel).await,
        Command::Record(command) => run_record(&engine, command, &cancel).await,
    }
}

async fn run_domain(
    engine: &SyncEngine,
    command: DomainCommand,
    cancel: &CancellationToken,
) -> Result<Value> {
    match command {
        DomainCommand::Search { name } => {
            let domain = engine.select_domain(&name, cancel).await?;
            Ok(serde_json::to_value(domain)?)
        }
        DomainCommand::Get { id } => {
            let domain = engine
                .read_domain(id, cancel)
                .await
                .with_context(|| format!("failed to read domain {}", id))?;
            Ok(serde_json::to_value(domain)?)
        }
        DomainCommand::Create(args) => {
            let spec = DomainSpec {
                unicode_name: args.name,
                company_id: args.company_id,
                nameserver_pair_name: args.nameserver_pair,
                protected: args.protected,
                replication_type: args.replication_type,
                replication_master_ips: args.master_ips,
                contract_id: args.contract_id,
            };
            let domain = engine
                .create_domain(&spec, cancel)
                .await
                .with_context(|| format!("failed to create domain {}", spec.unicode_name))?;
            Ok(serde_json::to_value(domain)?)
        }
        DomainCommand::Update(args) => {
            let current = engine
                .read_domain(args.id, cancel)
                .await
                .with_context(|| format!("failed to read domain {}", args.id))?;
            let patch = merge_patch(DomainPatch::from(&current), &args);
            let domain = engine
                .update_domain(args.id, &patch, cancel)
                .await
                .with_context(|| format!("failed to update domain {}", args.id))?;
            Ok(serde_json::to_value(domain)?)
        }
        DomainCommand::Delete { id } => {
            engine
                .delete_domain(id, cancel)
                .await
                .with_context(|| format!("failed to delete domain {}", id))?;
            Ok(json!({ "deleted": { "domainId": id } }))
        }
    }
}

async fn run_record(
    engine: &SyncEngine,
    command: RecordCommand,
    cancel: &CancellationToken,
) -> Result<Value> {
    match command {
        RecordCommand::List { domain_id } => {
            let records = engine
                .api()
                .list_records(domain_id, cancel)
                .await
                .with_context(|| format!("failed to list records of domain {}", domain_id))?;
            Ok(serde_json::to_value(records)?)
        }
        RecordCommand::Create(args) => {
            let spec = RecordSpec::new(args.domain_id, args.name, args.content)
                .with_type(args.record_type)
                .with_ttl(args.ttl);
            let record = engine
                .create_record(&spec, cancel)
                .await
                .with_context(|| format!("failed to create record ({})", spec.natural_key()))?;
            Ok(serde_json::to_value(record)?)
        }
        RecordCommand::Update(args) => {
            let update = RecordUpdate {
                content: args.content,
                ttl: args.ttl,
            };
            let record = engine
                .update_record(
                    args.domain_id,
                    &RecordId::new(args.record_id.as_str()),
                    &args.name,
                    &update,
                    cancel,
                )
                .await
                .with_context(|| format!("failed to update record {}", args.record_id))?;
            Ok(serde_json::to_value(record)?)
        }
        RecordCommand::Delete {
            domain_id,
            record_id,
        } => {
            let record_id = RecordId::new(record_id);
            engine
                .delete_record(domain_id, &record_id, cancel)
                .await
                .with_context(|| format!("failed to delete record {}", record_id))?;
            Ok(json!({ "deleted": { "domainId": domain_id, "recordId": record_id } }))
        }
        RecordCommand::Read {
            domain_id,
            name,
            content,
        } => {
            let key = NaturalKey::new(name, content);
            let record = engine
                .read_record(domain_id, &key, cancel)
                .await
                .with_context(|| format!("failed to read record ({})", key))?;
            Ok(serde_json::to_value(record)?)
        }
        RecordCommand::Import { id } => {
            let record = engine.import_record(&id, cancel).await?;
            Ok(serde_json::to_value(record)?)
        }
    }
}

/// Apply the flags given on the command line on top of the current domain
fn merge_patch(mut patch: DomainPatch, args: &UpdateDomainArgs) -> DomainPatch {
    if args.clear_master_ips {
        patch.replication_master_ips.clear();
    } else if let Some(ref ips) = args.master_ips {
        patch.replication_master_ips = ips.clone();
    }
    if let Some(protected) = args.protected {
        patch.protected = protected;
    }
    if let Some(ref company_id) = args.company_id {
        patch.company_id = company_id.clone();
    }
    if let Some(ref contract_id) = args.contract_id {
        patch.contract_id = contract_id.clone();
    }
    patch
}

fn parse_log_level(raw: Option<&str>) -> Result<Level> {
    match raw.map(str::to_lowercase).as_deref() {
        None | Some("") | Some("info") => Ok(Level::INFO),
        Some("trace") => Ok(Level::TRACE),
        Some("debug") => Ok(Level::DEBUG),
        Some("warn") => Ok(Level::WARN),
        Some("error") => Ok(Level::ERROR),
        Some(other) => anyhow::bail!(
            "PSDNS_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            other
        ),
    }
}

fn exit_code_for(error: &anyhow::Error) -> PsdnsExitCode {
    match error.downcast_ref::<psdns_core::Error>() {
        Some(
            psdns_core::Error::Config(_)
            | psdns_core::Error::InvalidInput(_)
            | psdns_core::Error::InvalidImportId(_),
        ) => PsdnsExitCode::ConfigError,
        _ => PsdnsExitCode::RuntimeError,
    }
}
