mod commands;
mod util;

use clap::{Parser, Subcommand};
use presence_core::memory::MemoryStore;
use presence_core::{ProvisioningTemplates, RequestContext, Store};
use presence_store::{PgStore, StoreConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::commands::provision::ProvisionArgs;
use crate::commands::status::StatusCommands;
use crate::util::{exit_error, print_json};

#[derive(Parser)]
#[command(
    name = "presence",
    version,
    about = "Agent availability statuses and tenant provisioning for contact channels"
)]
struct Cli {
    /// Correlation id stamped on every log line (generated when omitted)
    #[arg(long, env = "PRESENCE_CORRELATION_ID", global = true)]
    correlation_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Store(StoreCommands),
    /// Print the built-in provisioning templates as JSON
    Templates,
}

/// Commands that read or write the configured store.
#[derive(Subcommand)]
enum StoreCommands {
    /// Seed tenants with channels, statuses, signals and ponders
    Provision(ProvisionArgs),
    /// Manage the channel statuses of one tenant
    Status {
        /// Tenant the command operates on
        #[arg(long, env = "PRESENCE_TENANT_ID")]
        tenant_id: Uuid,
        #[command(subcommand)]
        command: StatusCommands,
    },
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let json = std::env::var("PRESENCE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "presence=info".into()))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn connect(config: &StoreConfig) -> PgStore {
    let store = match PgStore::connect(config).await {
        Ok(store) => store,
        Err(e) => exit_error(
            &format!("Failed to connect to database: {e}"),
            Some("Is PostgreSQL running? Check DATABASE_URL."),
        ),
    };
    if let Err(e) = store.migrate().await {
        exit_error(&format!("Failed to run migrations: {e}"), None);
    }
    store
}

async fn execute<S: Store>(store: S, correlation_id: Option<&str>, command: StoreCommands) -> i32 {
    match command {
        StoreCommands::Provision(args) => {
            let ctx = RequestContext::new(Uuid::nil(), correlation_id);
            commands::provision::run(store, &ctx, args).await
        }
        StoreCommands::Status { tenant_id, command } => {
            let ctx = RequestContext::new(tenant_id, correlation_id);
            commands::status::run(store, &ctx, command).await
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    let correlation_id = cli.correlation_id.as_deref();

    let code = match cli.command {
        Commands::Templates => print_json(&ProvisioningTemplates::standard()),
        Commands::Store(command) => match StoreConfig::from_env() {
            Ok(Some(config)) => execute(connect(&config).await, correlation_id, command).await,
            Ok(None) => {
                tracing::warn!("DATABASE_URL is not set, running against an in-memory store (nothing is persisted)");
                execute(MemoryStore::new(), correlation_id, command).await
            }
            Err(e) => exit_error(&e.to_string(), Some("Check PRESENCE_DB_MAX_CONNECTIONS")),
        },
    };
    std::process::exit(code);
}
