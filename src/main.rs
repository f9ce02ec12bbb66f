use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use ledger_bot::repositories::conversations::{
    ConversationStoreRef, Expiry, MemoryConversationStore, PgConversationStore,
};
use ledger_bot::repositories::ledger::{LedgerStoreRef, MemoryLedgerStore, PgLedgerStore};
use ledger_bot::repositories::init_schema;
use ledger_bot::services;
use ledger_bot::settings::Settings;
use ledger_bot::transport::TelegramTransport;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    /// Keep users, ledger and conversations in memory. Nothing survives a restart.
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    let settings = Settings::new(&args.config).expect("Could not load config file.");
    log::info!("Starting ledger bot.");

    let expiry = Expiry::from_secs(settings.conversation.ttl_secs);
    let (ledger, conversations): (LedgerStoreRef, ConversationStoreRef) = if args.memory {
        log::warn!("Running with in-memory stores.");
        (
            Arc::new(MemoryLedgerStore::new()),
            Arc::new(MemoryConversationStore::new(expiry)),
        )
    } else {
        let conn = PgPoolOptions::new()
            .max_connections(5)
            .connect(&settings.postgres.url)
            .await?;
        init_schema(&conn).await?;

        (
            Arc::new(PgLedgerStore::new(conn.clone())),
            Arc::new(PgConversationStore::new(conn, expiry)),
        )
    };

    let transport = Arc::new(TelegramTransport::new(&settings.telegram.token)?);

    let running = services::start_services(settings, ledger, conversations, transport).await?;

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down.");
    running.shutdown().await;

    Ok(())
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
