//! Laurea - certification issuance and verification platform API

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use laurea::{
    config::Args,
    db::MongoClient,
    delivery::DeliveryScheduler,
    gateway::PhonePeClient,
    ledger::{CertificateLedger, LedgerStore, MemoryLedgerStore, MongoLedgerStore},
    mail,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("laurea={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Laurea - Certification Platform API");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Frontend: {}", args.frontend_base_url);
    info!("Delivery delay: {}s", args.delivery_delay_secs);
    info!(
        "Gateway: {} ({})",
        if args.phonepe.is_configured() { "configured" } else { "not configured" },
        args.phonepe.phonepe_environment
    );
    info!(
        "Mail relay: {}",
        args.mail.mail_api_url.as_deref().unwrap_or("not configured")
    );
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Ledger store: MongoDB in production, in-memory fallback in dev mode
    let store: Arc<dyn LedgerStore> = match mongo {
        Some(ref client) => match MongoLedgerStore::new(client).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to initialize ledger collections: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            warn!("Using in-memory ledger store (records are lost on restart)");
            Arc::new(MemoryLedgerStore::new())
        }
    };
    let ledger = Arc::new(CertificateLedger::new(Arc::clone(&store)));

    // Outbound mail transport
    let mailer = mail::mailer_from_args(&args.mail);

    // Payment gateway client with its token cache
    let gateway = Arc::new(PhonePeClient::new(args.phonepe.clone()));

    // Delivery scheduler: background dispatcher for deferred certificate mail
    let scheduler = DeliveryScheduler::spawn(
        Arc::clone(&store),
        Arc::clone(&mailer),
        args.delivery_queue_size,
    );
    info!(
        "Delivery scheduler started (delay {}s, queue {})",
        args.delivery_delay_secs, args.delivery_queue_size
    );

    // Create application state and run the server
    let state = Arc::new(AppState::new(
        args, mongo, ledger, scheduler, mailer, gateway,
    ));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
