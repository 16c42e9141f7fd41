//! parley — multi-tenant customer-messaging gateway.

use std::{net::SocketAddr, sync::Arc};

use {
    anyhow::Context,
    clap::Parser,
    sqlx::sqlite::SqlitePoolOptions,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    parley_common::{MediaCache, NoopMediaCache},
    parley_gateway::{AppState, TenantRooms, serve},
    parley_inbox::{InboxService, SqliteInboxStore},
    parley_instagram::InstagramClient,
    parley_media::MediaStore,
    parley_tenants::{CredentialCipher, SqliteTenantStore},
    parley_whatsapp::WhatsAppClient,
};

#[derive(Parser)]
#[command(name = "parley", about = "parley — multi-tenant customer-messaging gateway")]
struct Cli {
    /// Address to bind the HTTP/WebSocket server on.
    #[arg(long, env = "PARLEY_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// SQLite database URL.
    #[arg(
        long,
        env = "PARLEY_DATABASE_URL",
        default_value = "sqlite://parley.db?mode=rwc"
    )]
    database_url: String,

    /// 64-hex-char master key for credential encryption at rest.
    #[arg(long, env = "PARLEY_MASTER_KEY", hide_env_values = true)]
    master_key: String,

    /// Directory for the media download cache. Media caching is disabled
    /// when unset.
    #[arg(long, env = "PARLEY_UPLOADS_DIR")]
    uploads_dir: Option<String>,

    /// Base URL of the WhatsApp Cloud API (override for testing).
    #[arg(long, env = "PARLEY_WHATSAPP_GRAPH_BASE", default_value = parley_whatsapp::outbound::DEFAULT_GRAPH_BASE)]
    whatsapp_graph_base: String,

    /// Base URL of the Instagram Messaging API (override for testing).
    #[arg(long, env = "PARLEY_INSTAGRAM_GRAPH_BASE", default_value = parley_instagram::outbound::DEFAULT_GRAPH_BASE)]
    instagram_graph_base: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "PARLEY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, env = "PARLEY_JSON_LOGS")]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let cipher = CredentialCipher::from_hex(&cli.master_key)
        .context("invalid PARLEY_MASTER_KEY")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to SQLite")?;
    SqliteTenantStore::init(&pool).await?;
    SqliteInboxStore::init(&pool).await?;

    let tenants = Arc::new(SqliteTenantStore::new(pool.clone(), cipher));
    let store = Arc::new(SqliteInboxStore::new(pool));
    let rooms = Arc::new(TenantRooms::default());

    let media: Arc<dyn MediaCache> = match &cli.uploads_dir {
        Some(dir) => {
            info!(uploads_dir = %dir, "media cache enabled");
            Arc::new(MediaStore::new(
                dir,
                cli.whatsapp_graph_base.clone(),
                tenants.clone(),
            ))
        },
        None => {
            info!("no uploads dir configured, media caching disabled");
            Arc::new(NoopMediaCache)
        },
    };

    let service = Arc::new(InboxService {
        customers: store.clone(),
        conversations: store.clone(),
        messages: store,
        tenants: tenants.clone(),
        credentials: tenants.clone(),
        whatsapp: WhatsAppClient::new(cli.whatsapp_graph_base),
        instagram: InstagramClient::new(cli.instagram_graph_base),
        events: rooms.clone(),
        media,
    });

    let state = AppState {
        service,
        tenants: tenants.clone(),
        credentials: tenants,
        rooms,
    };

    serve(state, cli.bind).await?;
    Ok(())
}
