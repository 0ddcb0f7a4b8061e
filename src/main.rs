use tracing::{error, info};

use postbox::datetime::format_utc_datetime;
use postbox::{Config, Database, EmailFilter, EmailService, EmailStatus, Page};

/// Number of recent emails listed at startup.
const RECENT_LIMIT: i64 = 10;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = postbox::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        postbox::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    info!("postbox {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> postbox::Result<()> {
    let db = Database::open(&config.database.path).await?;
    let service = EmailService::from_config(&db, config);

    let drafts = service
        .count(&EmailFilter::new().with_status(EmailStatus::Draft))
        .await?;
    let total = service.count(&EmailFilter::new()).await?;
    info!("{total} emails stored, {drafts} drafts");

    let recent = service
        .list_short(&EmailFilter::new(), Some(Page::new(0, RECENT_LIMIT)))
        .await?;
    for email in recent {
        let id = email.id.as_ref().map(|id| id.as_str()).unwrap_or("-");
        let ts = format_utc_datetime(&email.ts, &config.display.timezone, &config.display.ts_format);
        info!(
            "{ts}  {id}  {}",
            email.subject.as_deref().unwrap_or("(no subject)")
        );
    }

    db.close().await;
    Ok(())
}
