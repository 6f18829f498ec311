use tracing::{error, info};

use gamemail::mail::{AttachmentRepository, MessageRepository};
use gamemail::{Config, Database, SpamPolicy, UserRepository};

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
    if let Err(e) = gamemail::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        gamemail::logging::init_console_only(&config.logging.level);
    }

    info!("gamemail - in-game mail service");

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    let opened = Database::open(&config.database.path, config.database.max_connections);
    let db = match opened.await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    let policy = SpamPolicy::from(&config.mail);
    info!(
        min_interval_secs = policy.min_interval.num_seconds(),
        max_per_minute = policy.max_per_minute,
        max_per_hour = policy.max_per_hour,
        duplicate_window_secs = policy.duplicate_window.num_seconds(),
        serialize_submissions = config.mail.serialize_submissions,
        "Anti-abuse policy"
    );

    let pool = db.pool();
    let users = UserRepository::new(pool);
    let messages = MessageRepository::new(pool);
    let attachments = AttachmentRepository::new(pool);
    let counts = tokio::try_join!(users.count(), messages.count(), attachments.count());
    match counts {
        Ok((users, messages, attachments)) => {
            info!(users, messages, attachments, "Database ready");
        }
        Err(e) => error!("Failed to read row counts: {e}"),
    }

    db.close().await;
}
