use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use concejo_mystery::{
    app::App,
    config::Config,
    engine::GameEngine,
    gemini::GeminiClient,
    storage::SqliteStorage,
    transcript::StdinSource,
};

/// Command-line options
#[derive(Debug, Parser)]
#[command(
    name = "concejo-mystery",
    version,
    about = "Misterio en el Concejo - una aventura de detectives narrada por IA"
)]
struct Cli {
    /// Locale the narration is generated in (overrides GAME_LOCALE)
    #[arg(long)]
    locale: Option<String>,

    /// Database file path (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(locale) = cli.locale {
        config.game.locale = locale;
    }
    if let Some(database) = cli.database {
        config.database.path = database;
    }

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Concejo Mystery starting..."
    );

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    // Initialize Gemini client
    let gemini = match GeminiClient::new(&config.gemini, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.gemini.base_url, "Gemini client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Gemini client");
            return Err(e.into());
        }
    };

    let engine = GameEngine::new(storage.clone(), gemini, &config);
    let app = App::new(config, storage, engine);

    let mut input = StdinSource::new();
    if let Err(e) = app.run(&mut input).await {
        error!(error = %e, "Application error");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        concejo_mystery::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        concejo_mystery::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
