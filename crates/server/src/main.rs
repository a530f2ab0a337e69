use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use liveqa_server::{
    config::Config,
    db::Database,
    routes::{
        self,
        auth::{generate_token, Role},
    },
    state::AppState,
};

#[derive(Parser)]
#[command(name = "liveqa-server")]
#[command(about = "Live Q&A session service", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default)
    Serve,
    /// Mint a presenter token signed with the configured secret
    Token {
        /// Presenter identity to embed as the token subject
        presenter_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liveqa_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Token { presenter_id } => {
            let token = generate_token(&presenter_id, Role::Presenter, &config.auth)?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    tracing::info!("Starting Live Q&A server on {}:{}", config.server.host, config.server.port);

    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;

    let state = AppState::new(db, config.clone());
    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
