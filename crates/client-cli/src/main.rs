use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{AuthorMode, CreateSessionRequest, ListSessionsQuery, SessionStatus};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod api;
mod config;
mod console;
mod error;
mod participant;
mod poller;
mod presenter;

use api::ApiClient;
use config::Config;
use error::ClientError;
use participant::ParticipantClient;
use presenter::PresentationController;

#[derive(Parser)]
#[command(name = "liveqa")]
#[command(about = "Live Q&A for lectures - present a session or join one by code")]
#[command(version)]
struct Cli {
    /// Server URL (overrides config)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Presenter token (overrides config)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new session and run the presenter console
    Present {
        #[arg(long)]
        title: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        lecture: Option<String>,
    },
    /// List your sessions, most recent first
    Sessions {
        #[arg(long)]
        course: Option<String>,
        /// active or ended
        #[arg(long)]
        status: Option<SessionStatus>,
    },
    /// Session counts per course
    Courses,
    /// End a session; its code is released and no new questions are accepted
    End { session_id: Uuid },
    /// Join a session by its code and run the participant console
    Join {
        code: String,
        /// Post under this name instead of anonymously
        #[arg(long)]
        name: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (server, token, presenter_interval_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "liveqa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Config { action } = cli.command {
        return handle_config_command(action);
    }

    let config = Config::load().unwrap_or_default();
    let server = cli.server.as_deref().unwrap_or(config.server()).to_string();
    let token = cli.token.or_else(|| config.remote.token.clone());
    let api = Arc::new(ApiClient::new(
        &server,
        token,
        config.polling.request_timeout(),
    )?);

    match cli.command {
        Commands::Present {
            title,
            course,
            lecture,
        } => {
            let created = api
                .create_session(&CreateSessionRequest {
                    title,
                    course_ref: course,
                    lecture_ref: lecture,
                })
                .await?;
            tracing::info!("Session {} created with code {}", created.session_id, created.code);
            let controller = PresentationController::new(created.session_id, created.code);
            console::run_presenter(api, controller, &config.polling).await?;
        }
        Commands::Sessions { course, status } => {
            let query = ListSessionsQuery {
                course_ref: course,
                status,
            };
            let sessions = api.list_sessions(&query).await?;
            if sessions.is_empty() {
                println!("No sessions.");
            }
            for session in sessions {
                println!(
                    "{}  {}  {:<6}  {:>4} msgs  {:>7}  [{}] {}",
                    session.id,
                    session.code,
                    session.status.as_str(),
                    session.messages_count,
                    session.duration,
                    session.course_ref,
                    session.title
                );
            }
        }
        Commands::Courses => {
            for course in api.course_summaries().await? {
                println!(
                    "{:<16} {} active / {} total",
                    course.course_ref, course.active_sessions, course.total_sessions
                );
            }
        }
        Commands::End { session_id } => {
            let ended = api.end_session(session_id).await?;
            println!("Session ended at {}", ended.ended_at.to_rfc3339());
        }
        Commands::Join { code, name } => {
            let author = match name {
                Some(display_name) => AuthorMode::Named {
                    display_name: shared::validation::display_name(&display_name)?,
                },
                None => AuthorMode::Anonymous,
            };
            let client = match ParticipantClient::join(api.clone(), &code, author).await {
                Ok(client) => client,
                Err(ClientError::InvalidCode(code)) => {
                    eprintln!("\x1b[33mNo active session uses code {}.\x1b[0m", code);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            console::run_participant(api, client, &config.polling).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            let mut config = Config::load().unwrap_or_default();
            config.set(&key, &value)?;
            config.save()?;
            println!("Configuration saved");
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            println!("{}", config.get(&key)?);
        }
        ConfigAction::Show => {
            let config = Config::load()?;
            for key in config::CONFIG_KEYS {
                println!("{}: {}", key, config.get(key)?);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
