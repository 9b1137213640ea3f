use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fl_auth::{
    ApiRequest, EnvSecretProvider, FileSecureStore, HttpTimeouts, KeyringSecureStore,
    MemorySecureStore, SecureStore, SessionConfig, SessionManager,
};
use fl_settings::{Settings, SettingsManager, StorageBackend};
use fl_state::{AuthStateMachine, AuthStatus};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "flashy", version, about = "Flashy session client")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, env = "FLASHY_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the current session and navigation tree
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FLASHY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with a Google OAuth authorization code
    LoginGoogle {
        #[arg(long)]
        code: String,
    },
    /// Sign out and forget the stored tokens
    Logout,
    /// Authenticated GET against the API, printing the response body
    Get {
        /// Path relative to the API root, e.g. `/flashcards`
        path: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let manager = match cli.settings {
        Some(path) => SettingsManager::new(path),
        None => SettingsManager::from_project_dirs()?,
    };
    let settings = manager.load().await?;
    init_tracing(&settings);
    debug!("Using settings from {}", manager.path().display());

    let store = open_store(settings.storage).await?;
    let session = Arc::new(SessionManager::new(session_config(&settings)?, store)?);
    let machine = AuthStateMachine::new(session);
    let tracker = machine.track_session();

    match cli.command {
        Command::Status => {
            machine.restore().await;
        }
        Command::Login { email, password } => {
            machine.login(&email, &password).await;
            ensure_signed_in(&machine)?;
        }
        Command::LoginGoogle { code } => {
            machine.login_with_google(&code).await;
            ensure_signed_in(&machine)?;
        }
        Command::Logout => {
            machine.logout().await;
            info!("Signed out");
        }
        Command::Get { path } => {
            if !machine.restore().await {
                bail!("Not signed in; run `flashy login` first");
            }
            let response = machine
                .session()
                .dispatch(&ApiRequest::get(path))
                .await
                .context("Request failed")?;
            println!("{}", response.text());
        }
    }

    print_status(&machine);
    tracker.abort();
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn session_config(settings: &Settings) -> Result<SessionConfig> {
    let config = match &settings.api_url {
        Some(url) => SessionConfig::new(url),
        None => SessionConfig::from_env(),
    }
    .context("Invalid API URL")?;

    Ok(config
        .with_timeouts(HttpTimeouts {
            connect: settings.connect_timeout(),
            request: settings.request_timeout(),
        })
        .with_shared_refresh(settings.share_inflight_refresh))
}

async fn open_store(backend: StorageBackend) -> Result<Arc<dyn SecureStore>> {
    debug!("Opening {} token store", backend);
    let store: Arc<dyn SecureStore> = match backend {
        StorageBackend::File => {
            let dir = FileSecureStore::default_storage_dir()?;
            Arc::new(
                FileSecureStore::new(&dir, Arc::new(EnvSecretProvider::default()))
                    .await
                    .with_context(|| format!("Failed to open token store at {}", dir.display()))?,
            )
        }
        StorageBackend::Keyring => Arc::new(KeyringSecureStore::default()),
        StorageBackend::Memory => Arc::new(MemorySecureStore::new()),
    };
    Ok(store)
}

fn ensure_signed_in(machine: &AuthStateMachine) -> Result<()> {
    let state = machine.state();
    if state.status == AuthStatus::Failed {
        bail!(
            "Login failed: {}",
            state.last_error.as_deref().unwrap_or(fl_state::DEFAULT_LOGIN_ERROR)
        );
    }
    Ok(())
}

fn print_status(machine: &AuthStateMachine) {
    let state = machine.state();
    println!("status: {}", state.status);
    if let Some(user) = &state.user {
        let roles: Vec<&str> = user.roles.iter().map(String::as_str).collect();
        println!("user:   {} [{}]", user.username, roles.join(", "));
    }
    println!("tree:   {}", state.active_tree());
}
