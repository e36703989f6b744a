use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auth_cell::{AuthService, FileTokenStore, SessionBackend};
use cleaner_cell::{CleanerProfileService, CleanerStatusGate};
use company_cell::{CompanyProfileService, CompanyStatusGate};
use shared_config::AppConfig;
use shared_graphql::{FetchPolicy, GraphqlClient};
use shared_models::auth::{AuthState, TokenStore};
use shared_models::gate::{GateDecision, Navigator};
use shared_utils::gate::GateMonitor;

#[derive(Parser)]
#[command(name = "helpmeclean-session", about = "HelpMeClean session client")]
struct Cli {
    /// GraphQL endpoint, overrides GRAPHQL_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>,

    /// Token file, overrides TOKEN_STORE_PATH
    #[arg(long)]
    token_file: Option<String>,

    /// Role requested at sign-in, overrides SIGN_IN_ROLE
    #[arg(long)]
    role: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the stored session and print it
    Status,
    /// Exchange a Google ID token for a session
    Login {
        #[arg(long, env = "GOOGLE_ID_TOKEN")]
        id_token: String,
    },
    /// Development sign-in with a bare email address
    DevLogin {
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Ask the backend for a fresh token
    Refresh,
    /// Evaluate an onboarding gate for a location
    Gate {
        #[arg(value_enum)]
        surface: Surface,
        #[arg(long, default_value = "/")]
        path: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Surface {
    Company,
    Cleaner,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInReport<'a> {
    state: &'a AuthState,
    is_new_user: bool,
}

/// Auto-redirects have nowhere to go in a terminal, so they are logged.
struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, to: &str, replace: bool) {
        info!("Gate redirect to {} (replace: {})", to, replace);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.graphql_endpoint = endpoint;
    }
    if let Some(path) = cli.token_file {
        config.token_store_path = path;
    }
    if let Some(role) = cli.role {
        config.sign_in_role = role;
    }

    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.token_store_path));
    let client = Arc::new(
        GraphqlClient::new(&config)
            .context("Failed to build GraphQL client")?
            .with_token_store(Arc::clone(&tokens)),
    );
    let auth = AuthService::from_config(tokens, &config).context("Invalid SIGN_IN_ROLE")?;

    info!("Using GraphQL endpoint {}", client.endpoint());

    let mut updates = auth.subscribe_stream();
    let backend: Arc<dyn SessionBackend> = client.clone();
    auth.initialize(backend).await;

    match cli.command {
        Command::Status => {
            let state = settled(&auth, &mut updates).await;
            print_json(&state)?;
        }
        Command::Login { id_token } => {
            let user = auth.login_with_google(&id_token).await?;
            info!("Signed in as {}, home is {}", user.email, user.role.home_path());
            print_json(&auth.get_state())?;
        }
        Command::DevLogin { email } => {
            let sign_in = auth.login_dev(&email).await?;
            print_json(&SignInReport { state: &auth.get_state(), is_new_user: sign_in.is_new_user })?;
        }
        Command::Logout => {
            auth.logout().await;
            print_json(&auth.get_state())?;
        }
        Command::Refresh => {
            settled(&auth, &mut updates).await;
            auth.refresh_token().await;
            print_json(&auth.get_state())?;
        }
        Command::Gate { surface, path } => {
            let decision = match surface {
                Surface::Company => {
                    let monitor = GateMonitor::with_navigator(CompanyStatusGate::default(), path, Arc::new(LogNavigator));
                    let _subscription = monitor.watch_session(auth.session());
                    settled(&auth, &mut updates).await;
                    if auth.is_authenticated() {
                        CompanyProfileService::new(client.clone()).sync(&monitor, FetchPolicy::CacheFirst).await;
                    }
                    monitor.decision()
                }
                Surface::Cleaner => {
                    let monitor = GateMonitor::with_navigator(CleanerStatusGate::default(), path, Arc::new(LogNavigator));
                    let _subscription = monitor.watch_session(auth.session());
                    settled(&auth, &mut updates).await;
                    if auth.is_authenticated() {
                        CleanerProfileService::new(client.clone()).sync(&monitor, FetchPolicy::CacheFirst).await;
                    }
                    monitor.decision()
                }
            };
            report_decision(&decision);
            print_json(&decision)?;
        }
    }

    Ok(())
}

/// Wait out any scheduled retries so the printed state is final.
async fn settled(auth: &AuthService, updates: &mut tokio::sync::broadcast::Receiver<AuthState>) -> AuthState {
    while !auth.get_state().is_settled() {
        match updates.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    auth.get_state()
}

fn report_decision(decision: &GateDecision) {
    match decision {
        GateDecision::Block { overlay } => warn!("Gate blocks the screen: {:?}", overlay.kind),
        GateDecision::Redirect { to } => info!("Gate redirects to {}", to),
        GateDecision::Wait | GateDecision::PassThrough => {}
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
