use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use board_sync::config::{Settings, SyncConfig};
use board_sync::github::GitHubClient;
use board_sync::import::{DEFAULT_RESULTS_PATH, ImportOptions, Importer, LoopbackNotifier};
use board_sync::reconcile::{Reconciler, bootstrap_pipelines};
use board_sync::retry::RetryConfig;
use board_sync::server::{AppState, build_router};
use board_sync::setup;
use board_sync::zenhub::ZenHubClient;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Keeps GitHub project boards and ZenHub pipelines in sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the webhook server (default).
    Serve,

    /// Copy every ZenHub pipeline onto the GitHub boards once, overwriting
    /// board state. Expects a server to be running for echo suppression.
    Import {
        /// Log what would be placed without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Where to write progress.
        #[arg(long, default_value = DEFAULT_RESULTS_PATH)]
        results: PathBuf,
    },

    /// Write a starter config listing the workspace pipelines. Refuses to
    /// overwrite an existing file.
    InitConfig,

    /// Make an organization project the global board.
    SetGlobalBoard {
        /// Project number, as shown in the project URL.
        project: u64,
    },

    /// Route entities carrying every given label to an organization project.
    /// Replaces a mapping with the same label set.
    AddLabelMapping {
        /// Project number, as shown in the project URL.
        project: u64,

        /// A required label. Repeat for more than one.
        #[arg(long = "label", required = true)]
        labels: Vec<String>,
    },
}

struct Clients {
    reconciler: Arc<Reconciler<GitHubClient, ZenHubClient>>,
    zenhub: Arc<ZenHubClient>,
}

fn github_client(settings: &Settings, organization: &str) -> anyhow::Result<GitHubClient> {
    GitHubClient::from_token(
        settings.github_token.clone(),
        organization,
        RetryConfig::with_default_delay(settings.default_retry_after),
    )
    .context("failed to build GitHub client")
}

fn zenhub_client(settings: &Settings) -> anyhow::Result<ZenHubClient> {
    ZenHubClient::new(
        &settings.zenhub_token,
        settings.zenhub_api_url.clone(),
        settings.zenhub_workspace_id.clone(),
        RetryConfig::with_default_delay(settings.default_retry_after),
    )
    .context("failed to build ZenHub client")
}

async fn build_clients(settings: &Settings) -> anyhow::Result<Clients> {
    let mut config = SyncConfig::load(&settings.config_path)?;
    let github = github_client(settings, &config.organization)?;
    let zenhub = zenhub_client(settings)?;

    bootstrap_pipelines(&mut config, &zenhub)
        .await
        .context("failed to load ZenHub pipelines")?;

    let zenhub = Arc::new(zenhub);
    let reconciler = Reconciler::new(
        Arc::new(config),
        Arc::new(github),
        Arc::clone(&zenhub),
        settings.zenhub_workspace_id.clone(),
    );

    Ok(Clients {
        reconciler: Arc::new(reconciler),
        zenhub,
    })
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let clients = build_clients(&settings).await?;
    let app = build_router(AppState::new(
        clients.reconciler,
        settings.webhook_secret.clone(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn import(settings: Settings, dry_run: bool, results: PathBuf) -> anyhow::Result<()> {
    let clients = build_clients(&settings).await?;
    let notifier = LoopbackNotifier::new(&settings.internal_url)?;
    let importer = Importer::new(
        clients.reconciler,
        clients.zenhub,
        notifier,
        ImportOptions {
            dry_run,
            results_path: results,
        },
    );

    let results = importer.run().await?;
    info!(
        pipelines = results.pipelines.len(),
        issues = results.issues.len(),
        "Import finished"
    );
    Ok(())
}

async fn init_config(settings: Settings) -> anyhow::Result<()> {
    let zenhub = zenhub_client(&settings)?;
    let config = setup::init_config(&settings.config_path, &zenhub).await?;
    info!(
        path = %settings.config_path.display(),
        pipelines = config.zenhub_pipelines.len(),
        "Created config"
    );
    Ok(())
}

async fn set_global_board(settings: Settings, project: u64) -> anyhow::Result<()> {
    let mut config = SyncConfig::load(&settings.config_path)?;
    let github = github_client(&settings, &config.organization)?;

    let board = setup::board_from_project(&github, project, &config.field_names).await?;
    info!(board = %board.github_board_id, "Setting global board");
    setup::set_global_board(&mut config, board);
    config.save(&settings.config_path)?;
    Ok(())
}

async fn add_label_mapping(
    settings: Settings,
    project: u64,
    labels: Vec<String>,
) -> anyhow::Result<()> {
    let mut config = SyncConfig::load(&settings.config_path)?;
    let github = github_client(&settings, &config.organization)?;

    let board = setup::board_from_project(&github, project, &config.field_names).await?;
    let replaced = setup::upsert_label_mapping(&mut config, labels, board)?;
    config.save(&settings.config_path)?;
    info!(replaced, "Label mapping saved");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "board_sync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::Import { dry_run, results } => import(settings, dry_run, results).await,
        Command::InitConfig => init_config(settings).await,
        Command::SetGlobalBoard { project } => set_global_board(settings, project).await,
        Command::AddLabelMapping { project, labels } => {
            add_label_mapping(settings, project, labels).await
        }
    }
}
