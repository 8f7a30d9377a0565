mod jobs;
mod render;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use ferry_core::bus::ProgressBus;
use ferry_core::events::ProgressSink;
use ferry_core::joblog::JobLog;
use ferry_core::model::{Credential, RepoVisibility, SyncRequest};
use ferry_core::orchestrator::JobOrchestrator;
use ferry_core::transport::{Git2Transport, GitCliTransport, MirrorTransport};
use ferry_hosting::GitHubClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Mirror every repository from one GitHub account to another"
)]
struct Cli {
    #[arg(long, help = "Account owning the repositories to mirror")]
    source_account: String,

    #[arg(
        long,
        env = "FERRY_SOURCE_TOKEN",
        hide_env_values = true,
        help = "Token for the source account; omit for public repositories"
    )]
    source_token: Option<String>,

    #[arg(long, help = "Account receiving the mirrors")]
    target_account: String,

    #[arg(
        long,
        env = "FERRY_TARGET_TOKEN",
        hide_env_values = true,
        help = "Token for the target account"
    )]
    target_token: String,

    #[arg(long, help = "Directory holding local mirrors, reused across runs")]
    work_root: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "cli")]
    transport: TransportArg,

    #[arg(
        long,
        value_enum,
        default_value = "private",
        help = "Visibility for repositories created in the target"
    )]
    visibility: VisibilityArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportArg {
    /// Shell out to the external git client.
    Cli,
    /// Use embedded libgit2.
    Embedded,
}

#[derive(Clone, Copy, ValueEnum)]
enum VisibilityArg {
    Private,
    Public,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let work_root = match cli.work_root {
        Some(root) => root,
        None => default_work_root()?,
    };

    let hosting = Arc::new(GitHubClient::new()?);
    let transport: Arc<dyn MirrorTransport> = match cli.transport {
        TransportArg::Cli => Arc::new(GitCliTransport::new()),
        TransportArg::Embedded => Arc::new(Git2Transport::new()),
    };
    let visibility = match cli.visibility {
        VisibilityArg::Private => RepoVisibility::Private,
        VisibilityArg::Public => RepoVisibility::Public,
    };

    let bus = Arc::new(ProgressBus::new());
    let log = JobLog::new(&work_root);
    let orchestrator = Arc::new(JobOrchestrator::new(
        hosting,
        transport,
        Arc::clone(&bus) as Arc<dyn ProgressSink>,
        log,
        work_root,
        visibility,
    ));

    let runner = jobs::JobRunner::new(orchestrator, bus);
    let request = SyncRequest {
        source_account: cli.source_account,
        source_credential: cli.source_token.map(Credential::new),
        target_account: cli.target_account,
        target_credential: Credential::new(cli.target_token),
    };
    let started = runner.start(request);
    println!("job {} started", started.job_id);

    let cancel = started.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    if render::render_events(started.events).await {
        Ok(())
    } else {
        anyhow::bail!("synchronization job failed")
    }
}

fn default_work_root() -> anyhow::Result<PathBuf> {
    let project = ProjectDirs::from("com", "git-ferry", "git-ferry").context("resolve project dirs")?;
    Ok(project.data_local_dir().join("mirrors"))
}
