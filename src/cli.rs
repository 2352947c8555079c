use crate::client::api::{ApiClientError, HttpJobsApi, StartRequest};
use crate::client::boot::BootObservation;
use crate::client::{CompletionHook, JobSupervisor};
use crate::config::settings::{AppConfig, ClientConfig};
use crate::infrastructure::library::VideoId;
use crate::modules::jobs::dto::JobStatusResponse;
use crate::modules::jobs::model::{JobCategory, JobState};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const REFRESH: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "library-jobs")]
#[command(about = "Background scan, thumbnail, cleanup and transcode jobs for a video library")]
pub struct Cli {
    /// Job server base URL used by the client commands
    #[arg(long, global = true, env = "SERVER_URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the job server
    Serve {
        /// Listen port (overrides APP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the status of every job slot
    Status,
    /// Scan the library and wait for it to finish
    Scan {
        /// Re-check known files and drop records whose files are gone
        #[arg(long)]
        full: bool,
    },
    /// Generate missing thumbnails
    Thumbnails,
    /// Remove records whose files no longer exist
    Cleanup,
    /// Queue videos for transcoding, one at a time
    Transcode {
        #[arg(required = true)]
        ids: Vec<VideoId>,
    },
    /// Reattach to whatever is running and follow it to the end
    Watch,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut client_config = ClientConfig::new();
    if let Some(server) = cli.server {
        client_config.server_url = server;
    }

    let request = match cli.command {
        Command::Serve { port } => {
            let mut config = AppConfig::new().context("Failed to load configuration")?;
            if let Some(port) = port {
                config.server_port = port;
            }
            return crate::app::serve(config).await;
        }
        Command::Status => return print_status(&client_config).await,
        Command::Watch => None,
        Command::Scan { full } => Some(vec![StartRequest::Scan { full_scan: full }]),
        Command::Thumbnails => Some(vec![StartRequest::Thumbnails]),
        Command::Cleanup => Some(vec![StartRequest::Cleanup]),
        Command::Transcode { ids } => Some(ids.into_iter().map(StartRequest::Transcode).collect()),
    };

    follow(&client_config, request.unwrap_or_default()).await
}

async fn print_status(config: &ClientConfig) -> anyhow::Result<()> {
    use crate::client::api::JobsApi;

    let api = HttpJobsApi::new(&config.server_url)?;
    for category in JobCategory::ALL {
        match api.status(category).await {
            Ok(status) => println!("{}", render(category, &status)),
            Err(e) => println!("{category:<11} unreachable: {e}"),
        }
    }
    Ok(())
}

/// Boot-reconciles, issues `requests`, then prints every mirror change until
/// nothing is left to observe.
async fn follow(config: &ClientConfig, requests: Vec<StartRequest>) -> anyhow::Result<()> {
    let api = Arc::new(HttpJobsApi::new(&config.server_url)?);
    let hook: CompletionHook = Arc::new(|category: JobCategory, status: &JobStatusResponse| {
        info!(%category, "Finished: {}", status.message);
    });
    let supervisor = JobSupervisor::new(api, config.intervals(), Some(hook));

    let report = supervisor.reconcile().await;
    for (category, observation) in &report.observations {
        match observation {
            BootObservation::Idle => {}
            BootObservation::Reattached(status) => match status.scan_kind() {
                Some(kind) => println!("Reattached to running {}", kind.tag().to_lowercase()),
                None => println!("Reattached to running {category} job"),
            },
            BootObservation::Failed(status) => println!("{}", render(*category, status)),
            BootObservation::Unreachable(e) => println!("{category:<11} unreachable: {e}"),
        }
    }
    if report.reattached().is_empty() && requests.is_empty() {
        println!("Nothing is running.");
    }

    // already reported above
    let mut shown: HashMap<JobCategory, JobStatusResponse> = HashMap::new();
    for (category, status) in supervisor.snapshot().await {
        if !status.state().is_active() {
            shown.insert(category, status);
        }
    }

    for request in requests {
        match supervisor.start(request).await {
            Ok(()) => {}
            Err(ApiClientError::Conflict(message)) => warn!("{}", message),
            Err(e) => bail!("{} request failed: {}", request.category(), e),
        }
    }

    loop {
        for (category, status) in supervisor.snapshot().await {
            if shown.get(&category) != Some(&status) {
                if status.state() != JobState::Idle || shown.contains_key(&category) {
                    println!("{}", render(category, &status));
                }
                shown.insert(category, status);
            }
        }
        if supervisor.settled().await {
            break;
        }
        tokio::time::sleep(REFRESH).await;
    }

    let pending = supervisor.queue().pending().await;
    supervisor.shutdown().await;
    if !pending.is_empty() {
        bail!("Server unreachable, videos not transcoded: {:?}", pending);
    }
    Ok(())
}

fn render(category: JobCategory, status: &JobStatusResponse) -> String {
    let mut line = format!("{:<11} {:<12} {}", category.as_str(), status.status, status.message);
    if status.total > 0 {
        line.push_str(&format!(" ({}/{})", status.progress, status.total));
    }
    if let Some(id) = status.subject_id {
        line.push_str(&format!(" [video {id}]"));
    }
    line
}
