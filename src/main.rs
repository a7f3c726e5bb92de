use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use workflow_rerunner::config::{LoggingConfig, RerunnerConfig};
use workflow_rerunner::driver::{RerunDriver, RerunOutcome, RerunReport};
use workflow_rerunner::github::{ActionsApi, GitHubClient};
use workflow_rerunner::model::{RunId, WorkflowRun};
use workflow_rerunner::{collector, snapshot};

#[derive(Parser)]
#[command(
    name = "workflow-rerunner",
    about = "Re-run failed and cancelled GitHub Actions workflow runs",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository owner (user or organization)
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Repository name
    #[arg(long, global = true)]
    repo: Option<String>,

    /// API token sent as a bearer credential
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// REST API root (GitHub Enterprise: https://<host>/api/v3)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Snapshot file written by collection and read by `drive`
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// JSON output for machine parsing
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect eligible runs, rerun each one and wait for it to finish
    Run,

    /// Collect eligible runs and write the snapshot, without rerunning
    Collect,

    /// Rerun and monitor the runs stored in an existing snapshot
    Drive,

    /// Show the current status of one run
    Status {
        /// Workflow run id
        #[arg(long)]
        run_id: u64,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut RerunnerConfig) {
        if let Some(owner) = &self.owner {
            config.github.owner = owner.clone();
        }
        if let Some(repo) = &self.repo {
            config.github.repo = repo.clone();
        }
        if let Some(token) = &self.token {
            config.github.token = Some(token.clone());
        }
        if let Some(api_url) = &self.api_url {
            config.github.api_url = api_url.clone();
        }
        if let Some(snapshot) = &self.snapshot {
            config.collector.snapshot_path = snapshot.clone();
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config resolution logs before the configured subscriber can exist.
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || {
        RerunnerConfig::resolve(cli.config.as_deref())
    })?;
    cli.apply_overrides(&mut config);
    init_tracing(&config.logging);
    config.validate()?;

    let client = GitHubClient::new(&config.github, &config.collector)?;

    match cli.command {
        Commands::Run => {
            let reports = workflow_rerunner::run_with(&client, &config).await;
            print_reports(&reports, cli.json)?;
        }
        Commands::Collect => {
            let runs = collector::collect(
                &client,
                &config.policy.policy(),
                chrono::Utc::now(),
                &config.collector.snapshot_path,
            )
            .await;
            print_runs(&runs, cli.json)?;
        }
        Commands::Drive => {
            let runs = snapshot::read(&config.collector.snapshot_path)?;
            tracing::info!(runs = runs.len(), path = %config.collector.snapshot_path.display(), "driving runs from snapshot");
            let reports = RerunDriver::new(&client, config.policy.policy(), config.polling.clone())
                .drive(&runs)
                .await;
            print_reports(&reports, cli.json)?;
        }
        Commands::Status { run_id } => {
            let state = client.run_state(RunId(run_id)).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                let conclusion = state
                    .conclusion
                    .as_ref()
                    .map(|c| c.as_str())
                    .unwrap_or("-");
                println!("Run {} - Status: {}, Conclusion: {}", run_id, state.status, conclusion);
            }
        }
    }

    Ok(())
}

fn print_runs(runs: &[WorkflowRun], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(runs)?);
        return Ok(());
    }
    if runs.is_empty() {
        println!("No workflow runs need to be rerun.");
        return Ok(());
    }
    println!("{:<14} | {:<10} | {:<25} | Name", "Run", "Conclusion", "Created");
    println!("{:-<14}-|-{:-<10}-|-{:-<25}-|-{:-<20}", "", "", "", "");
    for run in runs {
        println!(
            "{:<14} | {:<10} | {:<25} | {}",
            run.id,
            run.conclusion.as_ref().map(|c| c.as_str()).unwrap_or("-"),
            run.created_at.to_rfc3339(),
            run.name().unwrap_or("")
        );
    }
    Ok(())
}

fn print_reports(reports: &[RerunReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }
    if reports.is_empty() {
        println!("There are currently no workflow runs that need to be rerun.");
        return Ok(());
    }
    println!("{:<14} | {:<18} | {:<6} | Details", "Run", "Outcome", "Polls");
    println!("{:-<14}-|-{:-<18}-|-{:-<6}-|-{:-<30}", "", "", "", "");
    for report in reports {
        let details = match &report.outcome {
            RerunOutcome::Expired => "cancelled more than the rerun window ago".to_string(),
            RerunOutcome::RerunRejected { error } | RerunOutcome::StatusUnavailable { error } => {
                error.clone()
            }
            RerunOutcome::Completed { conclusion } => format!(
                "conclusion: {}",
                conclusion.as_ref().map(|c| c.as_str()).unwrap_or("-")
            ),
            RerunOutcome::TimedOut { last_status } => format!(
                "last status: {}",
                last_status.as_ref().map(|s| s.as_str()).unwrap_or("unknown")
            ),
        };
        println!(
            "{:<14} | {:<18} | {:<6} | {}",
            report.run_id,
            report.outcome.label(),
            report.polls,
            details
        );
    }
    Ok(())
}
