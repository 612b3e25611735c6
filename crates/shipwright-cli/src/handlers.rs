//! Command handlers.

use crate::client::ApiClient;
use crate::config::ServerConfig;
use anyhow::{Context, bail};
use console::style;
use shipwright_api::{AdmissionFilter, AllowList, AppState};
use shipwright_core::ports::{SourceControl, SubmitOutcome, TargetRegistry};
use shipwright_orchestrator::{Orchestrator, Outcome, ScheduleBinder};
use shipwright_targets::{DirectoryRegistry, GitSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::info;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

struct Components {
    source_control: Arc<dyn SourceControl>,
    registry: Arc<dyn TargetRegistry>,
}

fn components(config: &ServerConfig) -> Components {
    let source_control: Arc<dyn SourceControl> = Arc::new(GitSource::new());
    let registry: Arc<dyn TargetRegistry> = Arc::new(DirectoryRegistry::new(
        &config.targets_root,
        Arc::clone(&source_control),
    ));
    Components {
        source_control,
        registry,
    }
}

/// Run the hook server with schedules armed.
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let Components {
        source_control,
        registry,
    } = components(config);
    let orchestrator = Orchestrator::new(Arc::clone(&registry), config.orchestrator_config());

    let allow_list = AllowList::parse(&config.allow_list).context("invalid allow_list")?;
    if !config.metadata_url.is_empty() {
        allow_list.spawn_refresh(
            config.metadata_url.clone(),
            Duration::from_secs(config.metadata_timeout_seconds),
        );
    }

    let binder = ScheduleBinder::new(
        Arc::clone(&registry),
        Arc::clone(&source_control),
        Arc::new(orchestrator.clone()),
    );
    let schedules = binder
        .bind()
        .await
        .with_context(|| format!("discovering targets in {}", config.targets_root.display()))?;
    info!(count = schedules.len(), "Schedules bound");

    let admission = AdmissionFilter::new(allow_list, registry, source_control);
    let state = Arc::new(
        AppState::new(admission, orchestrator).with_forwarded_for(config.trust_forwarded_for),
    );

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(addr = %config.bind, root = %config.targets_root.display(), "Listening for push hooks");

    shipwright_api::serve(listener, state).await?;
    Ok(())
}

/// Print every target with its branch and schedule.
pub async fn list_targets(config: &ServerConfig) -> anyhow::Result<()> {
    let Components {
        source_control,
        registry,
    } = components(config);

    let targets = registry
        .discover()
        .await
        .with_context(|| format!("reading {}", config.targets_root.display()))?;

    if targets.is_empty() {
        println!(
            "{} No targets in {}",
            style("!").yellow(),
            config.targets_root.display()
        );
        return Ok(());
    }

    let header = format!("{:<32} {:<20} {}", "NAME", "BRANCH", "SCHEDULE");
    println!("{}", style(header).bold());
    for target in targets {
        let branch = source_control.current_branch(target.path()).await.ok();
        let schedule = branch
            .as_deref()
            .and_then(|b| target.schedule(b).ok().flatten())
            .map(|spec| spec.expression().to_string());

        println!(
            "{:<32} {:<20} {}",
            target.name(),
            branch.as_deref().unwrap_or("-"),
            schedule.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// Submit `name` to the running daemon, then poll until it finishes.
pub async fn deploy(config: &ServerConfig, name: &str, detach: bool) -> anyhow::Result<()> {
    let client = ApiClient::new(&config.server_url);
    let accepted = client
        .deploy(name)
        .await
        .with_context(|| format!("submitting {} to {}", name, config.server_url))?;

    let verb = match accepted.outcome {
        SubmitOutcome::Started => "Deploying",
        SubmitOutcome::Queued | SubmitOutcome::Replaced => "Queued",
    };
    println!("{} {} {}", style("▶").cyan(), verb, style(name).bold());
    if detach {
        return Ok(());
    }

    let started = Instant::now();
    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let status = client.status(name).await?;
        if status.running || status.pending {
            continue;
        }
        let Some(last) = status.last else { continue };
        if last.sequence <= accepted.completed {
            continue;
        }
        match last.outcome {
            Outcome::Succeeded => {
                println!(
                    "{} Deployed {} in {} ms",
                    style("✓").green(),
                    name,
                    started.elapsed().as_millis()
                );
                return Ok(());
            }
            Outcome::Failed { stage, error } => {
                println!("{} {} failed: {}", style("✗").red(), stage, error);
                bail!("deployment of {} failed", name);
            }
        }
    }
}
