//! ArtifactDrop command-line entry point.

mod config;
mod history;
mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use artifactdrop_protocol::{ApiExchange, ArtifactKind, ExchangeLogger, Platform};
use artifactdrop_release_api::{ApiToken, Client, filter_apps};
use artifactdrop_transfer::TransferEngine;
use artifactdrop_upload::{UploadEvent, UploadOrchestrator, UploadResult};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::history::{HistoryEntry, UploadHistory};

#[derive(Debug, Parser)]
#[command(author, version, about = "Upload mobile app artifacts to Release Management")]
struct Cli {
    /// API token; overrides the config file.
    #[arg(long, env = "ARTIFACTDROP_API_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Path to the config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API base URL; overrides the config file.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store defaults in the config file.
    Configure {
        /// Default workspace slug for `apps`.
        #[arg(long)]
        workspace: Option<String>,
        /// Default app for `upload` and `check`.
        #[arg(long)]
        app: Option<String>,
        /// Persist the token given by --token or the environment.
        #[arg(long)]
        save_token: bool,
    },
    /// List organizations visible to the token.
    Orgs,
    /// List apps connected to Release Management in a workspace.
    Apps {
        #[arg(long)]
        workspace: Option<String>,
        #[arg(long)]
        platform: Option<Platform>,
        /// Case-insensitive match on app name or project title.
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Verify that the token can reach an app.
    Check {
        #[arg(long)]
        app: Option<String>,
    },
    /// Upload an IPA, APK or AAB and publish its install page.
    Upload {
        file: PathBuf,
        #[arg(long)]
        app: Option<String>,
        /// Defaults to the platform implied by the file extension.
        #[arg(long)]
        platform: Option<Platform>,
        /// Release notes ("what to test").
        #[arg(long)]
        notes: Option<String>,
        /// Status queries before giving up.
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Seconds between status queries.
        #[arg(long)]
        poll_interval: Option<u64>,
    },
    /// Show or clear the local upload history.
    History {
        #[arg(long)]
        clear: bool,
    },
}

/// Resolved configuration plus command-line overrides.
struct CliContext {
    config: AppConfig,
    config_path: PathBuf,
    token: Option<String>,
    api_url: Option<String>,
}

impl CliContext {
    fn load(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => config::default_config_path()?,
        };
        let config = AppConfig::load_from(&config_path)
            .with_context(|| format!("failed to read config {}", config_path.display()))?;
        Ok(Self {
            config,
            config_path,
            token: cli.token.clone().filter(|t| !t.trim().is_empty()),
            api_url: cli.api_url.clone(),
        })
    }

    fn token(&self) -> Result<ApiToken> {
        let token = self
            .token
            .clone()
            .unwrap_or_else(|| self.config.api_token.clone());
        let token = ApiToken::new(token.trim());
        if token.is_empty() {
            bail!(
                "no API token: pass --token, set ARTIFACTDROP_API_TOKEN, or run `artifactdrop configure --save-token`"
            );
        }
        Ok(token)
    }

    fn client(&self) -> Result<Client> {
        let base_url = self
            .api_url
            .as_deref()
            .unwrap_or_else(|| self.config.base_url());
        Ok(Client::new()?
            .with_base_url(base_url)
            .with_logger(exchange_logger()))
    }

    fn app_id(&self, flag: Option<String>) -> Result<String> {
        flag.or_else(|| non_empty(&self.config.last_app_id))
            .ok_or_else(|| anyhow!("no app: pass --app or run `artifactdrop configure --app <id>`"))
    }

    fn history(&self) -> UploadHistory {
        let dir = self.config_path.parent().unwrap_or_else(|| Path::new("."));
        UploadHistory::load(dir.join("history.json"))
    }

    fn save(&self) -> Result<()> {
        self.config.save_to(&self.config_path)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Writes every API exchange to the debug log.
fn exchange_logger() -> ExchangeLogger {
    Arc::new(|exchange: ApiExchange| {
        debug!(
            at = %exchange.timestamp.to_rfc3339(),
            curl = exchange.curl_command.as_deref().unwrap_or(""),
            "api exchange"
        );
        for line in &exchange.lines {
            debug!("  {line}");
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(version = env!("CARGO_PKG_VERSION"), "starting artifactdrop");

    let mut ctx = CliContext::load(&cli)?;

    match cli.command {
        Command::Configure {
            workspace,
            app,
            save_token,
        } => configure(&mut ctx, workspace, app, save_token),
        Command::Orgs => list_orgs(&ctx).await,
        Command::Apps {
            workspace,
            platform,
            search,
        } => list_apps(&ctx, workspace, platform, &search).await,
        Command::Check { app } => check(&ctx, app).await,
        Command::Upload {
            file,
            app,
            platform,
            notes,
            max_attempts,
            poll_interval,
        } => {
            upload(
                &mut ctx,
                UploadArgs {
                    file,
                    app,
                    platform,
                    notes,
                    max_attempts,
                    poll_interval,
                },
            )
            .await
        }
        Command::History { clear } => show_history(&ctx, clear),
    }
}

fn configure(
    ctx: &mut CliContext,
    workspace: Option<String>,
    app: Option<String>,
    save_token: bool,
) -> Result<()> {
    if save_token {
        ctx.config.api_token = ctx.token()?.as_str().to_string();
    }
    if let Some(workspace) = workspace {
        ctx.config.workspace_id = workspace;
    }
    if let Some(app) = app {
        ctx.config.last_app_id = app;
    }
    ctx.save()?;
    info!(path = %ctx.config_path.display(), "configuration saved");

    println!("config:     {}", ctx.config_path.display());
    println!(
        "token:      {}",
        if ctx.config.api_token.is_empty() { "(not set)" } else { "[REDACTED]" }
    );
    println!("workspace:  {}", ctx.config.workspace_id);
    println!("app:        {}", ctx.config.last_app_id);
    println!("api url:    {}", ctx.config.base_url());
    println!(
        "polling:    {} attempts every {}s",
        ctx.config.poll_max_attempts, ctx.config.poll_interval_secs
    );
    Ok(())
}

async fn list_orgs(ctx: &CliContext) -> Result<()> {
    let orgs = ctx.client()?.list_organizations(&ctx.token()?).await?;
    if orgs.is_empty() {
        println!("No organizations found.");
    }
    for org in orgs {
        println!("{}\t{}", org.slug, org.name);
    }
    Ok(())
}

async fn list_apps(
    ctx: &CliContext,
    workspace: Option<String>,
    platform: Option<Platform>,
    search: &str,
) -> Result<()> {
    let workspace = workspace
        .or_else(|| non_empty(&ctx.config.workspace_id))
        .ok_or_else(|| anyhow!("no workspace: pass --workspace or run `artifactdrop configure --workspace <slug>`"))?;

    let apps = ctx
        .client()?
        .list_connected_apps(&ctx.token()?, &workspace)
        .await?;
    let matching = filter_apps(&apps, platform, search);
    if matching.is_empty() {
        println!("No connected apps found.");
    }
    for app in matching {
        match &app.project_title {
            Some(title) => println!("{}\t{}\t{} ({title})", app.id, app.platform, app.app_name),
            None => println!("{}\t{}\t{}", app.id, app.platform, app.app_name),
        }
    }
    Ok(())
}

async fn check(ctx: &CliContext, app: Option<String>) -> Result<()> {
    let app_id = ctx.app_id(app)?;
    let app = ctx
        .client()?
        .get_connected_app(&ctx.token()?, &app_id)
        .await?;
    println!("Connected to {} ({})", app.app_name, app.platform);
    Ok(())
}

struct UploadArgs {
    file: PathBuf,
    app: Option<String>,
    platform: Option<Platform>,
    notes: Option<String>,
    max_attempts: Option<u32>,
    poll_interval: Option<u64>,
}

async fn upload(ctx: &mut CliContext, args: UploadArgs) -> Result<()> {
    let token = ctx.token()?;
    let app_id = ctx.app_id(args.app)?;
    let platform = match args.platform {
        Some(p) => p,
        None => {
            let name = args
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ArtifactKind::from_file_name(&name)
                .map(|kind| kind.platform())
                .map_err(|_| anyhow!("Invalid file type. Please select an IPA, APK, or AAB file."))?
        }
    };

    let mut policy = ctx.config.poll_policy();
    if let Some(n) = args.max_attempts {
        policy.max_attempts = n.max(1);
    }
    if let Some(secs) = args.poll_interval {
        policy.interval = Duration::from_secs(secs);
    }

    let client = ctx.client()?;
    let engine = TransferEngine::new()?.with_logger(exchange_logger());
    let mut orchestrator =
        UploadOrchestrator::new(Arc::new(client), Arc::new(engine)).with_poll_policy(policy);

    let mut events = orchestrator
        .take_events()
        .ok_or_else(|| anyhow!("upload events already taken"))?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                UploadEvent::Progress(p) => eprint!("\r{}", output::progress_line(&p)),
                UploadEvent::StateChanged(state) => debug!(state = %state, "upload state"),
                UploadEvent::Finished(_) => eprintln!(),
            }
        }
    });

    let selected = orchestrator.select_file(&args.file, platform).await?;
    info!(
        file = %selected.artifact.file_name,
        size = %output::format_size(selected.artifact.size),
        sha256 = %selected.sha256,
        app_id = %app_id,
        "uploading"
    );

    let handle = orchestrator.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.cancel() {
                warn!("cancelling upload");
            } else {
                warn!("upload can no longer be cancelled, waiting for processing to finish");
            }
        }
    });

    let result = orchestrator
        .start_upload(&token, &app_id, args.notes.as_deref())
        .await;
    ctrl_c.abort();
    drop(orchestrator);
    let _ = printer.await;

    match result? {
        UploadResult::Cancelled => {
            println!("Upload cancelled.");
            Ok(())
        }
        UploadResult::Completed(outcome) => {
            let mut history = ctx.history();
            let entry = HistoryEntry {
                file_name: selected.artifact.file_name.clone(),
                kind: selected.artifact.kind,
                file_size: selected.artifact.size,
                uploaded_at: Utc::now(),
                success: outcome.success,
                message: outcome.message.clone(),
                sha256: selected.sha256.clone(),
                artifact_id: outcome.artifact_id.clone(),
                app_id: app_id.clone(),
                public_install_url: outcome.public_install_url.clone(),
            };
            if let Err(e) = history.record(entry) {
                warn!(path = %history.path().display(), error = %e, "failed to write history");
            }

            if !outcome.success {
                bail!("{}", outcome.message);
            }

            ctx.config.last_app_id = app_id;
            if let Err(e) = ctx.save() {
                warn!(error = %e, "failed to remember last app");
            }

            println!("{}", outcome.message);
            println!("Artifact ID: {}", outcome.artifact_id);
            match &outcome.public_install_url {
                Some(url) => println!("Install page: {url}"),
                None => println!("Install page: not available yet"),
            }
            Ok(())
        }
    }
}

fn show_history(ctx: &CliContext, clear: bool) -> Result<()> {
    let mut history = ctx.history();
    if clear {
        history.clear()?;
        println!("History cleared.");
        return Ok(());
    }
    if history.entries().is_empty() {
        println!("No uploads yet.");
        return Ok(());
    }
    for entry in history.entries() {
        println!(
            "{}  {:<7}  {}  {} ({})  {}",
            entry.uploaded_at.format("%Y-%m-%d %H:%M"),
            if entry.success { "ok" } else { "failed" },
            entry.app_id,
            entry.file_name,
            output::format_size(entry.file_size),
            entry
                .public_install_url
                .as_deref()
                .unwrap_or(entry.message.as_str())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_upload() {
        let cli = Cli::try_parse_from([
            "artifactdrop",
            "--token",
            "t",
            "upload",
            "build/app.aab",
            "--app",
            "app-1",
            "--platform",
            "android",
            "--max-attempts",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.token.as_deref(), Some("t"));
        match cli.command {
            Command::Upload {
                file,
                app,
                platform,
                max_attempts,
                ..
            } => {
                assert_eq!(file, PathBuf::from("build/app.aab"));
                assert_eq!(app.as_deref(), Some("app-1"));
                assert_eq!(platform, Some(Platform::Android));
                assert_eq!(max_attempts, Some(10));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_unknown_platform() {
        assert!(
            Cli::try_parse_from(["artifactdrop", "apps", "--platform", "windows"]).is_err()
        );
    }

    #[test]
    fn token_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_token":"from-file","last_app_id":"saved"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "artifactdrop",
            "--config",
            path.to_str().unwrap(),
            "--token",
            "from-flag",
            "check",
        ])
        .unwrap();
        let ctx = CliContext::load(&cli).unwrap();
        assert_eq!(ctx.token().unwrap().as_str(), "from-flag");
        assert_eq!(ctx.app_id(None).unwrap(), "saved");
        assert_eq!(ctx.app_id(Some("other".into())).unwrap(), "other");
    }

    #[test]
    fn missing_token_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CliContext {
            config: AppConfig::default(),
            config_path: dir.path().join("config.json"),
            token: None,
            api_url: None,
        };
        assert!(ctx.token().is_err());
        assert!(ctx.app_id(None).is_err());
    }
}
