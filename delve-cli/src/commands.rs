//! CLI subcommand handlers.

use crate::render;
use crate::{Commands, ConfigAction, ResearchArgs};
use anyhow::Context;
use delve_core::config::{DelveConfig, load_config, to_toml_string};
use delve_core::error::ResearchError;
use delve_core::providers::create_provider;
use delve_core::research::{
    FileSessionRecorder, ResearchCallback, ResearchEngine, ResearchPhase, ResearchReport,
    ResearchState, list_sessions, load_session,
};
use delve_tools::{GoogleSearchGateway, HttpContentFetcher};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Research(args) => handle_research(args, workspace, quiet).await,
        Commands::Sessions { id: None } => handle_sessions(workspace),
        Commands::Sessions { id: Some(id) } => handle_session(workspace, id),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load_workspace_config(workspace: &Path) -> anyhow::Result<DelveConfig> {
    load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut DelveConfig, args: &ResearchArgs) {
    if let Some(provider) = &args.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if args.no_session {
        config.session.enabled = false;
    }
}

async fn handle_research(
    args: ResearchArgs,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("The research query must not be empty");
    }

    let mut config = load_workspace_config(workspace)?;
    apply_overrides(&mut config, &args);
    for warning in config.llm.validate() {
        warn!(warning = %warning, "LLM configuration");
    }
    config
        .research
        .validate()
        .context("Invalid research configuration")?;

    let provider = create_provider(&config.llm).context("Failed to initialize LLM provider")?;
    let search = GoogleSearchGateway::from_config(&config.search)
        .context("Failed to initialize search gateway")?;
    let fetcher = HttpContentFetcher::from_config(&config.fetch)
        .context("Failed to initialize content fetcher")?;

    let mut engine = ResearchEngine::new(
        provider,
        Arc::new(search),
        Arc::new(fetcher),
        config.research.clone(),
    )
    .with_generation(config.llm.temperature, Some(config.llm.max_tokens))
    .with_callback(Arc::new(CliProgress {
        quiet,
        to_stderr: args.json,
    }));

    let session_dir = config.session.resolved_directory();
    if config.session.enabled {
        engine = engine.with_recorder(Arc::new(FileSessionRecorder::new(&session_dir)));
    }

    let (report, state) = engine.run_with_state(query).await;
    let degraded = state.report.is_none();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::report_block(&report, degraded, render::REPORT_WIDTH));
        if config.session.enabled && !quiet {
            println!(
                "Session {} recorded under {}",
                state.session_id(),
                session_dir.display()
            );
        }
    }
    Ok(())
}

fn handle_sessions(workspace: &Path) -> anyhow::Result<()> {
    let config = load_workspace_config(workspace)?;
    let dir = config.session.resolved_directory();
    let sessions = list_sessions(&dir);
    if sessions.is_empty() {
        println!("No recorded sessions under {}", dir.display());
    } else {
        print!("{}", render::sessions_table(&sessions));
    }
    Ok(())
}

fn handle_session(workspace: &Path, id: Uuid) -> anyhow::Result<()> {
    let config = load_workspace_config(workspace)?;
    let dir = config.session.resolved_directory();
    let state = load_session(&dir, id)
        .with_context(|| format!("Failed to load session {} from {}", id, dir.display()))?;
    print!("{}", session_block(&state));
    Ok(())
}

/// A recorded run without a report renders like a degraded run.
fn session_block(state: &ResearchState) -> String {
    match &state.report {
        Some(report) => render::report_block(report, false, render::REPORT_WIDTH),
        None => render::report_block(
            &ResearchReport::degraded(state),
            true,
            render::REPORT_WIDTH,
        ),
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".delve");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = to_toml_string(&DelveConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_workspace_config(workspace)?;
            println!("{}", to_toml_string(&config)?);
            Ok(())
        }
    }
}

/// Prints phase and progress lines. They go to stderr when stdout carries JSON.
struct CliProgress {
    quiet: bool,
    to_stderr: bool,
}

impl CliProgress {
    fn emit(&self, line: String) {
        if self.to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

impl ResearchCallback for CliProgress {
    fn on_phase_change(&self, phase: ResearchPhase) {
        if !self.quiet {
            self.emit(format!("\x1b[36m[{}]\x1b[0m {}", phase, phase_label(phase)));
        }
    }

    fn on_progress(&self, message: &str) {
        if !self.quiet {
            self.emit(format!("\x1b[90m  {}\x1b[0m", message));
        }
    }

    fn on_degraded(&self, error: &ResearchError) {
        eprintln!(
            "\x1b[33m[degraded]\x1b[0m Research stopped early: {}",
            error
        );
    }
}

fn phase_label(phase: ResearchPhase) -> &'static str {
    match phase {
        ResearchPhase::Searching => "Running initial searches...",
        ResearchPhase::Planning => "Planning the investigation...",
        ResearchPhase::Investigating => "Investigating research questions...",
        ResearchPhase::Synthesizing => "Synthesizing the report...",
    }
}
