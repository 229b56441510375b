mod cli;
mod host;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use harbor_common::ConfigError;
use harbor_config::HarborConfig;
use harbor_extensions::{Call, ContextRole, LoadOutcome, MatchPattern, RunAt, ScriptContext};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use cli::Command;
use host::{Host, StdoutContext};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn read_config(path: Option<&Path>) -> Result<HarborConfig, ConfigError> {
    match path {
        Some(path) => {
            let config = harbor_config::toml_loader::load_from_path(path)?;
            harbor_config::validation::validate(&config)?;
            Ok(config)
        }
        None => harbor_config::load_config(),
    }
}

fn load(config: &HarborConfig, dir: Option<&Path>) -> ExitCode {
    if !config.extensions.enabled {
        tracing::info!("Extensions are disabled in config");
        return ExitCode::SUCCESS;
    }
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => match config.extensions.resolved_dir() {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!("No extensions directory: {e}");
                return ExitCode::FAILURE;
            }
        },
    };
    let host = Host::from_config(config);
    let outcomes = host.registry.load_dir(&dir);
    for outcome in &outcomes {
        match outcome {
            LoadOutcome::Loaded {
                id,
                name,
                version,
                profile,
            } => println!("loaded  {id}  {name} {version} ({profile})"),
            LoadOutcome::Failed { path, error } => println!("failed  {}  {error}", path.display()),
        }
    }
    if outcomes.iter().any(|o| matches!(o, LoadOutcome::Failed { .. })) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn match_url(pattern: &str, url: &str) -> ExitCode {
    let compiled = MatchPattern::compile(pattern);
    if !compiled.is_valid() {
        eprintln!("invalid match pattern: {pattern}");
        return ExitCode::FAILURE;
    }
    let matched = compiled.test(url);
    println!("{matched}");
    if matched {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn serve(config: &HarborConfig, extension: &Path, url: Option<&str>) -> ExitCode {
    let mut host = Host::from_config(config);
    host.start_pump();
    let runtime = match host.registry.load(extension) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Extension failed to load: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Serving {} ({})", runtime.manifest().name, runtime.profile());

    let tab = url.map(|url| {
        let tab = host.shell.tabs.new_tab(url);
        for stage in [RunAt::DocumentStart, RunAt::DocumentEnd, RunAt::DocumentIdle] {
            host.registry.inject_content_scripts(tab, url, None, stage);
        }
        tab
    });
    let page: Arc<dyn ScriptContext> = Arc::new(StdoutContext::new(ContextRole::Page, tab, "page"));
    runtime.attach_page(&page);

    let mut in_flight = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match Call::from_json(&line) {
            Some(call) => in_flight.push(runtime.dispatch(call, Arc::clone(&page))),
            None => tracing::warn!("malformed call envelope ignored"),
        }
    }

    // Calls still waiting on a message response get a short grace period.
    for task in in_flight {
        let abort = task.abort_handle();
        if tokio::time::timeout(DRAIN_TIMEOUT, task).await.is_err() {
            abort.abort();
        }
    }
    runtime.detach(page.id());
    host.registry.remove(runtime.id());
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    let loaded = read_config(args.config.as_deref());

    // CLI flag, then the configured level, then the default.
    let log_directive = match (&args.log_level, &loaded) {
        (Some(level), _) => level.clone(),
        (None, Ok(config)) => format!("harbor={}", config.logging.level.as_directive()),
        (None, Err(_)) => "harbor=info".to_string(),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "harbor=info".parse().unwrap()),
            ),
        )
        .init();

    tracing::info!("Harbor v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {}", path.display());
    }
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        HarborConfig::default()
    });

    match args.command {
        Command::Load { dir } => load(&config, dir.as_deref()),
        Command::Match { pattern, url } => match_url(&pattern, &url),
        Command::Serve { extension, url } => serve(&config, &extension, url.as_deref()).await,
    }
}
