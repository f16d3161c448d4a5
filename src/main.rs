mod cdp;
mod config;
mod guard;
mod heartbeat;
mod indicators;
mod observe;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// A Rust CLI watchdog that keeps a browser mining session alive:
/// attach to a Chromium tab over the DevTools protocol, watch the
/// page's visible state on a fixed heartbeat, and start the session
/// or reload the page when it goes idle.
#[derive(Parser, Debug)]
#[command(name = "stoker", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "stoker.toml")]
    config: PathBuf,

    /// DevTools websocket URL (overrides config)
    #[arg(long)]
    cdp_url: Option<String>,

    /// Substring of the target page's URL (overrides config)
    #[arg(long)]
    page: Option<String>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-tick observations, guard decisions)
    #[arg(short, long)]
    verbose: bool,

    /// Suppress per-tick status lines, only warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_filter = if verbose {
        "stoker=debug"
    } else if quiet {
        "warn"
    } else {
        "stoker=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!(?cli, "parsed CLI arguments");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let mut config =
        config::load(&cli.config).map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(url) = cli.cdp_url {
        config.page.cdp_url = url;
    }
    if let Some(fragment) = cli.page {
        config.page.url_fragment = fragment;
    }

    if cli.dry_run {
        println!("stoker v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file:   {}", cli.config.display());
        println!("CDP endpoint:  {}", config.page.cdp_url);
        let fragment = if config.page.url_fragment.is_empty() {
            "(first open page)".to_string()
        } else {
            config.page.url_fragment.clone()
        };
        println!("Page:          {fragment}");
        println!(
            "Heartbeat:     every {}s after a {}s startup delay",
            config.heartbeat.interval_secs, config.heartbeat.startup_delay_secs
        );
        println!(
            "Confirmation:  {} polls x {}ms",
            config.confirm.poll_count, config.confirm.poll_interval_ms
        );
        println!("Reload guard:  {}s", config.reload.guard_secs);
        println!("Dry run mode — config validated, not running.");
        return Ok(());
    }

    tracing::info!(cdp_url = %config.page.cdp_url, "stoker starting");
    let probe = cdp::CdpProbe::connect(&config.page.cdp_url, &config.page.url_fragment)
        .await
        .map_err(|e| format!("Failed to attach to browser: {e}"))?;

    let controller = heartbeat::HeartbeatController::new(&config);
    heartbeat::run(
        controller,
        &probe,
        config.heartbeat.startup_delay(),
        config.heartbeat.interval(),
    )
    .await;

    tracing::info!("stoker stopped");
    Ok(())
}
