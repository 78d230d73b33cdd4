mod config;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use pinger_core::{
    decide, resolve_targets, run_cycle, truncate_for_log, CycleReport, HttpProber, ProbeOutcome,
    Scheduler, WebhookDispatcher,
};

use crate::config::AppConfig;

fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");

    if GIT_HASH.is_empty() {
        VERSION
    } else {
        // Built once at startup for clap; lives as long as the process.
        Box::leak(format!("{VERSION} ({GIT_HASH})").into_boxed_str())
    }
}

/// Keep free-tier web services awake and get told when they stop answering.
#[derive(Parser)]
#[command(
    name = "pinger",
    version = version_string(),
    about,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments for the default `serve` command.
    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Args)]
struct ServeArgs {
    /// Listen address (e.g. 0.0.0.0:3000). Overrides config file and PORT.
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Path to TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the HTTP status server (default).
    Serve(ServeArgs),
    /// Probe every target once, print the results and exit.
    Check {
        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Send the resulting notifications to the configured webhooks.
        #[arg(long, default_value_t = false)]
        notify: bool,

        /// Print the cycle report as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve(cli.serve)) {
        Commands::Serve(args) => run_serve(args.listen, args.config.as_deref()).await,
        Commands::Check {
            config,
            notify,
            json,
        } => {
            let code = run_check(config.as_deref(), notify, json).await;
            std::process::exit(code);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, String> {
    AppConfig::load(path, std::env::vars())
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<&Path>) {
    let app_config = match load_config(config_path) {
        Ok(c) => {
            init_tracing(&c.server.log_format);
            if let Some(path) = config_path {
                tracing::info!(path = %path.display(), "Loaded config file");
            }
            c
        }
        Err(e) => {
            init_tracing("pretty");
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let listen = listen_override.unwrap_or_else(|| app_config.server.listen());
    let pinger_config = app_config.pinger.to_pinger_config();

    let scheduler = match Scheduler::from_config(pinger_config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            std::process::exit(1);
        }
    };

    let urls = scheduler.configured_urls();
    let webhooks = scheduler.webhook_urls();
    tracing::info!(
        urls = urls.len(),
        webhooks = webhooks.len(),
        schedule = %scheduler.config().schedule_description(),
        notify_success = scheduler.config().notify_success,
        "OnRender Pinger started"
    );
    for url in &urls {
        tracing::info!(url = %url, "Monitoring");
    }
    for webhook in &webhooks {
        tracing::info!(webhook = %truncate_for_log(webhook), "Webhook configured");
    }

    let timer = Arc::clone(&scheduler).start();
    let state = pinger_api::state::AppState::new(Arc::clone(&scheduler));

    tracing::info!(%listen, "Starting status server");
    let served = pinger_api::serve_with_state(listen, state, pinger_api::shutdown_signal()).await;

    timer.abort();
    if let Err(e) = served {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
}

/// Exit code: 0 when every target answered, 2 when at least one is down,
/// 1 on configuration errors.
async fn run_check(config_path: Option<&Path>, notify: bool, json: bool) -> i32 {
    // Logs go to stderr so `--json` output stays parseable.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let app_config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{}", e);
            return 1;
        }
    };
    let pinger_config = app_config.pinger.to_pinger_config();

    let prober = match HttpProber::from_config(&pinger_config) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return 1;
        }
    };

    let target_count = resolve_targets(&pinger_config.ping_urls).len();
    let spinner = if json {
        ProgressBar::hidden()
    } else {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bar = ProgressBar::new_spinner().with_style(style);
        bar.set_message(format!("Pinging {} target(s)...", target_count));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };

    let report = run_cycle(Arc::new(prober), &pinger_config.ping_urls).await;
    spinner.finish_and_clear();

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize report");
                return 1;
            }
        }
    } else {
        print_report(&report);
    }

    if notify {
        let dispatcher = match WebhookDispatcher::from_config(&pinger_config) {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build webhook client");
                return 1;
            }
        };
        let payloads = decide(&report, pinger_config.notify_success);
        if payloads.is_empty() && !json {
            println!("  {}", style("No notification to send").dim());
        }
        for payload in payloads {
            let summary = dispatcher.dispatch(&payload).await;
            if !json {
                println!(
                    "  {} {} sent: {} delivered, {} failed",
                    style("webhook").dim(),
                    payload.notification_type,
                    summary.delivered,
                    summary.failed
                );
            }
        }
    }

    if report.failed.is_empty() {
        0
    } else {
        2
    }
}

fn print_report(report: &CycleReport) {
    println!(
        "{} {}",
        style("pinger").bold(),
        style(env!("CARGO_PKG_VERSION")).dim()
    );
    println!();

    // Succeeded and failed lists are each in configured order; show failures last.
    for outcome in report.succeeded.iter().chain(report.failed.iter()) {
        println!("  {}", format_outcome(outcome));
    }

    println!();
    let summary = format!("{}/{} apps responding", report.success_count, report.total);
    if report.failed.is_empty() {
        println!("{}", style(summary).green().bold());
    } else {
        println!("{}", style(summary).red().bold());
    }
}

fn format_outcome(outcome: &ProbeOutcome) -> String {
    match (outcome.status_code(), outcome.response_time_ms()) {
        (Some(code), Some(ms)) => format!(
            "{} {:<4} {:>7}  {}",
            style("UP  ").green().bold(),
            code,
            format!("{}ms", ms),
            outcome.url
        ),
        _ => format!(
            "{} {:<4} {:>7}  {}  {}",
            style("DOWN").red().bold(),
            "-",
            "",
            outcome.url,
            style(outcome.error_message().unwrap_or("unknown error")).red()
        ),
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => {
            fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt().with_env_filter(filter).init();
        }
    }
}
