//! omws-check CLI
//!
//! Entry point for the `omws-check` monitoring plugin. Exit codes follow
//! plugin conventions: 0 OK, 1 warning, 2 critical, 3 unknown.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use omws_client::config::{ClientConfig, EffectiveConfig};
use omws_client::host::{HttpTransport, OperationInvoker, ServiceClient};
use omws_client::summary::ExitCode;
use omws_client::timeout::SystemClock;
use omws_client::tracker::ProgressTracker;
use omws_client::ServiceCheck;
use omws_protocol::Ticket;
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "omws-check")]
#[command(about = "Check and drive an OMWS modeling service", version)]
struct Cli {
    /// Service endpoint URL
    #[arg(long, short = 'e', global = true)]
    endpoint: Option<String>,

    /// Output verbosity, 0 (status line only) to 3 (every step)
    #[arg(long, short = 'v', global = true, value_parser = clap::value_parser!(u8).range(0..=3))]
    verbosity: Option<u8>,

    /// Path to config file (default: ~/.config/omws/client.toml if present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Seconds between progress queries
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Wall-clock budget per ticket in seconds
    #[arg(long, global = true)]
    poll_timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Run the full service check (default)
    Check {
        /// Jobs to run, comma-separated (e.g. "create_model,test_model")
        #[arg(long, value_delimiter = ',')]
        jobs: Option<Vec<String>>,

        /// Warn when a configured layer is not advertised
        #[arg(long)]
        verify_layers: bool,

        /// Print the step report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ping the service
    Ping,

    /// Query the progress of a ticket once
    Progress {
        ticket: String,
    },

    /// Poll a ticket until it reaches a terminal state
    Track {
        ticket: String,

        /// Name used in reports
        #[arg(long, default_value = "job")]
        label: String,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Dotted path of a single value, e.g. "poll.timeout_seconds"
        key: Option<String>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version print to stdout and succeed
            let code = if e.use_stderr() {
                ExitCode::Unknown
            } else {
                ExitCode::Ok
            };
            let _ = e.print();
            process::exit(code.as_i32());
        }
    };

    let effective = match EffectiveConfig::build(cli.config.as_deref(), Some(cli_overrides(&cli))) {
        Ok(c) => c,
        Err(e) => exit_with(e.exit_code(), &e.to_string()),
    };
    init_tracing(effective.client.verbosity);

    let command = cli.command.clone().unwrap_or(Commands::Check {
        jobs: None,
        verify_layers: false,
        json: false,
    });

    let code = match command {
        Commands::Config { key } => run_config(&effective, key.as_deref()),
        Commands::Check { json, .. } => run_check(&effective.client, json),
        Commands::Ping => run_ping(&effective.client),
        Commands::Progress { ticket } => run_progress(&effective.client, &ticket),
        Commands::Track { ticket, label } => run_track(&effective.client, &ticket, &label),
    };
    process::exit(code.as_i32());
}

/// Flags given on the command line, as the highest-precedence config layer
fn cli_overrides(cli: &Cli) -> Value {
    let mut layer = Map::new();
    if let Some(endpoint) = &cli.endpoint {
        layer.insert("endpoint".into(), json!(endpoint));
    }
    if let Some(verbosity) = cli.verbosity {
        layer.insert("verbosity".into(), json!(verbosity));
    }

    let mut poll = Map::new();
    if let Some(interval) = cli.poll_interval {
        poll.insert("interval_seconds".into(), json!(interval));
    }
    if let Some(timeout) = cli.poll_timeout {
        poll.insert("timeout_seconds".into(), json!(timeout));
    }
    if !poll.is_empty() {
        layer.insert("poll".into(), Value::Object(poll));
    }

    if let Some(Commands::Check {
        jobs,
        verify_layers,
        ..
    }) = &cli.command
    {
        let mut check = Map::new();
        if let Some(jobs) = jobs {
            check.insert("jobs".into(), json!(jobs));
        }
        if *verify_layers {
            check.insert("verify_layers".into(), json!(true));
        }
        if !check.is_empty() {
            layer.insert("check".into(), Value::Object(check));
        }
    }

    Value::Object(layer)
}

/// RUST_LOG wins; otherwise the level follows the verbosity
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn exit_with(code: ExitCode, message: &str) -> ! {
    println!("{}: {}", code, message);
    process::exit(code.as_i32());
}

fn build_client(config: &ClientConfig) -> ServiceClient {
    let http = match config.http_config() {
        Ok(h) => h,
        Err(e) => exit_with(e.exit_code(), &e.to_string()),
    };
    let transport = match HttpTransport::new(http) {
        Ok(t) => t,
        Err(e) => exit_with(ExitCode::Unknown, &e.to_string()),
    };
    let invoker = match OperationInvoker::with_policy(
        Arc::new(transport),
        config.retry.clone(),
        Arc::new(SystemClock),
    ) {
        Ok(i) => i,
        Err(e) => exit_with(ExitCode::Unknown, &e.to_string()),
    };
    ServiceClient::new(invoker)
}

fn run_config(effective: &EffectiveConfig, key: Option<&str>) -> ExitCode {
    if let Some(key) = key {
        return match effective.get(key) {
            Some(Value::String(s)) => {
                println!("{}", s);
                ExitCode::Ok
            }
            Some(value) => {
                println!("{}", value);
                ExitCode::Ok
            }
            None => exit_with(ExitCode::Unknown, &format!("No config value at {}", key)),
        };
    }

    match effective.to_json() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::Ok
        }
        Err(e) => exit_with(ExitCode::Unknown, &format!("Error serializing config: {}", e)),
    }
}

fn run_check(config: &ClientConfig, json: bool) -> ExitCode {
    let client = build_client(config);
    let started = Instant::now();
    let results = ServiceCheck::new(&client, &SystemClock, config).run();

    if json {
        match serde_json::to_string_pretty(&results.to_json()) {
            Ok(report) => println!("{}", report),
            Err(e) => exit_with(ExitCode::Unknown, &format!("Error serializing report: {}", e)),
        }
        return results.exit_code();
    }

    if config.verbosity >= 3 {
        for step in results.steps.iter().filter(|s| s.status.is_ok()) {
            match &step.detail {
                Some(detail) => println!("{}: OK ( {} )", step.step, detail),
                None => println!("{}: OK", step.step),
            }
        }
        println!("Finished test in {} seconds", started.elapsed().as_secs());
    }
    println!("{}", results.status_line());
    results.exit_code()
}

fn run_ping(config: &ClientConfig) -> ExitCode {
    let client = build_client(config);
    let verbose = config.verbosity > 1;
    match client.ping() {
        Ok(true) => {
            println!("OK");
            ExitCode::Ok
        }
        Ok(false) => exit_with(ExitCode::Critical, "Service unavailable"),
        Err(e) => exit_with(e.exit_code(), &e.report(verbose)),
    }
}

fn parse_ticket(raw: &str) -> Ticket {
    match Ticket::new(raw) {
        Some(t) => t,
        None => exit_with(ExitCode::Unknown, "Ticket must not be empty"),
    }
}

fn run_progress(config: &ClientConfig, raw: &str) -> ExitCode {
    let client = build_client(config);
    let ticket = parse_ticket(raw);
    match client.get_progress(&ticket) {
        Ok(progress) => {
            println!("{}", progress.code());
            ExitCode::Ok
        }
        Err(e) => exit_with(e.exit_code(), &e.report(config.verbosity > 1)),
    }
}

fn run_track(config: &ClientConfig, raw: &str, label: &str) -> ExitCode {
    let client = build_client(config);
    let ticket = parse_ticket(raw);
    let tracker = ProgressTracker::new(&client, &SystemClock, config.poll);

    match tracker.track(&ticket, label) {
        Ok(report) => {
            if config.verbosity >= 3 {
                println!("Finished {}", report.ticket);
            }
            println!("OK");
            ExitCode::Ok
        }
        Err(e) => exit_with(e.exit_code(), &e.report(config.verbosity > 1)),
    }
}
