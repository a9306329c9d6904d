mod scenarios;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use tidehold_game::{GameMode, StartupConfig};

use scenarios::{SCENARIOS, ScenarioCtx, get_scenario};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum NetRole {
    /// Local single-player process
    #[default]
    Single,
    /// Networked session host
    Host,
    /// Networked session client
    Client,
}

impl From<NetRole> for GameMode {
    fn from(value: NetRole) -> Self {
        match value {
            NetRole::Single => Self::SinglePlayer,
            NetRole::Host => Self::NetworkHost,
            NetRole::Client => Self::NetworkClient,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "tidehold-tester", version)]
#[command(about = "Headless QA harness for the Tidehold campaign core")]
struct Args {
    /// Scenarios to run (comma-separated)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Scratch directory for save files (defaults to a temp dir)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    // Startup flags mirrored into the controller configuration.
    /// Run the (absent) display fullscreen; recorded for the core
    #[arg(long)]
    fullscreen: bool,

    /// One-mouse-button UI mode
    #[arg(long)]
    one_mouse_button: bool,

    /// Touch-style UI without a pointer
    #[arg(long)]
    mobile_ui: bool,

    /// Network role for the session
    #[arg(long, value_enum, default_value_t = NetRole::Single)]
    net_role: NetRole,
}

fn split_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "info" } else { "warn" }),
    )
    .init();

    if args.list_scenarios {
        for scenario in SCENARIOS {
            println!("{:<20} {}", scenario.name.bold(), scenario.description);
        }
        return Ok(());
    }

    let config = StartupConfig {
        fullscreen: args.fullscreen,
        one_mouse_button: args.one_mouse_button,
        mobile_ui: args.mobile_ui,
        mode: args.net_role.into(),
    };

    let save_root = match &args.save_dir {
        Some(dir) => dir.clone(),
        None => std::env::temp_dir().join(format!("tidehold-tester-{}", std::process::id())),
    };
    std::fs::create_dir_all(&save_root).context("creating the save root")?;
    log::info!("save root: {}", save_root.display());

    let seeds: Vec<u64> = split_csv(&args.seeds)
        .iter()
        .map(|s| s.parse().with_context(|| format!("bad seed: {s}")))
        .collect::<Result<_>>()?;

    let mut failures = 0usize;
    let mut records = Vec::new();
    for name in split_csv(&args.scenarios) {
        let Some(scenario) = get_scenario(&name) else {
            eprintln!("{} unknown scenario: {name}", "ERROR".red().bold());
            failures += 1;
            continue;
        };
        for seed in &seeds {
            let ctx = ScenarioCtx {
                seed: *seed,
                config,
                save_dir: save_root.join(format!("{name}-{seed}")),
            };
            let started = Instant::now();
            let result = (scenario.run)(&ctx);
            let elapsed = started.elapsed();
            match &result {
                Ok(()) => {
                    println!("{} {name} (seed {seed}, {elapsed:.1?})", "PASS".green().bold());
                }
                Err(err) => {
                    failures += 1;
                    println!("{} {name} (seed {seed}): {err:#}", "FAIL".red().bold());
                }
            }
            records.push(serde_json::json!({
                "scenario": name,
                "seed": seed,
                "pass": result.is_ok(),
                "duration_ms": elapsed.as_millis() as u64,
                "error": result.err().map(|e| format!("{e:#}")),
            }));
        }
    }

    if args.report == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }

    if failures > 0 {
        anyhow::bail!("{failures} scenario run(s) failed");
    }
    Ok(())
}
