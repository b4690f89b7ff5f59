//! Skywatch scenario simulator CLI
//!
//! Run deterministic overlay scenarios and report pass/fail per seed.

use clap::Parser;
use skywatch_core::{AircraftRegistry, SettingsPatch, Store};
use skywatch_sim::persist::{attach_persistence, load_settings};
use skywatch_sim::scenarios::ScenarioId;
use skywatch_sim::{ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Skywatch deterministic scenario simulator
#[derive(Parser, Debug)]
#[command(name = "skywatch-sim")]
#[command(about = "Run deterministic overlay scenarios for Skywatch", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (cap_station, parked_ramp, dateline, jitter, fog_of_war, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Simulated duration in seconds
    #[arg(short, long, default_value = "60")]
    duration: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export per-frame contact rows to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Settings file, loaded at startup and rewritten on change
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Operator coalition (overrides the settings file)
    #[arg(long)]
    coalition: Option<String>,

    /// Aircraft registry JSON (`{ "<type>": { "natoName": "..." } }`)
    #[arg(long)]
    aircraft: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Skywatch Scenario Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Settings: file (if any), then CLI overrides
    let store = match &args.settings {
        Some(path) => match load_settings(path) {
            Ok(settings) => Store::new(settings),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => Store::new(Default::default()),
    };
    let _persistence = args.settings.as_ref().map(|path| {
        info!("Persisting settings to {}", path.display());
        attach_persistence(&store, path.clone())
    });
    if let Some(coalition) = &args.coalition {
        store.update(SettingsPatch {
            coalition: Some(coalition.clone()),
            ..Default::default()
        });
    }
    let settings = store.get();
    if let Err(e) = settings.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let aircraft = match &args.aircraft {
        Some(path) => {
            let loaded = std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|json| AircraftRegistry::from_json(&json).map_err(|e| e.to_string()));
            match loaded {
                Ok(registry) => Some(registry),
                Err(e) => {
                    eprintln!("Error: failed to load {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            }
        }
        None => None,
    };

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: cap_station, parked_ramp, dateline, jitter, fog_of_war, all");
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        info!("Running with export to: {}", export_path);
        let mut runner = ScenarioRunner::new(base_seed)
            .with_duration(args.duration)
            .with_settings(settings);
        if let Some(registry) = aircraft {
            runner = runner.with_aircraft(registry);
        }
        let (result, export) = runner.run_with_export(scenarios[0]).await;

        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {:?}", e);
        } else {
            info!("Exported {} frames to {}", export.frames.len(), export_path);
        }

        if result.passed {
            info!("✓ {} (seed={}) PASSED", scenarios[0].name(), base_seed);
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    // Run simulations
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let mut runner = ScenarioRunner::new(seed)
            .with_duration(args.duration)
            .with_settings(settings.clone());
        if let Some(registry) = &aircraft {
            runner = runner.with_aircraft(registry.clone());
        }

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "applied": r.metrics.applied,
                    "rejected": r.metrics.rejected,
                    "purged": r.metrics.purged,
                    "max_speed_error_pct": r.metrics.max_speed_error_pct,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
