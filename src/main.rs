//! Battery dispatch optimizer entry point — CLI wiring and config-driven
//! controller construction.

use std::path::Path;
use std::process;

use chrono::{DateTime, Utc};

use bess_arb::config::DispatchConfig;
use bess_arb::controller::RollingHorizonController;
use bess_arb::io::export::export_csv;
use bess_arb::io::prices::load_markets;
use bess_arb::market::Market;
use bess_arb::trace::TraceSummary;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    prices_path: Option<String>,
    start: Option<DateTime<Utc>>,
    cycles_override: Option<usize>,
    trace_out: Option<String>,
}

fn print_help() {
    eprintln!("bess-arb — rolling-horizon battery dispatch optimizer");
    eprintln!();
    eprintln!("Usage: bess-arb --prices <path> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --prices <path>    Long-format price CSV (time,market,price[,availability])");
    eprintln!("  --config <path>    Load run configuration from TOML file");
    eprintln!("  --start <rfc3339>  First cycle start time (default: start of price data)");
    eprintln!("  --cycles <n>       Override the configured cycle count");
    eprintln!("  --trace-out <path> Export the dispatch trace to CSV");
    eprintln!("  --help             Show this help message");
    eprintln!();
    eprintln!("If no --config is given, the baseline configuration is used.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        prices_path: None,
        start: None,
        cycles_override: None,
        trace_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    process::exit(1);
                }
                cli.config_path = Some(args[i].clone());
            }
            "--prices" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --prices requires a path argument");
                    process::exit(1);
                }
                cli.prices_path = Some(args[i].clone());
            }
            "--start" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --start requires an RFC 3339 timestamp");
                    process::exit(1);
                }
                match DateTime::parse_from_rfc3339(&args[i]) {
                    Ok(t) => cli.start = Some(t.with_timezone(&Utc)),
                    Err(_) => {
                        eprintln!(
                            "error: --start value \"{}\" is not a valid RFC 3339 timestamp",
                            args[i]
                        );
                        process::exit(1);
                    }
                }
            }
            "--cycles" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --cycles requires a count argument");
                    process::exit(1);
                }
                if let Ok(n) = args[i].parse::<usize>() {
                    cli.cycles_override = Some(n);
                } else {
                    eprintln!("error: --cycles value \"{}\" is not a valid count", args[i]);
                    process::exit(1);
                }
            }
            "--trace-out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --trace-out requires a path argument");
                    process::exit(1);
                }
                cli.trace_out = Some(args[i].clone());
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Matches configured market names against the loaded price data.
fn select_markets(config: &DispatchConfig, loaded: Vec<Market>) -> Vec<Market> {
    let mut selected = Vec::with_capacity(config.markets.len());
    for market_cfg in &config.markets {
        match loaded.iter().find(|m| m.name == market_cfg.name) {
            Some(market) => selected.push(market.clone()),
            None => {
                eprintln!(
                    "error: configured market \"{}\" not found in price data",
                    market_cfg.name
                );
                process::exit(1);
            }
        }
    }
    selected
}

fn main() {
    let cli = parse_args();

    let mut config = if let Some(ref path) = cli.config_path {
        match DispatchConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        DispatchConfig::baseline()
    };

    if let Some(cycles) = cli.cycles_override {
        config.controller.cycles = cycles;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let Some(ref prices_path) = cli.prices_path else {
        eprintln!("error: --prices is required");
        print_help();
        process::exit(1);
    };
    let loaded = match load_markets(Path::new(prices_path)) {
        Ok(markets) => markets,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let markets = select_markets(&config, loaded);

    // Default start: the earliest time every configured market has a price.
    let start = cli.start.unwrap_or_else(|| {
        markets
            .iter()
            .filter_map(Market::first_timestamp)
            .max()
            .unwrap_or_else(|| {
                eprintln!("error: price data is empty");
                process::exit(1);
            })
    });

    let asset = config.to_asset_parameters();
    let energy_capacity_mwh = asset.energy_capacity_mwh();
    let dt_hours = config.horizon.step_minutes as f64 / 60.0;

    let mut controller = RollingHorizonController::new(
        asset,
        markets,
        config.to_tariffs(),
        config.horizon.steps,
        config.step(),
        config.asset.initial_soc,
        config.controller.target_soc,
        config.solve_options(),
    );

    if let Err(e) = controller.run(start, config.controller.cycles) {
        eprintln!("{e}");
        process::exit(1);
    }

    for record in controller.trace().records() {
        println!("{record}");
    }

    let summary = TraceSummary::from_trace(controller.trace(), dt_hours, energy_capacity_mwh);
    println!("\n{summary}");

    if let Some(ref path) = cli.trace_out {
        if let Err(e) = export_csv(Path::new(path), controller.trace()) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Trace written to {path}");
    }
}
