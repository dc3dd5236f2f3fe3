//! polisee-runner: headless runner for policy simulations.
//!
//! Usage:
//!   polisee-runner --policy food_price_ceiling --param price_cap=4 --steps 24 --seed 7
//!   polisee-runner --policy none --json
//!   polisee-runner --ipc-mode

use anyhow::{Context, Result};
use polisee_core::{
    config::SimConfig,
    policy::PolicyParams,
    request::{simulate, SimulationRequest, SimulationResponse, DEFAULT_STEPS},
};
use std::env;
use std::io::{self, BufRead, Write};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let json = args.iter().any(|a| a == "--json");
    let data_dir = flag_value(&args, "--data-dir");

    let config = match data_dir {
        Some(dir) => SimConfig::load(dir)?,
        None => SimConfig::default(),
    };

    if ipc_mode {
        return run_ipc_loop(&config);
    }

    let request = SimulationRequest {
        policy_type: flag_value(&args, "--policy").unwrap_or("none").to_string(),
        params: parse_params(&args)?,
        steps: parse_flag(&args, "--steps")?.unwrap_or(DEFAULT_STEPS),
        seed: parse_flag(&args, "--seed")?,
    };

    let response = simulate(&request, &config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_summary(&request, &response);
    }
    Ok(())
}

/// One JSON request per stdin line, one JSON response (or error) per stdout line.
fn run_ipc_loop(config: &SimConfig) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<SimulationRequest>(&buffer) {
            Ok(request) => match simulate(&request, config) {
                Ok(response) => serde_json::to_value(&response)?,
                Err(e) => {
                    log::warn!("ipc: {} failed: {e}", request.policy_type);
                    serde_json::json!({ "error": e.to_string() })
                }
            },
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(request: &SimulationRequest, response: &SimulationResponse) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:      {}", response.run_id);
    println!("  policy:      {}", request.policy_type);
    println!("  seed:        {}", response.seed);
    println!("  steps:       {}", response.history.len());
    if let Some(last) = response.history.last() {
        println!("  avg price:   {:.2}", last.avg_price);
        println!("  gini:        {:.3}", last.gini);
        println!("  compliance:  {:.1}%", last.compliance_rate * 100.0);
        println!("  avg stress:  {:.3}", last.avg_stress);
    }

    println!();
    println!("=== NEIGHBORHOODS ===");
    for (name, nb) in &response.neighborhoods {
        println!("  {name:<16} price {:>8.2} | supply {:>10.1}", nb.price, nb.supply);
    }

    let analysis = &response.analysis;
    println!();
    println!("=== ANALYSIS ===");
    println!(
        "  UCI: {:.3} ({})",
        analysis.unintended_consequence_index,
        analysis.band.as_str()
    );
    if analysis.alerts.is_empty() {
        println!("  (No alerts)");
    }
    for alert in &analysis.alerts {
        println!("  [{:?}] {}: {}", alert.severity, alert.kind, alert.mechanism);
    }

    println!();
    println!("{}", response.explanation.layman);
    for rec in &response.recommendations {
        println!("  - {rec}");
    }
}

/// Collect every `--param name=value` pair.
fn parse_params(args: &[String]) -> Result<PolicyParams> {
    let mut params = PolicyParams::new();
    for pair in args.windows(2).filter(|w| w[0] == "--param").map(|w| &w[1]) {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("--param expects name=value, got {pair}"))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("--param {name}: {value} is not a number"))?;
        params.insert(name.to_string(), value);
    }
    Ok(params)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

/// Parse a flag's value when present; a malformed value is an error.
fn parse_flag<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    flag_value(args, flag)
        .map(|s| s.parse::<T>().with_context(|| format!("invalid {flag} {s}")))
        .transpose()
}
