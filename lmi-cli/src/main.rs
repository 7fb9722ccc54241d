//! lmi-cli: search for LMI stability certificates from the command line.

mod solver_choice;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lmi_cert::{solve_lmi, CertificateSettings, LmiRequest, LmiResult};
use serde::Serialize;

use solver_choice::SolverChoice;

#[derive(Parser, Debug)]
#[command(name = "lmi-cli", version, about = "LMI stability certificate search")]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a request read from a JSON file
    Solve {
        /// Request file
        path: PathBuf,

        /// Backend (defaults to LMI_BACKEND, then auto)
        #[arg(long, value_enum)]
        backend: Option<SolverChoice>,

        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },
    /// Solve the built-in two-state example
    Demo {
        /// Search for the D certificate instead of H
        #[arg(long)]
        d_mode: bool,

        #[arg(long, value_enum)]
        backend: Option<SolverChoice>,

        #[arg(long)]
        pretty: bool,
    },
}

/// Result plus the state values the caller sent along.
#[derive(Serialize)]
struct Response<'a> {
    state_values: &'a BTreeMap<String, f64>,
    #[serde(flatten)]
    result: &'a LmiResult,
}

fn demo_request(use_d_constraint: bool) -> LmiRequest {
    LmiRequest {
        state_values: BTreeMap::from([("x1".to_string(), 1.0), ("x2".to_string(), -0.5)]),
        matrix_a: vec![vec![-1.0, 0.0], vec![0.0, -1.0]],
        matrix_b: vec![vec![1.0], vec![0.0]],
        matrix_q: vec![1.0, 1.0],
        alpha_min: 0.1,
        alpha_max: 10.0,
        n: 2,
        lambda_val: 0.5,
        use_d_constraint,
    }
}

fn read_request(path: &Path) -> Result<LmiRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse request {}", path.display()))
}

fn settings_for(backend: Option<SolverChoice>, verbose: u8) -> CertificateSettings {
    let mut settings = if verbose > 0 {
        CertificateSettings::verbose()
    } else {
        CertificateSettings::default()
    };
    if let Some(choice) = backend {
        settings = settings.with_backend(choice.into());
    }
    settings
}

fn run(request: &LmiRequest, settings: &CertificateSettings, pretty: bool) -> Result<()> {
    let result = solve_lmi(request, settings).context("invalid request")?;
    if !result.feasible {
        log::warn!("no {} certificate found", result.mode);
    }

    let response = Response {
        state_values: &request.state_values,
        result: &result,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", json);
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Solve { path, backend, pretty } => {
            let request = read_request(&path)?;
            run(&request, &settings_for(backend, cli.verbose), pretty)
        }
        Command::Demo { d_mode, backend, pretty } => {
            run(&demo_request(d_mode), &settings_for(backend, cli.verbose), pretty)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use lmi_cert::BackendChoice;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_solve_arguments() {
        let cli = Cli::parse_from(["lmi-cli", "-vv", "solve", "req.json", "--backend", "operator-splitting"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Solve { path, backend, pretty } => {
                assert_eq!(path, PathBuf::from("req.json"));
                assert_eq!(backend, Some(SolverChoice::OperatorSplitting));
                assert!(!pretty);
            }
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn test_backend_flag_overrides_default() {
        let settings = settings_for(Some(SolverChoice::InteriorPoint), 0);
        assert_eq!(settings.backend, BackendChoice::InteriorPoint);
        assert!(settings_for(None, 1).solver.verbose);
    }

    #[test]
    fn test_response_echoes_state_values() {
        let request = demo_request(false);
        let result = solve_lmi(&request, &CertificateSettings::default()).unwrap();
        let json = serde_json::to_value(Response {
            state_values: &request.state_values,
            result: &result,
        })
        .unwrap();
        assert_eq!(json["state_values"]["x1"], 1.0);
        assert_eq!(json["mode"], "h_mode");
        assert_eq!(json["feasible"], result.feasible);
        assert!(json.get("outcome").is_some());
    }
}
