use std::{
    ffi::OsStr,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::{
    gate::{self, GateError},
    report::{self, OutputFormat},
    toolchain::CommandToolchain,
};

/// Long option names that may also be spelled with a single dash, as in
/// `-min-coverage 80`.
const SINGLE_DASH_OPTIONS: &[&str] = &[
    "min-coverage",
    "toolchain",
    "packages",
    "coverprofile",
    "format",
    "no-color",
    "verbose",
];

#[derive(Parser, Debug, Clone)]
#[command(
    name = "coverage_gate",
    author,
    version,
    about = "Run package tests with coverage and fail when any package is below the threshold",
    long_about = None
)]
pub struct Args {
    /// Minimum test coverage percentage required per package
    #[arg(
        long,
        env = "COVERAGE_GATE_MIN",
        default_value_t = 70.0,
        allow_negative_numbers = true
    )]
    pub min_coverage: f64,

    /// Toolchain program providing `list` and `test` subcommands
    #[arg(long, env = "COVERAGE_GATE_TOOLCHAIN", default_value = "go")]
    pub toolchain: String,

    /// Package pattern handed to `<toolchain> list`
    #[arg(long, env = "COVERAGE_GATE_PACKAGES", default_value = "./app/...")]
    pub packages: String,

    /// Coverage profile file written by each test run
    #[arg(
        long,
        value_name = "PATH",
        env = "COVERAGE_GATE_COVERPROFILE",
        default_value = "coverage.out"
    )]
    pub coverprofile: PathBuf,

    /// Output format (text or json)
    #[arg(long, env = "COVERAGE_GATE_FORMAT", default_value = "text")]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub min_coverage: f64,
    pub toolchain: String,
    pub packages: String,
    pub coverprofile: PathBuf,
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_coverage: 70.0,
            toolchain: "go".to_string(),
            packages: "./app/...".to_string(),
            coverprofile: PathBuf::from("coverage.out"),
            format: OutputFormat::Text,
            color: true,
        }
    }
}

impl From<Args> for GateConfig {
    fn from(value: Args) -> Self {
        Self {
            min_coverage: value.min_coverage,
            toolchain: value.toolchain,
            packages: value.packages,
            coverprofile: value.coverprofile,
            format: value.format,
            color: color_enabled(value.no_color, std::env::var_os("NO_COLOR").as_deref()),
        }
    }
}

/// Styling stays on when stdout is piped, as CI logs render ANSI codes.
/// `--no-color` or a non-empty `NO_COLOR` turns it off.
pub fn color_enabled(no_color_flag: bool, no_color_env: Option<&OsStr>) -> bool {
    !no_color_flag && no_color_env.map_or(true, OsStr::is_empty)
}

/// Rewrite `-min-coverage`-style options to their `--` form so clap accepts them.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            let Some(rest) = arg.strip_prefix('-').filter(|rest| !rest.starts_with('-')) else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_OPTIONS.contains(&name) {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

/// Logs go to stderr; stdout carries only the report.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run(config: GateConfig) -> Result<ExitCode> {
    colored::control::set_override(config.color);

    let toolchain = CommandToolchain::new(&config.toolchain);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let exit_code = match gate::run_gate(&toolchain, &config, &mut out) {
        Ok(outcome) => outcome.exit_code(),
        Err(GateError::ListPackages(source)) => {
            if let Some(output) = source.output() {
                warn!(output, "Package listing output");
            }
            let err = GateError::ListPackages(source);
            let message = match config.format {
                OutputFormat::Text => err.to_string(),
                OutputFormat::Json => report::render_json_error(&err.to_string())
                    .context("failed to encode listing error")?,
            };
            writeln!(out, "{}", message).context("failed to write listing error")?;
            ExitCode::from(1)
        }
        Err(err) => return Err(err.into()),
    };

    out.flush().context("failed to flush report")?;
    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn normalize_args__single_dash_long_option__then_doubles_dash() {
        let normalized = normalize_args(strings(&[
            "coverage_gate",
            "-min-coverage",
            "80",
            "-format=json",
            "-v",
            "--no-color",
        ]));
        assert_eq!(
            normalized,
            strings(&[
                "coverage_gate",
                "--min-coverage",
                "80",
                "--format=json",
                "-v",
                "--no-color",
            ])
        );
    }

    #[test]
    fn normalize_args__negative_value__then_left_untouched() {
        let normalized = normalize_args(strings(&["coverage_gate", "-min-coverage", "-5"]));
        assert_eq!(normalized, strings(&["coverage_gate", "--min-coverage", "-5"]));
    }

    #[test]
    fn args__no_options__then_uses_defaults() {
        let args = Args::try_parse_from(["coverage_gate"]).expect("parse defaults");
        let config = GateConfig::from(args);

        assert_eq!(config.min_coverage, 70.0);
        assert_eq!(config.toolchain, "go");
        assert_eq!(config.packages, "./app/...");
        assert_eq!(config.coverprofile, PathBuf::from("coverage.out"));
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(
            config.color,
            color_enabled(false, std::env::var_os("NO_COLOR").as_deref())
        );
    }

    #[test]
    fn color_enabled__no_flag_and_no_env__then_stays_on() {
        assert!(color_enabled(false, None));
        assert!(color_enabled(false, Some(OsStr::new(""))));
    }

    #[test]
    fn color_enabled__flag_or_no_color_env__then_turns_off() {
        assert!(!color_enabled(true, None));
        assert!(!color_enabled(false, Some(OsStr::new("1"))));
    }

    #[test]
    fn args__go_style_threshold__then_parses_after_normalizing() {
        let argv = normalize_args(strings(&["coverage_gate", "-min-coverage", "85.5"]));
        let args = Args::try_parse_from(argv).expect("parse threshold");
        assert_eq!(args.min_coverage, 85.5);
    }

    #[test]
    fn args__out_of_range_threshold__then_accepted_as_is() {
        let args = Args::try_parse_from(["coverage_gate", "--min-coverage", "-5"])
            .expect("negative threshold");
        assert_eq!(args.min_coverage, -5.0);

        let args = Args::try_parse_from(["coverage_gate", "--min-coverage", "150"])
            .expect("threshold above 100");
        assert_eq!(args.min_coverage, 150.0);
    }

    #[test]
    fn args__non_numeric_threshold__then_rejected() {
        assert!(Args::try_parse_from(["coverage_gate", "--min-coverage", "high"]).is_err());
    }

    #[test]
    fn gate_config__from_args__then_converts_all_fields() {
        let args = Args {
            min_coverage: 55.0,
            toolchain: "/opt/go/bin/go".to_string(),
            packages: "./internal/...".to_string(),
            coverprofile: PathBuf::from("out/cover.out"),
            format: OutputFormat::Json,
            no_color: true,
            verbose: true,
        };

        let config = GateConfig::from(args);

        assert_eq!(config.min_coverage, 55.0);
        assert_eq!(config.toolchain, "/opt/go/bin/go");
        assert_eq!(config.packages, "./internal/...");
        assert_eq!(config.coverprofile, PathBuf::from("out/cover.out"));
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.color);
    }

    #[test]
    fn init_tracing__called_twice__then_second_call_is_ignored() {
        init_tracing(false);
        init_tracing(true);
    }
}
