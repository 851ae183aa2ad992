//! The gate loop: list once, then test, extract, compare, and report each
//! package in order.

use std::io::{self, Write};
use std::process::ExitCode;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::app::GateConfig;
use crate::coverage::extract_coverage;
use crate::report::{self, OutputFormat, PackageReport, PackageStatus, Summary};
use crate::toolchain::{Toolchain, ToolchainError};

#[derive(Debug, Error)]
pub enum GateError {
    /// The only fatal condition: nothing can be checked without a package list.
    #[error("Error listing packages: {0}")]
    ListPackages(#[source] ToolchainError),
    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub reports: Vec<PackageReport>,
    pub summary: Summary,
}

impl GateOutcome {
    pub fn exit_code(&self) -> ExitCode {
        if self.summary.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        }
    }
}

pub fn run_gate<T, W>(
    toolchain: &T,
    config: &GateConfig,
    out: &mut W,
) -> Result<GateOutcome, GateError>
where
    T: Toolchain + ?Sized,
    W: Write,
{
    let text = config.format == OutputFormat::Text;
    if text {
        writeln!(out, "{}", report::render_header(config.min_coverage))?;
    }

    info!(
        min_coverage = config.min_coverage,
        pattern = %config.packages,
        "Checking package coverage",
    );

    let packages = toolchain
        .list_packages(&config.packages)
        .map_err(GateError::ListPackages)?;
    debug!(count = packages.len(), "Listed packages");

    let mut summary = Summary::default();
    let mut reports = Vec::with_capacity(packages.len());

    for package in packages {
        let status = check_package(toolchain, &package, config);
        summary.record(&status);

        let package_report = PackageReport { package, status };
        if text {
            writeln!(
                out,
                "{}",
                report::render_line(&package_report, config.min_coverage)
            )?;
        }
        reports.push(package_report);
    }

    match config.format {
        OutputFormat::Text => {
            writeln!(out, "{}", report::render_summary(&summary, config.min_coverage))?;
        }
        OutputFormat::Json => {
            let json = report::render_json(&reports, &summary, config.min_coverage)?;
            writeln!(out, "{}", json)?;
        }
    }

    info!(
        measured = summary.measured(),
        passed = summary.passed(),
        "Coverage check finished",
    );

    Ok(GateOutcome { reports, summary })
}

fn check_package<T>(toolchain: &T, package: &str, config: &GateConfig) -> PackageStatus
where
    T: Toolchain + ?Sized,
{
    debug!(package, "Running package tests");

    match toolchain.test_package(package, &config.coverprofile) {
        Ok(output) => {
            let status =
                PackageStatus::from_extraction(extract_coverage(&output), config.min_coverage);
            if let PackageStatus::ParseError { matched, reason } = &status {
                warn!(package, matched = %matched, reason = %reason, "Unparseable coverage");
            }
            status
        }
        Err(err) => {
            warn!(package, error = %err, "Test invocation failed");
            if let Some(output) = err.output() {
                debug!(package, output, "Test invocation output");
            }
            PackageStatus::InvocationError {
                message: err.to_string(),
            }
        }
    }
}
