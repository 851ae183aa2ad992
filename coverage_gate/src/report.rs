//! Per-package results, running totals, and their text and JSON renderings.

use colored::Colorize;
use serde::Serialize;

use crate::coverage::Extraction;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format '{}'. Use 'text' or 'json'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PackageStatus {
    Passed { coverage: f64 },
    Failed { coverage: f64 },
    NoTests,
    InvocationError { message: String },
    ParseError { matched: String, reason: String },
}

impl PackageStatus {
    pub fn from_extraction(extraction: Extraction, min_coverage: f64) -> Self {
        match extraction {
            Extraction::NoTests => Self::NoTests,
            Extraction::Unparseable { matched, reason } => Self::ParseError { matched, reason },
            Extraction::Measured(coverage) if coverage >= min_coverage => {
                Self::Passed { coverage }
            }
            Extraction::Measured(coverage) => Self::Failed { coverage },
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Passed { .. } => "ok",
            Self::Failed { .. } => "fail",
            Self::NoTests => "no_tests",
            Self::InvocationError { .. } => "error",
            Self::ParseError { .. } => "parse_error",
        }
    }

    pub fn coverage(&self) -> Option<f64> {
        match self {
            Self::Passed { coverage } | Self::Failed { coverage } => Some(*coverage),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::InvocationError { .. } | Self::ParseError { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageReport {
    pub package: String,
    pub status: PackageStatus,
}

/// Running totals across the packages checked so far.
///
/// Every measured coverage counts towards the average, including the ones
/// below the threshold. Packages without tests and packages that errored
/// contribute nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    total_coverage: f64,
    measured: usize,
    failed: bool,
}

impl Summary {
    pub fn record(&mut self, status: &PackageStatus) {
        if let Some(coverage) = status.coverage() {
            self.total_coverage += coverage;
            self.measured += 1;
        }
        if status.is_failure() {
            self.failed = true;
        }
    }

    pub fn measured(&self) -> usize {
        self.measured
    }

    pub fn average(&self) -> Option<f64> {
        if self.measured == 0 {
            return None;
        }
        Some(self.total_coverage / self.measured as f64)
    }

    pub fn passed(&self) -> bool {
        !self.failed
    }
}

pub fn render_header(min_coverage: f64) -> String {
    format!(
        "Running tests and checking coverage (Minimum: {:.1}%)...",
        min_coverage
    )
    .bold()
    .to_string()
}

pub fn render_line(report: &PackageReport, min_coverage: f64) -> String {
    let package = &report.package;
    match &report.status {
        PackageStatus::Passed { coverage } => format!(
            "ok\t{}\tcoverage: {:.1}% of statements. Passed.",
            package, coverage
        )
        .bold()
        .green()
        .to_string(),
        PackageStatus::Failed { coverage } => format!(
            "fail\t{}\tcoverage: {:.1}% of statements. Failed (below {:.1}%).",
            package, coverage, min_coverage
        )
        .bold()
        .red()
        .to_string(),
        PackageStatus::NoTests => format!("?\t{}\t[no test files]", package)
            .bold()
            .yellow()
            .to_string(),
        PackageStatus::InvocationError { message } => {
            format!("fail\t{}\terror running tests: {}", package, message)
                .bold()
                .red()
                .to_string()
        }
        PackageStatus::ParseError { reason, .. } => {
            format!("Error parsing coverage for package {}: {}", package, reason)
        }
    }
}

pub fn render_summary(summary: &Summary, min_coverage: f64) -> String {
    match summary.average() {
        Some(average) => format!(
            "Overall coverage is {:.1}%. Push allowed if all individual packages are above {:.1}%.",
            average, min_coverage
        )
        .bold()
        .to_string(),
        None => "No tests found in any package.".bold().red().to_string(),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    min_coverage: f64,
    packages: Vec<JsonPackage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    average: Option<f64>,
    measured_packages: usize,
    passed: bool,
}

#[derive(Serialize)]
struct JsonPackage<'a> {
    package: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    coverage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

pub fn render_json(
    reports: &[PackageReport],
    summary: &Summary,
    min_coverage: f64,
) -> serde_json::Result<String> {
    let packages = reports
        .iter()
        .map(|report| JsonPackage {
            package: &report.package,
            status: report.status.label(),
            coverage: report.status.coverage(),
            detail: match &report.status {
                PackageStatus::InvocationError { message } => Some(message.clone()),
                PackageStatus::ParseError { matched, reason } => {
                    Some(format!("{}: {}", matched, reason))
                }
                _ => None,
            },
        })
        .collect();

    serde_json::to_string_pretty(&JsonReport {
        min_coverage,
        packages,
        average: summary.average(),
        measured_packages: summary.measured(),
        passed: summary.passed(),
    })
}

#[derive(Serialize)]
struct JsonError<'a> {
    error: &'a str,
    passed: bool,
}

/// JSON document for a run that could not check any package.
pub fn render_json_error(message: &str) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonError {
        error: message,
        passed: false,
    })
}
