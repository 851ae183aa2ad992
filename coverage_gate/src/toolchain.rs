//! Toolchain invocation.
//!
//! The gate never measures coverage itself. It asks an external toolchain to
//! list packages and to run each package's tests with coverage enabled, then
//! hands the captured text to the extractor.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{status}")]
    Failed { status: String, output: String },
}

impl ToolchainError {
    /// Combined output of a command that ran but exited unsuccessfully.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Failed { output, .. } => Some(output),
            Self::Spawn { .. } => None,
        }
    }
}

/// Package listing and per-package test execution.
pub trait Toolchain {
    /// List the packages matching `pattern`, in toolchain order.
    fn list_packages(&self, pattern: &str) -> Result<Vec<String>, ToolchainError>;

    /// Run one package's tests with the coverage profile written to
    /// `coverprofile`, returning stdout and stderr as a single blob.
    ///
    /// The blob is all of stdout followed by all of stderr, not interleaved.
    fn test_package(&self, package: &str, coverprofile: &Path) -> Result<String, ToolchainError>;
}

/// Drives an external program exposing `list <pattern>` and
/// `test -coverprofile=<file> <package>` (the `go` command line).
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    program: PathBuf,
    display_name: String,
}

impl CommandToolchain {
    pub fn new(program: &str) -> Self {
        let resolved = which::which(program).unwrap_or_else(|_| PathBuf::from(program));
        debug!(program, resolved = %resolved.display(), "Resolved toolchain");
        Self {
            program: resolved,
            display_name: program.to_string(),
        }
    }

    fn run(&self, args: &[String]) -> Result<String, ToolchainError> {
        debug!(program = %self.display_name, ?args, "Running toolchain command");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| ToolchainError::Spawn {
                program: self.display_name.clone(),
                source,
            })?;

        let combined = combine_output(&output);
        if !output.status.success() {
            return Err(ToolchainError::Failed {
                status: output.status.to_string(),
                output: combined,
            });
        }

        Ok(combined)
    }
}

impl Toolchain for CommandToolchain {
    fn list_packages(&self, pattern: &str) -> Result<Vec<String>, ToolchainError> {
        let output = self.run(&["list".to_string(), pattern.to_string()])?;
        Ok(parse_package_list(&output))
    }

    fn test_package(&self, package: &str, coverprofile: &Path) -> Result<String, ToolchainError> {
        self.run(&[
            "test".to_string(),
            format!("-coverprofile={}", coverprofile.display()),
            package.to_string(),
        ])
    }
}

fn combine_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

/// Split a listing into package identifiers, one per non-blank line.
pub fn parse_package_list(listing: &str) -> Vec<String> {
    listing
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
