//! Coverage gate for CI pipelines.
//!
//! Lists the packages under a pattern, runs each package's tests with
//! coverage enabled through an external toolchain, scrapes the reported
//! percentage, and fails the run when any package is below the minimum.
//!
//! ```bash
//! coverage_gate -min-coverage 80
//! coverage_gate --toolchain go --packages ./app/... --format json
//! ```

pub mod app;
pub mod coverage;
pub mod gate;
pub mod report;
pub mod toolchain;
