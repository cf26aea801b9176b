// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Process-wide logging setup and the human-readable build summary printed
//! at the end of a run. Grounded in the teacher `logging` crate's use of
//! `colored` to tint level markers (`[ERROR]` red, `[DEBUG]` green) — the
//! same palette is reused here for the final pass/fail/up-to-date tally.

use colored::Colorize;

use xbuild_scheduler::BuildReport;

/// Initializes the global logger from `RUST_LOG` (default `info`), matching
/// the teacher's `env_logger::init()` convention used across its CLI
/// binaries. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}

/// Prints a one-line-per-bucket summary of a finished build to stdout, then
/// one line per recorded error to stderr.
pub fn print_summary(report: &BuildReport) {
    println!(
        "{} built, {} up-to-date, {} cleaned, {} skipped, {} failed",
        report.built.len().to_string().green(),
        report.up_to_date.len().to_string().cyan(),
        report.cleaned.len().to_string().cyan(),
        report.skipped.len().to_string().yellow(),
        report.errors.len().to_string().red(),
    );

    for error in &report.errors {
        eprintln!("{} {error}", "[ERROR]".red());
    }

    if report.success() {
        println!("{}", "BUILD SUCCEEDED".green().bold());
    } else {
        println!("{}", "BUILD FAILED".red().bold());
    }
}
