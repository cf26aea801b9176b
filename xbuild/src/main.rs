// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Command-line driver (§4.9, §6): parses flags with `clap`'s derive API,
//! loads a TOML build script into an [`InitializationContext`], freezes it,
//! and runs the scheduler in the mode (`clean` / `dry-run` / build) implied
//! by the flags. Grounded in the teacher's `process_executor` binary, which
//! follows the same parse-flags / build-a-context / run-and-report-exit-code
//! shape.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use xbuild_errors::BuildError;
use xbuild_graph::InitializationContext;
use xbuild_scheduler::BuildOptions;

/// Builds the targets named on the command line against a TOML build script.
#[derive(Parser)]
#[command(name = "xbuild", about = "An extensible, incremental build tool engine")]
struct Cli {
    /// Targets to build. Defaults to every target tagged "all" when empty.
    targets: Vec<String>,

    /// Remove each target's declared outputs instead of building them.
    #[arg(long)]
    clean: bool,

    /// Resolve the dependency graph and report what would run without
    /// executing any target.
    #[arg(long)]
    dry_run: bool,

    /// Treat non-target dependency paths as already satisfied, skipping the
    /// up-to-date checks that would normally consult them.
    #[arg(long)]
    ignore_deps: bool,

    /// Keep building independent targets after one fails instead of
    /// aborting at the first error.
    #[arg(long)]
    keep_going: bool,

    /// After each target completes, re-check that its dependencies are
    /// still present and unmodified.
    #[arg(long)]
    verify: bool,

    /// Number of worker threads to run the execution phase with. Defaults
    /// to the available parallelism.
    #[arg(long)]
    workers: Option<usize>,

    /// Shuffle equal-priority scheduling order, to surface ordering bugs
    /// that a deterministic run would hide.
    #[arg(long)]
    randomize_priorities: bool,

    /// Write the resolved dependency graph as Graphviz dot to this path.
    #[arg(long)]
    dep_graph_file: Option<PathBuf>,

    /// Print wall-clock timing for resolution and execution.
    #[arg(long)]
    profile: bool,

    /// Print the number of logical CPUs the worker pool was sized against.
    #[arg(long)]
    log_cpu_utilisation: bool,

    /// Path to the TOML build script to load.
    #[arg(long, default_value = "build.toml")]
    build_file: PathBuf,

    /// Property override in the form NAME=VALUE. May be repeated.
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    define: Vec<String>,
}

fn main() {
    xbuild_logging::init();
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let root_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            log::error!("failed to determine current directory: {e}");
            return 1;
        }
    };

    let mut init = InitializationContext::new(root_dir);
    if let Err(e) = xbuild_script::load(&mut init, &cli.build_file) {
        report_fatal(&e);
        return 1;
    }

    for define in &cli.define {
        match define.split_once('=') {
            Some((name, value)) => init.override_property_from_cli(name.to_string(), value.to_string()),
            None => {
                log::error!("invalid -D argument \"{define}\", expected NAME=VALUE");
                return 1;
            }
        }
    }

    let ctx = match init.freeze() {
        Ok(ctx) => ctx,
        Err(e) => {
            report_fatal(&e);
            return 1;
        }
    };

    if let Err(e) = ctx.run_pre_build_checks() {
        report_fatal(&e);
        return 1;
    }

    if cli.log_cpu_utilisation {
        log::info!("available parallelism: {} logical cpus", num_cpus::get());
    }

    let build_work_dir = PathBuf::from(
        ctx.properties()
            .get("BUILD_WORK_DIR")
            .map(|v| v.as_str())
            .unwrap_or_else(|_| "BUILD_WORK".to_string()),
    );
    if let Err(e) = xbuild_scheduler::artifacts::ensure_work_dir_schema(&build_work_dir) {
        log::warn!("failed to check work-dir schema at {}: {e}", build_work_dir.display());
    }

    let requested: Vec<String> =
        if cli.targets.is_empty() { ctx.targets_with_tag("all").iter().map(|t| t.name().to_string()).collect() } else { cli.targets.clone() };

    let resolve_start = Instant::now();
    let graph = match xbuild_graph::resolve(&ctx, &requested) {
        Ok(graph) => graph,
        Err(errors) => {
            for error in &errors {
                report_fatal(error);
            }
            return 1;
        }
    };
    if cli.profile {
        log::info!("resolution took {:.3}s", resolve_start.elapsed().as_secs_f64());
    }

    xbuild_scheduler::artifacts::write_selected_targets(&graph, &ctx.root_dir().join("selected-targets.txt")).ok();
    if let Some(dep_graph_file) = &cli.dep_graph_file {
        if let Err(e) = xbuild_scheduler::artifacts::write_dep_graph(&graph, dep_graph_file) {
            log::warn!("failed to write dependency graph to {}: {e}", dep_graph_file.display());
        }
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            log::warn!("received interrupt, stopping after in-flight targets finish");
            cancel.store(true, Ordering::SeqCst);
        })
        .ok();
    }

    let options = BuildOptions {
        clean: cli.clean,
        dry_run: cli.dry_run,
        ignore_deps: cli.ignore_deps,
        keep_going: cli.keep_going,
        verify: cli.verify,
        workers: cli.workers.unwrap_or_else(|| BuildOptions::default().workers),
        randomize_priorities: cli.randomize_priorities,
        dep_graph_file: cli.dep_graph_file.clone(),
        profile: cli.profile,
        log_cpu_utilisation: cli.log_cpu_utilisation,
        cancel,
    };

    let execution_start = Instant::now();
    let report = xbuild_scheduler::run_resolved(&ctx, &graph, &options);
    if cli.profile {
        log::info!("execution took {:.3}s", execution_start.elapsed().as_secs_f64());
    }

    xbuild_logging::print_summary(&report);
    if report.success() {
        0
    } else {
        1
    }
}

fn report_fatal(error: &BuildError) {
    log::error!("{error}");
}
