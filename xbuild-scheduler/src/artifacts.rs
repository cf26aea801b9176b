// Copyright 2026 xbuild contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Diagnostic artifacts written after dependency resolution: a human-readable
//! `selected-targets.txt` listing and, when requested, a Graphviz `.dot`
//! dependency-graph dump — grounded in the teacher graph crate's
//! `InnerGraph::visualize`, which renders its own node/edge graph with
//! `petgraph::dot::Dot`.

use std::io;
use std::path::Path;

use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;

use xbuild_graph::ResolvedGraph;

/// Bumped whenever the on-disk layout of `targets/` (work directories,
/// implicit-inputs files) changes in a way that would make a prior build's
/// artifacts misleading to an up-to-date check. Bumping this forces every
/// target in an existing `BUILD_WORK_DIR` to rebuild once, the next time the
/// engine runs against it.
const WORK_DIR_SCHEMA_VERSION: u32 = 1;

/// Ensures `${BUILD_WORK_DIR}/xpybuild-version.properties` records the
/// current tool version and work-dir schema version (§6). If the file is
/// absent or names an older schema version, the entire `targets/`
/// subdirectory is wiped first, so stale per-target artifacts from an
/// incompatible layout can never be misread as still valid — the schema
/// bump forces a full rebuild rather than a crash or silent corruption.
pub fn ensure_work_dir_schema(build_work_dir: &Path) -> io::Result<()> {
    let version_file = build_work_dir.join("xpybuild-version.properties");
    let on_disk_schema = std::fs::read_to_string(&version_file).ok().and_then(|contents| {
        contents.lines().find_map(|line| {
            line.strip_prefix("schema_version=")
                .and_then(|v| v.trim().parse::<u32>().ok())
        })
    });

    if on_disk_schema != Some(WORK_DIR_SCHEMA_VERSION) {
        let targets_dir = build_work_dir.join("targets");
        if targets_dir.exists() {
            log::info!(
                "work-dir schema changed ({:?} -> {WORK_DIR_SCHEMA_VERSION}); clearing {}",
                on_disk_schema,
                targets_dir.display()
            );
            std::fs::remove_dir_all(&targets_dir)?;
        }
    }

    std::fs::create_dir_all(build_work_dir)?;
    std::fs::write(
        &version_file,
        format!(
            "version={}\nschema_version={WORK_DIR_SCHEMA_VERSION}\n",
            env!("CARGO_PKG_VERSION")
        ),
    )?;
    Ok(())
}

/// Writes one line per scheduled target: its name, effective priority, and
/// its direct target dependencies, sorted for determinism.
pub fn write_selected_targets(graph: &ResolvedGraph, path: &Path) -> io::Result<()> {
    let mut names: Vec<&String> = graph.wrappers.keys().collect();
    names.sort();

    let mut out = String::new();
    for name in names {
        let wrapper = &graph.wrappers[name];
        out.push_str(&format!(
            "{name} (priority={}) deps=[{}]\n",
            wrapper.effective_priority(),
            wrapper.target_deps.join(", "),
        ));
    }
    std::fs::write(path, out)
}

/// Writes the resolved dependency graph as Graphviz dot, with an edge from
/// each target to every one of its target dependencies.
pub fn write_dep_graph(graph: &ResolvedGraph, path: &Path) -> io::Result<()> {
    let mut names: Vec<&String> = graph.wrappers.keys().collect();
    names.sort();

    let mut dot_graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices = std::collections::HashMap::new();
    for name in &names {
        indices.insert((*name).clone(), dot_graph.add_node((*name).clone()));
    }
    for name in &names {
        let wrapper = &graph.wrappers[*name];
        let from = indices[*name];
        for dep in &wrapper.target_deps {
            if let Some(&to) = indices.get(dep) {
                dot_graph.add_edge(from, to, ());
            }
        }
    }

    let rendered = format!("{}", Dot::with_config(&dot_graph, &[Config::EdgeNoLabel]));
    std::fs::write(path, rendered)
}
