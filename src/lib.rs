// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod hook;
pub mod logging;
pub mod relation;
pub mod scope;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, RelationConfig, Step};
use crate::engine::{ScenarioReport, ScenarioRuntime};
use crate::exec::LoggingExecutor;
use crate::relation::read_all_state_dirs;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - per-relation scenario runtimes (relationer + in-memory store)
/// - the logging hook executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {:?}", config_path))?;
    let state_root = state_root(&config_path, &cfg);

    if args.dry_run {
        print_dry_run(&cfg, &state_root);
        return Ok(());
    }

    if args.inspect {
        return print_state_dirs(&state_root);
    }

    let selected = select_relations(&cfg, args.relation.as_deref())?;

    tokio::select! {
        res = run_relations(&cfg, &state_root, selected) => res,
        res = tokio::signal::ctrl_c() => {
            res.context("listening for Ctrl+C")?;
            info!("interrupted; stopping");
            Ok(())
        }
    }
}

async fn run_relations(
    cfg: &ConfigFile,
    state_root: &Path,
    relations: Vec<(&str, &RelationConfig)>,
) -> Result<()> {
    let settle = cfg.config.settle_duration();

    for (name, rel) in relations {
        println!("relation {name} (id {})", rel.id);
        let runtime =
            ScenarioRuntime::from_config(name, rel, state_root, settle, LoggingExecutor::new())?;
        let report = runtime
            .run(&rel.steps)
            .await
            .with_context(|| format!("running relation {name:?}"))?;
        print_report(&report);
    }
    Ok(())
}

fn select_relations<'a>(
    cfg: &'a ConfigFile,
    only: Option<&str>,
) -> Result<Vec<(&'a str, &'a RelationConfig)>> {
    let selected: Vec<_> = cfg
        .relation
        .iter()
        .filter(|(name, _)| only.is_none_or(|o| o == name.as_str()))
        .map(|(name, rel)| (name.as_str(), rel))
        .collect();

    if selected.is_empty() {
        if let Some(name) = only {
            bail!("no relation named {name:?} in config");
        }
    }
    Ok(selected)
}

/// Resolve `[config].state_dir` relative to the config file's directory.
fn state_root(config_path: &Path, cfg: &ConfigFile) -> PathBuf {
    let state_dir = PathBuf::from(&cfg.config.state_dir);
    if state_dir.is_absolute() {
        return state_dir;
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(state_dir),
        _ => state_dir,
    }
}

fn print_report(report: &ScenarioReport) {
    println!("  hooks committed: {}", report.runs.len());
    println!("  members: {:?}", report.state.members);
    if report.state.broken {
        println!("  relation broken");
    }
}

fn print_state_dirs(root: &Path) -> Result<()> {
    let dirs = read_all_state_dirs(root)
        .with_context(|| format!("reading state directories under {:?}", root))?;

    println!("state root {:?} ({} relations)", root, dirs.len());
    for (id, dir) in dirs.iter() {
        let state = dir.state();
        println!("  - relation {id}");
        println!("      members: {:?}", state.members);
        if let Some(pending) = &state.changed_pending {
            println!("      changed pending: {pending}");
        }
        if let Some(hook) = dir.last_hook() {
            println!("      last hook: {hook}");
        }
    }
    Ok(())
}

/// Simple dry-run output: print relations and their steps.
fn print_dry_run(cfg: &ConfigFile, state_root: &Path) {
    println!("relhooks dry-run");
    println!("  config.state_dir = {:?}", state_root);
    println!("  config.settle = {}", cfg.config.settle);
    println!();

    println!("relations ({}):", cfg.relation.len());
    for (name, rel) in cfg.relation.iter() {
        println!("  - {name} (id {})", rel.id);
        println!("      local_unit: {}", rel.local_unit);
        if rel.implicit {
            println!("      implicit: true");
        }
        if !rel.settings.is_empty() {
            println!("      settings: {:?}", rel.settings);
        }
        for step in rel.steps.iter() {
            match step {
                Step::Enter { unit, .. } => println!("      enter {unit}"),
                Step::Change { unit, .. } => println!("      change {unit}"),
                Step::Leave { unit } => println!("      leave {unit}"),
                Step::Dying => println!("      dying"),
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
