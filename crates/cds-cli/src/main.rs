//! cds - command-line tools for stack files.
//!
//! Inspect, migrate, search and headlessly run stacks without a designer.

use anyhow::{Context, Result, bail};
use cds_core::document;
use cds_core::migrate::detect_format;
use cds_core::resolve::FsLoader;
use cds_core::search::SearchOptions;
use cds_editor::config::EditorConfig;
use cds_editor::manager::StackManager;
use cds_runtime::{
    ExecutionController, Invocation, RuntimeConfig, ScriptContext, ScriptEngine,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// cds - work with stack files
#[derive(Parser)]
#[command(name = "cds")]
#[command(about = "Command-line tools for stack files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a stack: format, cards and views
    Info {
        file: PathBuf,
    },

    /// Upgrade a stack to the current file format
    Migrate {
        file: PathBuf,
        /// Write here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search handlers and text properties
    Find {
        file: PathBuf,
        needle: String,
        #[arg(long)]
        match_case: bool,
        #[arg(long)]
        whole_word: bool,
        /// Replace every match and save
        #[arg(long)]
        replace: Option<String>,
        /// Write replacements here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a stack headlessly, logging every handler it would execute
    Run {
        file: PathBuf,
        /// Card to start on
        #[arg(short, long, default_value_t = 0)]
        card: usize,
        /// Periodic ticks to dispatch before stopping
        #[arg(short, long, default_value_t = 0)]
        ticks: u32,
        /// Runtime settings as a JSON file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file } => info(&file),
        Commands::Migrate { file, output } => migrate(&file, output.as_deref()),
        Commands::Find {
            file,
            needle,
            match_case,
            whole_word,
            replace,
            output,
        } => {
            let options = SearchOptions {
                match_case,
                whole_word,
            };
            match replace {
                Some(replacement) => {
                    replace_all(&file, &needle, &replacement, options, output.as_deref())
                }
                None => find(&file, &needle, options),
            }
        }
        Commands::Run {
            file,
            card,
            ticks,
            config,
        } => run(&file, card, ticks, config.as_deref()),
    }
}

fn read_json(file: &Path) -> Result<Value> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("{} is not JSON", file.display()))
}

fn open(file: &Path) -> Result<StackManager> {
    StackManager::open(file, &FsLoader, EditorConfig::default())
        .with_context(|| format!("Failed to load {}", file.display()))
}

/// Print format, card list and view counts.
fn info(file: &Path) -> Result<()> {
    let format = detect_format(&read_json(file)?)?;
    let manager = open(file)?;
    let graph = manager.graph();
    println!("{}", file.display());
    println!("  format:  {format} (current {})", document::CURRENT_FORMAT);
    println!("  cards:   {}", graph.card_count());
    for (index, card) in graph.card_ids().into_iter().enumerate() {
        let Some(idx) = graph.index_of(card) else {
            continue;
        };
        let name = graph.get(card).map(|n| n.name()).unwrap_or_default();
        println!(
            "    {index}: {name} ({} views)",
            graph.descendants(idx).len()
        );
    }
    Ok(())
}

/// Load (migrating on the way) and write back at the current format.
fn migrate(file: &Path, output: Option<&Path>) -> Result<()> {
    let from = detect_format(&read_json(file)?)?;
    let mut manager = open(file)?;
    let target = output.unwrap_or(file);
    manager
        .save(Some(target))
        .with_context(|| format!("Failed to write {}", target.display()))?;
    println!(
        "{}: format {from} -> {}",
        target.display(),
        document::CURRENT_FORMAT
    );
    Ok(())
}

fn find(file: &Path, needle: &str, options: SearchOptions) -> Result<()> {
    let manager = open(file)?;
    let matches = manager.find(needle, options)?;
    if matches.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for m in &matches {
        println!("{} [{}..{}]", m.path, m.start, m.end);
    }
    println!("{} matches", matches.len());
    Ok(())
}

fn replace_all(
    file: &Path,
    needle: &str,
    replacement: &str,
    options: SearchOptions,
    output: Option<&Path>,
) -> Result<()> {
    let mut manager = open(file)?;
    let changed = manager.replace_all(needle, replacement, options)?;
    if changed == 0 {
        println!("No matches.");
        return Ok(());
    }
    let target = output.unwrap_or(file);
    manager
        .save(Some(target))
        .with_context(|| format!("Failed to write {}", target.display()))?;
    println!("Replaced text in {changed} places, saved {}", target.display());
    Ok(())
}

/// Engine that logs each handler instead of interpreting it.
struct TraceEngine;

impl ScriptEngine for TraceEngine {
    fn run(&mut self, cx: &ScriptContext, invocation: &Invocation) -> cds_runtime::Result<()> {
        cx.check_terminated()?;
        log::info!(
            "frame {}: {} on {} ({} lines)",
            cx.frame(),
            invocation.event,
            invocation.target,
            invocation.source.lines().count()
        );
        Ok(())
    }

    fn on_stack_return(&mut self, cx: &ScriptContext, value: Value) {
        log::info!("frame {}: stack returned {value}", cx.frame());
    }
}

fn run(file: &Path, card: usize, ticks: u32, config: Option<&Path>) -> Result<()> {
    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            RuntimeConfig::from_json(&text)
                .with_context(|| format!("Invalid runtime config {}", path.display()))?
        }
        None => RuntimeConfig::default(),
    };
    let factory = || Box::new(TraceEngine) as Box<dyn ScriptEngine>;
    let mut controller = ExecutionController::new(factory, Arc::new(FsLoader), config);
    controller
        .open(file, card)
        .with_context(|| format!("Failed to run {}", file.display()))?;

    let timeout = Duration::from_secs(5);
    if !controller.run_until_idle(timeout) {
        bail!("scripts did not settle within {timeout:?}");
    }
    let interval = config.periodic_interval();
    let mut now = Instant::now();
    let mut dispatched = 0;
    for _ in 0..ticks {
        now += interval;
        dispatched += controller.tick(now);
        controller.run_until_idle(timeout);
    }
    let card_index = controller.manager().map_or(0, StackManager::card_index);
    controller.shutdown();
    println!(
        "{}: stopped on card {card_index}, {dispatched} periodic handlers over {ticks} ticks",
        file.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn find_with_replace_parses() {
        let cli = Cli::try_parse_from(["cds", "find", "a.json", "score", "--replace", "points", "--whole-word"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Find {
                whole_word: true,
                match_case: false,
                replace: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn run_defaults_to_first_card() {
        let cli = Cli::try_parse_from(["cds", "run", "main.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { card: 0, ticks: 0, .. }));
    }
}
