use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use code_atlas::{AtlasConfig, CodeAtlas, GraphNode, SymbolKind, TraceDirection, watch};

#[derive(Parser)]
#[command(
    name = "code-atlas",
    version,
    about = "Workspace code graph: symbols, calls, and graph queries"
)]
struct Cli {
    /// Workspace root to index.
    #[arg(short, long, default_value = ".", global = true)]
    path: PathBuf,

    /// Emit JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Parser worker threads for the initial build.
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the workspace and print statistics.
    Index,
    /// Search symbols by regex pattern.
    Find {
        pattern: String,
        /// Restrict to symbol kinds (e.g. class, function, interface).
        #[arg(short, long)]
        kind: Vec<String>,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Who calls the target (node id or short name)?
    Callers { target: String },
    /// What does the source (node id or short name) call?
    Callees { source: String },
    /// Bounded breadth-first trace from a symbol.
    Trace {
        start: String,
        #[arg(short, long, default_value = "forward")]
        direction: String,
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Enumerate call paths between two symbols.
    Paths {
        from: String,
        to: String,
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Callables unreachable from any exported entry point.
    DeadCode {
        /// Restrict output to files matching this regex.
        #[arg(long)]
        file: Option<String>,
    },
    /// Print index statistics without running queries.
    Stats,
    /// Watch the workspace and stream incremental updates until interrupted.
    Watch,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("workspace root {} not found", cli.path.display()))?;

    let mut config = AtlasConfig::load(&root);
    if let Some(workers) = cli.workers {
        config.parser_workers = workers.max(1);
    }
    let atlas = CodeAtlas::new(config);
    let stats = atlas.index(None)?;

    match cli.command {
        Command::Index | Command::Stats => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "{} nodes, {} edges ({} unresolved), {} files",
                    stats.nodes, stats.edges, stats.unresolved_edges, stats.files
                );
                println!(
                    "{} files skipped, {} files with parse errors",
                    stats.files_skipped, stats.files_with_parse_errors
                );
                let mut by_kind: Vec<_> = atlas.symbols_by_kind().into_iter().collect();
                by_kind.sort_by(|a, b| b.1.cmp(&a.1));
                for (kind, count) in by_kind {
                    println!("  {:<12} {count}", kind.as_str());
                }
            }
        }

        Command::Find { pattern, kind, limit } => {
            let kinds = parse_kinds(&kind)?;
            let nodes = atlas.find_symbols(&pattern, kinds.as_deref(), limit)?;
            print_nodes(&nodes, cli.json)?;
        }

        Command::Callers { target } => {
            let id = resolve_target(&atlas, &target)?;
            print_nodes(&atlas.get_callers(&id), cli.json)?;
        }

        Command::Callees { source } => {
            let id = resolve_target(&atlas, &source)?;
            print_nodes(&atlas.get_callees(&id), cli.json)?;
        }

        Command::Trace { start, direction, depth } => {
            let direction = TraceDirection::parse(&direction)
                .with_context(|| format!("unknown direction '{direction}' (forward|backward)"))?;
            let id = resolve_target(&atlas, &start)?;
            let result = atlas.trace(&id, direction, depth, None, None)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if !result.start_found {
                println!("symbol not found: {start}");
            } else {
                for hop in &result.nodes {
                    println!(
                        "{:indent$}{} ({}:{})",
                        "",
                        hop.node.qualified_name,
                        hop.node.file,
                        hop.node.line,
                        indent = (hop.depth - 1) * 2
                    );
                }
            }
        }

        Command::Paths { from, to, depth } => {
            let from_id = resolve_target(&atlas, &from)?;
            let to_id = resolve_target(&atlas, &to)?;
            let result = atlas.find_paths(&from_id, &to_id, depth, None)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.paths.is_empty() {
                println!("no paths from {from} to {to}");
            } else {
                for path in &result.paths {
                    let names: Vec<&str> =
                        path.iter().map(|n| n.qualified_name.as_str()).collect();
                    println!("{}", names.join(" -> "));
                }
                if result.truncated {
                    println!("(truncated at {} paths)", result.paths.len());
                }
            }
        }

        Command::DeadCode { file } => {
            let result = atlas.find_dead_code(file.as_deref(), None)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.dead.is_empty() {
                println!(
                    "no dead code ({} entry points, {} reachable nodes)",
                    result.entry_points, result.reachable
                );
            } else {
                for dead in &result.dead {
                    println!(
                        "{} ({}:{}): {}",
                        dead.node.qualified_name, dead.node.file, dead.node.line, dead.reason
                    );
                }
            }
        }

        Command::Watch => {
            let atlas = std::sync::Arc::new(atlas);
            let (_handle, rx) = watch(std::sync::Arc::clone(&atlas))?;
            eprintln!("watching {} (ctrl-c to stop)", root.display());
            for event in rx {
                let stats = atlas.stats();
                println!("{:?}: {} nodes, {} edges", event, stats.nodes, stats.edges);
            }
        }
    }

    Ok(())
}

/// Accept a node id as-is, or resolve a unique short name to its node id.
fn resolve_target(atlas: &CodeAtlas, target: &str) -> Result<String> {
    if atlas.get_node(target).is_some() {
        return Ok(target.to_owned());
    }
    let escaped = format!("^{}$", regex::escape(target));
    let matches = atlas.find_symbols(&escaped, None, 10)?;
    match matches.len() {
        0 => Ok(target.to_owned()), // queries report unknown ids as empty results
        1 => Ok(matches[0].id.clone()),
        _ => {
            let ids: Vec<&str> = matches.iter().map(|n| n.id.as_str()).collect();
            bail!("ambiguous symbol '{target}'; candidates: {}", ids.join(", "))
        }
    }
}

fn parse_kinds(raw: &[String]) -> Result<Option<Vec<SymbolKind>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let mut kinds = Vec::with_capacity(raw.len());
    for value in raw {
        match SymbolKind::parse(value) {
            Some(kind) => kinds.push(kind),
            None => bail!("unknown symbol kind '{value}'"),
        }
    }
    Ok(Some(kinds))
}

fn print_nodes(nodes: &[GraphNode], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(nodes)?);
        return Ok(());
    }
    if nodes.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for node in nodes {
        let exported = if node.is_exported { " [exported]" } else { "" };
        println!(
            "{:<12} {} ({}:{}){exported}",
            node.kind.as_str(),
            node.qualified_name,
            node.file,
            node.line
        );
    }
    Ok(())
}
