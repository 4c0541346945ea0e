//! Codexref CLI - Cross-reference analysis over parsed code chunks

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use codexref::analysis::{
    CallDirection, DependencyGraph, DependencyOptions, DependencyScope, Implementation,
    ImplementationOptions, InheritanceOptions, InheritanceTree, MethodCallGraph, TraceOptions,
};
use codexref::config::{self, AnalyzerSettings, CodexrefConfig};
use codexref::query::{EmbeddingEngine, EmbeddingSearch};
use codexref::ui::{self, Icons};
use codexref::{CodeChunk, CrossReferenceAnalyzer, DependencyKind, IndexStats, SqliteChunkStore};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "codexref")]
#[command(version)]
#[command(about = "Cross-reference analysis for parsed code: call graphs, inheritance, dependencies")]
#[command(long_about = r#"
Codexref indexes the methods and classes of a parsed codebase and answers:
  • Who calls what (call graph tracing)
  • What extends a class (inheritance trees)
  • How classes depend on each other (cycles, hotspots, package metrics)
  • Which classes implement an interface

Example usage:
  codexref import --chunks chunks.json
  codexref build
  codexref trace --method login --direction both
  codexref deps --target OrderService --scope global --types inheritance,method-call
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./codexref.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the chunk database
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default codexref.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Load a JSON array of parsed chunks into the database
    Import {
        /// JSON file produced by the parser
        #[arg(long)]
        chunks: PathBuf,

        /// Drop all stored chunks and embeddings first
        #[arg(long)]
        replace: bool,
    },

    /// Compute embeddings for every stored chunk
    Embed {
        /// Chunks per model call
        #[arg(long, default_value = "32")]
        batch_size: usize,
    },

    /// Build the method and class indices and save the snapshot
    Build {
        /// Ignore an existing snapshot and rebuild from the database
        #[arg(long)]
        force: bool,
    },

    /// Trace the call graph around a method
    Trace {
        /// Method name
        #[arg(short, long)]
        method: String,

        /// Only match methods of this class
        #[arg(long)]
        class: Option<String>,

        /// Only match methods in this file (full path or suffix)
        #[arg(long)]
        file: Option<String>,

        /// Maximum expansion depth (config default when omitted)
        #[arg(long)]
        depth: Option<usize>,

        /// callees, callers or both
        #[arg(long, default_value = "callees")]
        direction: String,

        /// Fall back to embedding search for names the index can't resolve
        #[arg(long)]
        semantic: bool,
    },

    /// Show the subclass tree of a class
    Tree {
        /// Root class name
        #[arg(long)]
        class: String,

        /// Include interface children
        #[arg(long)]
        interfaces: bool,

        /// Include abstract children
        #[arg(long = "abstract")]
        include_abstract: bool,
    },

    /// Analyze class dependencies: cycles, hotspots, metrics
    Deps {
        /// Target class name
        #[arg(short, long)]
        target: String,

        /// file, package or global
        #[arg(long, default_value = "package")]
        scope: String,

        /// Edge kinds to include (import, inheritance, composition, method-call)
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,
    },

    /// List classes implementing an interface
    Impls {
        /// Interface name
        #[arg(short, long)]
        interface: String,

        /// Also include implementers of interfaces extending it
        #[arg(long)]
        subinterfaces: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }
}

fn emit_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Config, database and analyzer settings resolved from flags and codexref.toml
struct Context {
    config_path: PathBuf,
    database: PathBuf,
    settings: AnalyzerSettings,
}

impl Context {
    fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
        let file_config = config::load_config(Some(config_path.as_path()))?.unwrap_or_default();

        let database = cli
            .database
            .clone()
            .or_else(|| file_config.database.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| config::default_database_path_in(Path::new(".")));

        Ok(Self {
            config_path,
            database,
            settings: AnalyzerSettings::from_config(&file_config),
        })
    }

    fn open_store(&self) -> anyhow::Result<Arc<SqliteChunkStore>> {
        config::ensure_db_dir(&self.database)?;
        Ok(Arc::new(SqliteChunkStore::open(&self.database)?))
    }

    fn analyzer(&self, store: Arc<SqliteChunkStore>) -> CrossReferenceAnalyzer {
        CrossReferenceAnalyzer::new(store, self.settings.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let ctx = Context::resolve(&cli)?;

    match cli.command {
        Commands::Init { force } => run_init(&ctx, force, mode),
        Commands::Import { chunks, replace } => run_import(&ctx, &chunks, replace, mode),
        Commands::Embed { batch_size } => run_embed(&ctx, batch_size, mode),
        Commands::Build { force } => run_build(&ctx, force, mode).await,
        Commands::Trace { method, class, file, depth, direction, semantic } => {
            let mut options = TraceOptions::new(method)
                .with_depth(depth.unwrap_or(ctx.settings.max_depth))
                .with_direction(direction.parse::<CallDirection>()?);
            options.class_name = class;
            options.file_path = file;
            run_trace(&ctx, &options, semantic, mode).await
        }
        Commands::Tree { class, interfaces, include_abstract } => {
            let options = InheritanceOptions::new(class)
                .interfaces(interfaces)
                .abstract_classes(include_abstract);
            run_tree(&ctx, &options, mode).await
        }
        Commands::Deps { target, scope, types } => {
            let kinds = types
                .iter()
                .map(|t| t.parse::<DependencyKind>())
                .collect::<codexref::Result<Vec<_>>>()?;
            let options = DependencyOptions::new(target)
                .with_scope(scope.parse::<DependencyScope>()?)
                .with_types(kinds);
            run_deps(&ctx, &options, mode).await
        }
        Commands::Impls { interface, subinterfaces } => {
            let options = ImplementationOptions::new(interface).with_subinterfaces(subinterfaces);
            run_impls(&ctx, &options, mode).await
        }
    }
}

fn run_init(ctx: &Context, force: bool, mode: OutputMode) -> anyhow::Result<()> {
    let config = CodexrefConfig::with_defaults();
    config::write_config(&ctx.config_path, &config, force)?;

    if mode.is_human() {
        ui::success(&format!("Wrote {}", ctx.config_path.display()));
    } else {
        emit_json(&serde_json::json!({ "config": ctx.config_path, "written": true }))?;
    }
    Ok(())
}

fn run_import(ctx: &Context, path: &Path, replace: bool, mode: OutputMode) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(path)?;
    let chunks: Vec<CodeChunk> = serde_json::from_str(&contents)?;

    let store = ctx.open_store()?;
    if replace {
        store.clear_all()?;
        tracing::info!("Cleared existing chunks from {}", ctx.database.display());
    }
    let inserted = store.insert_chunks(&chunks)?;
    let stats = store.stats()?;

    if mode.is_human() {
        ui::success(&format!("Imported {} chunks from {}", inserted, path.display()));
        ui::status(Icons::DATABASE, "Database", &ctx.database.display().to_string());
        println!("{}", stats);
    } else {
        emit_json(&serde_json::json!({
            "imported": inserted,
            "chunks": stats.chunks,
            "files": stats.files,
            "embeddings": stats.embeddings,
        }))?;
    }
    Ok(())
}

fn run_embed(ctx: &Context, batch_size: usize, mode: OutputMode) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    if store.count_chunks()? == 0 {
        if mode.is_human() {
            ui::warn("No chunks in the database to embed.");
        } else {
            emit_json(&serde_json::json!({ "embedded": 0 }))?;
        }
        return Ok(());
    }

    if mode.is_human() {
        ui::status(Icons::BRAIN, "Model", "all-MiniLM-L6-v2");
    }
    let started = Instant::now();
    let search = EmbeddingSearch::new(EmbeddingEngine::new()?, store);
    let embedded = tokio::task::block_in_place(|| search.embed_store(batch_size))?;

    if mode.is_human() {
        ui::success(&format!("Embedded {} chunks", embedded));
        ui::timing(&format!("{:.2?}", started.elapsed()));
    } else {
        emit_json(&serde_json::json!({ "embedded": embedded }))?;
    }
    Ok(())
}

async fn run_build(ctx: &Context, force: bool, mode: OutputMode) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let mut analyzer = ctx.analyzer(store);
    let started = Instant::now();

    let stats = if force {
        analyzer.rebuild_indexes().await?
    } else {
        analyzer.index_stats().await?
    };

    if mode.is_human() {
        print_build_stats(&stats);
        ui::status(Icons::FILE, "Snapshot", &analyzer.snapshot_paths().method_index.display().to_string());
        ui::timing(&format!("{:.2?}", started.elapsed()));
    } else {
        emit_json(&stats)?;
    }
    Ok(())
}

fn print_build_stats(stats: &IndexStats) {
    if stats.loaded_from_snapshot {
        ui::info("Index", "loaded from snapshot (use --force to rebuild)");
    } else {
        ui::success("Index built");
    }
    println!(
        "{}",
        ui::stats_table(&[
            ("Classes", stats.classes.to_string()),
            ("Methods", stats.methods.to_string()),
            ("Files indexed", stats.files_indexed.to_string()),
            ("Files skipped", stats.files_skipped.to_string()),
            ("Files failed", stats.files_failed.to_string()),
            ("Malformed chunks", stats.chunks_skipped.to_string()),
        ])
    );
}

async fn run_trace(ctx: &Context, options: &TraceOptions, semantic: bool, mode: OutputMode) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let mut analyzer = ctx.analyzer(store.clone());
    if semantic {
        let search = EmbeddingSearch::new(EmbeddingEngine::new()?, store);
        analyzer = analyzer.with_similarity(Arc::new(search));
    }

    let graph = analyzer.trace_method_calls(options).await?;
    if mode.is_human() {
        print_call_graph(&graph, options);
    } else {
        emit_json(&graph)?;
    }
    Ok(())
}

fn print_call_graph(graph: &MethodCallGraph, options: &TraceOptions) {
    ui::header(&format!(
        "{} of {}.{}",
        options.direction, graph.root.class_name, graph.root.name
    ));
    ui::status(Icons::FILE, "Defined in", &format!("{}:{}", graph.root.file_path, graph.root.start_line));

    ui::section("Calls");
    if graph.edges.is_empty() {
        println!("  {}", ui::muted("no calls found"));
    }
    for edge in &graph.edges {
        let name = |id: &str| graph.nodes.get(id).map(|m| m.name.clone()).unwrap_or_else(|| id.to_string());
        ui::edge_line(&name(&edge.from), &name(&edge.to), &format!("({}, {:.1})", edge.kind, edge.weight));
    }

    if !graph.cycles.is_empty() {
        ui::section("Cycles");
        for cycle in &graph.cycles {
            ui::risk(Icons::CYCLE, &cycle.join(" -> "));
        }
    }

    ui::section("Summary");
    ui::summary_row("Methods:", &graph.metadata.total_methods.to_string());
    ui::summary_row("Entry points:", &graph.entry_points.join(", "));
    ui::summary_row("Termination points:", &graph.termination_points.join(", "));
    ui::summary_row("Max complexity:", &graph.metadata.max_depth.to_string());
}

async fn run_tree(ctx: &Context, options: &InheritanceOptions, mode: OutputMode) -> anyhow::Result<()> {
    let analyzer = ctx.analyzer(ctx.open_store()?);
    let tree = analyzer.build_inheritance_tree(options).await?;

    if mode.is_human() {
        print_tree(&tree);
    } else {
        emit_json(&tree)?;
    }
    Ok(())
}

fn print_tree(tree: &InheritanceTree) {
    ui::header(&format!("Inheritance tree of {}", tree.root.name));

    let mut stack = vec![(tree.root.name.as_str(), 0usize)];
    while let Some((name, depth)) = stack.pop() {
        let Some(class) = tree.nodes.get(name) else { continue };
        ui::tree_line(depth, &ui::symbol(&class.name), &format!("[{}] {}", class.class_type, class.file_path));

        let mut children: Vec<&str> = tree
            .nodes
            .values()
            .filter(|c| c.superclass.as_deref() == Some(name) && c.name != tree.root.name)
            .map(|c| c.name.as_str())
            .collect();
        children.reverse();
        stack.extend(children.into_iter().map(|c| (c, depth + 1)));
    }

    ui::section("Summary");
    ui::summary_row("Depth:", &tree.depth.to_string());
    ui::summary_row("Concrete:", &tree.concrete_classes.join(", "));
    ui::summary_row("Abstract:", &tree.abstract_classes.join(", "));
    ui::summary_row("Interfaces:", &tree.interfaces.join(", "));
}

async fn run_deps(ctx: &Context, options: &DependencyOptions, mode: OutputMode) -> anyhow::Result<()> {
    let analyzer = ctx.analyzer(ctx.open_store()?);
    let graph = analyzer.analyze_dependencies(options).await?;

    if mode.is_human() {
        print_dependencies(&graph);
    } else {
        emit_json(&graph)?;
    }
    Ok(())
}

fn print_dependencies(graph: &DependencyGraph) {
    ui::header(&format!("Dependencies of {} ({} scope)", graph.target, graph.scope));

    let mut nodes = ui::TableBuilder::new(["Class", "Kind", "Deps", "Dependents", "Methods", "Instability"]);
    for node in &graph.nodes {
        nodes.add_row([
            node.name.clone(),
            node.kind.to_string(),
            node.dependencies.len().to_string(),
            node.dependents.len().to_string(),
            node.complexity.to_string(),
            format!("{:.2}", node.stability),
        ]);
    }
    println!("{}", nodes.build());

    if !graph.edges.is_empty() {
        ui::section("Edges");
        for edge in &graph.edges {
            ui::edge_line(&edge.from, &edge.to, &format!("({}, {:.1})", edge.kind, edge.strength));
        }
    }

    if !graph.cycles.is_empty() {
        ui::section("Cycles");
        for cycle in &graph.cycles {
            ui::risk(Icons::CYCLE, &cycle.join(" -> "));
        }
    }

    if !graph.hotspots.is_empty() {
        ui::section("Hotspots");
        for hotspot in &graph.hotspots {
            ui::risk(Icons::HOTSPOT, &format!("{} [{}] score {:.2}", hotspot.node_id, hotspot.kind, hotspot.score));
            for recommendation in &hotspot.recommendations {
                println!("      {}", ui::dim(recommendation));
            }
        }
    }

    let m = &graph.metrics;
    ui::section("Metrics");
    println!(
        "{}",
        ui::stats_table(&[
            ("Nodes", m.total_nodes.to_string()),
            ("Edges", m.total_edges.to_string()),
            ("Cycles", m.circular_dependencies.to_string()),
            ("Average coupling", format!("{:.2}", m.average_coupling)),
            ("Cohesion", format!("{:.2}", m.cohesion_score)),
            ("Stability index", format!("{:.2}", m.stability_index)),
            ("Abstractness", format!("{:.2}", m.abstractness)),
            ("Distance from main sequence", format!("{:.2}", m.distance_from_main_sequence)),
        ])
    );
}

async fn run_impls(ctx: &Context, options: &ImplementationOptions, mode: OutputMode) -> anyhow::Result<()> {
    let analyzer = ctx.analyzer(ctx.open_store()?);
    let found = analyzer.find_implementations(options).await?;

    if mode.is_human() {
        print_implementations(&options.interface_name, &found);
    } else {
        emit_json(&found)?;
    }
    Ok(())
}

fn print_implementations(interface: &str, found: &[Implementation]) {
    ui::header(&format!("Implementations of {}", interface));
    if found.is_empty() {
        println!("  {}", ui::muted("none"));
        return;
    }

    let mut table = ui::TableBuilder::new(["Class", "Via", "Package", "Abstract", "Methods"]);
    for implementation in found {
        table.add_row([
            implementation.implementation_name.clone(),
            implementation.interface_name.clone(),
            implementation.package.clone(),
            implementation.is_abstract.to_string(),
            implementation.methods.len().to_string(),
        ]);
    }
    println!("{}", table.build());
}
