use anyhow::{bail, Context};
use clap::Parser;
use ragvault::ui::cli::{Cli, Commands};
use ragvault::{Config, FileWatcher, RagEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::new(cli.base_dir.map(PathBuf::from))?;

    match cli.command {
        Commands::Init => handle_init(&config),
        Commands::Ingest { path, force } => handle_ingest(&config, Path::new(&path), force),
        Commands::Watch { path } => handle_watch(&config, Path::new(&path)),
        Commands::Search { query, k } => handle_search(&config, &query, k),
        Commands::Context { query } => {
            let engine = open_engine(&config)?;
            println!("{}", engine.context_for(&query));
            Ok(())
        }
        Commands::Sources => handle_sources(&config),
        Commands::Delete { id } => {
            let engine = open_engine(&config)?;
            let source = engine
                .remove_source(&id)
                .with_context(|| format!("Could not delete data source {}", id))?;
            println!("✓ Deleted {} ({} chunks)", source.name, source.chunk_count);
            Ok(())
        }
        Commands::Status => {
            let engine = open_engine(&config)?;
            println!("Data directory: {}", config.data_dir.display());
            println!("Vector store size: {}", engine.size());
            println!("Data sources: {}", engine.list_sources().len());
            let orphans = engine.count_orphans();
            if orphans > 0 {
                println!("Orphaned chunks: {} (run `ragvault cleanup`)", orphans);
            }
            Ok(())
        }
        Commands::Cleanup => {
            let engine = open_engine(&config)?;
            let removed = engine.prune_orphans();
            println!("Removed {} orphaned chunks, kept {}", removed, engine.size());
            Ok(())
        }
        Commands::Purge => {
            let engine = open_engine(&config)?;
            engine.purge();
            println!("✓ All data sources removed");
            Ok(())
        }
    }
}

fn open_engine(config: &Config) -> anyhow::Result<RagEngine> {
    if !config.is_initialized() {
        bail!("ragvault is not initialized. Run 'ragvault init' first.");
    }
    RagEngine::open(config).context("Failed to open the retrieval engine")
}

fn handle_init(config: &Config) -> anyhow::Result<()> {
    if config.is_initialized() {
        println!("ragvault is already initialized at: {}", config.base_dir.display());
        return Ok(());
    }

    config.init()?;
    println!("✓ Created data directory: {}", config.data_dir.display());
    println!("\nNext steps:");
    println!("  1. Ingest data: ragvault ingest /path/to/menu.csv");
    println!("  2. Try a query: ragvault search \"opening hours\"");
    Ok(())
}

fn handle_ingest(config: &Config, path: &Path, force: bool) -> anyhow::Result<()> {
    let engine = open_engine(config)?;

    if path.is_dir() {
        let report = engine.ingest_directory(path, force)?;
        for source in &report.ingested {
            println!("  ✓ {} ({} chunks)", source.name, source.chunk_count);
        }
        for (name, error) in &report.failed {
            println!("  ✗ {}: {}", name, error);
        }
        println!("\nIngestion complete!");
        println!("  Ingested: {} files", report.ingested.len());
        if report.skipped > 0 {
            println!("  Skipped (unchanged): {} files", report.skipped);
        }
        if !report.failed.is_empty() {
            println!("  Errors: {} files", report.failed.len());
        }
    } else {
        let source = engine
            .ingest_path(path)
            .with_context(|| format!("Failed to ingest {}", path.display()))?;
        println!("✓ {} ({} chunks), id {}", source.name, source.chunk_count, source.id);
    }

    println!("Vector store size: {}", engine.size());
    Ok(())
}

fn handle_watch(config: &Config, path: &Path) -> anyhow::Result<()> {
    let engine = Arc::new(open_engine(config)?);

    // Catch up on anything that changed while we were not watching
    let report = engine.ingest_directory(path, false)?;
    println!(
        "Initial sync: {} ingested, {} unchanged, {} failed",
        report.ingested.len(),
        report.skipped,
        report.failed.len()
    );
    println!("Press Ctrl+C to stop watching...\n");

    let watcher = FileWatcher::new(path, engine)?;
    watcher.watch()?;
    Ok(())
}

fn handle_search(config: &Config, query: &str, k: usize) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let hits = engine.query(query, k)?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} results:", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let source = hit
            .attributes
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        println!("\n{}. {} (score: {:.3})", i + 1, source, hit.score);
        let preview: String = hit.text.chars().take(150).collect();
        println!("   {}", preview);
    }

    Ok(())
}

fn handle_sources(config: &Config) -> anyhow::Result<()> {
    let engine = open_engine(config)?;
    let sources = engine.list_sources();

    if sources.is_empty() {
        println!("No data sources.");
        return Ok(());
    }

    for source in &sources {
        println!(
            "{}  {}  {} chunks  {}",
            source.id,
            source.name,
            source.chunk_count,
            source.uploaded_at.to_rfc3339()
        );
    }
    println!("\nTotal documents: {}", engine.size());
    Ok(())
}
