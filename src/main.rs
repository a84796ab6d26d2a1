use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mindtree::config::{ensure_database_directory, load_dotenv_from};
use mindtree::llm::LlmClientBuilder;
use mindtree::service::HttpFetcher;
use mindtree::{
    Assistant, Config, Database, ImportSummary, LinkRebuildReport, ObsidianService, SourceFile,
    linker, logging,
};

/// mindtree - knowledge graph from Obsidian vaults
#[derive(Parser)]
#[command(name = "mindtree")]
#[command(about = "Import Obsidian notes and canvases into a linked knowledge graph")]
#[command(version)]
struct Cli {
    /// Database file, overriding MINDTREE_DB
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Import a vault directory or individual files
    Import(ImportCommand),
    /// Download and import one document
    ImportUrl(ImportUrlCommand),
    /// Rebuild stored links
    Links(LinksCommand),
    /// Print nodes and explicit links as JSON
    Graph,
    /// Search imported notes
    Search(SearchCommand),
    /// Print the digest handed to the assistant
    Context,
    /// Ask the assistant a question about the notes
    Ask(AskCommand),
    /// List recent import logs
    Logs(LogsCommand),
}

#[derive(Parser)]
struct ImportCommand {
    /// A directory, or one or more .md/.canvas/.txt files
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Parser)]
struct ImportUrlCommand {
    #[arg(value_name = "URL")]
    url: String,
}

#[derive(Parser)]
struct LinksCommand {
    #[arg(value_enum)]
    mode: LinkMode,
}

#[derive(Clone, Copy, ValueEnum)]
enum LinkMode {
    /// Wiki-links and canvas edges only
    Explicit,
    /// Wiki-links plus inferred tag and title links
    Generate,
}

#[derive(Parser)]
struct SearchCommand {
    #[arg(value_name = "QUERY")]
    query: String,

    /// Maximum number of results
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
}

#[derive(Parser)]
struct AskCommand {
    #[arg(value_name = "QUESTION")]
    question: String,
}

#[derive(Parser)]
struct LogsCommand {
    /// Maximum number of logs
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let dotenv = load_dotenv_from(Path::new(".env"));
    let mut config = Config::from_env()?;
    if let Some(path) = cli.db {
        config = config.with_database_path(path);
    }
    logging::init(&config)?;
    if let Err(e) = dotenv {
        tracing::warn!(error = %e, "ignoring unreadable .env file");
    }

    ensure_database_directory(&config.database_path)?;
    let db = Database::open(&config.database_path).context("Failed to open database")?;
    let service = ObsidianService::new(db);

    match cli.command {
        Commands::Import(cmd) => execute_import(&cmd.paths, &service, &config),
        Commands::ImportUrl(cmd) => {
            let summary =
                service.import_from_url(&cmd.url, &HttpFetcher::new()?, config.user.as_deref())?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Links(cmd) => execute_links(cmd.mode, &service),
        Commands::Graph => {
            let network = service.get_network_data()?;
            println!("{}", serde_json::to_string_pretty(&network)?);
            Ok(())
        }
        Commands::Search(cmd) => execute_search(&cmd.query, cmd.limit, &service),
        Commands::Context => {
            println!("{}", service.get_obsidian_context()?);
            Ok(())
        }
        Commands::Ask(cmd) => execute_ask(&cmd.question, &service, &config),
        Commands::Logs(cmd) => execute_logs(cmd.limit, &service),
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad paths, unsupported input and invalid URLs.
/// Database, network and model failures are internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    const USER_ERRORS: [&str; 6] = [
        "cannot be empty",
        "Not a directory",
        "No nodes imported",
        "Invalid URL",
        "Failed to read",
        "Unsupported file",
    ];
    error
        .chain()
        .any(|cause| USER_ERRORS.iter().any(|m| cause.to_string().contains(m)))
}

fn execute_import(paths: &[PathBuf], service: &ObsidianService, config: &Config) -> Result<()> {
    let summary = match paths {
        [dir] if dir.is_dir() => service.import_from_directory(dir, config.user.as_deref())?,
        _ => {
            let files = read_source_files(paths)?;
            service.import_from_files(&files, config.user.as_deref())?
        }
    };
    print_summary(&summary);
    Ok(())
}

/// Reads files given on the command line, keeping the paths as typed.
fn read_source_files(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    if paths.is_empty() {
        anyhow::bail!("Import paths cannot be empty");
    }
    paths
        .iter()
        .map(|path| {
            if path.is_dir() {
                anyhow::bail!(
                    "Unsupported file: {} is a directory; import directories one at a time",
                    path.display()
                );
            }
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SourceFile::new(display_path(path), content))
        })
        .collect()
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Imported {}: {} nodes ({} new, {} updated), {} links",
        summary.import_source,
        summary.nodes_total(),
        summary.nodes_created,
        summary.nodes_updated,
        summary.links_created
    );
    if summary.links_skipped > 0 {
        println!("  {} duplicate links skipped", summary.links_skipped);
    }
    if summary.unresolved_links > 0 {
        println!("  {} links point to notes that were not imported", summary.unresolved_links);
    }
    for failure in &summary.failures {
        println!("  failed: {} ({})", failure.path, failure.error);
    }
    for skipped in &summary.skipped_files {
        println!("  skipped: {skipped}");
    }
}

fn execute_links(mode: LinkMode, service: &ObsidianService) -> Result<()> {
    let report = match mode {
        LinkMode::Explicit => linker::extract_explicit_links(service.store())?,
        LinkMode::Generate => linker::generate_links(service.store())?,
    };
    println!("{}", format_report(&report));
    Ok(())
}

fn format_report(report: &LinkRebuildReport) -> String {
    format!(
        "Removed {} links, created {} (wiki {}, canvas-edge {}, tag {}, title-similarity {}), {} unresolved",
        report.removed,
        report.total(),
        report.wiki,
        report.canvas_edge,
        report.tag,
        report.title_similarity,
        report.unresolved
    )
}

fn execute_search(query: &str, limit: usize, service: &ObsidianService) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("Search query cannot be empty");
    }

    let results = service.search_obsidian_nodes(query, limit)?;
    if results.is_empty() {
        println!("No notes found.");
        return Ok(());
    }
    for result in results {
        println!(
            "{:>6.1}  {} ({})",
            result.score,
            result.node.title(),
            result.node.path()
        );
    }
    Ok(())
}

fn execute_ask(question: &str, service: &ObsidianService, config: &Config) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question cannot be empty");
    }

    let client = LlmClientBuilder::new()
        .build()
        .context("Failed to create LLM client")?;
    let assistant = Assistant::new(service, client, config.context_ttl);
    let answer = assistant.ask(question)?;

    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("\nSources: {}", answer.sources.join(", "));
    }
    Ok(())
}

fn execute_logs(limit: usize, service: &ObsidianService) -> Result<()> {
    let logs = service.store().list_import_logs(Some(limit))?;
    if logs.is_empty() {
        println!("No imports recorded.");
        return Ok(());
    }
    for log in logs {
        let status = if log.success { "ok" } else { "failed" };
        print!(
            "{} {:<6} {} ({} nodes, {} links)",
            log.imported_at, status, log.import_source, log.nodes_count, log.links_count
        );
        if let Some(error) = &log.error {
            print!(": {error}");
        }
        println!();
    }
    Ok(())
}
