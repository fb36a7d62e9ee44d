//! protoir - Compile protocol documents into typed descriptions and code
//!
//! This tool loads protocol documents (JSON records produced by a document
//! front end), builds the typed protocol IR for each one and writes one
//! artifact per selected output format.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use protoir_core::{
    emit, Backend, EmitConfig, Protocol, ProtocolDocument, RustBackend, SimpleBackend,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Compile protocol documents into typed descriptions and code
#[derive(Parser, Debug)]
#[command(name = "protoir")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Output directory for generated artifacts
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format; repeat to produce several artifacts per document
    #[arg(long, value_enum, default_value = "simple")]
    format: Vec<OutputFormat>,

    /// Indentation used in generated artifacts
    #[arg(long, default_value = "  ")]
    indent: String,

    /// Leave descriptive comments out of generated artifacts
    #[arg(long)]
    no_comments: bool,

    /// Dry run - don't write files, just show what would be generated
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing artifacts whose content differs
    #[arg(long)]
    force: bool,

    /// Only print the emission order of each document
    #[arg(long)]
    list_only: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single protocol document
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of protocol documents (*.json)
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Output format for generated artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable description (.txt)
    Simple,
    /// Rust type skeletons (.rs)
    Rust,
}

impl OutputFormat {
    fn backend(self, config: EmitConfig) -> Box<dyn Backend> {
        match self {
            OutputFormat::Simple => Box::new(SimpleBackend::new(config)),
            OutputFormat::Rust => Box::new(RustBackend::new(config)),
        }
    }
}

/// Result of writing one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    /// New or replaced content was written
    Written,
    /// The existing file already held identical content
    Unchanged,
}

/// Tracks what a batch produced
#[derive(Default)]
struct BatchStats {
    documents: usize,
    documents_failed: usize,
    backends_failed: usize,
    written: usize,
    unchanged: usize,
    writes_failed: usize,
}

impl BatchStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} documents ({} failed), {} artifacts written, {} unchanged, {} write failures, {} backend failures",
            self.documents,
            self.documents_failed,
            self.written,
            self.unchanged,
            self.writes_failed,
            self.backends_failed
        );
    }
}

/// Compute a hash of artifact content
fn content_hash(content: &[u8]) -> blake3::Hash {
    blake3::hash(content)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    // Dispatch based on input mode
    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, file)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Process a single protocol document
fn process_single_file(cli: &Cli, file: &Path) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let stem = file
        .file_stem()
        .map(PathBuf::from)
        .with_context(|| format!("Input path has no file name: {}", file.display()))?;

    let mut stats = BatchStats::default();
    stats.documents += 1;
    process_document(cli, file, &stem, &mut stats)?;

    if !cli.list_only && !cli.dry_run {
        stats.print_summary();
    }

    Ok(())
}

/// Process a directory of protocol documents recursively
fn process_directory(cli: &Cli, directory: &Path) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut stats = BatchStats::default();

    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() || is_hidden(path) {
            continue;
        }

        if !is_document(path) {
            trace!("Skipping non-document: {}", path.display());
            continue;
        }

        // Artifacts mirror the input tree under the output directory
        let relative = path
            .strip_prefix(directory)
            .unwrap_or(path)
            .with_extension("");

        debug!("Processing document: {}", path.display());
        stats.documents += 1;
        if let Err(e) = process_document(cli, path, &relative, &mut stats) {
            // Log error but continue with other documents
            warn!("Error processing {}: {:#}", path.display(), e);
            stats.documents_failed += 1;
        }
    }

    if !cli.list_only && !cli.dry_run {
        stats.print_summary();
    }

    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Load one document and build its protocol
fn load_protocol(path: &Path) -> Result<Protocol> {
    trace!("Reading {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;

    let doc = ProtocolDocument::from_json(&text)
        .with_context(|| format!("Failed to parse document: {}", path.display()))?;

    Protocol::from_document(&doc)
        .with_context(|| format!("Failed to build protocol '{}' from {}", doc.name, path.display()))
}

/// Build one document and write an artifact per selected format.
///
/// `stem` is the artifact path relative to the output directory, without
/// extension. A failing backend is logged and the remaining formats still run.
fn process_document(cli: &Cli, path: &Path, stem: &Path, stats: &mut BatchStats) -> Result<()> {
    let protocol = load_protocol(path)?;
    let order = protocol
        .emission_order()
        .with_context(|| format!("Failed to order protocol '{}'", protocol.name()))?;

    debug!(
        "Protocol '{}' from {}: {} names to emit",
        protocol.name(),
        path.display(),
        order.len()
    );

    if cli.list_only {
        for name in &order {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = EmitConfig::new()
        .indent_str(cli.indent.clone())
        .include_comments(!cli.no_comments);

    for format in &cli.format {
        let mut backend = format.backend(config.clone());
        let report = emit(&protocol, &order, backend.as_mut());
        if !report.is_complete() {
            for (name, e) in &report.failures {
                error!("{} backend failed on '{}': {}", backend.name(), name, e);
            }
            stats.backends_failed += 1;
            continue;
        }

        let output_path = artifact_path(&cli.output, stem, backend.extension());
        let content = backend.output();

        if cli.dry_run {
            println!("Would write: {}", output_path.display());
            if cli.verbose > 0 {
                println!("---");
                println!("{}", content);
                println!("---");
            }
            continue;
        }

        match write_artifact(&output_path, &content, cli.force) {
            Ok(WriteOutcome::Written) => {
                println!("Wrote {}", output_path.display());
                stats.written += 1;
            }
            Ok(WriteOutcome::Unchanged) => {
                debug!("Unchanged: {}", output_path.display());
                stats.unchanged += 1;
            }
            Err(e) => {
                error!("Failed to write {}: {:#}", output_path.display(), e);
                stats.writes_failed += 1;
            }
        }
    }

    Ok(())
}

/// `<output>/<stem>.<extension>`; dots already in `stem` are kept
fn artifact_path(output: &Path, stem: &Path, extension: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    output.join(name)
}

/// Write an artifact, leaving identical existing content untouched
fn write_artifact(output_path: &Path, content: &str, force: bool) -> Result<WriteOutcome> {
    // Create parent directories
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    if output_path.exists() {
        let existing = fs::read(output_path)
            .with_context(|| format!("Failed to read file: {}", output_path.display()))?;
        if content_hash(&existing) == content_hash(content.as_bytes()) {
            return Ok(WriteOutcome::Unchanged);
        }
        if !force {
            bail!(
                "File already exists with different content: {} (use --force to overwrite)",
                output_path.display()
            );
        }
    }

    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(WriteOutcome::Written)
}
