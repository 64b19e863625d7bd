//! # CLI Module
//!
//! Command-line interface for the bookshelf catalog.
//!
//! ## Usage
//! ```bash
//! # Scan the folders listed in library.json
//! bookshelf scan
//!
//! # Scan explicit folders, one of them private, skipping a temp folder
//! bookshelf scan ~/Books --private ~/Books-private --exclude ~/Books/tmp
//!
//! # See what the rules make of a filename
//! bookshelf parse "Series Name - Vol.03 - Author.cbz"
//!
//! # List the catalog (private books hidden unless --private)
//! bookshelf list --output json
//!
//! # Drop soft-deleted rows for good
//! bookshelf purge
//! ```

use bookshelf_catalog::core::catalog::{Catalog, CatalogEntry, SqliteCatalog};
use bookshelf_catalog::core::library::{
    parse_extension_list, visible_entries, ExcludedPath, LibraryConfig, ScanTarget,
};
use bookshelf_catalog::core::parser::FilenameParser;
use bookshelf_catalog::core::pipeline::{
    lock_path_for, Pipeline, ScanCoordinator, ScanOutcome, ScanReport,
};
use bookshelf_catalog::core::rules::RuleSet;
use bookshelf_catalog::error::{ConfigurationError, Result};
use bookshelf_catalog::events::{
    Event, EventChannel, HashEvent, ReconcileEvent, ScanEvent, SessionEvent,
};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

const APP_DIR: &str = "bookshelf-catalog";

/// Bookshelf - keep a catalog of your e-books in step with your folders
#[derive(Parser, Debug)]
#[command(name = "bookshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Library config file (targets, exclusions, extensions)
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Parsing rules file
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan folders and reconcile the catalog with them
    Scan {
        /// Folders to scan (added to those in the library config)
        paths: Vec<PathBuf>,

        /// Folders to scan whose books are hidden outside private mode
        #[arg(long = "private", value_name = "PATH")]
        private_paths: Vec<PathBuf>,

        /// Folders to skip entirely
        #[arg(short, long, value_name = "PATH")]
        exclude: Vec<PathBuf>,

        /// Comma-separated extension allow-list, e.g. "epub,pdf,cbz"
        #[arg(long)]
        extensions: Option<String>,

        /// Hashing worker threads
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the metadata the rules extract from filenames
    Parse {
        #[arg(required = true)]
        filenames: Vec<String>,
    },

    /// List active catalog entries
    List {
        /// Include books from private folders
        #[arg(long)]
        private: bool,
    },

    /// Permanently remove soft-deleted entries
    Purge,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (paths only)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let library_path = cli.library.clone().unwrap_or_else(|| default_config_path("library.json"));

    match cli.command {
        Commands::Scan {
            paths,
            private_paths,
            exclude,
            extensions,
            threads,
            include_hidden,
            verbose,
        } => {
            let mut library = LibraryConfig::load_or_default(&library_path)?;
            library
                .targets
                .extend(paths.into_iter().map(ScanTarget::new));
            library
                .targets
                .extend(private_paths.into_iter().map(ScanTarget::private));
            library
                .excluded
                .extend(exclude.into_iter().map(ExcludedPath::new));
            if let Some(setting) = extensions {
                library.extensions = parse_extension_list(&setting);
            }
            if threads.is_some() {
                library.hash_threads = threads;
            }

            if library.targets.is_empty() {
                return Err(ConfigurationError::Malformed {
                    origin: library_path.display().to_string(),
                    reason: "no scan targets: pass folders or list them under \"targets\""
                        .to_string(),
                }
                .into());
            }

            let rules = load_rules(cli.rules.as_deref())?;
            run_scan(&db_path, library, rules, include_hidden, cli.output, verbose)
        }
        Commands::Parse { filenames } => {
            let rules = load_rules(cli.rules.as_deref())?;
            run_parse(&filenames, rules, cli.output);
            Ok(())
        }
        Commands::List { private } => {
            let library = LibraryConfig::load_or_default(&library_path)?;
            run_list(&db_path, &library, private, cli.output)
        }
        Commands::Purge => run_purge(&db_path, cli.output),
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("catalog.db")
}

fn default_config_path(file: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(file)
}

/// An explicit rules file must exist; the default one may be absent
fn load_rules(explicit: Option<&Path>) -> Result<RuleSet> {
    let rules = match explicit {
        Some(path) => RuleSet::load(path)?,
        None => RuleSet::load_or_builtin(&default_config_path("parsing_rules.json"))?,
    };
    Ok(rules)
}

fn run_scan(
    db_path: &Path,
    library: LibraryConfig,
    rules: RuleSet,
    include_hidden: bool,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Bookshelf").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let catalog = Arc::new(SqliteCatalog::open(db_path)?);
    let coordinator = ScanCoordinator::with_lock_file(lock_path_for(db_path));
    let session = coordinator.begin()?;

    let pipeline = Pipeline::builder()
        .library(&library)
        .rules(rules)
        .include_hidden(include_hidden)
        .catalog(catalog)
        .build();

    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();

    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Session(SessionEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Scan(ScanEvent::Completed { total_files }) => {
                    pb.set_length(total_files as u64);
                }
                Event::Hash(HashEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    if verbose {
                        pb.set_message(
                            p.current_path
                                .file_name()
                                .unwrap_or_default()
                                .to_string_lossy()
                                .into_owned(),
                        );
                    }
                }
                Event::Reconcile(ReconcileEvent::Moved { from, to, .. }) if verbose => {
                    pb.println(format!("  moved {} → {}", from.display(), to.display()));
                }
                Event::Session(SessionEvent::Completed { .. })
                | Event::Session(SessionEvent::Aborted { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_with_events(session, &sender);

    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = result?;

    match output {
        OutputFormat::Pretty => print_pretty_report(&term, &report, verbose),
        OutputFormat::Json => print_json(&report),
        OutputFormat::Minimal => {
            for warning in &report.warnings {
                println!("{}\t{}", warning.path.display(), warning.reason);
            }
        }
    }

    if !report.is_completed() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_pretty_report(term: &Term, report: &ScanReport, verbose: bool) {
    match &report.outcome {
        ScanOutcome::Completed => {
            term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
                .ok();
        }
        ScanOutcome::Aborted { reason } => {
            term.write_line(&format!(
                "{} Scan Aborted: {}",
                style("✗").red().bold(),
                reason
            ))
            .ok();
        }
    }
    term.write_line("").ok();

    let counts = &report.counts;
    term.write_line(&format!(
        "  {} files seen in {:.1}s",
        style(counts.files_seen).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();

    for (count, label) in [
        (counts.inserted, "added"),
        (counts.moved, "moved"),
        (counts.content_updated, "updated in place"),
        (counts.deleted, "marked deleted"),
        (counts.unchanged, "unchanged"),
    ] {
        term.write_line(&format!("  {} {}", style(count).cyan(), label))
            .ok();
    }

    if counts.skipped > 0 {
        term.write_line(&format!(
            "  {} skipped with warnings",
            style(counts.skipped).yellow()
        ))
        .ok();
    }

    if !report.warnings.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Warnings:").bold().underlined()))
            .ok();

        let shown = if verbose { report.warnings.len() } else { 10 };
        for warning in report.warnings.iter().take(shown) {
            term.write_line(&format!(
                "  {} {}: {}",
                style("!").yellow(),
                display_path(&warning.path),
                warning.reason
            ))
            .ok();
        }
        if report.warnings.len() > shown {
            term.write_line(&format!(
                "  {}",
                style(format!(
                    "... and {} more (use --verbose)",
                    report.warnings.len() - shown
                ))
                .dim()
            ))
            .ok();
        }
    }
}

fn run_parse(filenames: &[String], rules: RuleSet, output: OutputFormat) {
    let parser = FilenameParser::new(rules);

    #[derive(Serialize)]
    struct Parsed<'a> {
        filename: &'a str,
        #[serde(flatten)]
        metadata: bookshelf_catalog::core::catalog::BookMetadata,
    }

    let parsed: Vec<Parsed<'_>> = filenames
        .iter()
        .map(|name| Parsed {
            filename: name,
            metadata: parser.parse(name),
        })
        .collect();

    match output {
        OutputFormat::Json => print_json(&parsed),
        OutputFormat::Minimal => {
            for p in &parsed {
                println!("{}", p.metadata.title.as_deref().unwrap_or(""));
            }
        }
        OutputFormat::Pretty => {
            for p in &parsed {
                println!("{}", style(p.filename).bold());
                let m = &p.metadata;
                let fields = [
                    ("title", m.title.clone()),
                    ("subtitle", m.subtitle.clone()),
                    ("volume", m.volume.map(|v| v.to_string())),
                    ("author", m.author.clone()),
                    ("original author", m.original_author.clone()),
                    ("series", m.series.clone()),
                    ("category", m.category.clone()),
                    ("rating", m.rating.map(|r| r.to_string())),
                ];
                for (label, value) in fields {
                    if let Some(value) = value {
                        println!("  {:<16} {}", style(label).dim(), value);
                    }
                }
                if m.is_collection_volume {
                    println!("  {:<16} yes", style("collection").dim());
                }
                println!();
            }
        }
    }
}

fn run_list(
    db_path: &Path,
    library: &LibraryConfig,
    private_mode: bool,
    output: OutputFormat,
) -> Result<()> {
    let catalog = SqliteCatalog::open(db_path)?;
    let mut entries = catalog.list_active()?;
    entries.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    let shown: Vec<&CatalogEntry> = visible_entries(&entries, &library.targets, private_mode);

    match output {
        OutputFormat::Json => print_json(&shown),
        OutputFormat::Minimal => {
            for entry in &shown {
                println!("{}", entry.file_path.display());
            }
        }
        OutputFormat::Pretty => {
            for entry in &shown {
                let mut line = style(entry.display_title()).bold().to_string();
                if let Some(volume) = entry.metadata.volume {
                    line.push_str(&format!(" #{}", volume));
                }
                if let Some(author) = &entry.metadata.author {
                    line.push_str(&format!(" {}", style(author).cyan()));
                }
                println!("{}", line);
                println!("    {}", style(display_path(&entry.file_path)).dim());
            }
            let hidden = entries.len() - shown.len();
            if hidden > 0 {
                println!();
                println!(
                    "{}",
                    style(format!("{} private books hidden (use --private)", hidden)).dim()
                );
            }
        }
    }

    Ok(())
}

fn run_purge(db_path: &Path, output: OutputFormat) -> Result<()> {
    let catalog = SqliteCatalog::open(db_path)?;
    // Never purge underneath a running scan
    let _session = ScanCoordinator::with_lock_file(lock_path_for(db_path)).begin()?;
    let removed = catalog.purge_deleted()?;

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "purged": removed })),
        _ => println!("Purged {} deleted entries", removed),
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to render JSON: {}", e),
    }
}

fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}
