//! gvload - load a Google Voice export into a SQLite database
//!
//! Reads every exported page in a directory, reconciles contact names and
//! numbers across the whole export, then writes calls, voicemails,
//! recordings and text messages to the database and the resolved contacts
//! to a CSV file.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database (default): $XDG_DATA_HOME/gvload/gvload.db (~/.local/share/gvload/gvload.db)
//! - Logs: $XDG_STATE_HOME/gvload/gvload.log (~/.local/state/gvload/gvload.log)
//! - Config: $XDG_CONFIG_HOME/gvload/config.toml (~/.config/gvload/config.toml)

mod process_lock;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use gvload_core::contacts::{ensure_absent, write_contacts_csv, ContactDirectory};
use gvload_core::ingest::{IngestResult, Ingestor};
use gvload_core::reconcile::{reconcile, Reconciliation};
use gvload_core::{Config, Database, InsertSummary};
use indicatif::{ProgressBar, ProgressStyle};
use process_lock::acquire_load_guard;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gvload")]
#[command(about = "Load Google Voice data into a database")]
#[command(version)]
struct Args {
    /// Directory containing the exported Google Voice pages
    path: PathBuf,

    /// Database to create or append to (defaults to the configured database)
    database: Option<PathBuf>,

    /// Contacts CSV (Name,Number,Notes) to merge into reconciliation
    #[arg(short = 'c', long)]
    contacts: Option<PathBuf>,

    /// File to write discovered contacts to (must not exist)
    #[arg(short = 'f', long = "contact-csv")]
    contact_csv: Option<PathBuf>,

    /// Clear existing records before inserting new ones
    #[arg(long)]
    clear: bool,

    /// Comma-delimited list of this account's phone numbers
    #[arg(short = 'm', long = "my-numbers", value_delimiter = ',')]
    my_numbers: Vec<String>,

    /// Config file to use instead of the XDG default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output (-v per-file details, -vv debug logging)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    if !args.my_numbers.is_empty() {
        config.account.my_numbers = args.my_numbers.clone();
    }
    if args.verbose >= 2 {
        config.logging.level = "debug".to_string();
    }

    let _log_guard =
        gvload_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(path = %args.path.display(), "gvload starting");

    config
        .account
        .validate()
        .context("pass --my-numbers or set account.my_numbers in the config file")?;
    let my_numbers = config.account.normalized_numbers();

    let contact_csv = args
        .contact_csv
        .clone()
        .unwrap_or_else(|| config.output.contacts_csv.clone());
    ensure_absent(&contact_csv).context("refusing to overwrite contacts CSV")?;

    let directory = match &args.contacts {
        Some(path) => Some(
            ContactDirectory::read(path)
                .with_context(|| format!("failed to read contacts file {}", path.display()))?,
        ),
        None => None,
    };

    if !args.path.is_dir() {
        bail!("export directory not found: {}", args.path.display());
    }

    let ingestor = Ingestor::new(&args.path, my_numbers.clone())
        .with_extension(config.ingest.extension.clone())
        .with_progress_every(config.ingest.progress_every);
    let ingest = run_ingest(&ingestor)?;

    if ingest.documents.is_empty() {
        bail!("found no Google Voice records in {}", args.path.display());
    }
    println!("Read {} records.", ingest.documents.len());
    print_ingest_result(&ingest, args.verbose);

    let mut records = ingest.into_records();
    let outcome = reconcile(&mut records, directory.as_ref(), &my_numbers);

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| config.resolved_database());
    let _load_guard = acquire_load_guard(&db_path).context("failed to acquire process lock")?;

    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    if args.clear {
        db.clear_records().context("failed to clear existing records")?;
    }

    let inserted = db
        .insert_records(&records)
        .context("failed to insert records")?;

    let rows = outcome
        .index
        .contact_rows(directory.as_ref().map(|d| &d.notes));
    write_contacts_csv(&contact_csv, &rows).context("failed to write contacts CSV")?;
    let contacts = db
        .insert_contacts(&rows)
        .context("failed to insert contacts")?;

    print_load_result(&db_path, &contact_csv, &outcome, &inserted, contacts, args.verbose);

    tracing::info!(
        records = inserted.total(),
        contacts,
        "gvload complete"
    );

    Ok(())
}

/// Ingest every page with a progress bar
fn run_ingest(ingestor: &Ingestor) -> Result<IngestResult> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let result = ingestor
        .ingest_all_with_progress(|current, total, path| {
            if current == 0 {
                pb.set_length(total as u64);
            }
            pb.set_position(current as u64);
            pb.set_message(
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("...")
                    .to_string(),
            );
        })
        .with_context(|| format!("failed to read {}", ingestor.root().display()))?;

    pb.finish_and_clear();
    Ok(result)
}

/// Print ingest summary
fn print_ingest_result(result: &IngestResult, verbose: u8) {
    let (conversations, calls, audio) = result.kind_counts();

    println!("\nIngest complete:");
    println!("  Files processed:  {}", result.files_processed);
    println!("  Conversations:    {}", conversations);
    println!("  Calls:            {}", calls);
    println!("  Voicemail/audio:  {}", audio);
    println!("  Unrecognized:     {}", result.unrecognized.len());
    println!("  Multi-party:      {}", result.multi_party);

    if verbose >= 1 && !result.unrecognized.is_empty() {
        println!("\nUnrecognized files:");
        for path in &result.unrecognized {
            println!("  {}", shorten_path(path));
        }
    }

    if !result.errors.is_empty() {
        println!("\nErrors ({}):", result.errors.len());
        for (path, err) in &result.errors {
            println!("  {}: {}", shorten_path(path), err);
        }
    }
}

/// Print load summary
fn print_load_result(
    db_path: &Path,
    contact_csv: &Path,
    outcome: &Reconciliation,
    inserted: &InsertSummary,
    contacts: usize,
    verbose: u8,
) {
    println!("\nLoad complete:");
    println!("  Database:          {}", shorten_path(db_path));
    println!("  Texts inserted:    {}", inserted.texts);
    println!("  Calls inserted:    {}", inserted.calls);
    println!("  Audio inserted:    {}", inserted.audio);
    println!("  Missing numbers:   {}", inserted.missing_numbers);
    println!("  Contacts filled:   {}", outcome.contacts_filled);
    println!("  Ambiguities:       {}", outcome.ambiguities.len());
    println!("  Contacts inserted: {}", contacts);
    println!("  Contacts CSV:      {}", shorten_path(contact_csv));

    if verbose >= 1 && !outcome.ambiguities.is_empty() {
        println!("\nAmbiguous mappings:");
        for a in &outcome.ambiguities {
            println!(
                "  {:?} {}: {} vs {} -> {}",
                a.direction, a.key, a.incumbent, a.challenger, a.chosen
            );
        }
    }
}

/// Shorten a path for display by abbreviating the home directory
fn shorten_path(path: &Path) -> String {
    if let Ok(home) = std::env::var("HOME") {
        if let Ok(suffix) = path.strip_prefix(&home) {
            return format!("~/{}", suffix.display());
        }
    }
    path.display().to_string()
}
