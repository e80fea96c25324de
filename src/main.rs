//! dtsettings - Download Dynatrace settings objects to JSON files.
//!
//! ## Usage
//!
//! ```bash
//! # Export the schemas listed in ./schemas_config.txt to ./downloaded_settings
//! # (DYNATRACE_URL and DYNATRACE_API_TOKEN come from the environment or .env)
//! dtsettings
//!
//! # Custom schema list and output directory
//! dtsettings --schemas my_schemas.txt --output backup/
//!
//! # Write a schema list with the default schemas
//! dtsettings init-schemas
//!
//! # Check an export against its manifest
//! dtsettings verify backup/
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dtsettings::{
    Credentials, DEFAULT_SCHEMA_FILE, Error, ExportConfig, ExportEvent, ExportManifest,
    ExportSummary, Exporter, FetchMode, HttpSettingsClient, JsonStorage, Result, TOKEN_ENV,
    URL_ENV, read_schema_file,
};

/// Process exit code when the run finished but not everything succeeded
const EXIT_PARTIAL: u8 = 2;

/// Progress is printed every this many objects (and for the last one)
const PROGRESS_EVERY: usize = 5;

const RULE: &str = "============================================================";

fn main() -> ExitCode {
    // Variables already set in the environment win over .env
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "error",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Command::InitSchemas { path, force }) => init_schemas(&path, force),
        Some(Command::Verify { dir }) => verify(&dir),
        None => export(&cli.export),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("✗ Error: {err}");
            exit_code_for(&err)
        }
    }
}

/// Fatal errors exit 1; a failure after the export finished (archive) exits 2
fn exit_code_for(err: &Error) -> ExitCode {
    if err.is_config_error() {
        eprintln!(
            "  Check {URL_ENV}, {TOKEN_ENV} (environment or .env) and the schema list \
             (`dtsettings init-schemas` writes a default one)"
        );
    }
    if err.is_fatal() {
        ExitCode::FAILURE
    } else {
        ExitCode::from(EXIT_PARTIAL)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "dtsettings",
    author,
    version,
    about = "Download Dynatrace settings objects into one JSON file per object",
    args_conflicts_with_subcommands = true,
    after_help = "Environment:\n  \
        DYNATRACE_URL        Environment URL, e.g. https://abc12345.live.dynatrace.com\n  \
        DYNATRACE_API_TOKEN  API token with the settings.read scope\n\n\
        Both may be placed in a .env file in the working directory."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    export: ExportArgs,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Dynatrace environment URL
    #[arg(long, env = URL_ENV)]
    url: Option<String>,

    /// Dynatrace API token
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    token: Option<String>,

    /// Schema list file (one schema ID per line, '#' comments)
    #[arg(short, long, default_value = DEFAULT_SCHEMA_FILE)]
    schemas: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "downloaded_settings")]
    output: PathBuf,

    /// Write the objects returned by the list call instead of fetching each one
    #[arg(long)]
    list_only: bool,

    /// Page size for the list call (1-500, API default when omitted)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=500))]
    page_size: Option<u32>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Do not write manifest.json
    #[arg(long)]
    no_manifest: bool,

    /// Create files readable by the current user only
    #[arg(long)]
    secure: bool,

    /// Also pack the export into this zip file
    #[cfg(feature = "archive")]
    #[arg(long, value_name = "FILE")]
    archive: Option<PathBuf>,

    /// Only print the summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a schema list file containing the default schemas
    InitSchemas {
        /// Destination file
        #[arg(default_value = DEFAULT_SCHEMA_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check an export directory against its manifest.json
    Verify {
        /// Export directory
        #[arg(default_value = "downloaded_settings")]
        dir: PathBuf,
    },
}

fn export(args: &ExportArgs) -> Result<ExitCode> {
    println!("{RULE}");
    println!("Dynatrace Settings Objects Downloader");
    println!("{RULE}");

    let url = args.url.as_deref().ok_or(Error::MissingEnv(URL_ENV))?;
    let token = args.token.as_deref().ok_or(Error::MissingEnv(TOKEN_ENV))?;
    let credentials = Credentials::new(url, token)?;
    println!("✓ Using Dynatrace environment: {}", credentials.display_url());

    let schemas = read_schema_file(&args.schemas)?;
    println!(
        "✓ Loaded {} schemas from config file: {}",
        schemas.len(),
        args.schemas.display()
    );

    let mut builder = ExportConfig::builder(credentials)
        .schemas(schemas)
        .output_dir(&args.output)
        .timeout(Duration::from_secs(args.timeout))
        .secure_output(args.secure);
    if args.list_only {
        builder = builder.fetch_mode(FetchMode::ListOnly);
    }
    if let Some(size) = args.page_size {
        builder = builder.page_size(size);
    }
    if args.no_manifest {
        builder = builder.without_manifest();
    }
    let config = builder.build();

    let client = HttpSettingsClient::from_config(&config)?;
    let mut exporter = Exporter::new(config, client);
    let quiet = args.quiet;
    exporter.on_event(move |event| report(event, quiet));

    let summary = exporter.run()?;
    print_summary(&summary);

    #[cfg(feature = "archive")]
    if let Some(archive) = &args.archive {
        let info = dtsettings::create_archive(&summary.output_dir, archive)?;
        println!(
            "  ✓ Archive: {} ({} files, sha256 {})",
            info.path.display(),
            info.files,
            info.sha256
        );
    }

    if summary.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

/// Console rendering of progress events
fn report(event: &ExportEvent<'_>, quiet: bool) {
    if quiet {
        return;
    }
    match event {
        ExportEvent::Started { output_dir, .. } => {
            println!("✓ Output directory: {}", absolute(output_dir).display());
        }
        ExportEvent::SchemaStarted { schema_id } => {
            println!("\n📋 Processing schema: {schema_id}");
        }
        ExportEvent::SchemaListed { count: 0, .. } => {
            println!("  ℹ No objects found for this schema");
        }
        ExportEvent::SchemaListed { count, .. } => {
            println!("  ℹ Found {count} objects to download");
        }
        ExportEvent::ObjectSaved { index, total, .. } => {
            if index % PROGRESS_EVERY == 0 || index == total {
                println!("  ⬇ Downloaded {index}/{total} objects");
            }
        }
        ExportEvent::ObjectFailed { failure, .. } => {
            println!("  ✗ Error downloading object {failure}");
        }
        ExportEvent::SchemaFinished { outcome } => {
            if let Some(err) = &outcome.list_error {
                println!("  ✗ Error listing settings for schema {}: {err}", outcome.schema_id);
            } else if outcome.found > 0 {
                println!(
                    "  ✓ Downloaded {}/{} objects successfully",
                    outcome.downloaded, outcome.found
                );
            }
        }
        ExportEvent::ManifestWritten { path } => {
            println!("\n✓ Manifest: {}", path.display());
        }
        ExportEvent::Finished { .. } => {}
    }
}

fn print_summary(summary: &ExportSummary) {
    println!("\n{RULE}");
    println!("Summary:");
    println!(
        "  ✓ Schemas processed: {}/{}",
        summary.schemas_succeeded(),
        summary.schemas_attempted()
    );
    println!("  ✓ Total objects downloaded: {}", summary.total_downloaded());
    let failed = summary.failures().count();
    if failed > 0 {
        println!("  ✗ Objects failed: {failed}");
    }
    println!("  ✓ Output location: {}", absolute(&summary.output_dir).display());
    println!("{RULE}");
}

fn init_schemas(path: &Path, force: bool) -> Result<ExitCode> {
    dtsettings::config::write_default_schema_file(path, force)?;
    println!("✓ Wrote default schema list to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn verify(dir: &Path) -> Result<ExitCode> {
    let manifest = ExportManifest::load(&JsonStorage::new(), dir)?;
    let check = manifest.verify(dir)?;

    println!(
        "✓ {} files checked against manifest ({} recorded)",
        check.checked,
        manifest.total_objects()
    );
    for file in &check.missing {
        println!("  ✗ Missing: {file}");
    }
    for file in &check.mismatched {
        println!("  ✗ Changed: {file}");
    }
    for schema in manifest.schemas.iter().filter(|s| !s.complete) {
        println!("  ℹ Export of {} was incomplete", schema.schema_id);
    }

    if check.is_ok() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
