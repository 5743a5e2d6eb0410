//! vocload CLI - validate VOC spreadsheets and register them
//!
//! # Main Commands
//!
//! ```bash
//! vocload run                      # Validate, map and submit the CSV in VOC_DATA_FILE_PATH
//! vocload run --infer              # Same, filling missing VOC types with Gemini first
//! vocload serve                    # Start the dry-run HTTP API (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! vocload check voc.csv            # Validation report only
//! vocload map voc.csv -o out.json  # Form records that would be submitted
//! vocload parse voc.csv            # Just parse CSV to JSON
//! ```
//!
//! Every command reads its settings from the environment / `.env`. Only
//! `run` needs the login and endpoint variables of the VOC application.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use vocload::ai::{GeminiClient, RateLimiter, TypeEnricher};
use vocload::api::logs::log_warning;
use vocload::directory::{AnyDirectorySource, DirectorySource};
use vocload::http::{check_operator, submit_all, AuthService, SessionRegistry};
use vocload::parser::{decode_content, detect_encoding, parse_csv_file_auto, parse_str};
use vocload::transform::pipeline::{find_data_file, load_batch, PipelineContext, PreparedBatch};
use vocload::config::RemoteSettings;
use vocload::Settings;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "vocload")]
#[command(about = "Validate VOC spreadsheets and register them in the VOC system", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full run: authorize, validate, map, log in and submit
    Run {
        /// Infer missing VOC types with Gemini (needs GOOGLE_API_KEY)
        #[arg(long)]
        infer: bool,

        /// Submit without waiting for Enter
        #[arg(short, long)]
        yes: bool,
    },

    /// Validate a VOC CSV and print the excluded rows
    Check {
        /// Input CSV file
        input: PathBuf,
    },

    /// Validate and map a VOC CSV, writing the form records as JSON
    Map {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the dry-run HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { infer, yes } => cmd_run(infer, yes).await,
        Commands::Check { input } => cmd_check(&input).await,
        Commands::Map { input, output } => cmd_map(&input, output.as_deref()).await,
        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),
        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_run(infer: bool, yes: bool) -> CliResult {
    let settings = Settings::from_env()?;
    let remote = RemoteSettings::from_env()?;
    let sessions = SessionRegistry::new();

    let result = run(&settings, &remote, &sessions, infer, yes).await;

    sessions.close_all();
    result
}

async fn run(settings: &Settings, remote: &RemoteSettings, sessions: &SessionRegistry, infer: bool, yes: bool) -> CliResult {
    let source = AnyDirectorySource::connect(&settings.directory).await?;

    eprintln!("🔐 Checking operator {}", remote.login_id);
    let members = source.fetch_auth_members().await?;
    check_operator(&remote.login_id, &members)?;

    let context = PipelineContext::load(settings, &source).await?;

    let data_file = find_data_file(&settings.data_dir)?;
    eprintln!("📄 Processing: {}", data_file.display());
    let batch = load_batch(&data_file)?;

    let prepared = if infer {
        match GeminiClient::from_settings(&settings.ai) {
            Ok(client) => {
                let enricher = TypeEnricher::new(
                    client,
                    RateLimiter::from_settings(&settings.ai),
                    &settings.ai.reason_log_dir,
                )
                .with_delay(settings.ai.request_delay);
                context.prepare_with_inference(batch, &enricher).await
            }
            Err(e) => {
                log_warning(format!("Type inference disabled: {}", e));
                context.prepare(batch)
            }
        }
    } else {
        context.prepare(batch)
    };

    print_summary(&prepared);

    if prepared.records.is_empty() {
        eprintln!("\n❗ Nothing to submit");
        return Ok(());
    }

    let session = sessions.open()?;
    AuthService::new(&session, remote).login_and_fetch_voc_page().await?;

    if !yes && !confirm(prepared.records.len())? {
        eprintln!("Cancelled, nothing submitted");
        return Ok(());
    }

    let report = submit_all(&session, &remote.insert_url, &prepared.records).await;

    eprintln!("\n🎉 Submission finished: {} of {} accepted", report.succeeded, report.total);
    for failure in &report.failures {
        eprintln!(
            "   ❌ record {} ({}): {}{}",
            failure.record,
            failure.requester,
            failure.status.map(|s| format!("HTTP {} ", s)).unwrap_or_default(),
            failure.message
        );
    }
    Ok(())
}

fn confirm(count: usize) -> io::Result<bool> {
    eprint!("\nPress Enter to submit {} records (type 'n' to cancel)... ", count);
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(!answer.trim().eq_ignore_ascii_case("n"))
}

async fn load_context(settings: &Settings) -> Result<PipelineContext, Box<dyn std::error::Error>> {
    let source = AnyDirectorySource::connect(&settings.directory).await?;
    Ok(PipelineContext::load(settings, &source).await?)
}

async fn cmd_check(input: &Path) -> CliResult {
    let settings = Settings::from_env()?;
    let context = load_context(&settings).await?;

    eprintln!("📄 Checking: {}", input.display());
    let prepared = context.prepare(load_batch(input)?);
    print_summary(&prepared);
    Ok(())
}

async fn cmd_map(input: &Path, output: Option<&Path>) -> CliResult {
    let settings = Settings::from_env()?;
    let context = load_context(&settings).await?;

    eprintln!("📄 Mapping: {}", input.display());
    let prepared = context.prepare(load_batch(input)?);
    print_summary(&prepared);

    let json = serde_json::to_string_pretty(&prepared.records)?;
    write_output(&json, output)?;
    Ok(())
}

fn cmd_parse(input: &Path, delimiter: Option<char>, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = match delimiter {
        Some(d) => {
            let bytes = fs::read(input)?;
            let encoding = detect_encoding(&bytes);
            let content = decode_content(&bytes, &encoding)?;
            parse_str(&content, d, encoding)?
        }
        None => parse_csv_file_auto(input)?,
    };

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let json = serde_json::to_string_pretty(&result.records)?;
    write_output(&json, output)?;

    Ok(())
}

async fn cmd_serve(port: u16) -> CliResult {
    let settings = Settings::from_env()?;
    let context = load_context(&settings).await?;
    vocload::server::start_server(port, context).await?;
    Ok(())
}

fn print_summary(prepared: &PreparedBatch) {
    prepared.log_excluded();

    eprintln!("\n📊 Summary");
    eprintln!("   Input rows:     {}", prepared.input_count);
    eprintln!("   Excluded rows:  {}", prepared.excluded.len());
    if let Some(inference) = &prepared.inference {
        eprintln!(
            "   Types inferred: {} of {}{}",
            inference.filled,
            inference.attempted,
            if inference.stopped_by_limit { " (stopped by quota)" } else { "" }
        );
    }
    eprintln!("   Ready records:  {}", prepared.records.len());
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
