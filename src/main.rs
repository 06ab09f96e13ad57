//! Sotto - private, local-first dictation
//!
//! Run with `sotto` or `sotto daemon` to start the daemon.
//! Use `sotto transcribe <file>` to transcribe an audio file.
//! Use `sotto history` to browse past transcripts.

use clap::{Parser, Subcommand};
use sotto::budget::BudgetGuard;
use sotto::capture::CommandCaptureService;
use sotto::cleanup::openai::{OpenAiCleanupConfig, OpenAiCleanupEngine};
use sotto::cleanup::remote::{RemoteCleanupConfig, RemoteCleanupEngine};
use sotto::cleanup::{CleanupEngine, RuleBasedCleanupEngine};
use sotto::config::{self, expand_tilde, CleanupBackend, Config};
use sotto::context::StaticContextProvider;
use sotto::daemon::{Daemon, HotkeyEvent};
use sotto::error::{CaptureError, SottoError};
use sotto::history::{HistoryStore, TranscriptEntry, TranscriptHistory};
use sotto::insert::{
    ClipboardService, ClipboardTransport, CommandClipboard, CommandTypeTransport,
    InsertionService, InsertionTransport,
};
use sotto::lexicon::{PersonalLexicon, PersonalLexiconService};
use sotto::metrics::TextNormalizer;
use sotto::profile::StyleProfileService;
use sotto::session::SessionCoordinator;
use sotto::snippet::SnippetService;
use sotto::transcribe::{TranscriptionEngine, WhisperCliTranscriptionEngine};
use sotto::transcript::CloudTier;
use sotto::bench;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sotto")]
#[command(author, version, about = "Private, local-first dictation")]
#[command(long_about = "
Sotto records speech, transcribes it offline with whisper.cpp, cleans the
transcript up, and inserts the result into the focused application.

Audio never leaves the machine. Cloud cleanup is optional, text-only, and
capped by a monthly budget guard.

In daemon mode, recording is controlled over stdin:
  start   begin hold-to-talk recording
  stop    finish recording and transcribe
  toggle  start/stop hands-free recording
  quit    shut the daemon down
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    /// Override the whisper model path
    #[arg(long, value_name = "MODEL")]
    model: Option<String>,

    /// Override the cleanup backend (rules, remote, openai)
    #[arg(long, value_name = "BACKEND")]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Transcribe an audio file (WAV, 16kHz, mono)
    Transcribe {
        /// Path to audio file
        file: PathBuf,

        /// Also run transcript cleanup on the result
        #[arg(long)]
        clean: bool,
    },

    /// Browse and manage transcript history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show monthly cloud budget status
    Budget,

    /// Run or validate the cleanup quality benchmark
    Bench {
        #[command(subcommand)]
        action: BenchAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Show the most recent transcripts
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Search transcripts by text or application
    Search { query: String },

    /// Copy the latest transcript back to the clipboard
    PasteLast,

    /// Re-run cleanup for one entry with the offline engine
    Retry { id: Uuid },

    /// Delete one entry
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum BenchAction {
    /// Score a manifest and print the summary
    Run {
        /// Path to the benchmark manifest (JSON)
        manifest: PathBuf,

        /// Write the full report to this path
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Score a manifest and fail if it exceeds the configured thresholds
    Validate {
        /// Path to the benchmark manifest (JSON)
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("sotto={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(model) = cli.model {
        config.transcription.model = model;
    }
    if let Some(backend) = cli.backend {
        config.cleanup.backend = match backend.to_lowercase().as_str() {
            "remote" => CleanupBackend::Remote,
            "openai" => CleanupBackend::Openai,
            _ => CleanupBackend::Rules,
        };
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            run_daemon(config).await?;
        }

        Commands::Transcribe { file, clean } => {
            transcribe_file(&config, &file, clean).await?;
        }

        Commands::History { action } => {
            run_history(&config, action).await?;
        }

        Commands::Budget => {
            show_budget(&config);
        }

        Commands::Bench { action } => {
            run_bench(&config, action)?;
        }

        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

/// Build and run the daemon, wiring every service from config
async fn run_daemon(config: Config) -> sotto::Result<()> {
    Config::ensure_directories()?;

    // First run: drop the commented default config next to the user.
    if let Some(path) = Config::default_path() {
        if !path.exists() {
            match std::fs::write(&path, config::DEFAULT_CONFIG) {
                Ok(()) => tracing::info!("wrote default config to {}", path.display()),
                Err(e) => tracing::warn!("failed to write default config: {e}"),
            }
        }
    }

    let capture_command = config
        .capture
        .command
        .clone()
        .ok_or(SottoError::Capture(CaptureError::NotConfigured))?;
    let capture = Arc::new(CommandCaptureService::new(
        capture_command,
        config.capture.args.clone(),
    ));

    let transcriber = Arc::new(build_transcriber(&config)?);
    let cleanup = build_cleanup_engine(&config)?;
    let fallback: Arc<dyn CleanupEngine> = Arc::new(RuleBasedCleanupEngine);

    let clipboard: Arc<dyn ClipboardService> = Arc::new(CommandClipboard::new(
        config.insert.clipboard_command.clone(),
        config.insert.clipboard_args.clone(),
    ));
    let insertion = Arc::new(build_insertion(&config, clipboard.clone()));
    let history = Arc::new(build_history(&config, clipboard));

    let coordinator = Arc::new(SessionCoordinator::new(
        capture,
        transcriber,
        cleanup,
        fallback,
        insertion,
        history,
        Arc::new(PersonalLexiconService::new(config.lexicon.clone())),
        Arc::new(StyleProfileService::new(
            config.profile.global.clone(),
            config.profile.per_app.clone(),
        )),
        Arc::new(SnippetService::new(config.snippets.clone())),
        Arc::new(config.budget.build_guard()),
    ));

    // The OS focus probe plugs in here; headless setups insert into whatever
    // holds focus via the transport chain.
    let context_provider = Arc::new(StaticContextProvider::default());

    let mut daemon = Daemon::new(
        coordinator,
        context_provider,
        config.resolve_state_file(),
        config.transcription.language_hints.clone(),
    );

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(read_control_events(tx));
    daemon.run(rx).await
}

/// Map stdin control lines to hotkey events
async fn read_control_events(tx: mpsc::Sender<HotkeyEvent>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let events: &[HotkeyEvent] = match line.trim() {
            "start" => &[HotkeyEvent::OptionKeyDown],
            "stop" => &[HotkeyEvent::OptionKeyUp],
            "toggle" => &[HotkeyEvent::HandsFreeKeyDown, HotkeyEvent::HandsFreeKeyUp],
            "quit" | "exit" => &[HotkeyEvent::Shutdown],
            "" => continue,
            other => {
                tracing::warn!("unknown control command: {other}");
                continue;
            }
        };
        for event in events {
            if tx.send(*event).await.is_err() {
                return;
            }
        }
    }
}

fn build_transcriber(config: &Config) -> sotto::Result<WhisperCliTranscriptionEngine> {
    let model = expand_tilde(&config.transcription.model);
    let engine = WhisperCliTranscriptionEngine::resolve(
        &config.transcription.cli,
        model,
        config.transcription.extra_args.clone(),
    )?;
    Ok(engine)
}

fn build_cleanup_engine(config: &Config) -> sotto::Result<Arc<dyn CleanupEngine>> {
    match config.cleanup.backend {
        CleanupBackend::Rules => Ok(Arc::new(RuleBasedCleanupEngine)),
        CleanupBackend::Remote => {
            let endpoint = config.cleanup.endpoint.clone().ok_or_else(|| {
                SottoError::Config("cleanup.endpoint is required for the remote backend".into())
            })?;
            let api_key = config.cleanup.resolve_api_key().ok_or_else(|| {
                SottoError::Config(format!(
                    "cleanup.api_key is unset and ${} is empty",
                    config.cleanup.api_key_env
                ))
            })?;
            let mut remote = RemoteCleanupConfig::new(endpoint, api_key);
            remote.premium_model = config.cleanup.premium_model.clone();
            remote.economical_model = config.cleanup.economical_model.clone();
            remote.timeout = config.cleanup.timeout();
            Ok(Arc::new(RemoteCleanupEngine::new(remote)))
        }
        CleanupBackend::Openai => {
            let api_key = config.cleanup.resolve_api_key().ok_or_else(|| {
                SottoError::Config(format!(
                    "cleanup.api_key is unset and ${} is empty",
                    config.cleanup.api_key_env
                ))
            })?;
            let mut openai = OpenAiCleanupConfig::new(api_key);
            if let Some(endpoint) = config.cleanup.endpoint.clone() {
                openai.endpoint = endpoint;
            }
            openai.premium_model = config.cleanup.premium_model.clone();
            openai.economical_model = config.cleanup.economical_model.clone();
            openai.timeout = config.cleanup.timeout();
            Ok(Arc::new(OpenAiCleanupEngine::new(openai)))
        }
    }
}

fn build_insertion(config: &Config, clipboard: Arc<dyn ClipboardService>) -> InsertionService {
    let mut transports: Vec<Arc<dyn InsertionTransport>> = Vec::new();
    if let Some(typer) = &config.insert.typer_command {
        transports.push(Arc::new(CommandTypeTransport::new(
            typer.clone(),
            config.insert.typer_args.clone(),
        )));
    }
    transports.push(Arc::new(ClipboardTransport::new(clipboard, None)));

    InsertionService::new(transports)
        .with_clipboard_first_apps(config.insert.clipboard_first_apps.clone())
}

fn build_history(config: &Config, clipboard: Arc<dyn ClipboardService>) -> HistoryStore {
    // "disabled" keeps history out of the data dir; the runtime dir is
    // ephemeral, so entries vanish with the session.
    let path = config
        .history
        .resolve_file()
        .unwrap_or_else(|| Config::runtime_dir().join("history.json"));
    HistoryStore::new(path, clipboard, config.history.max_entries)
}

/// Transcribe an audio file and print the result
async fn transcribe_file(config: &Config, path: &PathBuf, clean: bool) -> sotto::Result<()> {
    let engine = build_transcriber(config)?;
    let raw = engine
        .transcribe(path, &config.transcription.language_hints)
        .await?;

    if !clean {
        println!("{}", raw.text);
        return Ok(());
    }

    let lexicon = PersonalLexicon {
        entries: config.lexicon.clone(),
    };
    let cleaned = RuleBasedCleanupEngine
        .cleanup(&raw, &config.profile.global, &lexicon, CloudTier::None)
        .await
        .map_err(SottoError::Cleanup)?;

    println!("{}", cleaned.text);
    for flag in &cleaned.uncertainty_flags {
        eprintln!("note: {flag}");
    }
    Ok(())
}

async fn run_history(config: &Config, action: HistoryAction) -> sotto::Result<()> {
    let clipboard: Arc<dyn ClipboardService> = Arc::new(CommandClipboard::new(
        config.insert.clipboard_command.clone(),
        config.insert.clipboard_args.clone(),
    ));
    let store = build_history(config, clipboard);

    match action {
        HistoryAction::Recent { limit } => {
            for entry in store.recent(limit).await {
                print_entry(&entry);
            }
        }
        HistoryAction::Search { query } => {
            for entry in store.search(&query).await {
                print_entry(&entry);
            }
        }
        HistoryAction::PasteLast => match store.paste_last().await? {
            Some(entry) => println!("Copied to clipboard: {}", entry.clean_text),
            None => println!("History is empty."),
        },
        HistoryAction::Retry { id } => {
            let lexicon = PersonalLexicon {
                entries: config.lexicon.clone(),
            };
            let cleaned = store
                .retry(
                    id,
                    &RuleBasedCleanupEngine,
                    &config.profile.global,
                    &lexicon,
                    CloudTier::None,
                )
                .await?;
            println!("{}", cleaned.text);
        }
        HistoryAction::Delete { id } => {
            store.delete(id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

fn print_entry(entry: &TranscriptEntry) {
    println!(
        "{}  {}  [{}]\n  {}",
        entry.id,
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.app_bundle_id,
        entry.clean_text
    );
}

fn show_budget(config: &Config) {
    let guard: BudgetGuard = config.budget.build_guard();
    println!("Monthly cloud spend: ${:.4}", guard.monthly_spend());
    println!(
        "Soft cap: ${:.2}  Hard cap: ${:.2}",
        config.budget.soft_cap_usd, config.budget.hard_cap_usd
    );
    println!("Cloud mode: {:?}", guard.effective_mode());
}

fn run_bench(config: &Config, action: BenchAction) -> sotto::Result<()> {
    match action {
        BenchAction::Run { manifest, output } => {
            let manifest = bench::load_manifest(&manifest)?;
            let report = bench::run(&manifest, &TextNormalizer::default());
            if let Some(path) = output {
                bench::write_report(&report, &path)?;
                println!("Report written to {}", path.display());
            }
            print_bench_summary(&report.summary);
        }
        BenchAction::Validate { manifest } => {
            let manifest = bench::load_manifest(&manifest)?;
            let report = bench::run(&manifest, &TextNormalizer::default());
            print_bench_summary(&report.summary);
            bench::validate(&report, &config.bench)?;
            println!("Benchmark within thresholds.");
        }
    }
    Ok(())
}

fn print_bench_summary(summary: &bench::BenchSummary) {
    println!("Samples: {}", summary.sample_count);
    if let (Some(raw), Some(clean)) = (summary.raw_wer, summary.clean_wer) {
        println!("WER: raw {:.4} → clean {:.4}", raw, clean);
    }
    if let (Some(raw), Some(clean)) = (summary.raw_cer, summary.clean_cer) {
        println!("CER: raw {:.4} → clean {:.4}", raw, clean);
    }
    println!("Regressed samples: {}", summary.regressed_samples);
}

fn show_config(config: &Config) -> sotto::Result<()> {
    if let Some(path) = Config::default_path() {
        println!("# Config file: {}", path.display());
    }
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| SottoError::Config(format!("Failed to serialize config: {}", e)))?;
    println!("{rendered}");
    Ok(())
}
