//! `plagcheck`: operator front end for the checking service.
//!
//! ```bash
//! plagcheck check --user alice thesis.pdf chapter2.docx
//! plagcheck check --user alice --text-file essay.txt --mode local
//! plagcheck status --user alice
//! plagcheck download --user alice <job-id> --output result.pdf
//! plagcheck settings set --threshold 80
//! plagcheck corpus add reference.pdf --title "Plant Biology" --year 2019
//! plagcheck cleanup
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::sync::broadcast::error::TryRecvError;

use plagcheck::config::load_or_default;
use plagcheck::corpus::{self, CorpusMetadata};
use plagcheck::db::settings_repo;
use plagcheck::service::{cleanup, download, status};
use plagcheck::storage::MediaStorage;
use plagcheck::{
    AdmissionError, CheckMode, CheckService, Config, ConfigError, Database, DatabaseError,
    DetectionSettings, DownloadError, JobResult, PlagcheckError, Submission, Upload,
};

#[derive(Parser)]
#[command(name = "plagcheck", version, about = "Check documents for plagiarism against a local corpus and the web")]
struct Cli {
    /// JSON configuration file. Defaults to ~/.plagcheck/config.json when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit files or pasted text and wait for the results.
    Check {
        #[arg(long)]
        user: String,

        /// local, internet or both.
        #[arg(long, default_value_t = CheckMode::Both)]
        mode: CheckMode,

        /// Check this text instead of files.
        #[arg(long, conflicts_with_all = ["text_file", "files"])]
        text: Option<String>,

        /// Check the contents of a plain-text file as pasted text.
        #[arg(long, conflicts_with = "files")]
        text_file: Option<PathBuf>,

        /// PDF or DOCX files.
        files: Vec<PathBuf>,
    },

    /// Show quota, active job and recent history of a user.
    Status {
        #[arg(long)]
        user: String,

        #[arg(long)]
        json: bool,
    },

    /// Save the report of a finished job.
    Download {
        #[arg(long)]
        user: String,

        job_id: String,

        /// Target file. Defaults to RESULT_<name>.pdf in the current directory.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show or change the detection settings.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Per-user daily upload limits.
    Limit {
        #[command(subcommand)]
        action: LimitAction,
    },

    /// Manage the reference corpus.
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Delete reports older than the retention period.
    Cleanup,
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        /// Minimum sentence score (0-100) counted as plagiarized.
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// Report retention in days; 0 keeps reports forever.
        #[arg(long)]
        auto_delete_days: Option<u32>,
    },
}

#[derive(Subcommand)]
enum LimitAction {
    Set {
        #[arg(long)]
        user: String,

        limit: u32,
    },
}

#[derive(Subcommand)]
enum CorpusAction {
    /// Register a PDF, DOCX or text file as an indexed reference document.
    Add {
        path: PathBuf,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(long)]
        year: Option<u16>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Plagcheck(#[from] PlagcheckError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("{0}")]
    Usage(String),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = plagcheck::logging::init(cli.verbose, cli.log_json) {
        eprintln!("Warning: {}", e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_or_default(cli.config.as_deref())?;
    let db = Database::open(&config.database_path())?;

    match cli.command {
        Commands::Check {
            user,
            mode,
            text,
            text_file,
            files,
        } => check(config, db, &user, mode, text, text_file, files),
        Commands::Status { user, json } => {
            show_status(&config, &db, &user, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download { user, job_id, output } => {
            save_report(&config, &db, &user, &job_id, output)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Settings { action } => {
            settings(&db, action)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Limit {
            action: LimitAction::Set { user, limit },
        } => {
            plagcheck::db::quota_repo::set_daily_limit(&db, &user, limit)?;
            println!("Daily limit for {} set to {}", user, limit);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Corpus {
            action:
                CorpusAction::Add {
                    path,
                    title,
                    author,
                    year,
                },
        } => {
            let document = corpus::import(
                &db,
                &config.media_root,
                &path,
                CorpusMetadata { title, author, year },
                Utc::now(),
            )?;
            println!("Registered {} ({})", document.title, document.id);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Cleanup => {
            let settings = settings_repo::get(&db)?;
            let storage = MediaStorage::new(&config.media_root);
            let summary = cleanup::expire_reports(&db, &storage, settings.auto_delete_days, Utc::now())?;
            println!(
                "Expired: {}, removed: {}, already missing: {}, failed: {}",
                summary.expired, summary.removed, summary.already_missing, summary.failed
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_submission(
    text: Option<String>,
    text_file: Option<PathBuf>,
    files: Vec<PathBuf>,
) -> Result<Submission, CliError> {
    if let Some(text) = text {
        return Ok(Submission::Text(text));
    }
    if let Some(path) = text_file {
        let text = std::fs::read_to_string(&path).map_err(|e| CliError::Read { path, source: e })?;
        return Ok(Submission::Text(text));
    }
    if files.is_empty() {
        return Err(CliError::Usage("Give at least one file, --text or --text-file".to_string()));
    }

    files
        .into_iter()
        .map(|path| {
            let bytes = std::fs::read(&path).map_err(|e| CliError::Read {
                path: path.clone(),
                source: e,
            })?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            Ok(Upload::new(name, bytes))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Submission::Files)
}

fn check(
    config: Config,
    db: Database,
    user: &str,
    mode: CheckMode,
    text: Option<String>,
    text_file: Option<PathBuf>,
    files: Vec<PathBuf>,
) -> Result<ExitCode, CliError> {
    let submission = build_submission(text, text_file, files)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;

    let service = CheckService::start(config, db)?;
    let mut events = service.subscribe();

    let ids = match service.submit(user, mode, &submission) {
        Ok(ids) => ids,
        Err(e) => {
            service.shutdown();
            return Err(e.into());
        }
    };
    eprintln!("Queued {} job(s)", ids.len());

    let mut results: Vec<JobResult> = Vec::with_capacity(ids.len());
    while results.len() < ids.len() {
        if stop.load(Ordering::SeqCst) {
            eprintln!("Stopping after the running job; see `plagcheck status` for its result");
            service.request_stop();
            break;
        }

        loop {
            match events.try_recv() {
                Ok(event) => eprintln!(
                    "[{:>3}%] {} {}: {}",
                    event.progress, event.filename, event.phase, event.message
                ),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        if let Some(result) = service.recv_result_timeout(Duration::from_millis(200)) {
            results.push(result);
        }
    }

    let interrupted = service.shutdown();
    for result in &results {
        print_result(result);
    }
    if interrupted > 0 {
        println!("{} job(s) interrupted before they started", interrupted);
    }

    let all_ok = interrupted == 0 && results.len() == ids.len() && results.iter().all(|r| r.success);
    Ok(if all_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_result(result: &JobResult) {
    if result.success {
        println!(
            "{}  {}  global {}%  local {}%  internet {}%  report {}",
            result.job_id,
            result.filename,
            result.similarity_global.unwrap_or(0),
            result.similarity_local.unwrap_or(0),
            result.similarity_internet.unwrap_or(0),
            result.report_path.as_deref().unwrap_or("-"),
        );
    } else {
        println!(
            "{}  {}  FAILED: {}",
            result.job_id,
            result.filename,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

fn show_status(config: &Config, db: &Database, user: &str, json: bool) -> Result<(), CliError> {
    let storage = MediaStorage::new(&config.media_root);
    let snapshot = status::snapshot(
        db,
        &storage,
        user,
        config.default_daily_limit,
        config.status.recent_limit,
        chrono::Local::now().date_naive(),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "Uploads left today: {} of {}{}",
        snapshot.remaining_quota,
        snapshot.daily_limit,
        if snapshot.has_active_job { " (a check is running)" } else { "" }
    );
    for job in &snapshot.recent {
        let scores = match job.similarity_global {
            Some(global) => format!(
                "{}% (local {}%, internet {}%)",
                global,
                job.similarity_local.unwrap_or(0),
                job.similarity_internet.unwrap_or(0)
            ),
            None => format!("{}%", job.progress),
        };
        let note = if job.report_deleted {
            format!(" report deleted: {}", job.report_deleted_reason.as_deref().unwrap_or("-"))
        } else if let Some(error) = &job.error {
            format!(" {}", error)
        } else {
            String::new()
        };
        println!(
            "{}  {}  {}  {}  {}{}{}",
            job.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
            job.id,
            job.filename,
            job.status,
            scores,
            if job.can_download { "  [download]" } else { "" },
            note
        );
    }
    Ok(())
}

fn save_report(
    config: &Config,
    db: &Database,
    user: &str,
    job_id: &str,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let storage = MediaStorage::new(&config.media_root);
    let report = download::fetch(db, &storage, user, job_id, Utc::now())?;

    let target = output.unwrap_or_else(|| Path::new(".").join(&report.filename));
    std::fs::write(&target, &report.bytes).map_err(|e| CliError::Write {
        path: target.clone(),
        source: e,
    })?;
    println!("Saved {} ({} bytes)", target.display(), report.bytes.len());
    Ok(())
}

fn settings(db: &Database, action: SettingsAction) -> Result<(), CliError> {
    let current = settings_repo::get(db)?;
    match action {
        SettingsAction::Show => print_settings(&current),
        SettingsAction::Set {
            threshold,
            auto_delete_days,
        } => {
            if threshold.is_none() && auto_delete_days.is_none() {
                return Err(CliError::Usage("Nothing to change: pass --threshold or --auto-delete-days".to_string()));
            }
            let updated = DetectionSettings {
                similarity_threshold: threshold.unwrap_or(current.similarity_threshold),
                auto_delete_days: auto_delete_days.unwrap_or(current.auto_delete_days),
            };
            settings_repo::update(db, &updated, Utc::now())?;
            print_settings(&updated);
        }
    }
    Ok(())
}

fn print_settings(settings: &DetectionSettings) {
    println!("Similarity threshold: {}%", settings.similarity_threshold);
    if settings.auto_delete_days == 0 {
        println!("Auto-delete: disabled");
    } else {
        println!("Auto-delete after: {} days", settings.auto_delete_days);
    }
}
