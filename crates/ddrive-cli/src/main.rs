//! ddrive: command-line client for a content-deduplicating file store
//!
//! Session commands:
//!   login / logout / whoami       - manage the stored session
//!
//! Drive commands:
//!   ls [<dir>] [--search <q>]     - list a virtual directory or search all paths
//!   upload <files>... [--dir]     - upload local files into a directory
//!   mkdir <name> [--dir]          - create an empty directory
//!   rm <path>                     - delete a record
//!   download <path> [--out]       - fetch a record into a local directory
//!   stats                         - storage usage against the quota
//!
//! Local commands:
//!   hash <file>                   - print a file's content fingerprint
//!   config show                   - display the active configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ddrive_client::{
    DriveApi, FileSessionStore, HttpTransport, Pipeline, RateLimiter, SessionStore,
};
use ddrive_core::config::{expand_tilde, DriveConfig};
use ddrive_engine::{DownloadOutcome, DriveController, ProgressFn, UploadInput};
use ddrive_view::ViewItem;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ddrive",
    version,
    about = "Content-deduplicating drive client",
    long_about = "ddrive: browse, upload, download, and organize files in a deduplicating drive"
)]
struct Cli {
    /// Path to ddrive.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "DDRIVE_CONFIG",
        default_value = "~/.config/ddrive/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [logging].level
    #[arg(long, env = "DDRIVE_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides [logging].format
    #[arg(long, env = "DDRIVE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and store the session tokens
    Login {
        #[arg(long, short = 'u', env = "DDRIVE_USERNAME")]
        username: String,
        /// Password (prompted for when not set)
        #[arg(long, env = "DDRIVE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// End the session on the server and forget it locally
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List a directory (default: root), or search every path
    Ls {
        /// Directory path, e.g. docs/work
        #[arg(default_value = "")]
        dir: String,
        /// Case-insensitive substring match over all paths (ignores DIR)
        #[arg(long, short = 's')]
        search: Option<String>,
        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload local files into a directory
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Destination directory (default: root)
        #[arg(long, short = 'd', default_value = "")]
        dir: String,
    },

    /// Create an empty directory
    Mkdir {
        name: String,
        /// Parent directory (default: root)
        #[arg(long, short = 'd', default_value = "")]
        dir: String,
    },

    /// Delete a record by its full path
    Rm { path: String },

    /// Download a record by its full path
    Download {
        path: String,
        /// Local directory to write into (default: current dir)
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },

    /// Show storage usage against the configured quota
    Stats,

    /// Print the content fingerprint of a local file
    Hash { file: PathBuf },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let (config, from_file) = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    if !from_file {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            config_path.display()
        );
    }

    match cli.command {
        Commands::Login { username, password } => cmd_login(&config, &username, password).await,
        Commands::Logout => cmd_logout(&config).await,
        Commands::Whoami => cmd_whoami(&config).await,
        Commands::Ls { dir, search, json } => cmd_ls(&config, &dir, search.as_deref(), json).await,
        Commands::Upload { files, dir } => cmd_upload(&config, &files, &dir).await,
        Commands::Mkdir { name, dir } => cmd_mkdir(&config, &name, &dir).await,
        Commands::Rm { path } => cmd_rm(&config, &path).await,
        Commands::Download { path, out } => cmd_download(&config, &path, &out).await,
        Commands::Stats => cmd_stats(&config).await,
        Commands::Hash { file } => cmd_hash(&file).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Returns the parsed config and whether it came from a file.
async fn load_config(path: &Path) -> Result<(DriveConfig, bool)> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((DriveConfig::default(), false))
    }
}

// ── Client wiring ─────────────────────────────────────────────────────────────

/// Build the API client: file-backed session, HTTP transport, shared limiter.
fn build_api(config: &DriveConfig) -> Result<DriveApi> {
    let store_path = expand_tilde(&config.session.store_path);
    let session = FileSessionStore::open(&store_path)
        .with_context(|| format!("opening session store: {}", store_path.display()))?;
    let transport = HttpTransport::from_config(&config.server).context("building HTTP transport")?;
    let limiter = RateLimiter::new(config.client.min_request_interval());

    let notified = AtomicBool::new(false);
    let pipeline = Pipeline::new(Arc::new(transport), Arc::new(session), Arc::new(limiter))
        .with_reauth_hook(Box::new(move || {
            if !notified.swap(true, Ordering::SeqCst) {
                eprintln!("Session expired. Run `ddrive login` to sign in again.");
            }
        }));

    Ok(DriveApi::new(Arc::new(pipeline)))
}

/// Build a controller with the record set loaded and `dir` as current path.
async fn open_drive(config: &DriveConfig, dir: &str) -> Result<DriveController> {
    let api = build_api(config)?;
    if api.pipeline().session().access_token().is_none() {
        anyhow::bail!("not signed in\nRun `ddrive login --username <name>` first.");
    }

    let mut drive = DriveController::new(api).with_max_batch_files(config.client.max_batch_files);
    drive.load().await.context("listing files")?;
    drive.navigate(dir);
    Ok(drive)
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("progress bar template")?
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    Ok(pb)
}

// ── `ddrive login` / `logout` / `whoami` ──────────────────────────────────────

async fn cmd_login(config: &DriveConfig, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password(format!("Password for {username}: "))
            .context("reading password")?,
    };
    let api = build_api(config)?;

    api.login(username, &SecretString::from(password))
        .await
        .context("signing in")?;
    println!("Signed in as {username}");
    Ok(())
}

async fn cmd_logout(config: &DriveConfig) -> Result<()> {
    let api = build_api(config)?;
    api.logout().await.context("signing out")?;
    println!("Signed out");
    Ok(())
}

async fn cmd_whoami(config: &DriveConfig) -> Result<()> {
    let api = build_api(config)?;
    if api.pipeline().session().access_token().is_none() {
        println!("Not signed in");
        return Ok(());
    }

    let profile = api.profile().await.context("fetching profile")?;
    println!("username: {}", profile.username);
    if !profile.email.is_empty() {
        println!("email:    {}", profile.email);
    }
    if let Some(joined) = &profile.date_joined {
        println!("joined:   {joined}");
    }
    println!("server:   {}", config.server.base_url);
    Ok(())
}

// ── `ddrive ls` ───────────────────────────────────────────────────────────────

async fn cmd_ls(config: &DriveConfig, dir: &str, search: Option<&str>, json: bool) -> Result<()> {
    let mut drive = open_drive(config, dir).await?;
    if let Some(query) = search {
        drive.search(query);
    }
    let view = drive.view();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("serializing view")?
        );
        return Ok(());
    }

    if view.is_searching {
        println!("Search results for {:?}:", drive.search_query());
    } else {
        println!("/{}", drive.current_path());
    }
    if view.is_empty() {
        println!("  (empty)");
        return Ok(());
    }

    for item in &view.items {
        match item {
            ViewItem::Folder(folder) => {
                let noun = if folder.item_count == 1 { "item" } else { "items" };
                println!("  {:<40} {} {}", format!("{}/", folder.name), folder.item_count, noun);
            }
            ViewItem::File(record) => {
                let label = if view.is_searching { record.path.as_str() } else { record.name() };
                let dup = if record.is_duplicate { "  (dedup)" } else { "" };
                println!("  {:<40} {:>10}{}", label, fmt_bytes(record.size), dup);
            }
        }
    }
    Ok(())
}

// ── `ddrive upload` ───────────────────────────────────────────────────────────

async fn cmd_upload(config: &DriveConfig, files: &[PathBuf], dir: &str) -> Result<()> {
    let mut drive = open_drive(config, dir).await?;

    let mut inputs = Vec::with_capacity(files.len());
    for path in files {
        if !path.is_file() {
            anyhow::bail!("not a file: {}", path.display());
        }
        let input = UploadInput::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        inputs.push(input);
    }

    let pb = make_progress_bar(inputs.len() as u64, "upload")?;
    let pb_clone = pb.clone();
    let progress: ProgressFn = Box::new(move |done, total, msg| {
        pb_clone.set_length(total);
        pb_clone.set_position(done);
        pb_clone.set_message(msg.to_string());
    });

    let report = drive
        .upload(inputs, Some(&progress))
        .await
        .context("uploading files")?;
    pb.finish_with_message("done".to_string());

    println!();
    for item in &report.items {
        match &item.result {
            Ok(record) if record.is_duplicate => {
                println!("  ok    {} ({}, deduplicated)", record.path, fmt_bytes(record.size))
            }
            Ok(record) => println!("  ok    {} ({})", record.path, fmt_bytes(record.size)),
            Err(e) => println!("  FAIL  {}: {e}", item.path),
        }
    }

    let ok = report.succeeded().count();
    let failed = report.items.len() - ok;
    println!();
    println!("Upload complete:");
    println!("  uploaded: {ok} files");
    println!("  saved:    {} (deduplicated)", fmt_bytes(report.deduplicated_bytes()));
    if failed > 0 {
        anyhow::bail!("{failed} of {} uploads failed", report.items.len());
    }
    Ok(())
}

// ── `ddrive mkdir` / `rm` / `download` ────────────────────────────────────────

async fn cmd_mkdir(config: &DriveConfig, name: &str, dir: &str) -> Result<()> {
    let mut drive = open_drive(config, dir).await?;
    let folder = drive
        .create_folder(name)
        .await
        .with_context(|| format!("creating folder {name:?}"))?;
    println!("Created /{folder}");
    Ok(())
}

async fn cmd_rm(config: &DriveConfig, path: &str) -> Result<()> {
    let mut drive = open_drive(config, "").await?;
    let path = path.trim_start_matches('/');
    let id = drive
        .find_by_path(path)
        .map(|r| r.id.clone())
        .with_context(|| format!("no such file: {path}"))?;

    drive
        .delete(&id)
        .await
        .with_context(|| format!("deleting {path}"))?;
    println!("Deleted {path}");
    Ok(())
}

async fn cmd_download(config: &DriveConfig, path: &str, out: &Path) -> Result<()> {
    let drive = open_drive(config, "").await?;
    let path = path.trim_start_matches('/');
    let id = drive
        .find_by_path(path)
        .map(|r| r.id.clone())
        .with_context(|| format!("no such file: {path}"))?;

    match drive
        .download(&id, out)
        .await
        .with_context(|| format!("downloading {path}"))?
    {
        DownloadOutcome::Saved(dest) => println!("Saved {}", dest.display()),
        DownloadOutcome::Navigate(locator) => {
            println!("Transfer failed; open the file directly:");
            println!("  {locator}");
        }
    }
    Ok(())
}

// ── `ddrive stats` ────────────────────────────────────────────────────────────

async fn cmd_stats(config: &DriveConfig) -> Result<()> {
    let drive = open_drive(config, "").await?;
    let stats = drive.stats(config.quota.max_bytes);

    println!("Storage:");
    println!(
        "  used:      {} of {} ({:.1}%)",
        fmt_bytes(stats.used_bytes),
        fmt_bytes(stats.quota_bytes),
        stats.usage_percent
    );
    println!("  remaining: {}", fmt_bytes(stats.remaining_bytes));
    println!("  saved:     {} (deduplicated)", fmt_bytes(stats.saved_bytes));
    println!("  files:     {}", stats.file_count);
    Ok(())
}

// ── `ddrive hash` ─────────────────────────────────────────────────────────────

async fn cmd_hash(file: &Path) -> Result<()> {
    let path = file.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || ddrive_hash::fingerprint_file(&path))
        .await
        .context("hashing task panicked")??;
    println!("{digest}  {}", file.display());
    Ok(())
}

// ── `ddrive config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &DriveConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
