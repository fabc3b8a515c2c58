//! coffre: client-side encrypted file vault CLI
//!
//! Commands:
//!   push <files>...     - encrypt and upload one or more files
//!   pull <id> [<dest>]  - download and decrypt a file
//!   ls                  - list stored files
//!   rm <id>             - delete a stored file
//!   status              - storage health and index stats
//!   config show         - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use coffre_core::config::{expand_tilde, CoffreConfig, StorageBackend};
use coffre_core::types::RecordId;
use coffre_storage::{BlobStore, JsonMetadataStore, MetadataStore, S3Credentials};
use coffre_vault::{DownloadResult, UploadRequest, UploadResult, Vault, VaultError};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "coffre",
    version,
    about = "Client-side encrypted file vault",
    long_about = "coffre: encrypt files with a password before they leave the machine, \
                  store them in S3 or a local directory, and fetch them back"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "COFFRE_CONFIG",
        default_value = "~/.config/coffre/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [logging].level
    #[arg(long, env = "COFFRE_LOG")]
    log: Option<String>,

    /// Log format; overrides [logging].format
    #[arg(long, env = "COFFRE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt and upload files
    ///
    /// The password is read from COFFRE_PASSWORD, or prompted for (twice).
    Push {
        /// Local files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// MIME type recorded for every file (default: application/octet-stream)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Download and decrypt a file by id
    Pull {
        /// Record id (see `coffre ls`)
        id: String,
        /// Local destination (default: the original file name)
        dest: Option<PathBuf>,
        /// Overwrite an existing destination file
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// List stored files, newest first
    Ls,

    /// Delete a stored file and its record
    Rm {
        /// Record id (see `coffre ls`)
        id: String,
    },

    /// Show storage health and index stats
    Status,

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

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = CoffreConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.as_deref().unwrap_or(&config.logging.level);
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| parse_log_format(&config.logging.format));
    init_logging(level, &format);

    match cli.command {
        Commands::Push { files, mime } => cmd_push(&config, &files, mime.as_deref()).await,
        Commands::Pull { id, dest, force } => cmd_pull(&config, &id, dest.as_deref(), force).await,
        Commands::Ls => cmd_ls(&config),
        Commands::Rm { id } => cmd_rm(&config, &id).await,
        Commands::Status => cmd_status(&config, &config_path).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

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

fn parse_log_format(s: &str) -> LogFormat {
    if s.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    }
}

// ── Vault construction ────────────────────────────────────────────────────────

/// Build the vault from config. S3 credentials come from AWS_ACCESS_KEY_ID /
/// AWS_SECRET_ACCESS_KEY (or the COFFRE_-prefixed equivalents).
fn open_vault(config: &CoffreConfig) -> Result<Vault> {
    let op = build_operator_from_env(config)?;
    Vault::from_config(config, BlobStore::new(op)).context("configuring vault")
}

fn build_operator_from_env(config: &CoffreConfig) -> Result<opendal::Operator> {
    let creds = match config.storage.backend {
        StorageBackend::S3 => Some(S3Credentials::from_env()?),
        StorageBackend::Fs => None,
        // Blobs would vanish on exit while the index on disk keeps their records
        StorageBackend::Memory => anyhow::bail!(
            "storage.backend = \"memory\" is only usable in-process; \
             use \"fs\" or \"s3\" with the coffre CLI"
        ),
    };
    coffre_storage::build_operator(&config.storage, creds.as_ref())
        .context("building storage operator")
}

fn open_index(config: &CoffreConfig) -> Result<JsonMetadataStore> {
    let path = expand_tilde(&config.index.path);
    JsonMetadataStore::open(&path)
        .with_context(|| format!("opening metadata index: {}", path.display()))
}

// ── Password input ────────────────────────────────────────────────────────────

/// Read the password from COFFRE_PASSWORD, or prompt on the terminal.
/// With `confirm`, an interactive password must be typed twice.
fn read_password(confirm: bool) -> Result<SecretString> {
    if let Ok(pw) = std::env::var("COFFRE_PASSWORD") {
        return Ok(SecretString::from(pw));
    }

    let first = SecretString::from(rpassword::prompt_password("Password: ").context("reading password")?);
    if confirm {
        let second = SecretString::from(
            rpassword::prompt_password("Confirm password: ").context("reading password")?,
        );
        if first.expose_secret() != second.expose_secret() {
            anyhow::bail!("passwords do not match");
        }
    }
    Ok(first)
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `coffre push` ─────────────────────────────────────────────────────────────

async fn cmd_push(config: &CoffreConfig, files: &[PathBuf], mime: Option<&str>) -> Result<()> {
    let vault = open_vault(config)?;
    let mut index = open_index(config)?;
    let password = read_password(true)?;

    let results = push_files(&vault, &mut index, files, mime, &password).await?;

    let mut failed = 0usize;
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(up) => {
                println!("{}", path.display());
                println!("  id:      {}", up.id);
                println!("  bytes:   {}", fmt_bytes(up.size));
                println!("  remote:  {}", up.storage_path);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} upload(s) failed", files.len());
    }
    Ok(())
}

/// Read `files` and upload them as one batch. One result per file, in order.
async fn push_files<M: MetadataStore>(
    vault: &Vault,
    index: &mut M,
    files: &[PathBuf],
    mime: Option<&str>,
    password: &SecretString,
) -> Result<Vec<Result<UploadResult, VaultError>>> {
    let pb = make_progress_bar(files.len() as u64, "read");
    let mut requests = Vec::with_capacity(files.len());
    for path in files {
        pb.set_message(path.display().to_string());
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("not a file: {}", path.display()))?;
        let mut request = UploadRequest::new(name, data);
        if let Some(m) = mime {
            request = request.with_mime_type(m);
        }
        requests.push(request);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let spinner = make_spinner("push");
    spinner.set_message(format!("encrypting {} file(s)...", requests.len()));
    let results = vault.upload_batch(index, requests, password).await;
    spinner.finish_and_clear();
    Ok(results?)
}

// ── `coffre pull` ─────────────────────────────────────────────────────────────

async fn cmd_pull(config: &CoffreConfig, id: &str, dest: Option<&Path>, force: bool) -> Result<()> {
    let vault = open_vault(config)?;
    let index = open_index(config)?;
    let password = read_password(false)?;
    let id = RecordId::from(id);

    let (local_path, result) = match pull_file(&vault, &index, &id, dest, force, &password).await {
        Ok(pulled) => pulled,
        Err(e) if is_authentication_failure(&e) => {
            eprintln!("coffre: wrong password or corrupted file");
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };

    println!("Downloaded:");
    println!("  local:  {}", local_path.display());
    println!("  type:   {}", result.mime_type);
    println!("  bytes:  {}", fmt_bytes(result.data.len() as u64));

    Ok(())
}

/// Download and decrypt `id`, then write it to `dest` (default: its
/// original name in the current directory).
async fn pull_file<M: MetadataStore>(
    vault: &Vault,
    index: &M,
    id: &RecordId,
    dest: Option<&Path>,
    force: bool,
    password: &SecretString,
) -> Result<(PathBuf, DownloadResult)> {
    let pb = make_spinner("pull");
    pb.set_message(format!("fetching {id}..."));
    let downloaded = vault.download(index, id, password).await;
    pb.finish_and_clear();
    let result = downloaded?;

    let local_path = dest
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(&result.file_name));
    if local_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            local_path.display()
        );
    }
    if let Some(parent) = local_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(&local_path, &result.data)
        .await
        .with_context(|| format!("writing {}", local_path.display()))?;

    Ok((local_path, result))
}

fn is_authentication_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<VaultError>()
        .is_some_and(VaultError::is_authentication_failure)
}

// ── `coffre ls` ───────────────────────────────────────────────────────────────

fn cmd_ls(config: &CoffreConfig) -> Result<()> {
    let vault = open_vault(config)?;
    let index = open_index(config)?;
    let records = vault.list(&index);

    if records.is_empty() {
        println!("no files stored for {}", vault.owner());
        return Ok(());
    }

    let now = unix_now();
    println!("{:<36}  {:>9}  {:<24}  {:>8}  NAME", "ID", "SIZE", "TYPE", "AGE");
    for r in &records {
        println!(
            "{:<36}  {:>9}  {:<24}  {:>8}  {}",
            r.id,
            fmt_bytes(r.meta.size),
            r.meta.mime_type,
            format_age(now.saturating_sub(r.meta.uploaded_at)),
            r.meta.file_name,
        );
    }
    Ok(())
}

// ── `coffre rm` ───────────────────────────────────────────────────────────────

async fn cmd_rm(config: &CoffreConfig, id: &str) -> Result<()> {
    let vault = open_vault(config)?;
    let mut index = open_index(config)?;
    let id = RecordId::from(id);

    vault
        .delete(&mut index, &id)
        .await
        .with_context(|| format!("deleting {id}"))?;
    println!("deleted {id}");
    Ok(())
}

// ── `coffre status` ───────────────────────────────────────────────────────────

async fn cmd_status(config: &CoffreConfig, config_path: &Path) -> Result<()> {
    let vault = open_vault(config)?;
    let index = open_index(config)?;

    let storage_ok = match coffre_storage::check_health(vault.blobs().operator()).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("{e:#}");
            false
        }
    };

    let owned = vault.list(&index);
    let total: u64 = owned.iter().map(|r| r.meta.size).sum();

    println!("coffre v{}", env!("CARGO_PKG_VERSION"));
    println!("  config:   {}", config_path.display());
    println!(
        "  storage:  {} [{}]",
        describe_storage(config),
        if storage_ok { "ok" } else { "UNREACHABLE" }
    );
    println!("  index:    {}", index.path().display());
    println!("  owner:    {}", config.vault.owner);
    println!("  files:    {} ({})", owned.len(), fmt_bytes(total));
    if index.len() != owned.len() {
        println!("  other owners: {} record(s)", index.len() - owned.len());
    }

    if !storage_ok {
        std::process::exit(1);
    }
    Ok(())
}

fn describe_storage(config: &CoffreConfig) -> String {
    let s = &config.storage;
    match s.backend {
        StorageBackend::S3 => format!("s3 {}/{}", s.endpoint, s.bucket),
        StorageBackend::Fs => format!("fs {}", expand_tilde(&s.root).display()),
        StorageBackend::Memory => "memory".to_string(),
    }
}

// ── `coffre config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &CoffreConfig, config_path: &Path) -> Result<()> {
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

// ── Utilities ─────────────────────────────────────────────────────────────────

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn format_age(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
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
