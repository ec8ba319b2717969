use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lib::boundary::TimeBoundary;
use lib::channel::{parse_channel_list, ChannelRequest};
use lib::collect::{Collector, RunSummary};
use lib::config::Config;
use lib::source::telegram::TelegramSession;
use lib::source::MessageSource;
use lib::walk::WalkLimits;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "tgcollect")]
#[command(about = "Stream recent Telegram channel messages as JSON lines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by commands that open a Telegram session.
#[derive(Args, Debug)]
struct SessionArgs {
    /// Config file path (default: TGCOLLECT_CONFIG_PATH or ~/.tgcollect/config.json)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Telegram application id (default: TELEGRAM_API_ID or telegram.apiId)
    #[arg(long, value_name = "ID")]
    api_id: Option<i32>,

    /// Telegram application secret (default: TELEGRAM_API_HASH or telegram.apiHash)
    #[arg(long, value_name = "HASH")]
    api_hash: Option<String>,

    /// Directory holding the session file (default: telegram.sessionDir or <config dir>/session)
    #[arg(long, value_name = "DIR")]
    session_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory, a default config file, and the session directory.
    Init {
        /// Config file path (default: TGCOLLECT_CONFIG_PATH or ~/.tgcollect/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Sign the session in interactively (phone number, login code, optional 2FA password).
    Login {
        #[command(flatten)]
        session: SessionArgs,

        /// Phone number in international format; prompted for when omitted.
        #[arg(long, value_name = "PHONE")]
        phone: Option<String>,
    },

    /// Walk each channel newest-first down to --since and print one JSON record per line.
    /// Per-channel failures are reported on stderr and do not affect the exit status.
    Collect {
        #[command(flatten)]
        session: SessionArgs,

        /// Comma-separated channel names, bare or @-prefixed (default: collect.channels)
        #[arg(long, value_name = "LIST")]
        channels: Option<String>,

        /// ISO-8601 timestamp; older messages are not collected. Taken as UTC without an offset.
        #[arg(long, value_name = "TIMESTAMP")]
        since: String,

        /// Upper bound on messages pulled per channel (default: collect.maxMessagesPerChannel or 100)
        #[arg(long, value_name = "N")]
        max_messages: Option<usize>,
    },

    /// Check collector output: parse JSON lines from a file (or stdin) and count records per channel.
    Verify {
        /// JSONL file; stdin when omitted.
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("tgcollect {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Login { session, phone }) => {
            if let Err(e) = run_login(session, phone).await {
                log::error!("login failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Collect {
            session,
            channels,
            since,
            max_messages,
        }) => {
            if let Err(e) = run_collect(session, channels, since, max_messages).await {
                log::error!("collect failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Verify { path }) => {
            if let Err(e) = run_verify(path) {
                log::error!("verify failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Connect a session with credentials resolved from flags, env, and config.
async fn connect(
    config: &Config,
    config_path: &Path,
    args: &SessionArgs,
) -> anyhow::Result<TelegramSession> {
    let api_id = lib::config::resolve_api_id(config, args.api_id)?
        .context("api id is required (--api-id, TELEGRAM_API_ID, or telegram.apiId)")?;
    let api_hash = lib::config::resolve_api_hash(config, args.api_hash.clone())
        .context("api hash is required (--api-hash, TELEGRAM_API_HASH, or telegram.apiHash)")?;
    let session_dir =
        lib::config::resolve_session_dir(config, config_path, args.session_dir.clone());
    let session = TelegramSession::connect(api_id, &api_hash, &session_dir).await?;
    Ok(session)
}

fn prompt(label: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", label)?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn run_login(args: SessionArgs, phone: Option<String>) -> anyhow::Result<()> {
    let (config, config_path) = lib::config::load_config(args.config.clone())?;
    let session = connect(&config, &config_path, &args).await?;
    let phone = match phone.filter(|p| !p.trim().is_empty()) {
        Some(p) => p,
        None => prompt("phone number: ")?,
    };
    let mut ask = prompt;
    session.login(&phone, &mut ask).await?;
    println!("signed in; session saved to {}", session.session_path().display());
    Ok(())
}

/// Channels from the flag, or from config when the flag is absent.
fn channel_requests(config: &Config, flag: Option<&str>) -> Vec<ChannelRequest> {
    match flag {
        Some(list) => parse_channel_list(list),
        None => parse_channel_list(&config.collect.channels.join(",")),
    }
}

/// Everything `collect` needs besides the session, resolved from flags and config.
struct CollectPlan {
    requests: Vec<ChannelRequest>,
    boundary: TimeBoundary,
    limits: WalkLimits,
}

fn plan_collect(
    config: &Config,
    channels: Option<&str>,
    since: &str,
    max_messages: Option<usize>,
) -> anyhow::Result<CollectPlan> {
    let boundary = TimeBoundary::parse(since)?;
    let requests = channel_requests(config, channels);
    if requests.is_empty() {
        anyhow::bail!("at least one channel is required (--channels or collect.channels)");
    }
    let mut limits = config.collect.walk_limits();
    if let Some(n) = max_messages {
        limits.max_messages = n;
    }
    Ok(CollectPlan {
        requests,
        boundary,
        limits,
    })
}

/// Run the plan against `source`. Per-channel faults only reach `diagnostics`; an error
/// here means the run itself failed and the process should exit non-zero.
async fn collect_with<S, W, D>(
    source: S,
    plan: CollectPlan,
    out: W,
    diagnostics: D,
) -> anyhow::Result<RunSummary>
where
    S: MessageSource,
    W: Write,
    D: Write,
{
    let mut collector = Collector::new(out, diagnostics, plan.limits);
    let summary = collector
        .run_scoped(source, &plan.requests, plan.boundary)
        .await?;
    log::info!(
        "done: {} record(s) from {} channel(s), {} skipped",
        summary.total_emitted(),
        summary.channels.len(),
        summary.faulted().count()
    );
    Ok(summary)
}

async fn run_collect(
    args: SessionArgs,
    channels: Option<String>,
    since: String,
    max_messages: Option<usize>,
) -> anyhow::Result<()> {
    let (config, config_path) = lib::config::load_config(args.config.clone())?;
    let plan = plan_collect(&config, channels.as_deref(), &since, max_messages)?;

    let session = connect(&config, &config_path, &args).await?;
    session.require_authorized().await?;

    collect_with(session, plan, io::stdout(), io::stderr()).await?;
    Ok(())
}

/// Record count per channel, sorted by channel name.
fn count_by_channel(records: &[lib::record::NormalizedRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.channel.as_str()).or_insert(0) += 1;
    }
    counts
}

fn run_verify(path: Option<PathBuf>) -> anyhow::Result<()> {
    let records = match &path {
        Some(p) => {
            let file = std::fs::File::open(p).with_context(|| format!("opening {}", p.display()))?;
            lib::record::parse_jsonl(io::BufReader::new(file))
                .with_context(|| format!("parsing {}", p.display()))?
        }
        None => lib::record::parse_jsonl(io::stdin().lock()).context("parsing stdin")?,
    };
    for (channel, n) in count_by_channel(&records) {
        println!("{}\t{}", channel, n);
    }
    println!("total\t{}", records.len());
    Ok(())
}
