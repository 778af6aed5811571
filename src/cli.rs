//! CLI parsing and orchestration. Parses args, merges config, runs one crawl and maps errors
//! to exit codes.

use crate::config::{self, Config};
use crate::crawler::{
    BoardDumpSummary, BoardSourceKind, CrawlerError, DumpOptions, ErrorKind, HuabanCrawler,
    DEFAULT_SITE_ROOT,
};
use crate::model::Board;
use clap::Parser;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Crawl(#[from] CrawlerError),

    #[error("{0}")]
    Output(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Crawl(e) if e.kind() == ErrorKind::Filesystem => 3,
            CliRunError::Crawl(_) => 2,
            CliRunError::Output(_) => 3,
        }
    }
}

/// What to crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlType {
    Board,
    User,
    FollowedUsers,
    FollowedBoards,
}

#[derive(Parser, Debug)]
#[command(name = "hbcrawl")]
#[command(about = "Dump boards and pins from huaban.com to disk")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, gap_ms, accuracy, timeout_secs, board_source, save_meta, ignore_saved, site_root) are read from ./hbcrawl.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// What to crawl: board, user, followed-users or followed-boards.
    #[arg(short = 't', long = "type", value_parser = parse_type)]
    pub crawl_type: CrawlType,

    /// Output directory. A board is dumped straight into it; user crawls create
    /// one {urlname}-{board_id} directory per board. Default: config output_dir or CWD.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Board to dump (with --type board).
    #[arg(short, long)]
    pub board_id: Option<u64>,

    /// User to crawl, by numeric id.
    #[arg(short = 'u', long)]
    pub user_id: Option<u64>,

    /// User to crawl, by the name used in profile URLs.
    #[arg(short = 'U', long)]
    pub user_name: Option<String>,

    /// Base delay in milliseconds between requests (overrides config; default 0).
    #[arg(short, long)]
    pub gap: Option<u64>,

    /// Delay accuracy in [0, 1] (overrides config; default 1).
    #[arg(short, long)]
    pub accuracy: Option<f64>,

    /// Skip pins whose image is already on disk.
    #[arg(short, long)]
    pub ignore_saved: bool,

    /// Also write each pin's record as {pin_id}.json.
    #[arg(short = 'm', long)]
    pub save_meta: bool,

    /// How to fetch boards: json (default) or html.
    #[arg(long, value_parser = parse_board_source)]
    pub board_source: Option<BoardSourceKind>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Suppress progress output (warnings and errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and the full error chain on failure.
    #[arg(long)]
    pub verbose: bool,
}

fn parse_type(s: &str) -> Result<CrawlType, String> {
    match s.to_lowercase().as_str() {
        "board" => Ok(CrawlType::Board),
        "user" => Ok(CrawlType::User),
        "followed-users" => Ok(CrawlType::FollowedUsers),
        "followed-boards" => Ok(CrawlType::FollowedBoards),
        _ => Err(format!(
            "Unknown resource type '{}'. Use board, user, followed-users, or followed-boards.",
            s
        )),
    }
}

fn parse_board_source(s: &str) -> Result<BoardSourceKind, String> {
    s.parse()
}

fn parse_accuracy(value: f64) -> Result<f64, CliRunError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CliRunError::InvalidInput(format!(
            "Invalid accuracy {}: must be between 0 and 1.",
            value
        )));
    }
    Ok(value)
}

/// Who a user-level crawl is about.
#[derive(Debug, Clone, PartialEq, Eq)]
enum UserRef {
    Id(u64),
    Name(String),
}

fn user_ref(args: &Args) -> Result<UserRef, CliRunError> {
    if let Some(id) = args.user_id {
        return Ok(UserRef::Id(id));
    }
    match args.user_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(UserRef::Name(name.to_string())),
        _ => Err(CliRunError::InvalidInput(
            "Must specify either --user-id or --user-name.".to_string(),
        )),
    }
}

/// Check the flags a crawl type needs before touching the network.
fn validate_args(args: &Args) -> Result<(), CliRunError> {
    match args.crawl_type {
        CrawlType::Board => {
            if args.board_id.is_none() {
                return Err(CliRunError::InvalidInput(
                    "Must specify --board-id for --type board.".to_string(),
                ));
            }
        }
        _ => {
            user_ref(args)?;
        }
    }
    Ok(())
}

/// Effective settings after CLI > config > defaults.
#[derive(Debug, Clone, PartialEq)]
struct Effective {
    output_dir: PathBuf,
    user_agent: Option<String>,
    gap_ms: u64,
    accuracy: f64,
    timeout_secs: u64,
    board_source: BoardSourceKind,
    save_meta: bool,
    ignore_saved: bool,
    site_root: String,
}

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn effective(args: &Args, config: Option<&Config>) -> Result<Effective, CliRunError> {
    let board_source = match args.board_source {
        Some(kind) => kind,
        None => match config.and_then(|c| c.board_source.as_deref()) {
            Some(s) => s.parse().map_err(CliRunError::InvalidInput)?,
            None => BoardSourceKind::default(),
        },
    };
    let accuracy = parse_accuracy(
        args.accuracy
            .or_else(|| config.and_then(|c| c.accuracy))
            .unwrap_or(1.0),
    )?;
    Ok(Effective {
        output_dir: args
            .output
            .clone()
            .or_else(|| config.and_then(|c| c.output_dir.clone()))
            .unwrap_or_else(|| PathBuf::from(".")),
        user_agent: args
            .user_agent
            .clone()
            .or_else(|| config.and_then(|c| c.user_agent.clone())),
        gap_ms: args
            .gap
            .or_else(|| config.and_then(|c| c.gap_ms))
            .unwrap_or(0),
        accuracy,
        timeout_secs: args
            .timeout
            .or_else(|| config.and_then(|c| c.timeout_secs))
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        board_source,
        save_meta: args.save_meta || config.and_then(|c| c.save_meta).unwrap_or(false),
        ignore_saved: args.ignore_saved || config.and_then(|c| c.ignore_saved).unwrap_or(false),
        site_root: config
            .and_then(|c| c.site_root.clone())
            .unwrap_or_else(|| DEFAULT_SITE_ROOT.to_string()),
    })
}

fn ensure_dir(path: &Path) -> Result<(), CliRunError> {
    std::fs::create_dir_all(path).map_err(|e| {
        CliRunError::Output(format!(
            "Cannot create output directory {}: {}",
            path.display(),
            e
        ))
    })
}

fn print_board_info(board: &Board) {
    eprintln!("  ID:          {}", board.board_id);
    eprintln!("  Title:       {}", board.title);
    eprintln!("  Description: {}", board.description);
    eprintln!("  Pins:        {}", board.pin_count);
    eprintln!("  Followers:   {}", board.follow_count);
    eprintln!(
        "  Category:    {} [{}]",
        board.category_name, board.category_id
    );
    eprintln!("  Updated At:  {}", format_timestamp(board.updated_at));
    eprintln!("  Created At:  {}", format_timestamp(board.created_at));
    if let Some(user) = &board.user {
        eprintln!("  User:");
        eprintln!("    ID:        {}", user.user_id);
        eprintln!("    Name:      {}", user.username);
        eprintln!("    Pins:      {}", user.pin_count);
        eprintln!("    Joined At: {}", format_timestamp(user.created_at));
    }
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    validate_args(args)?;
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let eff = effective(args, config.as_ref())?;
    ensure_dir(&eff.output_dir)?;

    let mut builder = HuabanCrawler::builder()
        .site_root(eff.site_root.clone())
        .timeout_secs(eff.timeout_secs)
        .gap_ms(eff.gap_ms)
        .accuracy(eff.accuracy)
        .board_source(eff.board_source);
    if let Some(ua) = eff.user_agent.clone() {
        builder = builder.user_agent(ua);
    }
    let mut crawler = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;
    crawler.initialize()?;

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u64, total: u64| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        if n == 1 {
            if let Some(old) = state.take() {
                old.finish_and_clear();
            }
        }
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
            {
                bar.set_style(
                    style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                        .progress_chars("█▉▊▋▌▍▎▏ "),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_length(total.max(n));
        pb.set_position(n);
        pb.set_message(format!("Pin {}/{}", n, total));
    };
    let progress: Option<&dyn Fn(u64, u64)> = if args.quiet { None } else { Some(&progress_cb) };
    let options = DumpOptions {
        save_meta: eff.save_meta,
        ignore_saved: eff.ignore_saved,
        progress,
    };

    let summary = match args.crawl_type {
        CrawlType::Board => {
            let board_id = args.board_id.ok_or_else(|| {
                CliRunError::InvalidInput("Must specify --board-id for --type board.".to_string())
            })?;
            let board = crawler.board_info(board_id)?;
            if !args.quiet {
                eprintln!("Board:");
                print_board_info(&board);
            }
            crawler.dump_board(&board, &eff.output_dir, false, &options)?
        }
        CrawlType::User | CrawlType::FollowedUsers | CrawlType::FollowedBoards => {
            let urlname = match user_ref(args)? {
                UserRef::Name(name) => name,
                UserRef::Id(id) => crawler.user_by_id(id)?.urlname,
            };
            match args.crawl_type {
                CrawlType::User => crawler.dump_user(&urlname, &eff.output_dir, &options)?,
                CrawlType::FollowedBoards => {
                    crawler.dump_followed_boards(&urlname, &eff.output_dir, &options)?
                }
                _ => crawler.dump_followed_users(&urlname, &eff.output_dir, &options)?,
            }
        }
    };

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    if !args.quiet {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &BoardDumpSummary) {
    eprintln!(
        "Done: {} downloaded ({} bytes), {} skipped, {} failed.",
        summary.downloaded, summary.bytes, summary.skipped, summary.failed
    );
}
