//! hbcrawl: session-aware crawler that dumps huaban.com boards, pins and users to disk.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod model;

// Re-exports for CLI and consumers.
pub use crawler::{
    BoardDumpSummary, BoardSource, BoardSourceKind, CrawlerError, DumpOptions, ErrorKind,
    HuabanCrawler, HuabanCrawlerBuilder, Pacer, SettingsState,
};
pub use model::{Board, DumpResult, ImageKind, Pin, PinFile, Settings, User};
