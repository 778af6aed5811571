//! Writing pins and boards to disk.
//!
//! Layout: one directory per board holding `board.json`, `{pin_id}.{ext}` per image and
//! optionally `{pin_id}.json` per pin.

use crate::crawler::error::{CrawlerError, ErrorKind};
use crate::crawler::pager::{BoardPinsFeed, Cursor, Pager, FRESH_MAX};
use crate::crawler::session::PageRequest;
use crate::crawler::HuabanCrawler;
use crate::model::{Board, DumpResult, Pin};
use std::fs;
use std::path::Path;

pub const BOARD_DESCRIPTOR: &str = "board.json";

/// Per-run dump flags plus an optional `(processed, total)` progress callback.
#[derive(Clone, Copy, Default)]
pub struct DumpOptions<'a> {
    pub save_meta: bool,
    pub ignore_saved: bool,
    pub progress: Option<&'a dyn Fn(u64, u64)>,
}

/// What one or more board dumps did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardDumpSummary {
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub bytes: u64,
    /// Directory already complete, nothing was fetched.
    pub board_skipped: bool,
}

impl BoardDumpSummary {
    pub fn merge(&mut self, other: &BoardDumpSummary) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.bytes += other.bytes;
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CrawlerError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        .map_err(|e| CrawlerError::fs(path, e))?;
    fs::write(path, text).map_err(|e| CrawlerError::fs(path, e))
}

fn count_entries(dir: &Path) -> Result<u64, CrawlerError> {
    let entries = fs::read_dir(dir).map_err(|e| CrawlerError::fs(dir, e))?;
    Ok(entries.count() as u64)
}

impl HuabanCrawler {
    /// Save one pin's image (and optionally its record) into `dir`.
    ///
    /// With `ignore_if_present` and the image already on disk, nothing is fetched and the
    /// result has `size == 0`.
    pub fn dump_file(
        &mut self,
        dir: &Path,
        pin: &Pin,
        with_meta: bool,
        ignore_if_present: bool,
    ) -> Result<DumpResult, CrawlerError> {
        let image_path = dir.join(format!("{}.{}", pin.pin_id, pin.file.kind().extension()));
        let meta_path = with_meta.then(|| dir.join(format!("{}.json", pin.pin_id)));

        if ignore_if_present && image_path.exists() {
            return Ok(DumpResult {
                image_path,
                meta_path,
                size: 0,
            });
        }

        let url = self.image_link(&pin.file)?;
        let request = PageRequest::asset(url, &pin.file.mime).referer(self.board_referer(pin.board_id));
        let response = self.session.fetch_asset(&request)?;

        fs::write(&image_path, &response.body).map_err(|e| CrawlerError::fs(&image_path, e))?;
        if let Some(meta) = &meta_path {
            write_json(meta, pin)?;
        }

        let size = response
            .content_length()
            .unwrap_or(response.body.len() as u64);
        Ok(DumpResult {
            image_path,
            meta_path,
            size,
        })
    }

    /// Fetch a board by id and dump it into `dir`.
    pub fn dump_board_by_id(
        &mut self,
        board_id: u64,
        dir: &Path,
        options: &DumpOptions<'_>,
    ) -> Result<BoardDumpSummary, CrawlerError> {
        let board = self.board_info(board_id)?;
        self.dump_board(&board, dir, false, options)
    }

    /// Dump every pin of `board` into `dir`.
    ///
    /// `from_listing` means the board came from a listing whose embedded pins cannot be
    /// trusted, so the first page is fetched fresh. A directory holding exactly
    /// `2 * pin_count + 1` entries is taken as complete and skipped. Network and HTTP
    /// failures on a single pin are logged and counted. Page failures, filesystem errors and
    /// missing settings abort the dump.
    pub fn dump_board(
        &mut self,
        board: &Board,
        dir: &Path,
        from_listing: bool,
        options: &DumpOptions<'_>,
    ) -> Result<BoardDumpSummary, CrawlerError> {
        let mut summary = BoardDumpSummary::default();
        fs::create_dir_all(dir).map_err(|e| CrawlerError::fs(dir, e))?;

        let descriptor = board
            .descriptor()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            .map_err(|e| CrawlerError::fs(dir.join(BOARD_DESCRIPTOR), e))?;
        write_json(&dir.join(BOARD_DESCRIPTOR), &descriptor)?;

        let total = board.pin_count;
        if count_entries(dir)? == total * 2 + 1 {
            log::info!(
                "board {} ({}) already complete, skipping",
                board.board_id,
                dir.display()
            );
            summary.board_skipped = true;
            return Ok(summary);
        }
        log::info!(
            "dumping board {} \"{}\" ({} pins) into {}",
            board.board_id,
            board.title,
            total,
            dir.display()
        );

        let mut pager = Pager::new(BoardPinsFeed::new(board.board_id), self.pacer);
        let mut pins = if from_listing || board.pins.is_empty() {
            pager.next_page(&mut self.session)?.unwrap_or_default()
        } else {
            let start = board.pins.iter().map(|p| p.pin_id).min().unwrap_or(FRESH_MAX);
            pager = pager.starting_at(Cursor::Max(start));
            board.pins.clone()
        };

        let mut processed = 0u64;
        while !pins.is_empty() {
            for pin in &pins {
                processed += 1;
                match self.dump_file(dir, pin, options.save_meta, options.ignore_saved) {
                    Ok(result) if result.is_skipped() => {
                        summary.skipped += 1;
                        log::debug!("[{}/{}] pin {} already saved", processed, total, pin.pin_id);
                    }
                    Ok(result) => {
                        summary.downloaded += 1;
                        summary.bytes += result.size;
                        log::debug!(
                            "[{}/{}] pin {} saved ({} bytes)",
                            processed,
                            total,
                            pin.pin_id,
                            result.size
                        );
                        self.pacer.pause();
                    }
                    Err(e) if matches!(e.kind(), ErrorKind::Transport | ErrorKind::Protocol) => {
                        summary.failed += 1;
                        log::warn!("[{}/{}] pin {} failed: {}", processed, total, pin.pin_id, e);
                        self.pacer.pause();
                    }
                    Err(e) => return Err(e),
                }
                if let Some(progress) = options.progress {
                    progress(processed, total);
                }
            }
            if processed >= total {
                break;
            }
            pins = match pager.next_page(&mut self.session)? {
                Some(page) => page,
                None => break,
            };
        }

        log::info!(
            "board {}: {} downloaded, {} skipped, {} failed",
            board.board_id,
            summary.downloaded,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Dump every board of a user into `{out}/{urlname}-{board_id}`.
    pub fn dump_user(
        &mut self,
        urlname: &str,
        out: &Path,
        options: &DumpOptions<'_>,
    ) -> Result<BoardDumpSummary, CrawlerError> {
        let boards = self.user_boards(urlname)?;
        log::info!("user {} has {} boards", urlname, boards.len());
        self.dump_boards(&boards, urlname, out, options)
    }

    /// Dump the boards a user follows, each under its owner's name.
    pub fn dump_followed_boards(
        &mut self,
        urlname: &str,
        out: &Path,
        options: &DumpOptions<'_>,
    ) -> Result<BoardDumpSummary, CrawlerError> {
        let boards = self.followed_boards(urlname)?;
        log::info!("user {} follows {} boards", urlname, boards.len());
        self.dump_boards(&boards, urlname, out, options)
    }

    /// Dump all boards of every user that `urlname` follows.
    pub fn dump_followed_users(
        &mut self,
        urlname: &str,
        out: &Path,
        options: &DumpOptions<'_>,
    ) -> Result<BoardDumpSummary, CrawlerError> {
        let users = self.followed_users(urlname)?;
        log::info!("user {} follows {} users", urlname, users.len());
        let mut total = BoardDumpSummary::default();
        for user in &users {
            let summary = self.dump_user(&user.urlname, out, options)?;
            total.merge(&summary);
        }
        Ok(total)
    }

    fn dump_boards(
        &mut self,
        boards: &[Board],
        fallback_owner: &str,
        out: &Path,
        options: &DumpOptions<'_>,
    ) -> Result<BoardDumpSummary, CrawlerError> {
        let mut total = BoardDumpSummary::default();
        for board in boards {
            let dir = out.join(board.dir_name(fallback_owner));
            let summary = self.dump_board(board, &dir, true, options)?;
            total.merge(&summary);
        }
        Ok(total)
    }
}
