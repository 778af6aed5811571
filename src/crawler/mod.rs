//! Session-aware crawler: transport, cookie jar, embedded-data extraction, pagination and
//! dumping, combined behind [HuabanCrawler].

mod cookies;
mod dump;
mod error;
mod extract;
mod pager;
mod session;
mod source;
mod transport;

#[cfg(test)]
mod testing;

pub use cookies::{CookieJar, SetCookie};
pub use dump::{BoardDumpSummary, DumpOptions};
pub use error::{CrawlerError, ErrorKind};
pub use extract::{extract_board_payload, extract_settings};
pub use pager::{
    BoardPinsFeed, Cursor, Feed, FollowedBoardsFeed, FollowedUsersFeed, Page, Pacer, Pager,
    UserBoardsFeed, BOARD_PINS_LIMIT, FOLLOWING_LIMIT, FRESH_MAX, USER_BOARDS_LIMIT,
};
pub use session::{PageRequest, Session, SessionOptions, DEFAULT_SITE_ROOT, DEFAULT_USER_AGENT};
pub use source::{BoardSource, BoardSourceKind, HtmlBoardSource, JsonBoardSource};
pub use transport::{
    HttpRequest, HttpResponse, Method, ReqwestTransport, ReqwestTransportBuilder, Target,
    Transport,
};

use crate::model::{Board, Pin, PinFile, Settings, User};
use serde::Deserialize;
use std::time::Duration;

/// Site settings, loaded once by [HuabanCrawler::initialize].
#[derive(Debug, Clone, Default)]
pub enum SettingsState {
    #[default]
    Uninitialized,
    Loaded(Settings),
}

impl SettingsState {
    pub fn loaded(&self) -> Result<&Settings, CrawlerError> {
        match self {
            SettingsState::Loaded(settings) => Ok(settings),
            SettingsState::Uninitialized => Err(CrawlerError::SettingsNotLoaded),
        }
    }
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: User,
}

pub struct HuabanCrawler {
    session: Session,
    settings: SettingsState,
    board_source: Box<dyn BoardSource>,
    pacer: Pacer,
}

impl HuabanCrawler {
    pub fn new(
        transport: Box<dyn Transport + Send>,
        options: SessionOptions,
        board_source: BoardSourceKind,
        pacer: Pacer,
    ) -> Self {
        Self {
            session: Session::new(transport, options),
            settings: SettingsState::Uninitialized,
            board_source: board_source.build(),
            pacer,
        }
    }

    pub fn builder() -> HuabanCrawlerBuilder {
        HuabanCrawlerBuilder::default()
    }

    /// Use settings obtained elsewhere instead of calling [initialize](Self::initialize).
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = SettingsState::Loaded(settings);
        self
    }

    /// Fetch the site root and load image hosts and categories from its embedded settings.
    pub fn initialize(&mut self) -> Result<(), CrawlerError> {
        let root = format!("{}/", self.session.site_root());
        let html = self.session.fetch_html(&PageRequest::html(root))?;
        let settings = extract_settings(&html)?;
        log::debug!(
            "loaded settings: {} image hosts, {} categories",
            settings.img_hosts.len(),
            settings.categories.len()
        );
        self.settings = SettingsState::Loaded(settings);
        Ok(())
    }

    pub fn settings(&self) -> &SettingsState {
        &self.settings
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `http://{host}/{key}` where host is the `{bucket}_http` entry of the image hosts.
    pub fn image_link(&self, file: &PinFile) -> Result<String, CrawlerError> {
        let settings = self.settings.loaded()?;
        let host = settings
            .img_hosts
            .get(&format!("{}_http", file.bucket))
            .ok_or_else(|| CrawlerError::UnknownBucket {
                bucket: file.bucket.clone(),
            })?;
        Ok(format!("http://{}/{}", host, file.key))
    }

    /// Board metadata with its first page of pins.
    pub fn board_info(&mut self, board_id: u64) -> Result<Board, CrawlerError> {
        self.board_source.fetch_board(&mut self.session, board_id)
    }

    /// One page of a board's pins below `max`, newest first.
    pub fn board_pins_page(
        &mut self,
        board_id: u64,
        max: u64,
        limit: usize,
    ) -> Result<Vec<Pin>, CrawlerError> {
        let feed = BoardPinsFeed { board_id, limit };
        let mut pager = Pager::new(feed, Pacer::none()).starting_at(Cursor::Max(max));
        Ok(pager.next_page(&mut self.session)?.unwrap_or_default())
    }

    /// Board with its pins. Unless `first_page_only`, the remaining pages are appended.
    pub fn board_with_pins(
        &mut self,
        board_id: u64,
        first_page_only: bool,
    ) -> Result<Board, CrawlerError> {
        let mut board = self.board_info(board_id)?;
        if first_page_only {
            return Ok(board);
        }
        let start = board
            .pins
            .iter()
            .map(|p| p.pin_id)
            .min()
            .unwrap_or(FRESH_MAX);
        let rest = Pager::new(BoardPinsFeed::new(board_id), self.pacer)
            .starting_at(Cursor::Max(start))
            .collect_all(&mut self.session)?;
        board.pins.extend(rest);
        Ok(board)
    }

    pub fn user_boards(&mut self, urlname: &str) -> Result<Vec<Board>, CrawlerError> {
        Pager::new(UserBoardsFeed::new(urlname), self.pacer).collect_all(&mut self.session)
    }

    pub fn followed_boards(&mut self, urlname: &str) -> Result<Vec<Board>, CrawlerError> {
        Pager::new(FollowedBoardsFeed::new(urlname), self.pacer).collect_all(&mut self.session)
    }

    pub fn followed_users(&mut self, urlname: &str) -> Result<Vec<User>, CrawlerError> {
        Pager::new(FollowedUsersFeed::new(urlname), self.pacer).collect_all(&mut self.session)
    }

    pub fn user_by_id(&mut self, user_id: u64) -> Result<User, CrawlerError> {
        let root = self.session.site_root().to_string();
        let url = format!("{}/users/{}/?{}", root, user_id, self.session.token());
        let envelope: UserEnvelope = self
            .session
            .fetch_json(&PageRequest::json(url).referer(format!("{}/", root)))?;
        Ok(envelope.user)
    }

    /// `Content-Length` of a pin's image from a HEAD request, 0 if the host omits it.
    pub fn pin_image_size(&mut self, pin: &Pin) -> Result<u64, CrawlerError> {
        let url = self.image_link(&pin.file)?;
        let request = PageRequest::asset(url, &pin.file.mime)
            .referer(self.board_referer(pin.board_id))
            .head();
        let response = self.session.fetch_asset(&request)?;
        Ok(response.content_length().unwrap_or(0))
    }

    fn board_referer(&self, board_id: u64) -> String {
        format!("{}/boards/{}/", self.session.site_root(), board_id)
    }
}

/// Builder for a [HuabanCrawler] over a [ReqwestTransport].
#[derive(Debug, Clone)]
pub struct HuabanCrawlerBuilder {
    session: SessionOptions,
    board_source: BoardSourceKind,
    gap_ms: u64,
    accuracy: f64,
    max_redirects: usize,
}

impl Default for HuabanCrawlerBuilder {
    fn default() -> Self {
        Self {
            session: SessionOptions::default(),
            board_source: BoardSourceKind::default(),
            gap_ms: 0,
            accuracy: 1.0,
            max_redirects: 10,
        }
    }
}

impl HuabanCrawlerBuilder {
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.session.user_agent = ua.into();
        self
    }

    pub fn site_root(mut self, root: impl Into<String>) -> Self {
        self.session.site_root = root.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.session.timeout = Some(Duration::from_secs(secs));
        self
    }

    pub fn gap_ms(mut self, gap_ms: u64) -> Self {
        self.gap_ms = gap_ms;
        self
    }

    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn board_source(mut self, kind: BoardSourceKind) -> Self {
        self.board_source = kind;
        self
    }

    pub fn build(self) -> Result<HuabanCrawler, reqwest::Error> {
        let mut transport = ReqwestTransport::builder().max_redirects(self.max_redirects);
        if let Some(timeout) = self.session.timeout {
            transport = transport.timeout_secs(timeout.as_secs());
        }
        let transport = transport.build()?;
        Ok(HuabanCrawler::new(
            Box::new(transport),
            self.session,
            self.board_source,
            Pacer::new(self.gap_ms, self.accuracy),
        ))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::crawler::extract::fixtures::SETTINGS;
    use crate::crawler::testing::ScriptedTransport;

    /// Crawler over a scripted transport with the fixture settings already loaded.
    pub fn crawler(transport: ScriptedTransport) -> HuabanCrawler {
        let settings: Settings = serde_json::from_str(SETTINGS).unwrap_or_default();
        HuabanCrawler::new(
            Box::new(transport),
            SessionOptions::default(),
            BoardSourceKind::Json,
            Pacer::none(),
        )
        .with_settings(settings)
    }
}
