//! Ways of fetching a board with its first page of pins.
//!
//! The AJAX endpoint is preferred. The full board page with an embedded payload is kept as
//! an alternate for when the endpoint misbehaves.

use crate::crawler::error::CrawlerError;
use crate::crawler::extract::extract_board_payload;
use crate::crawler::pager::BOARD_PINS_LIMIT;
use crate::crawler::session::{PageRequest, Session};
use crate::model::Board;
use serde::Deserialize;
use std::str::FromStr;

pub trait BoardSource: Send {
    fn fetch_board(&self, session: &mut Session, board_id: u64) -> Result<Board, CrawlerError>;
}

fn board_url(session: &Session, board_id: u64) -> String {
    format!("{}/boards/{}/", session.site_root(), board_id)
}

/// `GET /boards/{id}/?{token}&limit=20&wfl=1` returning `{"board": {...}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBoardSource;

#[derive(Deserialize)]
struct BoardEnvelope {
    board: Board,
}

impl BoardSource for JsonBoardSource {
    fn fetch_board(&self, session: &mut Session, board_id: u64) -> Result<Board, CrawlerError> {
        let referer = board_url(session, board_id);
        let url = format!(
            "{}?{}&limit={}&wfl=1",
            referer,
            session.token(),
            BOARD_PINS_LIMIT
        );
        let envelope: BoardEnvelope =
            session.fetch_json(&PageRequest::json(url).referer(referer))?;
        Ok(envelope.board)
    }
}

/// `GET /boards/{id}/` as HTML, board read from `app.page["board"]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlBoardSource;

impl BoardSource for HtmlBoardSource {
    fn fetch_board(&self, session: &mut Session, board_id: u64) -> Result<Board, CrawlerError> {
        let url = board_url(session, board_id);
        let html = session.fetch_html(&PageRequest::html(url.clone()).referer(url))?;
        extract_board_payload(&html)
    }
}

/// Which [BoardSource] to use; set from config or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoardSourceKind {
    #[default]
    Json,
    Html,
}

impl BoardSourceKind {
    pub fn build(self) -> Box<dyn BoardSource> {
        match self {
            BoardSourceKind::Json => Box::new(JsonBoardSource),
            BoardSourceKind::Html => Box::new(HtmlBoardSource),
        }
    }
}

impl FromStr for BoardSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" | "ajax" => Ok(BoardSourceKind::Json),
            "html" | "page" => Ok(BoardSourceKind::Html),
            _ => Err(format!(
                "Invalid board source: '{}'. Use 'json' or 'html'.",
                s
            )),
        }
    }
}
