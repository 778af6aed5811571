//! Cursor-driven pagination over the site's listing endpoints.
//!
//! A [Feed] says how to ask for one page, how to move the cursor and when a page is the
//! last one. [Pager] drives a feed page by page, pausing between requests. Results are
//! not deduplicated; if the site returns overlapping pages, so do we.

use crate::crawler::error::CrawlerError;
use crate::crawler::session::{PageRequest, Session};
use crate::model::{Board, Pin, User};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// `max` sent when a descending stream starts from the newest item.
pub const FRESH_MAX: u64 = 0xFFFF_FFFF;
pub const BOARD_PINS_LIMIT: usize = 20;
pub const USER_BOARDS_LIMIT: usize = 10;
pub const FOLLOWING_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Items with an identifier below (or above) this bound.
    Max(u64),
    /// 1-based page number.
    Page(u32),
}

impl Cursor {
    fn query(self) -> String {
        match self {
            Cursor::Max(max) => format!("max={}", max),
            Cursor::Page(page) => format!("page={}", page),
        }
    }
}

/// Sleeps `gap + gap * (1 - accuracy) * random()` milliseconds between requests.
///
/// `accuracy = 1` gives a fixed delay; `accuracy = 0` spreads it up to twice the gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacer {
    gap_ms: u64,
    accuracy: f64,
}

impl Pacer {
    pub fn new(gap_ms: u64, accuracy: f64) -> Self {
        let accuracy = if accuracy.is_nan() {
            1.0
        } else {
            accuracy.clamp(0.0, 1.0)
        };
        Self { gap_ms, accuracy }
    }

    /// No pause at all.
    pub fn none() -> Self {
        Self::new(0, 1.0)
    }

    pub fn gap_ms(&self) -> u64 {
        self.gap_ms
    }

    /// Delay for a given random draw in `[0, 1)`.
    pub fn delay_for(&self, draw: f64) -> Duration {
        let gap = self.gap_ms as f64;
        let ms = gap + gap * (1.0 - self.accuracy) * draw.clamp(0.0, 1.0);
        Duration::from_millis(ms.floor() as u64)
    }

    pub fn next_delay(&self) -> Duration {
        self.delay_for(rand::thread_rng().gen::<f64>())
    }

    pub fn pause(&self) {
        if self.gap_ms == 0 {
            return;
        }
        let delay = self.next_delay();
        log::debug!("pausing {} ms", delay.as_millis());
        std::thread::sleep(delay);
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::none()
    }
}

/// One fetched page plus the total the endpoint reported, if any.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: Option<u64>,
}

/// A listing endpoint.
pub trait Feed {
    type Item;
    /// Wire shape of one response.
    type Raw: DeserializeOwned;

    fn first_cursor(&self) -> Cursor;
    fn url(&self, session: &Session, cursor: Cursor) -> String;
    fn referer(&self, session: &Session) -> String;
    fn page(&self, raw: Self::Raw) -> Page<Self::Item>;
    fn next_cursor(&self, current: Cursor, items: &[Self::Item]) -> Cursor;
    /// True when no request should follow this page.
    fn is_last(&self, page: &Page<Self::Item>) -> bool;
}

/// Walks a [Feed] one page at a time. Holds only the cursor state; the session is lent
/// per call so the caller can use it between pages.
#[derive(Debug, Clone)]
pub struct Pager<F: Feed> {
    feed: F,
    pacer: Pacer,
    cursor: Cursor,
    fetched: usize,
    accumulated: usize,
    target: Option<usize>,
    done: bool,
}

impl<F: Feed> Pager<F> {
    pub fn new(feed: F, pacer: Pacer) -> Self {
        let cursor = feed.first_cursor();
        Self {
            feed,
            pacer,
            cursor,
            fetched: 0,
            accumulated: 0,
            target: None,
            done: false,
        }
    }

    /// Resume from a cursor taken from data fetched elsewhere (e.g. a board's first page).
    pub fn starting_at(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    /// Stop once this many items were yielded.
    pub fn with_target(mut self, target: usize) -> Self {
        self.target = Some(target);
        self
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }

    /// Next non-empty page, or `None` at end of stream. Any failed page fails the walk.
    pub fn next_page(&mut self, session: &mut Session) -> Result<Option<Vec<F::Item>>, CrawlerError> {
        if self.done {
            return Ok(None);
        }
        if matches!(self.target, Some(t) if self.accumulated >= t) {
            self.done = true;
            return Ok(None);
        }
        if self.fetched > 0 {
            self.pacer.pause();
        }

        let request = PageRequest::json(self.feed.url(session, self.cursor))
            .referer(self.feed.referer(session));
        let raw: F::Raw = session.fetch_json(&request)?;
        self.fetched += 1;

        let page = self.feed.page(raw);
        if self.feed.is_last(&page) {
            self.done = true;
        }
        if page.items.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let next = self.feed.next_cursor(self.cursor, &page.items);
        if next == self.cursor && !self.done {
            log::warn!(
                "cursor did not advance past {:?} at {}; stopping",
                self.cursor,
                request.url
            );
            self.done = true;
        }
        self.cursor = next;
        self.accumulated += page.items.len();
        if matches!(self.target, Some(t) if self.accumulated >= t) {
            self.done = true;
        }
        Ok(Some(page.items))
    }

    /// Every remaining item, in fetch order.
    pub fn collect_all(mut self, session: &mut Session) -> Result<Vec<F::Item>, CrawlerError> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page(session)? {
            all.extend(items);
        }
        Ok(all)
    }
}

// Board pins: /boards/{id}/?max=<min pin id of last page>

#[derive(Debug, Deserialize)]
pub struct BoardPinsRaw {
    board: PinsOnly,
}

#[derive(Debug, Deserialize)]
struct PinsOnly {
    #[serde(default)]
    pins: Vec<Pin>,
}

#[derive(Debug, Clone)]
pub struct BoardPinsFeed {
    pub board_id: u64,
    pub limit: usize,
}

impl BoardPinsFeed {
    pub fn new(board_id: u64) -> Self {
        Self {
            board_id,
            limit: BOARD_PINS_LIMIT,
        }
    }
}

impl Feed for BoardPinsFeed {
    type Item = Pin;
    type Raw = BoardPinsRaw;

    fn first_cursor(&self) -> Cursor {
        Cursor::Max(FRESH_MAX)
    }

    fn url(&self, session: &Session, cursor: Cursor) -> String {
        format!(
            "{}/boards/{}/?{}&{}&limit={}&wfl=1",
            session.site_root(),
            self.board_id,
            session.token(),
            cursor.query(),
            self.limit
        )
    }

    fn referer(&self, session: &Session) -> String {
        format!("{}/boards/{}/", session.site_root(), self.board_id)
    }

    fn page(&self, raw: BoardPinsRaw) -> Page<Pin> {
        Page {
            items: raw.board.pins,
            total: None,
        }
    }

    fn next_cursor(&self, current: Cursor, items: &[Pin]) -> Cursor {
        items
            .iter()
            .map(|p| p.pin_id)
            .min()
            .map(Cursor::Max)
            .unwrap_or(current)
    }

    fn is_last(&self, page: &Page<Pin>) -> bool {
        page.items.len() < self.limit
    }
}

// Boards of a user: /{urlname}/?max=<max board id seen>

#[derive(Debug, Deserialize)]
pub struct UserBoardsRaw {
    user: UserBoards,
}

#[derive(Debug, Deserialize)]
struct UserBoards {
    #[serde(default)]
    board_count: Option<u64>,
    #[serde(default)]
    boards: Vec<Board>,
}

#[derive(Debug, Clone)]
pub struct UserBoardsFeed {
    pub urlname: String,
    pub limit: usize,
}

impl UserBoardsFeed {
    pub fn new(urlname: impl Into<String>) -> Self {
        Self {
            urlname: urlname.into(),
            limit: USER_BOARDS_LIMIT,
        }
    }
}

impl Feed for UserBoardsFeed {
    type Item = Board;
    type Raw = UserBoardsRaw;

    fn first_cursor(&self) -> Cursor {
        Cursor::Max(0)
    }

    fn url(&self, session: &Session, cursor: Cursor) -> String {
        format!(
            "{}/{}/?{}&{}&limit={}&wfl=1",
            session.site_root(),
            self.urlname,
            session.token(),
            cursor.query(),
            self.limit
        )
    }

    fn referer(&self, session: &Session) -> String {
        format!("{}/{}/", session.site_root(), self.urlname)
    }

    fn page(&self, raw: UserBoardsRaw) -> Page<Board> {
        Page {
            items: raw.user.boards,
            total: raw.user.board_count,
        }
    }

    fn next_cursor(&self, current: Cursor, items: &[Board]) -> Cursor {
        let seen = match current {
            Cursor::Max(max) => max,
            Cursor::Page(_) => 0,
        };
        let page_max = items.iter().map(|b| b.board_id).max().unwrap_or(0);
        Cursor::Max(seen.max(page_max))
    }

    fn is_last(&self, page: &Page<Board>) -> bool {
        page.total == Some(0) || page.items.is_empty()
    }
}

// Boards a user follows: /{urlname}/following/boards/?page=<n>

#[derive(Debug, Deserialize)]
pub struct FollowedBoardsRaw {
    #[serde(default)]
    user: Option<FollowingCount>,
    #[serde(default)]
    boards: Vec<Board>,
}

#[derive(Debug, Deserialize)]
struct FollowingCount {
    #[serde(default)]
    following_count: u64,
}

#[derive(Debug, Clone)]
pub struct FollowedBoardsFeed {
    pub urlname: String,
    pub limit: usize,
}

impl FollowedBoardsFeed {
    pub fn new(urlname: impl Into<String>) -> Self {
        Self {
            urlname: urlname.into(),
            limit: FOLLOWING_LIMIT,
        }
    }
}

impl Feed for FollowedBoardsFeed {
    type Item = Board;
    type Raw = FollowedBoardsRaw;

    fn first_cursor(&self) -> Cursor {
        Cursor::Page(1)
    }

    fn url(&self, session: &Session, cursor: Cursor) -> String {
        format!(
            "{}/{}/following/boards/?{}&{}&limit={}&wfl=1",
            session.site_root(),
            self.urlname,
            session.token(),
            cursor.query(),
            self.limit
        )
    }

    fn referer(&self, session: &Session) -> String {
        format!("{}/{}/following/boards/", session.site_root(), self.urlname)
    }

    fn page(&self, raw: FollowedBoardsRaw) -> Page<Board> {
        Page {
            items: raw.boards,
            total: raw.user.map(|u| u.following_count),
        }
    }

    fn next_cursor(&self, current: Cursor, _items: &[Board]) -> Cursor {
        match current {
            Cursor::Page(page) => Cursor::Page(page + 1),
            Cursor::Max(_) => Cursor::Page(1),
        }
    }

    fn is_last(&self, page: &Page<Board>) -> bool {
        page.total.unwrap_or(0) == 0 || page.items.is_empty()
    }
}

// Users a user follows: /{urlname}/following/?max=<min seq seen>

#[derive(Debug, Deserialize)]
pub struct FollowedUsersRaw {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Clone)]
pub struct FollowedUsersFeed {
    pub urlname: String,
    pub limit: usize,
}

impl FollowedUsersFeed {
    pub fn new(urlname: impl Into<String>) -> Self {
        Self {
            urlname: urlname.into(),
            limit: FOLLOWING_LIMIT,
        }
    }
}

impl Feed for FollowedUsersFeed {
    type Item = User;
    type Raw = FollowedUsersRaw;

    fn first_cursor(&self) -> Cursor {
        Cursor::Max(FRESH_MAX)
    }

    fn url(&self, session: &Session, cursor: Cursor) -> String {
        format!(
            "{}/{}/following/?{}&{}&limit={}&wfl=1",
            session.site_root(),
            self.urlname,
            session.token(),
            cursor.query(),
            self.limit
        )
    }

    fn referer(&self, session: &Session) -> String {
        format!("{}/{}/following/", session.site_root(), self.urlname)
    }

    fn page(&self, raw: FollowedUsersRaw) -> Page<User> {
        Page {
            items: raw.users,
            total: None,
        }
    }

    fn next_cursor(&self, current: Cursor, items: &[User]) -> Cursor {
        let seen = match current {
            Cursor::Max(max) => max,
            Cursor::Page(_) => FRESH_MAX,
        };
        let page_min = items.iter().filter_map(|u| u.seq).min().unwrap_or(seen);
        Cursor::Max(seen.min(page_min))
    }

    fn is_last(&self, page: &Page<User>) -> bool {
        page.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::session::SessionOptions;
    use crate::crawler::testing::{query_param, response, ScriptedTransport};
    use crate::crawler::ErrorKind;
    use serde_json::json;
    use std::collections::HashSet;
    use std::error::Error;

    /// Board with pin ids `total..=1`, served newest first below `max`.
    fn pin_feed(total: u64) -> ScriptedTransport {
        ScriptedTransport::new(move |req| {
            let url = req.target.to_url();
            let max: u64 = query_param(&url, "max")
                .and_then(|m| m.parse().ok())
                .unwrap_or(FRESH_MAX);
            let limit: usize = query_param(&url, "limit")
                .and_then(|l| l.parse().ok())
                .unwrap_or(20);
            let pins: Vec<_> = (1..=total)
                .rev()
                .filter(|id| *id < max)
                .take(limit)
                .map(|id| json!({"pin_id": id, "board_id": 1, "file": {"bucket": "hbimg", "key": format!("k{}", id), "type": "image/jpeg"}}))
                .collect();
            Ok(response(200, json!({"board": {"board_id": 1, "pins": pins}}).to_string()))
        })
    }

    #[test]
    fn delay_bounds_with_half_accuracy() {
        let pacer = Pacer::new(1000, 0.5);
        assert_eq!(pacer.delay_for(0.0), Duration::from_millis(1000));
        assert_eq!(pacer.delay_for(0.999_999), Duration::from_millis(1499));
        for _ in 0..1000 {
            let d = pacer.next_delay();
            assert!(d >= Duration::from_millis(1000) && d < Duration::from_millis(1500));
        }
    }

    #[test]
    fn accuracy_extremes() {
        assert_eq!(Pacer::new(800, 1.0).delay_for(0.9), Duration::from_millis(800));
        assert_eq!(Pacer::new(800, 0.0).delay_for(0.5), Duration::from_millis(1200));
        assert_eq!(Pacer::new(800, 7.0).delay_for(0.5), Duration::from_millis(800));
        assert_eq!(Pacer::new(800, -1.0).delay_for(0.5), Duration::from_millis(1200));
        assert_eq!(Pacer::none().delay_for(0.5), Duration::ZERO);
    }

    #[test]
    fn board_pins_45_in_three_pages() -> Result<(), Box<dyn Error>> {
        let transport = pin_feed(45);
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let mut pages = Pager::new(BoardPinsFeed::new(1), Pacer::none());

        let mut sizes = Vec::new();
        let mut all = Vec::new();
        while let Some(page) = pages.next_page(&mut session)? {
            sizes.push(page.len());
            all.extend(page);
        }
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(pages.pages_fetched(), 3);

        let unique: HashSet<u64> = all.iter().map(|p| p.pin_id).collect();
        assert_eq!(unique.len(), 45);

        let cursors: Vec<u64> = log
            .urls()
            .iter()
            .filter_map(|u| query_param(u, "max"))
            .filter_map(|m| m.parse().ok())
            .collect();
        assert_eq!(cursors, vec![FRESH_MAX, 26, 6]);
        for (i, chunk) in all.chunks(20).enumerate() {
            assert!(chunk.iter().all(|p| p.pin_id < cursors[i]));
            if i + 1 < cursors.len() {
                let page_min = chunk.iter().map(|p| p.pin_id).min().unwrap_or(0);
                assert_eq!(cursors[i + 1], page_min);
                assert!(cursors[i + 1] < cursors[i]);
            }
        }
        Ok(())
    }

    #[test]
    fn board_pins_stop_at_target() -> Result<(), Box<dyn Error>> {
        let transport = pin_feed(100);
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let pins = Pager::new(BoardPinsFeed::new(1), Pacer::none())
            .with_target(40)
            .collect_all(&mut session)?;
        assert_eq!(pins.len(), 40);
        assert_eq!(log.requests().len(), 2);
        Ok(())
    }

    #[test]
    fn board_pins_exact_multiple_ends_on_empty_page() -> Result<(), Box<dyn Error>> {
        let transport = pin_feed(40);
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let pins = Pager::new(BoardPinsFeed::new(1), Pacer::none()).collect_all(&mut session)?;
        assert_eq!(pins.len(), 40);
        assert_eq!(log.requests().len(), 3);
        Ok(())
    }

    #[test]
    fn starting_cursor_is_used() -> Result<(), Box<dyn Error>> {
        let transport = pin_feed(30);
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let pins = Pager::new(BoardPinsFeed::new(1), Pacer::none())
            .starting_at(Cursor::Max(11))
            .collect_all(&mut session)?;
        assert_eq!(pins.len(), 10);
        assert_eq!(query_param(&log.urls()[0], "max").as_deref(), Some("11"));
        Ok(())
    }

    #[test]
    fn failed_page_aborts_walk() {
        let mut calls = 0;
        let transport = ScriptedTransport::new(move |_| {
            calls += 1;
            if calls == 1 {
                let pins: Vec<_> = (0..20)
                    .map(|i| json!({"pin_id": 100 - i, "file": {"type": "image/png"}}))
                    .collect();
                Ok(response(200, json!({"board": {"pins": pins}}).to_string()))
            } else {
                Ok(response(502, "bad gateway"))
            }
        });
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let err = Pager::new(BoardPinsFeed::new(9), Pacer::none())
            .collect_all(&mut session)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn user_boards_cursor_is_running_max() -> Result<(), Box<dyn Error>> {
        let transport = ScriptedTransport::new(|req| {
            let url = req.target.to_url();
            let body = match query_param(&url, "max").as_deref() {
                Some("0") => json!({"user": {"board_count": 3, "boards": [{"board_id": 5}, {"board_id": 9}]}}),
                Some("9") => json!({"user": {"board_count": 3, "boards": [{"board_id": 12}]}}),
                _ => json!({"user": {"board_count": 3, "boards": []}}),
            };
            Ok(response(200, body.to_string()))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let boards =
            Pager::new(UserBoardsFeed::new("alice"), Pacer::none()).collect_all(&mut session)?;
        let ids: Vec<u64> = boards.iter().map(|b| b.board_id).collect();
        assert_eq!(ids, vec![5, 9, 12]);
        let urls = log.urls();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].starts_with("http://huaban.com/alice/?"));
        assert_eq!(query_param(&urls[0], "limit").as_deref(), Some("10"));
        assert_eq!(query_param(&urls[2], "max").as_deref(), Some("12"));
        Ok(())
    }

    #[test]
    fn user_boards_zero_count_stops() -> Result<(), Box<dyn Error>> {
        let transport = ScriptedTransport::new(|_| {
            Ok(response(200, json!({"user": {"board_count": 0, "boards": []}}).to_string()))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let boards =
            Pager::new(UserBoardsFeed::new("bob"), Pacer::none()).collect_all(&mut session)?;
        assert!(boards.is_empty());
        assert_eq!(log.requests().len(), 1);
        Ok(())
    }

    #[test]
    fn user_boards_without_count_pages_until_empty() -> Result<(), Box<dyn Error>> {
        let transport = ScriptedTransport::new(|req| {
            let body = match query_param(&req.target.to_url(), "max").as_deref() {
                Some("0") => json!({"user": {"boards": [{"board_id": 4}]}}),
                Some("4") => json!({"user": {"boards": [{"board_id": 7}]}}),
                _ => json!({"user": {"boards": []}}),
            };
            Ok(response(200, body.to_string()))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let boards =
            Pager::new(UserBoardsFeed::new("carol"), Pacer::none()).collect_all(&mut session)?;
        let ids: Vec<u64> = boards.iter().map(|b| b.board_id).collect();
        assert_eq!(ids, vec![4, 7]);
        assert_eq!(log.requests().len(), 3);
        Ok(())
    }

    #[test]
    fn user_boards_repeating_page_is_cut_off() -> Result<(), Box<dyn Error>> {
        let transport = ScriptedTransport::new(|_| {
            Ok(response(200, json!({"user": {"board_count": 50, "boards": [{"board_id": 3}]}}).to_string()))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let boards =
            Pager::new(UserBoardsFeed::new("bob"), Pacer::none()).collect_all(&mut session)?;
        // Duplicates are not removed; the stalled cursor ends the walk.
        assert_eq!(boards.len(), 2);
        assert_eq!(log.requests().len(), 2);
        Ok(())
    }

    #[test]
    fn followed_boards_page_numbers() -> Result<(), Box<dyn Error>> {
        let transport = ScriptedTransport::new(|req| {
            let url = req.target.to_url();
            let body = match query_param(&url, "page").as_deref() {
                Some("1") => json!({"user": {"following_count": 3}, "boards": [{"board_id": 1}, {"board_id": 2}]}),
                Some("2") => json!({"user": {"following_count": 3}, "boards": [{"board_id": 3}]}),
                _ => json!({"user": {"following_count": 3}, "boards": []}),
            };
            Ok(response(200, body.to_string()))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let boards = Pager::new(FollowedBoardsFeed::new("carol"), Pacer::none())
            .collect_all(&mut session)?;
        assert_eq!(boards.len(), 3);
        let pages: Vec<String> = log
            .urls()
            .iter()
            .filter_map(|u| query_param(u, "page"))
            .collect();
        assert_eq!(pages, vec!["1", "2", "3"]);
        assert!(log.urls()[0].contains("/carol/following/boards/?"));
        Ok(())
    }

    #[test]
    fn followed_boards_zero_following_stops() -> Result<(), Box<dyn Error>> {
        let transport = ScriptedTransport::new(|_| {
            Ok(response(200, json!({"user": {"following_count": 0}, "boards": []}).to_string()))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let boards = Pager::new(FollowedBoardsFeed::new("carol"), Pacer::none())
            .collect_all(&mut session)?;
        assert!(boards.is_empty());
        assert_eq!(log.requests().len(), 1);
        Ok(())
    }

    #[test]
    fn followed_users_cursor_is_running_min_seq() -> Result<(), Box<dyn Error>> {
        let transport = ScriptedTransport::new(|req| {
            let url = req.target.to_url();
            let max: u64 = query_param(&url, "max")
                .and_then(|m| m.parse().ok())
                .unwrap_or(0);
            let users: Vec<_> = [(1u64, "u1", 300u64), (2, "u2", 200), (3, "u3", 100)]
                .iter()
                .filter(|(_, _, seq)| *seq < max)
                .take(2)
                .map(|(id, name, seq)| json!({"user_id": id, "urlname": name, "seq": seq}))
                .collect();
            Ok(response(200, json!({"users": users}).to_string()))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        let users = Pager::new(FollowedUsersFeed::new("dave"), Pacer::none())
            .collect_all(&mut session)?;
        let names: Vec<&str> = users.iter().map(|u| u.urlname.as_str()).collect();
        assert_eq!(names, vec!["u1", "u2", "u3"]);
        let cursors: Vec<String> = log
            .urls()
            .iter()
            .filter_map(|u| query_param(u, "max"))
            .collect();
        assert_eq!(cursors, vec!["4294967295", "200", "100"]);
        Ok(())
    }

    #[test]
    fn cookies_from_one_page_go_out_with_the_next() -> Result<(), Box<dyn Error>> {
        let mut calls = 0;
        let transport = ScriptedTransport::new(move |_| {
            calls += 1;
            let pins: Vec<_> = (0..20)
                .map(|i| json!({"pin_id": 1000 - calls * 100 - i, "file": {"type": "image/png"}}))
                .collect();
            let body = if calls < 3 { json!({"board": {"pins": pins}}) } else { json!({"board": {"pins": []}}) };
            Ok(response(200, body.to_string()).with_header("set-cookie", &format!("page={}", calls)))
        });
        let log = transport.log();
        let mut session = Session::new(Box::new(transport), SessionOptions::default());
        Pager::new(BoardPinsFeed::new(1), Pacer::none()).collect_all(&mut session)?;
        let sent = log.requests();
        assert_eq!(sent[0].header_value("Cookie"), None);
        assert_eq!(sent[1].header_value("Cookie"), Some("page=1"));
        assert_eq!(sent[2].header_value("Cookie"), Some("page=2"));
        Ok(())
    }
}
