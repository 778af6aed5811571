//! In-memory cookie jar. Fed from `Set-Cookie` response lines, read back as a `Cookie` header.
//!
//! Expiry is only evaluated when new `Set-Cookie` data arrives; there is no timer.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;

/// One parsed `Set-Cookie` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
}

impl SetCookie {
    /// Parse `name=value; attr=val; attr...`. Unknown attributes are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let mut segs = line.split(';').map(str::trim);
        let (name, value) = split_pair(segs.next()?);
        if name.is_empty() {
            return None;
        }
        let mut cookie = SetCookie {
            name: name.to_string(),
            value: value.unwrap_or_default().to_string(),
            ..Default::default()
        };
        for seg in segs {
            let (key, value) = split_pair(seg);
            match key.to_ascii_lowercase().as_str() {
                "httponly" => cookie.http_only = true,
                "secure" => cookie.secure = true,
                "path" => cookie.path = value.map(String::from),
                "domain" => cookie.domain = value.map(String::from),
                "max-age" => cookie.max_age = value.and_then(|v| v.trim().parse().ok()),
                "expires" => cookie.expires = value.and_then(parse_cookie_date),
                _ => {}
            }
        }
        Some(cookie)
    }

    /// True if the cookie is already dead at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(max_age) = self.max_age {
            if max_age <= 0 {
                return true;
            }
        }
        matches!(self.expires, Some(at) if at < now)
    }
}

fn split_pair(seg: &str) -> (&str, Option<&str>) {
    match seg.split_once('=') {
        Some((k, v)) => (k.trim(), Some(v.trim())),
        None => (seg.trim(), None),
    }
}

/// `Wed, 21 Oct 2015 07:28:00 GMT` and the older dashed `Wed, 21-Oct-2015 07:28:00 GMT`.
fn parse_cookie_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Cookie name to value. Serialized in name order so the header is stable between calls.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    entries: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_from<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.update_from_at(lines, Utc::now());
    }

    /// Merge `Set-Cookie` lines as of `now`. Expired cookies remove any existing entry.
    pub fn update_from_at<'a, I>(&mut self, lines: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            let Some(cookie) = SetCookie::parse(line) else {
                log::debug!("ignoring malformed Set-Cookie line: {:?}", line);
                continue;
            };
            if cookie.is_expired_at(now) {
                self.entries.remove(&cookie.name);
            } else {
                self.entries.insert(cookie.name, cookie.value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `a=1; b=2`, or an empty string for an empty jar.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
