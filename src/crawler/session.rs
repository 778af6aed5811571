//! Per-crawler session: transport, cookie jar and cache-busting token.
//!
//! Every page request goes out with the same browser-like headers and the current cookies;
//! every response's `Set-Cookie` lines are merged before the status is checked.

use crate::crawler::cookies::CookieJar;
use crate::crawler::error::CrawlerError;
use crate::crawler::transport::{HttpResponse, Method, Target, Transport};
use serde::de::DeserializeOwned;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.3; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/67.0.3396.99 Safari/537.36";
pub const DEFAULT_SITE_ROOT: &str = "http://huaban.com";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7";
const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_JSON: &str = "application/json";

/// What to fetch and how to dress the request.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub url: String,
    pub accept: String,
    pub referer: Option<String>,
    /// Adds the XMLHttpRequest / JSON marker headers.
    pub ajax: bool,
    pub method: Method,
}

impl PageRequest {
    pub fn html(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: ACCEPT_HTML.to_string(),
            referer: None,
            ajax: false,
            method: Method::Get,
        }
    }

    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: ACCEPT_JSON.to_string(),
            referer: None,
            ajax: true,
            method: Method::Get,
        }
    }

    /// Binary asset (image) declared with its MIME type.
    pub fn asset(url: impl Into<String>, mime: &str) -> Self {
        Self {
            url: url.into(),
            accept: mime.to_string(),
            referer: None,
            ajax: false,
            method: Method::Get,
        }
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn head(mut self) -> Self {
        self.method = Method::Head;
        self
    }
}

/// Knobs fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub user_agent: String,
    pub site_root: String,
    pub timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            site_root: DEFAULT_SITE_ROOT.to_string(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

pub struct Session {
    transport: Box<dyn Transport + Send>,
    cookies: CookieJar,
    token: String,
    options: SessionOptions,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookies)
            .field("token", &self.token)
            .field("options", &self.options)
            .finish()
    }
}

impl Session {
    pub fn new(transport: Box<dyn Transport + Send>, mut options: SessionOptions) -> Self {
        let trimmed = options.site_root.trim_end_matches('/').len();
        options.site_root.truncate(trimmed);
        Self {
            transport,
            cookies: CookieJar::new(),
            token: unique_token(),
            options,
        }
    }

    /// Cache-busting token appended to AJAX query strings.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Site root without trailing slash, e.g. `http://huaban.com`.
    pub fn site_root(&self) -> &str {
        &self.options.site_root
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    fn headers_for(&self, req: &PageRequest) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_string(), req.accept.clone()),
            ("Pragma".to_string(), "no-cache".to_string()),
            ("Cache-Control".to_string(), "no-cache".to_string()),
            ("Accept-Encoding".to_string(), "gzip, deflate".to_string()),
            ("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string()),
            ("User-Agent".to_string(), self.options.user_agent.clone()),
        ];
        if let Some(referer) = &req.referer {
            headers.push(("Referer".to_string(), referer.clone()));
        }
        let cookie = self.cookies.serialize();
        if !cookie.is_empty() {
            headers.push(("Cookie".to_string(), cookie));
        }
        if req.ajax {
            headers.push(("X-Requested-With".to_string(), "XMLHttpRequest".to_string()));
            headers.push(("X-Request".to_string(), "JSON".to_string()));
        }
        headers
    }

    fn send(&mut self, req: &PageRequest) -> Result<HttpResponse, CrawlerError> {
        let target = Target::from(req.url.as_str());
        let headers = self.headers_for(req);
        log::debug!("{:?} {}", req.method, req.url);
        match req.method {
            Method::Get => self.transport.get(target, headers, self.options.timeout),
            Method::Head => self.transport.head(target, headers, self.options.timeout),
        }
    }

    /// Site page or API call. Merges `Set-Cookie` first, then fails on anything but 200.
    pub fn fetch(&mut self, req: &PageRequest) -> Result<HttpResponse, CrawlerError> {
        let response = self.send(req)?;
        let set_cookies = response.set_cookies();
        if !set_cookies.is_empty() {
            self.cookies.update_from(set_cookies);
        }
        check_status(response, &req.url)
    }

    /// Image host request. Cookies are sent but the CDN's `Set-Cookie` is not merged.
    pub fn fetch_asset(&mut self, req: &PageRequest) -> Result<HttpResponse, CrawlerError> {
        let response = self.send(req)?;
        check_status(response, &req.url)
    }

    pub fn fetch_json<T: DeserializeOwned>(
        &mut self,
        req: &PageRequest,
    ) -> Result<T, CrawlerError> {
        let response = self.fetch(req)?;
        serde_json::from_slice(&response.body).map_err(|source| CrawlerError::Payload {
            url: req.url.clone(),
            source,
        })
    }

    pub fn fetch_html(&mut self, req: &PageRequest) -> Result<String, CrawlerError> {
        Ok(self.fetch(req)?.text())
    }
}

fn check_status(response: HttpResponse, url: &str) -> Result<HttpResponse, CrawlerError> {
    if response.code != 200 {
        return Err(CrawlerError::HttpStatus {
            status: response.code,
            url: url.to_string(),
            body: response.text(),
        });
    }
    Ok(response)
}

/// Current time in milliseconds, base 36.
fn unique_token() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    to_base36(millis)
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
