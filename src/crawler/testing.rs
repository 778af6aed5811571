//! Scripted in-memory transport for unit tests.

use crate::crawler::error::CrawlerError;
use crate::crawler::transport::{HttpRequest, HttpResponse, Transport};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use std::sync::{Arc, Mutex};

type Handler = Box<dyn FnMut(&HttpRequest) -> Result<HttpResponse, CrawlerError> + Send>;

/// Shared view of the requests a [ScriptedTransport] has served.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<HttpRequest>>>);

impl RequestLog {
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.target.to_url()).collect()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.urls().iter().filter(|u| u.contains(needle)).count()
    }
}

pub struct ScriptedTransport {
    handler: Handler,
    log: RequestLog,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(&HttpRequest) -> Result<HttpResponse, CrawlerError> + Send + 'static,
    {
        Self {
            handler: Box::new(handler),
            log: RequestLog::default(),
        }
    }

    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }
}

impl Transport for ScriptedTransport {
    fn request(&mut self, req: HttpRequest) -> Result<HttpResponse, CrawlerError> {
        if let Ok(mut log) = self.log.0.lock() {
            log.push(req.clone());
        }
        (self.handler)(&req)
    }
}

/// Response with a body and matching `Content-Type`/`Content-Length`.
pub fn response(code: u16, body: impl Into<Vec<u8>>) -> HttpResponse {
    let body = body.into();
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
    HttpResponse {
        code,
        headers,
        body,
    }
}

impl HttpResponse {
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.append(HeaderName::from_static(name), value);
        }
        self
    }
}

/// Value of a `key=value` pair in the query string of `url`.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}
