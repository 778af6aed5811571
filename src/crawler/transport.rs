//! Blocking HTTP transport. Every verb goes through [Transport::request]; bodies are
//! decompressed here so callers only ever see plain bytes.

use crate::crawler::error::CrawlerError;
use flate2::read::{GzDecoder, ZlibDecoder};
use reqwest::header::{HeaderMap, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, SET_COOKIE};
use std::io::Read;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// Where a request goes: either a full URL or a pre-split host/path record.
/// Both forms resolve to the same URL string through [Target::to_url].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    HostPath {
        host: String,
        path: String,
        port: Option<u16>,
        https: bool,
    },
}

impl Target {
    pub fn to_url(&self) -> String {
        match self {
            Target::Url(url) => url.clone(),
            Target::HostPath {
                host,
                path,
                port,
                https,
            } => {
                let scheme = if *https { "https" } else { "http" };
                let sep = if path.starts_with('/') { "" } else { "/" };
                match port {
                    Some(port) => format!("{}://{}:{}{}{}", scheme, host, port, sep, path),
                    None => format!("{}://{}{}{}", scheme, host, sep, path),
                }
            }
        }
    }
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Target::Url(url.to_string())
    }
}

impl From<String> for Target {
    fn from(url: String) -> Self {
        Target::Url(url)
    }
}

/// One outgoing request. Headers are plain name/value pairs in send order.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub target: Target,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Drop the response body unread.
    pub header_only: bool,
}

impl HttpRequest {
    pub fn new(method: Method, target: impl Into<Target>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            timeout: None,
            header_only: method == Method::Head,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Case-insensitive lookup of the first header with this name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub code: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// All `Set-Cookie` lines, in the order the server sent them.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Issues requests. Implemented by [ReqwestTransport]; tests plug in scripted transports.
pub trait Transport {
    fn request(&mut self, req: HttpRequest) -> Result<HttpResponse, CrawlerError>;

    fn get(
        &mut self,
        target: Target,
        headers: Vec<(String, String)>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, CrawlerError> {
        self.request(
            HttpRequest::new(Method::Get, target)
                .headers(headers)
                .timeout(timeout),
        )
    }

    fn head(
        &mut self,
        target: Target,
        headers: Vec<(String, String)>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, CrawlerError> {
        self.request(
            HttpRequest::new(Method::Head, target)
                .headers(headers)
                .timeout(timeout),
        )
    }
}

/// Decompress a response body according to its `Content-Encoding`.
pub(crate) fn decode_body(
    url: &str,
    encoding: Option<&str>,
    raw: &[u8],
) -> Result<Vec<u8>, CrawlerError> {
    let encoding = encoding.map(|e| e.trim().to_ascii_lowercase());
    let mut out = Vec::new();
    let result = match encoding.as_deref() {
        Some("gzip") => GzDecoder::new(raw).read_to_end(&mut out),
        Some("deflate") => ZlibDecoder::new(raw).read_to_end(&mut out),
        _ => return Ok(raw.to_vec()),
    };
    result.map_err(|source| CrawlerError::Decode {
        url: url.to_string(),
        encoding: encoding.unwrap_or_default(),
        source,
    })?;
    Ok(out)
}

/// Transport over a blocking reqwest client. Cookies and decompression are left to the crawler.
#[derive(Debug)]
pub struct ReqwestTransport {
    inner: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }
}

impl Transport for ReqwestTransport {
    fn request(&mut self, req: HttpRequest) -> Result<HttpResponse, CrawlerError> {
        let url = req.target.to_url();
        let parsed = reqwest::Url::parse(&url).map_err(|e| CrawlerError::InvalidUrl {
            input: url.clone(),
            reason: e.to_string(),
        })?;
        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
        };
        let mut builder = self.inner.request(method, parsed);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().map_err(|e| CrawlerError::Network {
            url: url.clone(),
            source: e,
        })?;
        let code = response.status().as_u16();
        let headers = response.headers().clone();

        if req.header_only || code == 204 || !headers.contains_key(CONTENT_TYPE) {
            // Dropped unread; the connection is not reused.
            drop(response);
            return Ok(HttpResponse {
                code,
                headers,
                body: Vec::new(),
            });
        }

        let raw = response.bytes().map_err(|e| CrawlerError::Network {
            url: url.clone(),
            source: e,
        })?;
        let encoding = headers.get(CONTENT_ENCODING).and_then(|v| v.to_str().ok());
        let body = decode_body(&url, encoding, &raw)?;
        Ok(HttpResponse {
            code,
            headers,
            body,
        })
    }
}

#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout_secs: u64,
    max_redirects: usize,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_redirects: MAX_REDIRECTS,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Default request timeout in seconds. Per-request timeouts override it.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn max_redirects(mut self, n: usize) -> Self {
        self.max_redirects = n;
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, reqwest::Error> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()?;
        Ok(ReqwestTransport { inner })
    }
}
