// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blocking HTTP transport.
//!
//! The client only needs one primitive: send a request, get back a status,
//! headers and a body that can be read line by line. [`HttpTransport`] is
//! that seam; [`ReqwestTransport`] is the production implementation and
//! tests plug in their own.

use crate::config::ClientOptions;
use crate::error::{header_value, Error, InfluxError, Result};
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A request relative to the server base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute path, e.g. `/api/v2/write`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    /// Body as UTF-8 text (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Response with a streaming body.
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    body: Box<dyn BufRead + Send>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    pub fn new(
        status: u16,
        headers: Vec<(String, String)>,
        body: impl Read + Send + 'static,
    ) -> Self {
        Self {
            status,
            headers,
            body: Box::new(BufReader::new(body)),
        }
    }

    /// Response with an in-memory body.
    pub fn from_string(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, Vec::new(), std::io::Cursor::new(body.into().into_bytes()))
    }

    /// Appends a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Next line of the body without its terminator, `None` at end of body.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        read_trimmed_line(&mut self.body)
    }

    /// Hand the body to a streaming consumer.
    pub fn into_body(self) -> Box<dyn BufRead + Send> {
        self.body
    }

    /// Buffer the whole body.
    pub fn into_string(mut self) -> Result<String> {
        let mut out = String::new();
        self.body.read_to_string(&mut out)?;
        Ok(out)
    }
}

/// Read one line, stripping `\n` or `\r\n`.
pub(crate) fn read_trimmed_line<R: BufRead + ?Sized>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}

/// Blocking request/response primitive.
///
/// Implementations return every HTTP status as a response. `Err` is reserved
/// for failures where no status was obtained; connection failures must be
/// flagged with [`InfluxError::connection`] so they are retried.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, InfluxError>;
}

/// [`HttpTransport`] over `reqwest`'s blocking client.
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(options.timeout_ms))
            .connect_timeout(Duration::from_millis(options.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: options.url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, InfluxError> {
        let url = format!("{}{}", self.base_url, request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &url).query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        Ok(HttpResponse::new(status, headers, response))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> InfluxError {
    if e.is_redirect() {
        InfluxError::from_message(format!("too many redirects: {}", e)).with_source(e)
    } else if e.is_connect() || e.is_timeout() || e.is_request() {
        InfluxError::connection(e.to_string(), e)
    } else {
        InfluxError::from_message(e.to_string()).with_source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::post("/api/v2/write")
            .query("bucket", "b")
            .query("org", "o")
            .header("Content-Type", "text/plain; charset=utf-8")
            .body("h2o level=1i");

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.query_value("bucket"), Some("b"));
        assert_eq!(request.query_value("precision"), None);
        assert_eq!(request.header_value("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(request.body_text(), "h2o level=1i");
    }

    #[test]
    fn test_response_read_line() {
        let mut response = HttpResponse::from_string(200, "a,b\r\nc,d\n\nlast");
        assert_eq!(response.read_line().unwrap().as_deref(), Some("a,b"));
        assert_eq!(response.read_line().unwrap().as_deref(), Some("c,d"));
        assert_eq!(response.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(response.read_line().unwrap().as_deref(), Some("last"));
        assert_eq!(response.read_line().unwrap(), None);
    }

    #[test]
    fn test_response_headers_and_status() {
        let response = HttpResponse::from_string(204, "")
            .with_header("X-Influxdb-Version", "2.7.1");
        assert!(response.is_success());
        assert_eq!(response.header("x-influxdb-version"), Some("2.7.1"));
        assert!(!HttpResponse::from_string(429, "").is_success());
    }

    #[test]
    fn test_response_into_string() {
        let response = HttpResponse::from_string(200, "body");
        assert_eq!(response.into_string().unwrap(), "body");
    }

    #[test]
    fn test_reqwest_transport_connection_refused_is_retryable() {
        // Port 9 (discard) on localhost is normally closed.
        let options = ClientOptions::new("http://127.0.0.1:9", "t")
            .connect_timeout(Duration::from_millis(200))
            .timeout(Duration::from_millis(500));
        let transport = ReqwestTransport::new(&options).expect("client builds");
        let err = transport
            .send(HttpRequest::get("/ping"))
            .expect_err("nothing listens on port 9");
        assert!(err.is_retryable());
    }
}
