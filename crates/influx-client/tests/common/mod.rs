// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared test transport: records every request and replays scripted replies.

#![allow(dead_code)]

use influx_client::{ClientOptions, HttpRequest, HttpResponse, HttpTransport, InfluxClient, InfluxError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scripted reply. Once the script is empty every request gets `204`.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String, Vec<(String, String)>),
    ConnectionRefused,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Reply::Status(status, String::new(), Vec::new())
    }

    pub fn body(status: u16, body: impl Into<String>) -> Self {
        Reply::Status(status, body.into(), Vec::new())
    }

    pub fn retry_after(status: u16, seconds: u64) -> Self {
        Reply::Status(
            status,
            String::new(),
            vec![("Retry-After".to_string(), seconds.to_string())],
        )
    }
}

#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Bodies of the write requests, in send order.
    pub fn write_bodies(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path == "/api/v2/write")
            .map(HttpRequest::body_text)
            .collect()
    }

    /// Poll until `count` requests were seen or `timeout` elapses.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.request_count() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.request_count() >= count
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, InfluxError> {
        self.requests.lock().push(request);
        match self.script.lock().pop_front() {
            None => Ok(HttpResponse::from_string(204, "")),
            Some(Reply::Status(status, body, headers)) => {
                let mut response = HttpResponse::from_string(status, body);
                for (k, v) in headers {
                    response = response.with_header(k, v);
                }
                Ok(response)
            }
            Some(Reply::ConnectionRefused) => Err(InfluxError::connection(
                "connection refused",
                std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            )),
        }
    }
}

pub fn options() -> ClientOptions {
    ClientOptions::new("http://localhost:8086", "my-token")
        .org("my-org")
        .bucket("my-bucket")
}

pub fn client(options: ClientOptions) -> (InfluxClient, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let client = InfluxClient::with_transport(options, transport.clone()).expect("valid options");
    (client, transport)
}
