// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flux query API (`POST /api/v2/query`).

use crate::client::ApiContext;
use crate::error::{Error, Result};
use crate::flux::{parse_tables, FluxRecordStream, FluxTable};
use crate::transport::HttpRequest;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// CSV dialect requested from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialect {
    pub header: bool,
    pub delimiter: String,
    pub comment_prefix: String,
    pub annotations: Vec<String>,
    pub date_time_format: String,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            header: true,
            delimiter: ",".to_string(),
            comment_prefix: "#".to_string(),
            annotations: vec![
                "datatype".to_string(),
                "group".to_string(),
                "default".to_string(),
            ],
            date_time_format: "RFC3339".to_string(),
        }
    }
}

/// A Flux query with optional parameters.
///
/// Parameters are referenced as `params.<name>` in the query text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    pub dialect: Dialect,
    #[serde(rename = "type")]
    query_type: &'static str,
}

impl Query {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: None,
            dialect: Dialect::default(),
            query_type: "flux",
        }
    }

    /// Adds or replaces a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

impl From<&str> for Query {
    fn from(q: &str) -> Self {
        Query::new(q)
    }
}

impl From<String> for Query {
    fn from(q: String) -> Self {
        Query::new(q)
    }
}

/// Query API bound to one client.
#[derive(Clone)]
pub struct QueryApi {
    context: Arc<ApiContext>,
}

impl QueryApi {
    pub(crate) fn new(context: Arc<ApiContext>) -> Self {
        Self { context }
    }

    /// Run a query and decode every table into memory.
    pub fn query(&self, query: impl Into<Query>, org: Option<&str>) -> Result<Vec<FluxTable>> {
        let request = self.request(query.into(), org)?;
        let response = self.context.send(request)?;
        parse_tables(response.into_body())
    }

    /// Run a query and yield records as they are decoded.
    ///
    /// The request is sent on the first pull; configuration errors are
    /// reported immediately.
    pub fn query_stream(&self, query: impl Into<Query>, org: Option<&str>) -> Result<FluxRecordStream> {
        let request = self.request(query.into(), org)?;
        let context = Arc::clone(&self.context);
        Ok(FluxRecordStream::new(move || {
            Ok(context.send(request)?.into_body())
        }))
    }

    /// Run a query and return the undecoded CSV body.
    pub fn query_raw(&self, query: impl Into<Query>, org: Option<&str>) -> Result<String> {
        let request = self.request(query.into(), org)?;
        self.context.send(request)?.into_string()
    }

    fn request(&self, query: Query, org: Option<&str>) -> Result<HttpRequest> {
        if query.query.trim().is_empty() {
            return Err(Error::Config("query must not be empty".to_string()));
        }
        let org = ApiContext::require("org", org, self.context.options.org.as_deref())?;
        let body = serde_json::to_vec(&query)?;

        log::debug!("[influx-query] Query for org={}", org);
        Ok(HttpRequest::post("/api/v2/query")
            .query("org", org)
            .header("Content-Type", "application/json")
            .header("Accept", "application/csv")
            .body(body))
    }
}
