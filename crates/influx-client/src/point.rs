// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB v2 Line Protocol encoding.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp
//! ```
//!
//! Tags and fields are emitted sorted by key so the same point always
//! encodes to the same bytes.
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Unit of an integer timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WritePrecision {
    #[serde(rename = "s")]
    Second,
    #[serde(rename = "ms")]
    Millisecond,
    #[serde(rename = "us")]
    Microsecond,
    #[default]
    #[serde(rename = "ns")]
    Nanosecond,
}

impl WritePrecision {
    /// Value of the `precision` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            WritePrecision::Second => "s",
            WritePrecision::Millisecond => "ms",
            WritePrecision::Microsecond => "us",
            WritePrecision::Nanosecond => "ns",
        }
    }

    /// Nanoseconds in one unit of this precision.
    fn nanos_per_unit(&self) -> i128 {
        match self {
            WritePrecision::Second => 1_000_000_000,
            WritePrecision::Millisecond => 1_000_000,
            WritePrecision::Microsecond => 1_000,
            WritePrecision::Nanosecond => 1,
        }
    }
}

impl fmt::Display for WritePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WritePrecision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(WritePrecision::Second),
            "ms" => Ok(WritePrecision::Millisecond),
            "us" => Ok(WritePrecision::Microsecond),
            "ns" => Ok(WritePrecision::Nanosecond),
            other => Err(Error::Config(format!(
                "the time precision {} is not supported",
                other
            ))),
        }
    }
}

/// A value that can be stored in an InfluxDB field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// 64-bit signed integer.
    Integer(i64),
    /// UTF-8 string.
    String(String),
    /// Boolean value.
    Boolean(bool),
}

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`); NaN and infinities have no
    ///   representation and yield `None`
    /// - Integer: suffixed with `i` (e.g., `42i`)
    /// - String: quoted with double quotes, `\` and `"` escaped
    /// - Boolean: `true` or `false`
    pub fn to_line_protocol(&self) -> Option<String> {
        match self {
            FieldValue::Float(v) if !v.is_finite() => None,
            FieldValue::Float(v) => Some(format!("{}", v)),
            FieldValue::Integer(v) => Some(format!("{}i", v)),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                Some(format!("\"{}\"", escaped))
            }
            FieldValue::Boolean(v) => Some(if *v { "true" } else { "false" }.to_string()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(f64::from(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// Timestamp attached to a point.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    /// Already expressed in the write precision; passed through.
    Integer(i64),
    /// Passed through after rounding.
    Float(f64),
    /// Passed through verbatim.
    Text(String),
    /// Wall-clock instant, converted to the write precision.
    Instant(DateTime<Utc>),
}

impl Timestamp {
    fn to_line_protocol(&self, precision: WritePrecision) -> Option<String> {
        match self {
            Timestamp::Integer(v) => Some(v.to_string()),
            Timestamp::Float(v) if !v.is_finite() => None,
            Timestamp::Float(v) => Some(format!("{}", v.round() as i64)),
            Timestamp::Text(v) if v.is_empty() => None,
            Timestamp::Text(v) => Some(v.clone()),
            Timestamp::Instant(t) => {
                let nanos = i128::from(t.timestamp()) * 1_000_000_000
                    + i128::from(t.timestamp_subsec_nanos());
                Some(div_round(nanos, precision.nanos_per_unit()).to_string())
            }
        }
    }
}

impl From<i64> for Timestamp {
    fn from(v: i64) -> Self {
        Timestamp::Integer(v)
    }
}

impl From<i32> for Timestamp {
    fn from(v: i32) -> Self {
        Timestamp::Integer(i64::from(v))
    }
}

impl From<f64> for Timestamp {
    fn from(v: f64) -> Self {
        Timestamp::Float(v)
    }
}

impl From<&str> for Timestamp {
    fn from(v: &str) -> Self {
        Timestamp::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(v: DateTime<Utc>) -> Self {
        Timestamp::Instant(v)
    }
}

impl From<std::time::SystemTime> for Timestamp {
    fn from(v: std::time::SystemTime) -> Self {
        Timestamp::Instant(DateTime::<Utc>::from(v))
    }
}

/// Integer division rounding half away from zero.
fn div_round(value: i128, divisor: i128) -> i128 {
    let quotient = value / divisor;
    let remainder = value % divisor;
    if remainder.abs() * 2 >= divisor {
        quotient + value.signum()
    } else {
        quotient
    }
}

/// A single measurement sample.
///
/// ```
/// use influx_client::{Point, WritePrecision};
///
/// let point = Point::new("h2o")
///     .add_tag("location", "europe")
///     .add_field("level", 2)
///     .time(123, WritePrecision::Nanosecond);
///
/// assert_eq!(point.to_line_protocol().as_deref(), Some("h2o,location=europe level=2i 123"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Point {
    name: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, Option<FieldValue>>,
    time: Option<Timestamp>,
    precision: Option<WritePrecision>,
}

impl Point {
    /// Create a point for the given measurement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds or replaces a tag.
    pub fn add_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds or replaces a field.
    pub fn add_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), Some(value.into()));
        self
    }

    /// Adds or replaces a field that may be null. Null fields are not written.
    pub fn add_field_opt<V: Into<FieldValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.fields.insert(key.into(), value.map(Into::into));
        self
    }

    /// Sets the timestamp and the precision it is expressed in.
    pub fn time(mut self, time: impl Into<Timestamp>, precision: WritePrecision) -> Self {
        self.time = Some(time.into());
        self.precision = Some(precision);
        self
    }

    /// Sets the timestamp, leaving the precision to the write call.
    pub fn timestamp(mut self, time: impl Into<Timestamp>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Measurement name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag set, ordered by key.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Field set, ordered by key. `None` marks a null field.
    pub fn fields(&self) -> &BTreeMap<String, Option<FieldValue>> {
        &self.fields
    }

    /// Explicit precision, if one was set with [`Point::time`].
    pub fn precision(&self) -> Option<WritePrecision> {
        self.precision
    }

    /// Encode with the point's own precision (nanoseconds if unset).
    ///
    /// Returns `None` when no field survives filtering.
    pub fn to_line_protocol(&self) -> Option<String> {
        self.to_line_protocol_with(self.precision.unwrap_or_default(), None)
    }

    /// Encode, converting instants to `precision` unless the point carries
    /// its own, and merging `default_tags` underneath the point's tags.
    pub fn to_line_protocol_with(
        &self,
        precision: WritePrecision,
        default_tags: Option<&BTreeMap<String, String>>,
    ) -> Option<String> {
        let mut line = escape_key(&self.name, false);

        let tags = match default_tags {
            Some(defaults) if !defaults.is_empty() => {
                let mut merged = defaults.clone();
                merged.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
                encode_tags(&merged)
            }
            _ => encode_tags(&self.tags),
        };
        if !tags.is_empty() {
            line.push(',');
            line.push_str(&tags);
        }
        // An escaped trailing backslash must not swallow the separator.
        if line.ends_with('\\') {
            line.push(' ');
        }

        let fields = encode_fields(&self.fields);
        if fields.is_empty() {
            return None;
        }
        line.push(' ');
        line.push_str(&fields);

        let precision = self.precision.unwrap_or(precision);
        if let Some(ts) = self.time.as_ref().and_then(|t| t.to_line_protocol(precision)) {
            line.push(' ');
            line.push_str(&ts);
        }

        Some(line)
    }
}

fn encode_tags(tags: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in tags {
        let key = escape_key(key, true);
        let value = escape_key(value, true);
        if key.is_empty() || value.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&key);
        out.push('=');
        out.push_str(&value);
    }
    out
}

fn encode_fields(fields: &BTreeMap<String, Option<FieldValue>>) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        let key = escape_key(key, true);
        let value = match value.as_ref().and_then(FieldValue::to_line_protocol) {
            Some(v) => v,
            None => continue,
        };
        if key.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(&key);
        out.push('=');
        out.push_str(&value);
    }
    out
}

/// Escape a measurement name (`escape_equals == false`) or a tag/field key
/// or tag value (`escape_equals == true`).
///
/// Backslash, comma and space are backslash-escaped; newline, carriage
/// return and tab become the two-character sequences `\n`, `\r`, `\t`.
fn escape_key(s: &str, escape_equals: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | ',' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '=' if escape_equals => out.push_str("\\="),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
