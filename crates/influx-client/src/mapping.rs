// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON field-map conversion to [`Point`].
//!
//! A field map is a JSON object of the form:
//!
//! ```json
//! {
//!   "name": "h2o",
//!   "tags": { "location": "europe" },
//!   "fields": { "level": 2 },
//!   "time": 123,
//!   "precision": "s"
//! }
//! ```
//!
//! `measurement` is accepted as an alias of `name`. Tags are always written
//! as strings; fields keep their natural JSON type.

use crate::error::{Error, Result};
use crate::point::{FieldValue, Point, Timestamp};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Build a [`Point`] from a JSON field map.
///
/// Null, array and object tag/field values are skipped. A missing or
/// non-string measurement name is a configuration error.
pub fn point_from_json(record: &Value) -> Result<Point> {
    let obj = record
        .as_object()
        .ok_or_else(|| Error::Config("field map must be a JSON object".to_string()))?;

    let name = obj
        .get("name")
        .or_else(|| obj.get("measurement"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Config("field map has no measurement 'name'".to_string()))?;

    let mut point = Point::new(name);

    if let Some(tags) = obj.get("tags").and_then(Value::as_object) {
        for (key, val) in tags {
            if let Some(s) = json_to_string(val) {
                point = point.add_tag(key.as_str(), s);
            }
        }
    }

    if let Some(fields) = obj.get("fields").and_then(Value::as_object) {
        for (key, val) in fields {
            if let Some(fv) = json_to_field_value(val) {
                point = point.add_field(key.as_str(), fv);
            }
        }
    }

    if let Some(time) = obj.get("time").and_then(json_to_timestamp) {
        point = match obj.get("precision").and_then(Value::as_str) {
            Some(p) => point.time(time, p.parse()?),
            None => point.timestamp(time),
        };
    }

    Ok(point)
}

/// Convert a JSON value to a string representation for use as a tag value.
fn json_to_string(val: &Value) -> Option<String> {
    match val {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Null, arrays and objects are not valid tag values
        _ => None,
    }
}

/// Convert a JSON value to a FieldValue with type inference.
fn json_to_field_value(val: &Value) -> Option<FieldValue> {
    match val {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(FieldValue::Integer(i))
            } else {
                n.as_f64().map(FieldValue::Float)
            }
        }
        Value::String(s) => Some(FieldValue::String(s.clone())),
        Value::Bool(b) => Some(FieldValue::Boolean(*b)),
        _ => None,
    }
}

/// Integers pass through, RFC3339 strings become instants, any other
/// string is passed through verbatim.
fn json_to_timestamp(val: &Value) -> Option<Timestamp> {
    match val {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Timestamp::Integer(i))
            } else {
                n.as_f64().map(Timestamp::Float)
            }
        }
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Some(Timestamp::Instant(t.with_timezone(&Utc))),
            Err(_) => Some(Timestamp::Text(s.clone())),
        },
        _ => None,
    }
}
