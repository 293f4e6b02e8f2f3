// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Query result model: tables, columns, records and typed values.

use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;

/// A typed cell of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum FluxValue {
    /// Empty cell without a column default.
    Null,
    String(String),
    Boolean(bool),
    Long(i64),
    UnsignedLong(u64),
    Double(f64),
    /// Duration as an integer count of nanoseconds.
    Duration(i64),
    Base64Binary(Vec<u8>),
    DateTime(DateTime<FixedOffset>),
}

impl FluxValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FluxValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FluxValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FluxValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Signed integer view of `long` and `duration` cells.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FluxValue::Long(v) | FluxValue::Duration(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FluxValue::UnsignedLong(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FluxValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FluxValue::Base64Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            FluxValue::DateTime(t) => Some(t),
            _ => None,
        }
    }
}

/// Column schema, built from the annotation rows and the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxColumn {
    /// Position among the data columns (the leading annotation column is
    /// not counted).
    pub index: usize,
    pub label: String,
    /// Declared type from the `#datatype` row.
    pub data_type: String,
    /// Part of the group key (`#group` row).
    pub group: bool,
    /// Replacement for empty cells (`#default` row).
    pub default_value: Option<String>,
}

/// One table of a query result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxTable {
    pub columns: Vec<FluxColumn>,
    pub records: Vec<FluxRecord>,
}

impl FluxTable {
    pub fn new(columns: Vec<FluxColumn>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Columns whose value is shared by every record of the table.
    pub fn group_key(&self) -> Vec<&FluxColumn> {
        self.columns.iter().filter(|c| c.group).collect()
    }
}

/// One row of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxRecord {
    /// Index of the owning table in the result.
    pub table: usize,
    /// Values keyed by column label.
    pub values: BTreeMap<String, FluxValue>,
}

impl FluxRecord {
    pub fn new(table: usize, values: BTreeMap<String, FluxValue>) -> Self {
        Self { table, values }
    }

    pub fn get(&self, label: &str) -> Option<&FluxValue> {
        self.values.get(label)
    }

    /// `_value` column.
    pub fn value(&self) -> Option<&FluxValue> {
        self.get("_value")
    }

    /// `_field` column.
    pub fn field(&self) -> Option<&str> {
        self.get("_field").and_then(FluxValue::as_str)
    }

    /// `_measurement` column.
    pub fn measurement(&self) -> Option<&str> {
        self.get("_measurement").and_then(FluxValue::as_str)
    }

    /// `_time` column.
    pub fn time(&self) -> Option<&DateTime<FixedOffset>> {
        self.get("_time").and_then(FluxValue::as_datetime)
    }

    /// `_start` column.
    pub fn start(&self) -> Option<&DateTime<FixedOffset>> {
        self.get("_start").and_then(FluxValue::as_datetime)
    }

    /// `_stop` column.
    pub fn stop(&self) -> Option<&DateTime<FixedOffset>> {
        self.get("_stop").and_then(FluxValue::as_datetime)
    }
}
