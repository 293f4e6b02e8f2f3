// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Incremental annotated-CSV decoder.
//!
//! Response layout:
//! ```text
//! #datatype,string,long,dateTime:RFC3339,double
//! #group,false,false,false,false
//! #default,_result,,,
//! ,result,table,_time,_value
//! ,,0,2020-01-01T00:00:00Z,1.5
//! ```
//!
//! The first CSV column is the annotation column and never holds data.
//! Annotation rows may come in any order. A blank line ends a result set
//! and the next one starts with fresh annotations. A header of
//! `,error,reference` announces an error table whose single row is turned
//! into [`Error::Query`].

use super::table::{FluxColumn, FluxRecord, FluxTable, FluxValue};
use crate::error::{Error, Result};
use crate::transport::read_trimmed_line;
use base64::Engine;
use chrono::DateTime;
use std::collections::BTreeMap;
use std::io::BufRead;

const MISSING_TABLE_DEFINITION: &str =
    "Unable to parse CSV response. FluxTable definition was not found.";

/// Column (counting the annotation column) holding the table id.
const TABLE_ID_COLUMN: usize = 2;

/// Splits a line-oriented reader into CSV rows.
///
/// Quoted cells may contain commas, doubled quotes and line breaks. An
/// empty line yields an empty row.
pub struct CsvRowReader<R> {
    reader: R,
}

impl<R: BufRead> CsvRowReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Next row, `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<Vec<String>>> {
        let mut record = match read_trimmed_line(&mut self.reader)? {
            Some(line) => line,
            None => return Ok(None),
        };

        // an odd number of quotes means a quoted cell spans lines
        while record.matches('"').count() % 2 == 1 {
            match read_trimmed_line(&mut self.reader)? {
                Some(next) => {
                    record.push('\n');
                    record.push_str(&next);
                }
                None => break,
            }
        }

        if record.is_empty() {
            return Ok(Some(Vec::new()));
        }
        Ok(Some(split_record(&record)))
    }
}

fn split_record(record: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = record.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    cell.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                cell.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => cells.push(std::mem::take(&mut cell)),
                _ => cell.push(c),
            }
        }
    }
    cells.push(cell);
    cells
}

/// What a row contributed to the result.
#[derive(Debug, Clone, PartialEq)]
pub enum RowEvent {
    /// Annotation, blank line or error header.
    Consumed,
    /// A header row opened a table with the current schema.
    TableStarted,
    /// A data row. `new_table` is set when its table id differs from the
    /// previous row's, which opens a table with the same schema.
    Record { new_table: bool, record: FluxRecord },
}

#[derive(Debug, Default)]
struct Annotations {
    datatypes: Option<Vec<String>>,
    groups: Vec<String>,
    defaults: Vec<String>,
}

/// Row-at-a-time state machine over annotated CSV.
#[derive(Debug, Default)]
pub struct FluxCsvParser {
    annotations: Annotations,
    columns: Option<Vec<FluxColumn>>,
    error_table: bool,
    tables_started: usize,
    table_id: Option<String>,
}

impl FluxCsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of the current table.
    pub fn columns(&self) -> Option<&[FluxColumn]> {
        self.columns.as_deref()
    }

    /// Feed one CSV row.
    pub fn parse_row(&mut self, row: &[String]) -> Result<RowEvent> {
        if row.is_empty() {
            self.reset();
            return Ok(RowEvent::Consumed);
        }

        if self.error_table {
            let message = row.get(1).cloned().unwrap_or_default();
            let reference = row
                .get(2)
                .and_then(|r| r.trim().parse::<u32>().ok())
                .unwrap_or(0);
            return Err(Error::Query { message, reference });
        }

        if row[0].starts_with('#') {
            if self.columns.is_some() {
                // annotations after data open a new result set
                self.reset();
            }
            self.annotate(row);
            return Ok(RowEvent::Consumed);
        }

        if self.columns.is_none() {
            return self.parse_header(row);
        }

        self.parse_data(row)
    }

    fn reset(&mut self) {
        self.annotations = Annotations::default();
        self.columns = None;
        self.error_table = false;
        self.table_id = None;
    }

    fn annotate(&mut self, row: &[String]) {
        let values: Vec<String> = row[1..].to_vec();
        match row[0].as_str() {
            "#datatype" => self.annotations.datatypes = Some(values),
            "#group" => self.annotations.groups = values,
            "#default" => self.annotations.defaults = values,
            other => log::debug!("[influx-query] Ignoring annotation {}", other),
        }
    }

    fn parse_header(&mut self, row: &[String]) -> Result<RowEvent> {
        if row.get(1).map(String::as_str) == Some("error")
            && row.get(2).map(String::as_str) == Some("reference")
        {
            self.error_table = true;
            return Ok(RowEvent::Consumed);
        }

        let datatypes = match self.annotations.datatypes.take() {
            Some(types) => types,
            None => return Err(Error::Parse(MISSING_TABLE_DEFINITION.to_string())),
        };

        let columns = datatypes
            .into_iter()
            .enumerate()
            .map(|(index, data_type)| FluxColumn {
                index,
                label: row.get(index + 1).cloned().unwrap_or_default(),
                data_type,
                group: self
                    .annotations
                    .groups
                    .get(index)
                    .is_some_and(|g| g == "true"),
                default_value: self
                    .annotations
                    .defaults
                    .get(index)
                    .filter(|d| !d.is_empty())
                    .cloned(),
            })
            .collect();

        self.columns = Some(columns);
        self.table_id = None;
        self.tables_started += 1;
        Ok(RowEvent::TableStarted)
    }

    fn parse_data(&mut self, row: &[String]) -> Result<RowEvent> {
        let table_id = row.get(TABLE_ID_COLUMN).cloned().unwrap_or_default();
        let new_table = match &self.table_id {
            Some(current) => current.trim() != table_id.trim(),
            None => false,
        };
        if new_table {
            self.tables_started += 1;
        }
        self.table_id = Some(table_id);

        let columns = match &self.columns {
            Some(columns) => columns,
            None => return Err(Error::Parse(MISSING_TABLE_DEFINITION.to_string())),
        };

        let mut values = BTreeMap::new();
        for column in columns {
            let cell = row.get(column.index + 1).map(String::as_str).unwrap_or("");
            values.insert(column.label.clone(), to_value(cell, column)?);
        }

        Ok(RowEvent::Record {
            new_table,
            record: FluxRecord::new(self.tables_started.saturating_sub(1), values),
        })
    }
}

/// Coerce a cell according to its column's declared type.
fn to_value(cell: &str, column: &FluxColumn) -> Result<FluxValue> {
    let raw = if cell.is_empty() {
        match &column.default_value {
            Some(default) => default.as_str(),
            None => return Ok(FluxValue::Null),
        }
    } else {
        cell
    };

    let invalid = || {
        Error::Parse(format!(
            "Unable to parse CSV response. Invalid {} value '{}' in column '{}'",
            column.data_type, raw, column.label
        ))
    };

    let value = match column.data_type.as_str() {
        "boolean" => FluxValue::Boolean(raw.eq_ignore_ascii_case("true")),
        "long" => FluxValue::Long(raw.parse().map_err(|_| invalid())?),
        "unsignedLong" => FluxValue::UnsignedLong(raw.parse().map_err(|_| invalid())?),
        "duration" => FluxValue::Duration(raw.parse().map_err(|_| invalid())?),
        "double" => FluxValue::Double(match raw {
            "+Inf" => f64::INFINITY,
            "-Inf" => f64::NEG_INFINITY,
            _ => raw.parse().map_err(|_| invalid())?,
        }),
        "base64Binary" => FluxValue::Base64Binary(
            base64::engine::general_purpose::STANDARD
                .decode(raw.trim())
                .map_err(|_| invalid())?,
        ),
        "dateTime:RFC3339" | "dateTime:RFC3339Nano" => {
            FluxValue::DateTime(DateTime::parse_from_rfc3339(raw).map_err(|_| invalid())?)
        }
        _ => FluxValue::String(raw.to_string()),
    };
    Ok(value)
}

/// Decode a whole response into tables.
pub fn parse_tables<R: BufRead>(reader: R) -> Result<Vec<FluxTable>> {
    let mut rows = CsvRowReader::new(reader);
    let mut parser = FluxCsvParser::new();
    let mut tables: Vec<FluxTable> = Vec::new();

    while let Some(row) = rows.next_row()? {
        match parser.parse_row(&row)? {
            RowEvent::Consumed => {}
            RowEvent::TableStarted => {
                tables.push(FluxTable::new(parser.columns().unwrap_or_default().to_vec()));
            }
            RowEvent::Record { new_table, record } => {
                if new_table {
                    tables.push(FluxTable::new(parser.columns().unwrap_or_default().to_vec()));
                }
                if let Some(table) = tables.last_mut() {
                    table.records.push(record);
                }
            }
        }
    }
    Ok(tables)
}

/// [`parse_tables`] over an in-memory response.
pub fn parse_str(body: &str) -> Result<Vec<FluxTable>> {
    parse_tables(body.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORTCUT: &str = "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,long,string,string,string,boolean\n\
#group,false,false,false,false,false,false,false,false,false,true\n\
#default,_result,,,,,,,,,true\n\
,result,table,_start,_stop,_time,_value,_field,_measurement,host,value\n\
,,0,1970-01-01T00:00:10Z,1970-01-01T00:00:20Z,1970-01-01T00:00:10Z,10,free,mem,A,true\n";

    fn single_column(data_type: &str, cells: &[&str]) -> String {
        let mut data = format!(
            "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,long,string,string,string,{}\n\
#group,false,false,false,false,false,false,false,false,false,true\n\
#default,_result,,,,,,,,,\n\
,result,table,_start,_stop,_time,_value,_field,_measurement,host,value\n",
            data_type
        );
        for cell in cells {
            data.push_str(&format!(
                ",,0,1970-01-01T00:00:10Z,1970-01-01T00:00:20Z,1970-01-01T00:00:10Z,10,free,mem,A,{}\n",
                cell
            ));
        }
        data
    }

    fn value_column(data_type: &str, cells: &[&str]) -> Vec<FluxValue> {
        let tables = parse_str(&single_column(data_type, cells)).expect("valid csv");
        tables[0]
            .records
            .iter()
            .map(|r| r.get("value").cloned().unwrap_or(FluxValue::Null))
            .collect()
    }

    #[test]
    fn test_split_record_quotes() {
        assert_eq!(split_record(",a,b"), vec!["", "a", "b"]);
        assert_eq!(split_record(",\"x,y\",\"say \"\"hi\"\"\""), vec!["", "x,y", "say \"hi\""]);
        assert_eq!(split_record(""), vec![""]);
    }

    #[test]
    fn test_row_reader_multiline_quoted_cell() {
        let mut rows = CsvRowReader::new(",\"line1\nline2\",x\n\n,a\n".as_bytes());
        assert_eq!(rows.next_row().unwrap(), Some(vec!["".into(), "line1\nline2".into(), "x".into()]));
        assert_eq!(rows.next_row().unwrap(), Some(vec![]));
        assert_eq!(rows.next_row().unwrap(), Some(vec!["".into(), "a".into()]));
        assert_eq!(rows.next_row().unwrap(), None);
    }

    #[test]
    fn test_parse_shortcut() {
        let tables = parse_str(SHORTCUT).expect("valid csv");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].records.len(), 1);

        let record = &tables[0].records[0];
        let ten = DateTime::parse_from_rfc3339("1970-01-01T00:00:10Z").unwrap();
        let twenty = DateTime::parse_from_rfc3339("1970-01-01T00:00:20Z").unwrap();
        assert_eq!(record.start(), Some(&ten));
        assert_eq!(record.stop(), Some(&twenty));
        assert_eq!(record.time(), Some(&ten));
        assert_eq!(record.value(), Some(&FluxValue::Long(10)));
        assert_eq!(record.get("value"), Some(&FluxValue::Boolean(true)));
        assert_eq!(record.field(), Some("free"));
        assert_eq!(record.measurement(), Some("mem"));
        assert_eq!(record.get("result"), Some(&FluxValue::String("_result".into())));
        assert_eq!(record.values.len(), 11);
    }

    #[test]
    fn test_multiple_tables_by_id() {
        let data = "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,string,string,string,string,long,long,string\n\
#group,false,false,true,true,true,true,true,true,false,false,false\n\
#default,_result,,,,,,,,,,\n\
,result,table,_start,_stop,_field,_measurement,host,region,_value2,value1,value_str\n\
,,0,1677-09-21T00:12:43.145224192Z,2018-07-16T11:21:02.547596934Z,free,mem,A,west,121,11,test\n\
,,1,1677-09-21T00:12:43.145224192Z,2018-07-16T11:21:02.547596934Z,free,mem,B,west,484,22,test\n\
,,2,1677-09-21T00:12:43.145224192Z,2018-07-16T11:21:02.547596934Z,usage_system,cpu,A,west,1444,38,test\n\
,,3,1677-09-21T00:12:43.145224192Z,2018-07-16T11:21:02.547596934Z,user_usage,cpu,A,west,2401,49,test";

        let tables = parse_str(data).expect("valid csv");
        assert_eq!(tables.len(), 4);
        assert_eq!(tables[0].columns.len(), 11);
        let groups: Vec<bool> = tables[0].columns.iter().map(|c| c.group).collect();
        assert_eq!(
            groups,
            vec![false, false, true, true, true, true, true, true, false, false, false]
        );
        for (i, table) in tables.iter().enumerate() {
            assert_eq!(table.records.len(), 1);
            assert_eq!(table.records[0].table, i);
            assert_eq!(table.columns, tables[0].columns);
        }
        assert_eq!(tables[1].records[0].get("host"), Some(&FluxValue::String("B".into())));
        assert_eq!(tables[3].records[0].get("_value2"), Some(&FluxValue::Long(2401)));
    }

    #[test]
    fn test_mapping_boolean() {
        let values = value_column("boolean", &["true", "false", "x", "TRUE"]);
        assert_eq!(
            values,
            vec![
                FluxValue::Boolean(true),
                FluxValue::Boolean(false),
                FluxValue::Boolean(false),
                FluxValue::Boolean(true),
            ]
        );
    }

    #[test]
    fn test_empty_cell_uses_default() {
        let values = value_column("boolean", &[""]);
        assert_eq!(values, vec![FluxValue::Null]);

        let tables = parse_str(&SHORTCUT.replace(",A,true\n", ",A,\n")).expect("valid csv");
        assert_eq!(tables[0].records[0].get("value"), Some(&FluxValue::Boolean(true)));
    }

    #[test]
    fn test_mapping_unsigned_long() {
        let values = value_column("unsignedLong", &["17916881237904312345", ""]);
        assert_eq!(
            values,
            vec![FluxValue::UnsignedLong(17_916_881_237_904_312_345), FluxValue::Null]
        );
    }

    #[test]
    fn test_mapping_double() {
        let values = value_column("double", &["12.25", "", "+Inf", "-Inf"]);
        assert_eq!(
            values,
            vec![
                FluxValue::Double(12.25),
                FluxValue::Null,
                FluxValue::Double(f64::INFINITY),
                FluxValue::Double(f64::NEG_INFINITY),
            ]
        );
    }

    #[test]
    fn test_mapping_base64_binary() {
        let values = value_column("base64Binary", &["dGVzdCB2YWx1ZQ==", ""]);
        assert_eq!(
            values,
            vec![FluxValue::Base64Binary(b"test value".to_vec()), FluxValue::Null]
        );
    }

    #[test]
    fn test_mapping_rfc3339_nano() {
        let values = value_column("dateTime:RFC3339Nano", &["2020-11-02T07:29:49.55050738Z"]);
        let time = values[0].as_datetime().expect("datetime");
        assert_eq!(time.timestamp_subsec_nanos(), 550_507_380);
        assert_eq!(time.to_rfc3339(), "2020-11-02T07:29:49.550507380+00:00");
    }

    #[test]
    fn test_mapping_duration() {
        let values = value_column("duration", &["125", ""]);
        assert_eq!(values, vec![FluxValue::Duration(125), FluxValue::Null]);
    }

    #[test]
    fn test_unknown_type_as_string() {
        let values = value_column("unknown", &["12.25", ""]);
        assert_eq!(values, vec![FluxValue::String("12.25".into()), FluxValue::Null]);
    }

    #[test]
    fn test_invalid_number_is_parse_error() {
        let err = parse_str(&single_column("long", &["ten"])).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_group_key() {
        let data = "#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,dateTime:RFC3339,double,string,string,string,string\n\
#group,false,false,true,true,false,false,false,false,false,false\n\
#default,_result,,,,,,,,,\n\
,result,table,_start,_stop,_time,_value,_field,_measurement,host,value\n\
,,0,1970-01-01T00:00:10Z,1970-01-01T00:00:20Z,1970-01-01T00:00:10Z,10,free,mem,A,12.25\n";
        let tables = parse_str(data).expect("valid csv");
        assert_eq!(tables[0].columns.len(), 10);
        assert_eq!(tables[0].group_key().len(), 2);
    }

    #[test]
    fn test_error_table() {
        let data = "#datatype,string,string\n\
#group,true,true\n\
#default,,\n\
,error,reference\n\
,failed to create physical plan: invalid time bounds from procedure from: bounds contain zero time,897";
        match parse_str(data) {
            Err(Error::Query { message, reference }) => {
                assert_eq!(
                    message,
                    "failed to create physical plan: invalid time bounds from procedure from: bounds contain zero time"
                );
                assert_eq!(reference, 897);
            }
            other => panic!("expected query error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_table_quoted_without_reference() {
        let data = "#datatype,string,string\n#group,true,true\n#default,,\n,error,reference\n,\"boom\",42\n";
        assert!(matches!(
            parse_str(data),
            Err(Error::Query { ref message, reference: 42 }) if message == "boom"
        ));

        let data = "#datatype,string,string\n#group,true,true\n#default,,\n,error,reference\n,\"engine: unknown field type for value: xyz\",\n";
        assert!(matches!(
            parse_str(data),
            Err(Error::Query { ref message, reference: 0 }) if message == "engine: unknown field type for value: xyz"
        ));
    }

    #[test]
    fn test_error_after_data_result() {
        let data = format!(
            "{}\n#datatype,string,string\n#group,true,true\n#default,,\n,error,reference\n,\"engine: unknown field type for value: xyz\",\n",
            SHORTCUT
        );
        assert!(matches!(parse_str(&data), Err(Error::Query { reference: 0, .. })));
    }

    #[test]
    fn test_without_table_definition() {
        let data = ",result,table,_start,_stop,_time,_value,_field,_measurement,host,value\n\
,,0,1970-01-01T00:00:10Z,1970-01-01T00:00:20Z,1970-01-01T00:00:10Z,10,free,mem,A,12.25\n";
        match parse_str(data) {
            Err(Error::Parse(message)) => assert_eq!(message, MISSING_TABLE_DEFINITION),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_result_sets() {
        let block = |tag: &str| {
            let mut s = format!(
                "#datatype,string,long,string,string,double\n#group,false,false,true,true,false\n#default,{},,,,\n,result,table,_field,_measurement,_value\n",
                tag
            );
            for id in 0..2 {
                for v in 0..3 {
                    s.push_str(&format!(",,{},value,pct,{}\n", id, v));
                }
            }
            s
        };
        let data = format!("{}\n{}", block("t1"), block("t2"));
        let tables = parse_str(&data).expect("valid csv");
        assert_eq!(tables.len(), 4);
        assert!(tables.iter().all(|t| t.records.len() == 3));
        assert_eq!(tables[2].records[0].get("result"), Some(&FluxValue::String("t2".into())));
        assert_eq!(tables[3].records[0].table, 3);
    }

    #[test]
    fn test_table_not_starting_at_zero() {
        let mut data = String::from(
            "#datatype,string,long,string,double\n#group,false,false,true,false\n#default,t1,,,\n,result,table,_field,_value\n",
        );
        for id in 1..=2 {
            for v in 0..7 {
                data.push_str(&format!(",,{},value,{}\n", id, v));
            }
        }
        let tables = parse_str(&data).expect("valid csv");
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].records.len(), 7);
        assert_eq!(tables[1].records.len(), 7);
    }

    #[test]
    fn test_annotations_in_any_order() {
        let data = "#group,false,false,true,true,true,true,true,true,false,false\n\
#datatype,string,long,dateTime:RFC3339,dateTime:RFC3339,string,string,string,string,double,dateTime:RFC3339\n\
#default,mean,,,,,,,,,\n\
,result,table,_start,_stop,_field,_measurement,city,location,_value,_time\n\
,,0,1754-06-26T11:30:27.613654848Z,2040-10-27T12:13:46.485Z,temp,weather,Lon,us,30,1975-09-01T16:59:54.5Z\n\
,,1,1754-06-26T11:30:27.613654848Z,2040-10-27T12:13:46.485Z,temp,weather,Lon,us,86,1975-09-01T16:59:54.5Z\n";
        let tables = parse_str(data).expect("valid csv");
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].records.len(), 1);
        assert!(!tables[0].columns[0].group);
        assert!(!tables[0].columns[1].group);
        assert!(tables[0].columns[2].group);
        assert_eq!(tables[1].records.len(), 1);
        assert_eq!(tables[1].records[0].value(), Some(&FluxValue::Double(86.0)));
    }

    #[test]
    fn test_hash_inside_data_cell() {
        let data = "#datatype,string,long,string\n#group,false,false,true\n#default,_result,,\n,result,table,language\n,,0,C#\n";
        let tables = parse_str(data).expect("valid csv");
        assert_eq!(tables[0].records[0].get("language"), Some(&FluxValue::String("C#".into())));
    }

    #[test]
    fn test_empty_body() {
        assert!(parse_str("").expect("empty is valid").is_empty());
        assert!(parse_str("\n\n").expect("blank lines are valid").is_empty());
    }

    #[test]
    fn test_header_without_rows_yields_empty_table() {
        let data = "#datatype,string,long\n#group,false,false\n#default,_result,\n,result,table\n";
        let tables = parse_str(data).expect("valid csv");
        assert_eq!(tables.len(), 1);
        assert!(tables[0].records.is_empty());
    }

    /// Annotated CSV type and raw cell for a line-protocol field value.
    fn field_cell(encoded: &str) -> (&'static str, String) {
        if let Some(inner) = encoded.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            ("string", inner.replace("\\\"", "\"").replace("\\\\", "\\"))
        } else if let Some(int) = encoded.strip_suffix('i') {
            ("long", int.to_string())
        } else if encoded == "true" || encoded == "false" {
            ("boolean", encoded.to_string())
        } else {
            ("double", encoded.to_string())
        }
    }

    fn quoted(cell: &str) -> String {
        format!("\"{}\"", cell.replace('"', "\"\""))
    }

    #[test]
    fn test_encoded_point_values_read_back() {
        use crate::point::{FieldValue, Point};

        let point = Point::new("h2o")
            .add_tag("location", "west coast")
            .add_tag("sensor", "a=1,b")
            .add_field("level", 2)
            .add_field("temperature", 21.5)
            .add_field("ok", true)
            .add_field("note", "say \"hi\", \\ok");
        let line = point.to_line_protocol().expect("point has fields");
        assert_eq!(
            line,
            r#"h2o,location=west\ coast,sensor=a\=1\,b level=2i,note="say \"hi\", \\ok",ok=true,temperature=21.5"#
        );

        let mut types = vec!["string", "long", "string"];
        let mut labels = vec!["result".to_string(), "table".to_string(), "_measurement".to_string()];
        let mut cells = vec![String::new(), "0".to_string(), quoted(point.name())];
        for (key, value) in point.tags() {
            types.push("string");
            labels.push(key.clone());
            cells.push(quoted(value));
        }
        for (key, value) in point.fields() {
            let encoded = value.as_ref().and_then(FieldValue::to_line_protocol).expect("field encodes");
            let (data_type, cell) = field_cell(&encoded);
            types.push(data_type);
            labels.push(key.clone());
            cells.push(quoted(&cell));
        }

        let csv = format!(
            "#datatype,{}\n#group,{}\n#default,_result{}\n,{}\n,{}\n",
            types.join(","),
            vec!["false"; types.len()].join(","),
            ",".repeat(types.len() - 1),
            labels.join(","),
            cells.join(",")
        );
        let tables = parse_str(&csv).expect("valid csv");
        let record = &tables[0].records[0];

        assert_eq!(record.measurement(), Some("h2o"));
        assert_eq!(record.get("location"), Some(&FluxValue::String("west coast".into())));
        assert_eq!(record.get("sensor"), Some(&FluxValue::String("a=1,b".into())));
        assert_eq!(record.get("level"), Some(&FluxValue::Long(2)));
        assert_eq!(record.get("temperature"), Some(&FluxValue::Double(21.5)));
        assert_eq!(record.get("ok"), Some(&FluxValue::Boolean(true)));
        assert_eq!(
            record.get("note"),
            Some(&FluxValue::String("say \"hi\", \\ok".into()))
        );
    }
}
