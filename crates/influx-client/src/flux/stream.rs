// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lazy record-by-record decoding of a query response.

use super::parser::{CsvRowReader, FluxCsvParser, RowEvent};
use super::table::FluxRecord;
use crate::error::Result;
use std::io::BufRead;

type Body = Box<dyn BufRead + Send>;
type Opener = Box<dyn FnOnce() -> Result<Body> + Send>;

enum Source {
    /// Request not sent yet.
    Pending(Opener),
    Open(CsvRowReader<Body>),
    Closed,
}

/// Iterator over the records of a query response.
///
/// The request is sent on the first call to `next`. The response body is
/// released at end of input, on the first error, on [`close`](Self::close)
/// or when the stream is dropped, whichever comes first. Completed tables
/// are never buffered.
pub struct FluxRecordStream {
    source: Source,
    parser: FluxCsvParser,
}

impl FluxRecordStream {
    /// Stream that calls `opener` to obtain the body on first pull.
    pub fn new<F>(opener: F) -> Self
    where
        F: FnOnce() -> Result<Body> + Send + 'static,
    {
        Self {
            source: Source::Pending(Box::new(opener)),
            parser: FluxCsvParser::new(),
        }
    }

    /// Stream over an already open body.
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            source: Source::Open(CsvRowReader::new(Box::new(reader))),
            parser: FluxCsvParser::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.source, Source::Open(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.source, Source::Closed)
    }

    /// Release the response body. Later calls do nothing.
    pub fn close(&mut self) {
        if let Source::Open(_) = self.source {
            log::debug!("[influx-query] Closing response stream");
        }
        self.source = Source::Closed;
    }

    fn fail<T>(&mut self, error: crate::error::Error) -> Option<Result<T>> {
        self.close();
        Some(Err(error))
    }
}

impl Iterator for FluxRecordStream {
    type Item = Result<FluxRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.source, Source::Pending(_)) {
            if let Source::Pending(opener) = std::mem::replace(&mut self.source, Source::Closed) {
                match opener() {
                    Ok(body) => self.source = Source::Open(CsvRowReader::new(body)),
                    Err(e) => return Some(Err(e)),
                }
            }
        }

        loop {
            let rows = match &mut self.source {
                Source::Open(rows) => rows,
                _ => return None,
            };

            let row = match rows.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => {
                    self.close();
                    return None;
                }
                Err(e) => return self.fail(e),
            };

            match self.parser.parse_row(&row) {
                Ok(RowEvent::Record { record, .. }) => return Some(Ok(record)),
                Ok(_) => continue,
                Err(e) => return self.fail(e),
            }
        }
    }
}

impl Drop for FluxRecordStream {
    fn drop(&mut self) {
        self.close();
    }
}
