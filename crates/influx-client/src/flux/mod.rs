// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flux query results in annotated CSV.
//!
//! [`parse_tables`] materializes a whole response; [`FluxRecordStream`]
//! yields records one at a time for unbounded results.

mod parser;
mod stream;
mod table;

pub use parser::{parse_str, parse_tables, CsvRowReader, FluxCsvParser, RowEvent};
pub use stream::FluxRecordStream;
pub use table::{FluxColumn, FluxRecord, FluxTable, FluxValue};
