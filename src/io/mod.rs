//! I/O module
//!
//! Handles CSV parsing and output for the replay tool.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `reader` - Streaming CSV reader with iterator interface

pub mod csv_format;
pub mod reader;

pub use csv_format::{
    convert_csv_record, write_accounts_csv, write_transactions_csv, Operation, OperationRecord,
};
pub use reader::OperationReader;
