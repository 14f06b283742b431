//! Streaming CSV reader for replayed operations
//!
//! Provides an iterator over [`Operation`]s read from a CSV source,
//! delegating format concerns to the csv_format module.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `open()`
//! - Individual row errors are yielded as `Err` items carrying the line number
//!
//! Rows are read one at a time; the whole file is never held in memory.

use crate::io::csv_format::{convert_csv_record, Operation, OperationRecord};
use crate::types::LedgerError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Iterator over the operations of a CSV source
#[derive(Debug)]
pub struct OperationReader<R = File> {
    reader: csv::Reader<R>,
    line_num: u64,
}

impl OperationReader<File> {
    /// Open a CSV file for streaming
    ///
    /// # Returns
    ///
    /// * `Ok(OperationReader)` if the file opened successfully
    /// * `Err(LedgerError::IoError)` if it could not be opened
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| LedgerError::IoError {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> OperationReader<R> {
    /// Wrap any reader
    ///
    /// The CSV reader trims whitespace from all fields and accepts rows with
    /// fewer columns than the header, so trailing optional columns may be
    /// left off.
    pub fn from_reader(source: R) -> Self {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(source);

        Self {
            reader,
            line_num: 1,
        }
    }
}

impl<R: Read> Iterator for OperationReader<R> {
    type Item = Result<Operation, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<OperationRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;
        let line = self.line_num;

        Some(match row {
            Ok(record) => convert_csv_record(record).map_err(|e| match e {
                LedgerError::ParseError { message, .. } => LedgerError::ParseError {
                    line: Some(line),
                    message,
                },
                other => other,
            }),
            Err(e) => Err(LedgerError::ParseError {
                line: Some(e.position().map_or(line, |p| p.line())),
                message: e.to_string(),
            }),
        })
    }
}
