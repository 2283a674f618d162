//! Results persistence module
//!
//! Appends one CSV line per completed round to the suite's output file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::config::Workload;
use crate::models::ResultRow;
use crate::{Result, ScaleBenchError};

/// Destination of aggregated round rows
pub trait ResultSink {
    /// Persist one row; rows arrive in test case order
    fn record(&mut self, row: &ResultRow) -> Result<()>;
}

impl ResultSink for Vec<ResultRow> {
    fn record(&mut self, row: &ResultRow) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

/// CSV result file for one suite
///
/// The file is created (and truncated) on the first row so that an
/// unwritable location surfaces as a per-row persistence error.
#[derive(Debug)]
pub struct CsvResultSink {
    path: PathBuf,
    workload: Workload,
    writer: Option<BufWriter<File>>,
}

impl CsvResultSink {
    /// Create a sink writing to `path`
    pub fn new(path: impl Into<PathBuf>, workload: Workload) -> Self {
        Self {
            path: path.into(),
            workload,
            writer: None,
        }
    }

    fn open(&self) -> Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ScaleBenchError::PersistenceError(format!(
                        "Failed to create results directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = File::create(&self.path).map_err(|e| {
            ScaleBenchError::PersistenceError(format!(
                "Failed to create results file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut writer = BufWriter::new(file);
        write_line(&mut writer, ResultRow::csv_header(self.workload).iter().copied())
            .map_err(|e| self.write_error(e))?;
        Ok(writer)
    }

    fn write_error(&self, e: std::io::Error) -> ScaleBenchError {
        ScaleBenchError::PersistenceError(format!(
            "Failed to write results file {}: {}",
            self.path.display(),
            e
        ))
    }
}

impl ResultSink for CsvResultSink {
    fn record(&mut self, row: &ResultRow) -> Result<()> {
        if row.workload() != self.workload {
            return Err(ScaleBenchError::PersistenceError(format!(
                "{} row cannot be written to a {} results file",
                row.workload().description(),
                self.workload.description()
            )));
        }

        if self.writer.is_none() {
            self.writer = Some(self.open()?);
        }

        let fields = row.csv_fields();
        let result = match self.writer.as_mut() {
            Some(writer) => write_line(writer, fields.iter().map(String::as_str)),
            None => return Ok(()),
        };
        result.map_err(|e| self.write_error(e))
    }
}

fn write_line<'a, W: Write>(
    writer: &mut W,
    fields: impl Iterator<Item = &'a str>,
) -> std::io::Result<()> {
    let line: Vec<&str> = fields.collect();
    writeln!(writer, "{}", line.join(","))?;
    writer.flush()
}
